//! SerpAPI-backed catalog search
//!
//! Google Shopping and Google Hotels results are reduced to the compact
//! [`ShoppingItem`] and [`HotelItem`] shapes. Field values arrive as either
//! strings or numbers and are normalized to text.

use super::catalog::{CatalogHit, CatalogKind, CatalogSearch, HotelItem, ShoppingItem};
use crate::config::SerpApiConfig;
use crate::error::{ClonarError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// SerpAPI client
///
/// # Examples
///
/// ```
/// use clonar::actions::serpapi::SerpApiClient;
/// use clonar::config::SerpApiConfig;
///
/// let client = SerpApiClient::new(SerpApiConfig::default());
/// assert!(client.is_ok());
/// ```
pub struct SerpApiClient {
    client: Client,
    config: SerpApiConfig,
}

impl SerpApiClient {
    /// Create a client with the configured timeout
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: SerpApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("clonar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClonarError::Search(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            serpapi.event = "init",
            endpoint = %config.endpoint,
            has_key = config.api_key.is_some(),
            "Initialized SerpAPI client"
        );

        Ok(Self { client, config })
    }

    fn engine(kind: CatalogKind) -> &'static str {
        match kind {
            CatalogKind::Shopping => "google_shopping",
            CatalogKind::Hotels => "google_hotels",
        }
    }

    fn params(&self, kind: CatalogKind, query: &str, api_key: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("engine", Self::engine(kind).to_string()),
            ("q", query.to_string()),
            ("hl", self.config.language.clone()),
            ("gl", self.config.country.clone()),
            ("api_key", api_key.to_string()),
        ];
        if kind == CatalogKind::Hotels {
            // Hotels engine requires a stay; default to tomorrow for one night
            let check_in = Utc::now().date_naive() + chrono::Duration::days(1);
            let check_out = check_in + chrono::Duration::days(1);
            params.push(("check_in_date", check_in.format("%Y-%m-%d").to_string()));
            params.push(("check_out_date", check_out.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

#[async_trait]
impl CatalogSearch for SerpApiClient {
    async fn search(&self, kind: CatalogKind, query: &str, limit: usize) -> Result<Vec<CatalogHit>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ClonarError::Config("SerpAPI key not configured (set SERPAPI_KEY)".to_string())
            })?;

        tracing::debug!(
            serpapi.event = "request",
            engine = Self::engine(kind),
            query = %query,
            "Querying SerpAPI"
        );

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&self.params(kind, query, api_key))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(serpapi.event = "request_failed", error = %e, "SerpAPI request failed");
                ClonarError::Search(format!("SerpAPI request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            // The body may echo the request, which carries the key
            tracing::warn!(serpapi.event = "http_error", status = %status, "SerpAPI returned error");
            return Err(ClonarError::Search(format!("SerpAPI error {}", status)).into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClonarError::Search(format!("Failed to parse SerpAPI response: {}", e)))?;

        if let Some(message) = body.get("error").and_then(Value::as_str) {
            tracing::warn!(serpapi.event = "api_error", error = %message, "SerpAPI reported error");
            return Err(ClonarError::Search(format!("SerpAPI error: {}", message)).into());
        }

        let hits = match kind {
            CatalogKind::Shopping => parse_shopping(&body, limit),
            CatalogKind::Hotels => parse_hotels(&body, limit),
        };
        tracing::debug!(serpapi.event = "results", results = hits.len(), "SerpAPI results parsed");
        Ok(hits)
    }
}

/// Extract shopping listings from a response body
pub fn parse_shopping(body: &Value, limit: usize) -> Vec<CatalogHit> {
    let Some(results) = body.get("shopping_results").and_then(Value::as_array) else {
        return Vec::new();
    };

    results
        .iter()
        .take(limit)
        .map(|item| {
            CatalogHit::Product(ShoppingItem {
                title: text(item, "title"),
                price: text(item, "price"),
                link: first_text(item, &["link", "product_link"]),
                source: text(item, "source"),
                thumbnail: text(item, "thumbnail"),
                tag: text(item, "tag"),
                delivery: text(item, "delivery"),
                rating: text(item, "rating"),
                reviews: text(item, "reviews"),
                extracted_price: text(item, "extracted_price"),
                old_price: first_text(item, &["extracted_old_price", "extracted_price_old", "old_price"]),
            })
        })
        .collect()
}

/// Extract hotel listings from a response body
pub fn parse_hotels(body: &Value, limit: usize) -> Vec<CatalogHit> {
    let results = body
        .get("properties")
        .or_else(|| body.get("hotels_results"))
        .and_then(Value::as_array);
    let Some(results) = results else {
        return Vec::new();
    };

    results
        .iter()
        .take(limit)
        .map(|item| {
            let price = match text(item, "price") {
                p if !p.is_empty() => p,
                _ => item
                    .pointer("/rate_per_night/lowest")
                    .map(as_text)
                    .unwrap_or_default(),
            };
            let thumbnail = match text(item, "thumbnail") {
                t if !t.is_empty() => t,
                _ => item
                    .pointer("/images/0/thumbnail")
                    .map(as_text)
                    .unwrap_or_default(),
            };
            let amenities = item
                .get("amenities")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .map(as_text)
                        .filter(|a| !a.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            CatalogHit::Hotel(HotelItem {
                name: text(item, "name"),
                address: text(item, "address"),
                price,
                rating: first_text(item, &["rating", "overall_rating"]),
                reviews: text(item, "reviews"),
                thumbnail,
                link: text(item, "link"),
                amenities,
                booking_link: nested(item, "/booking/link"),
                booking_site: nested(item, "/booking/name"),
                city: nested(item, "/location/city"),
                state: nested(item, "/location/state"),
                country: nested(item, "/location/country"),
                description: text(item, "description"),
            })
        })
        .collect()
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn text(item: &Value, key: &str) -> String {
    item.get(key).map(as_text).unwrap_or_default()
}

fn first_text(item: &Value, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| text(item, key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn nested(item: &Value, pointer: &str) -> String {
    item.pointer(pointer).map(as_text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, api_key: Option<&str>) -> SerpApiConfig {
        SerpApiConfig {
            endpoint: format!("{}/search.json", server.uri()),
            api_key: api_key.map(str::to_string),
            timeout_seconds: 5,
            ..SerpApiConfig::default()
        }
    }

    #[test]
    fn test_parse_shopping_tolerates_numbers() {
        let body = json!({
            "shopping_results": [
                {
                    "title": "Sony WH-1000XM5",
                    "price": "$348.00",
                    "extracted_price": 348.0,
                    "product_link": "https://shop.test/sony",
                    "source": "Best Buy",
                    "rating": 4.7,
                    "reviews": 1200,
                    "extracted_old_price": 399.99
                },
                { "title": "second" }
            ]
        });
        let hits = parse_shopping(&body, 1);
        assert_eq!(hits.len(), 1);
        match &hits[0] {
            CatalogHit::Product(item) => {
                assert_eq!(item.link, "https://shop.test/sony");
                assert_eq!(item.rating, "4.7");
                assert_eq!(item.reviews, "1200");
                assert_eq!(item.extracted_price, "348.0");
                assert_eq!(item.old_price, "399.99");
            }
            other => panic!("unexpected hit: {:?}", other),
        }
    }

    #[test]
    fn test_parse_hotels_fallbacks() {
        let body = json!({
            "hotels_results": [{
                "name": "Park Hyatt Tokyo",
                "rate_per_night": { "lowest": "$612" },
                "overall_rating": 4.6,
                "images": [{ "thumbnail": "https://img.test/1.jpg" }],
                "amenities": ["Pool", "Spa", 3],
                "booking": { "link": "https://book.test", "name": "Hyatt" },
                "location": { "city": "Tokyo", "country": "Japan" }
            }]
        });
        let hits = parse_hotels(&body, 5);
        match &hits[0] {
            CatalogHit::Hotel(item) => {
                assert_eq!(item.price, "$612");
                assert_eq!(item.rating, "4.6");
                assert_eq!(item.thumbnail, "https://img.test/1.jpg");
                assert_eq!(item.amenities, vec!["Pool", "Spa", "3"]);
                assert_eq!(item.booking_site, "Hyatt");
                assert_eq!(item.city, "Tokyo");
                assert_eq!(item.state, "");
            }
            other => panic!("unexpected hit: {:?}", other),
        }
    }

    #[test]
    fn test_missing_results_is_empty() {
        assert!(parse_shopping(&json!({}), 5).is_empty());
        assert!(parse_hotels(&json!({"properties": "nope"}), 5).is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let server = MockServer::start().await;
        let client = SerpApiClient::new(config_for(&server, None)).unwrap();
        let err = client
            .search(CatalogKind::Shopping, "headphones", 5)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SERPAPI_KEY"));
    }

    #[tokio::test]
    async fn test_search_shopping_sends_engine_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("engine", "google_shopping"))
            .and(query_param("q", "running shoes"))
            .and(query_param("hl", "en"))
            .and(query_param("gl", "us"))
            .and(query_param("api_key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "shopping_results": [
                    { "title": "Pegasus 41", "price": "$130", "link": "https://nike.test/p41" }
                ]
            })))
            .mount(&server)
            .await;

        let client = SerpApiClient::new(config_for(&server, Some("secret"))).unwrap();
        let hits = client
            .search(CatalogKind::Shopping, "running shoes", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].link(), "https://nike.test/p41");
    }

    #[tokio::test]
    async fn test_search_hotels_sends_stay_dates() {
        let server = MockServer::start().await;
        let check_in = (Utc::now().date_naive() + chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("engine", "google_hotels"))
            .and(query_param("check_in_date", check_in.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": [{ "name": "Hotel Monaco", "link": "https://monaco.test" }]
            })))
            .mount(&server)
            .await;

        let client = SerpApiClient::new(config_for(&server, Some("secret"))).unwrap();
        let hits = client
            .search(CatalogKind::Hotels, "hotels in Salt Lake City", 5)
            .await
            .unwrap();
        assert_eq!(hits[0].title(), "Hotel Monaco");
    }

    #[tokio::test]
    async fn test_http_error_does_not_leak_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad api_key=secret"))
            .mount(&server)
            .await;

        let client = SerpApiClient::new(config_for(&server, Some("secret"))).unwrap();
        let err = client
            .search(CatalogKind::Shopping, "tv", 5)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(!message.contains("secret"));
    }

    #[tokio::test]
    async fn test_api_error_field_is_search_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"error": "Google hasn't returned any results"})),
            )
            .mount(&server)
            .await;

        let client = SerpApiClient::new(config_for(&server, Some("secret"))).unwrap();
        let err = client
            .search(CatalogKind::Shopping, "zzzz", 5)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("any results"));
    }
}
