//! Deterministic keyword rules
//!
//! Quick-mode planning runs entirely on these rules. Deep mode uses them to
//! fill in whatever the model left out (time sensitivity, constraints,
//! ambiguity, the airport soft constraint).

use super::types::{
    AmbiguityInfo, ExtractedEntities, FlightFilters, HotelFilters, Intent, MovieFilters,
    ProductFilters, SlotState, SoftConstraint, TimeSensitivity, Vertical, VerticalFilters,
};
use crate::config::MAX_SUB_QUERIES;
use crate::providers::Message;
use regex::Regex;
use std::sync::OnceLock;

/// Placeholder restatement for blank input
pub const EMPTY_QUERY_PROMPT: &str = "general question";

const FLIGHT_TERMS: &[&str] = &[
    "flight",
    "fly",
    "flying",
    "airfare",
    "airline",
    "plane ticket",
    "nonstop",
    "non-stop",
    "round trip",
    "round-trip",
    "one way",
    "one-way",
    "layover",
];

const HOTEL_TERMS: &[&str] = &[
    "hotel",
    "motel",
    "resort",
    "inn",
    "bed and breakfast",
    "b&b",
    "vacation rental",
    "lodging",
    "hostel",
    "place to stay",
    "accommodation",
    "airbnb",
];

const MOVIE_TERMS: &[&str] = &[
    "movie",
    "film",
    "cinema",
    "showtime",
    "trailer",
    "box office",
    "imdb",
    "screening",
    "sequel",
    "netflix",
];

const PRODUCT_TERMS: &[&str] = &[
    "buy",
    "purchase",
    "price",
    "cheap",
    "deal",
    "sale",
    "shop",
    "shopping",
    "product",
    "laptop",
    "phone",
    "iphone",
    "headphone",
    "earbud",
    "shoes",
    "sneaker",
    "jacket",
    "dress",
    "tv",
    "camera",
    "backpack",
    "gift",
];

/// Product nouns usable as a category filter
const PRODUCT_CATEGORIES: &[&str] = &[
    "laptop", "phone", "iphone", "headphone", "earbud", "shoes", "sneaker", "jacket", "dress",
    "tv", "camera", "backpack",
];

/// Phrases that contain a clause separator but must stay whole
const PROTECTED_PHRASES: &[&str] = &[
    "bed and breakfast",
    "black and white",
    "rock and roll",
    "salt and pepper",
    "b&b",
];

const COMPARE_TERMS: &[&str] = &[
    "compare",
    "comparison",
    "vs",
    "versus",
    "better",
    "difference between",
];
const BUY_TERMS: &[&str] = &["buy", "purchase", "order", "checkout", "add to cart"];
const BOOK_TERMS: &[&str] = &["book", "booking", "reserve", "reservation"];

const TIME_SENSITIVE_TERMS: &[&str] = &[
    "today",
    "tonight",
    "tomorrow",
    "now",
    "latest",
    "current",
    "currently",
    "upcoming",
    "news",
    "showtime",
    "in theaters",
    "in theatres",
    "deal",
    "sale",
    "price",
    "in stock",
    "availability",
    "available",
    "open now",
    "schedule",
    "this week",
    "this weekend",
    "next week",
    "next weekend",
    "this month",
    "next month",
    "new release",
    "release date",
];

const AMENITIES: &[&str] = &[
    "pool",
    "wifi",
    "wi-fi",
    "free breakfast",
    "breakfast",
    "parking",
    "gym",
    "spa",
    "pet friendly",
    "pet-friendly",
    "ocean view",
    "kitchen",
    "airport shuttle",
];

const BRANDS: &[(&str, &str)] = &[
    ("apple", "Apple"),
    ("samsung", "Samsung"),
    ("sony", "Sony"),
    ("bose", "Bose"),
    ("nike", "Nike"),
    ("adidas", "Adidas"),
    ("dell", "Dell"),
    ("lenovo", "Lenovo"),
    ("canon", "Canon"),
    ("nikon", "Nikon"),
    ("hilton", "Hilton"),
    ("marriott", "Marriott"),
    ("hyatt", "Hyatt"),
    ("delta", "Delta"),
    ("united airlines", "United Airlines"),
    ("jetblue", "JetBlue"),
];

const GENRES: &[&str] = &[
    "comedy",
    "horror",
    "action",
    "drama",
    "thriller",
    "animated",
    "documentary",
    "romance",
    "sci-fi",
    "musical",
];

const CABINS: &[&str] = &["premium economy", "business class", "first class", "economy"];

/// Ambiguous terms, each with interpretations and the context cues that favor them
const AMBIGUOUS_TERMS: &[(&str, &[(&str, &[&str])])] = &[
    (
        "apple",
        &[
            (
                "Apple (electronics brand)",
                &["iphone", "ipad", "macbook", "mac", "airpods", "laptop", "phone", "charger"],
            ),
            (
                "apple (fruit)",
                &["fruit", "eat", "recipe", "pie", "juice", "organic", "orchard"],
            ),
        ],
    ),
    (
        "jaguar",
        &[
            (
                "Jaguar (car brand)",
                &["car", "suv", "drive", "dealer", "lease", "sedan"],
            ),
            (
                "jaguar (animal)",
                &["animal", "zoo", "wild", "wildlife", "habitat", "rainforest"],
            ),
        ],
    ),
    (
        "python",
        &[
            (
                "Python (programming language)",
                &["code", "coding", "programming", "course", "script", "developer"],
            ),
            ("python (snake)", &["snake", "reptile", "pet", "zoo", "terrarium"]),
        ],
    ),
    (
        "amazon",
        &[
            (
                "Amazon (retailer)",
                &["order", "delivery", "prime", "buy", "shipping", "deal"],
            ),
            (
                "Amazon (rainforest)",
                &["rainforest", "river", "tour", "brazil", "jungle", "expedition"],
            ),
        ],
    ),
    (
        "jordan",
        &[
            (
                "Air Jordan (sneakers)",
                &["sneaker", "shoes", "nike", "size", "retro"],
            ),
            (
                "Jordan (country)",
                &["flight", "hotel", "petra", "amman", "trip", "visit", "travel"],
            ),
        ],
    ),
    (
        "galaxy",
        &[
            (
                "Samsung Galaxy (phones)",
                &["samsung", "phone", "android", "case", "charger"],
            ),
            (
                "galaxy (astronomy or film)",
                &["movie", "film", "space", "telescope", "guardians"],
            ),
        ],
    ),
];

/// Words that end a captured place phrase
const PHRASE_STOPWORDS: &[&str] = &[
    "with", "and", "for", "under", "in", "on", "at", "that", "which", "or", "but", "plus",
    "then", "please", "from", "to",
];

/// Uppercase three-letter words that are not airport codes
const NOT_AIRPORT_CODES: &[&str] = &["THE", "AND", "FOR", "USA", "ANA", "JAL", "NYC", "TV"];

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s*(?:,|;|\band\b|\bplus\b|\bthen\b)\s*").expect("separator pattern")
    })
}

fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?i:to|in|at|visiting|visit)\s+([A-Z][\p{L}]+(?:\s+[A-Z][\p{L}]+)?)")
            .expect("destination pattern")
    })
}

fn origin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bfrom\s+([A-Z][\p{L}]+(?:\s+[A-Z][\p{L}]+)?)").expect("origin pattern")
    })
}

fn proximity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(near|close to|next to|walking distance (?:to|from))\s+((?:the\s+)?[\p{L}][\p{L}'-]*(?:\s+[\p{L}][\p{L}'-]*)?)",
        )
        .expect("proximity pattern")
    })
}

fn budget_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:under|below|less than|up to|at most|max(?:imum)?|within)\s+\$?\s?(\d[\d,]*(?:\.\d+)?)",
        )
        .expect("budget pattern")
    })
}

fn rating_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([1-5](?:\.\d)?)\s*\+?\s*-?\s*stars?\b").expect("rating pattern")
    })
}

fn dates_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(today|tonight|tomorrow|this (?:week|weekend|month)|next (?:week|weekend|month)|\d{4}-\d{2}-\d{2}|(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+\d{1,2}(?:st|nd|rd|th)?)\b",
        )
        .expect("dates pattern")
    })
}

fn party_size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(\d{1,2})\s+(?:guests|people|adults|persons|travell?ers|passengers|tickets)\b",
        )
        .expect("party size pattern")
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year pattern"))
}

fn airport_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{3}\b").expect("airport code pattern"))
}

fn comparison_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s+(?:vs\.?|versus|or|and|compared (?:to|with))\s+|\s*,\s*")
            .expect("comparison pattern")
    })
}

fn comparison_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:compare|which is better[,:]?|what's better[,:]?)\s+(?:the\s+)?")
            .expect("comparison prefix pattern")
    })
}

/// Whole-word (or whole-phrase) match, tolerating an `s`/`es` plural
///
/// `lower` must already be lowercase.
pub fn has_term(lower: &str, term: &str) -> bool {
    let boundary = |s: &str| s.chars().next().map_or(true, |c| !c.is_alphanumeric());
    lower.match_indices(term).any(|(i, _)| {
        let before_ok = lower[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let rest = &lower[i + term.len()..];
        before_ok
            && (boundary(rest)
                || rest.strip_prefix('s').is_some_and(boundary)
                || rest.strip_prefix("es").is_some_and(boundary))
    })
}

fn count_terms(lower: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|term| has_term(lower, term)).count()
}

/// Collapse whitespace and trailing punctuation into a retrieval-ready prompt
///
/// Blank input yields [`EMPTY_QUERY_PROMPT`].
pub fn rewrite(query: &str) -> String {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['.', '?', '!', ',', ';']).trim();
    if trimmed.is_empty() {
        EMPTY_QUERY_PROMPT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Split an utterance into clauses on ",", ";", "and", "plus", "then"
///
/// Returns byte ranges into `query`. Phrases such as "bed and breakfast" are
/// never split.
pub fn split_clauses(query: &str) -> Vec<(usize, usize)> {
    let mut masked = query.to_ascii_lowercase();
    for phrase in PROTECTED_PHRASES {
        let guarded = phrase.replace([' ', '&'], "_");
        masked = masked.replace(phrase, &guarded);
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    for separator in separator_re().find_iter(&masked) {
        if separator.start() > start {
            ranges.push((start, separator.start()));
        }
        start = separator.end();
    }
    if start < query.len() {
        ranges.push((start, query.len()));
    }

    ranges
        .into_iter()
        .filter(|(s, e)| !query[*s..*e].trim().is_empty())
        .collect()
}

/// Best vertical for a clause, with its keyword hit count
///
/// Ties go to the more specific vertical (flight, hotel, movie, product).
pub fn detect_vertical(clause: &str) -> Option<(Vertical, usize)> {
    let lower = clause.to_lowercase();
    let scored = [
        (Vertical::Flight, count_terms(&lower, FLIGHT_TERMS)),
        (Vertical::Hotel, count_terms(&lower, HOTEL_TERMS)),
        (Vertical::Movie, count_terms(&lower, MOVIE_TERMS)),
        (Vertical::Product, count_terms(&lower, PRODUCT_TERMS)),
    ];

    let mut best: Option<(Vertical, usize)> = None;
    for (vertical, hits) in scored {
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((vertical, hits));
        }
    }
    best
}

/// Per-vertical slice of an utterance
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalSlice {
    pub vertical: Vertical,
    /// Clause text belonging to this vertical
    pub text: String,
    /// Keyword hits across its clauses
    pub hits: usize,
    /// Index of its first clause
    pub first_clause: usize,
}

/// Assign every clause to a vertical and group them
///
/// Clauses without a keyword inherit the vertical of the preceding clause
/// (leading ones inherit from the first classified clause). Adjacent clauses
/// of one vertical are kept as one span of the original text.
pub fn decompose(query: &str) -> Vec<VerticalSlice> {
    let ranges = split_clauses(query);
    let detected: Vec<Option<(Vertical, usize)>> = ranges
        .iter()
        .map(|(s, e)| detect_vertical(&query[*s..*e]))
        .collect();

    let first_known = match detected.iter().flatten().next() {
        Some((vertical, _)) => *vertical,
        None => return Vec::new(),
    };

    let mut slices: Vec<VerticalSlice> = Vec::new();
    let mut spans: Vec<(Vertical, Vec<(usize, usize)>)> = Vec::new();
    let mut current = first_known;
    let mut previous: Option<Vertical> = None;

    for (index, ((start, end), hit)) in ranges.iter().zip(&detected).enumerate() {
        let hits = hit.map_or(0, |(_, h)| h);
        if let Some((vertical, _)) = hit {
            current = *vertical;
        }

        match slices.iter_mut().find(|slice| slice.vertical == current) {
            Some(slice) => slice.hits += hits,
            None => slices.push(VerticalSlice {
                vertical: current,
                text: String::new(),
                hits,
                first_clause: index,
            }),
        }

        let entry = match spans.iter_mut().position(|(v, _)| *v == current) {
            Some(pos) => &mut spans[pos].1,
            None => {
                spans.push((current, Vec::new()));
                let last = spans.len() - 1;
                &mut spans[last].1
            }
        };
        match entry.last_mut() {
            Some(last) if previous == Some(current) => last.1 = *end,
            _ => entry.push((*start, *end)),
        }
        previous = Some(current);
    }

    for slice in &mut slices {
        if let Some((_, ranges)) = spans.iter().find(|(v, _)| *v == slice.vertical) {
            slice.text = ranges
                .iter()
                .map(|(s, e)| query[*s..*e].trim())
                .collect::<Vec<_>>()
                .join(", ");
        }
    }

    slices
}

/// Intent from keywords: compare, then buy, then book, else browse
pub fn detect_intent(text: &str) -> Intent {
    let lower = text.to_lowercase();
    if count_terms(&lower, COMPARE_TERMS) > 0 {
        Intent::Compare
    } else if count_terms(&lower, BUY_TERMS) > 0 {
        Intent::Buy
    } else if count_terms(&lower, BOOK_TERMS) > 0 {
        Intent::Book
    } else {
        Intent::Browse
    }
}

/// Freshness tag
///
/// Time-sensitive when a freshness keyword or date appears, or when the
/// primary vertical is flight (fares and schedules always change).
pub fn detect_time_sensitivity(text: &str, vertical: Vertical) -> TimeSensitivity {
    let lower = text.to_lowercase();
    if vertical == Vertical::Flight
        || count_terms(&lower, TIME_SENSITIVE_TERMS) > 0
        || dates_re().is_match(text)
    {
        TimeSensitivity::TimeSensitive
    } else {
        TimeSensitivity::Timeless
    }
}

/// First capitalized place after "to", "in", "at" or "visit"
pub fn find_destination(text: &str) -> Option<String> {
    destination_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Most recent destination mentioned in the user's history
pub fn destination_from_history(history: &[Message]) -> Option<String> {
    history
        .iter()
        .rev()
        .filter(|m| m.is_user())
        .find_map(|m| find_destination(&m.content))
}

fn find_origin(text: &str) -> Option<String> {
    origin_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn find_proximity(text: &str) -> Option<String> {
    let caps = proximity_re().captures(text)?;
    let preposition = caps.get(1)?.as_str().to_lowercase();
    let mut words: Vec<&str> = caps.get(2)?.as_str().split_whitespace().collect();
    while words
        .last()
        .is_some_and(|w| PHRASE_STOPWORDS.contains(&w.to_lowercase().as_str()))
    {
        words.pop();
    }
    if words.is_empty() || (words.len() == 1 && words[0].eq_ignore_ascii_case("the")) {
        return None;
    }
    Some(format!("{} {}", preposition, words.join(" ")))
}

fn find_budget(text: &str) -> Option<f64> {
    budget_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

fn find_rating(text: &str) -> Option<f32> {
    rating_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn find_dates(text: &str) -> Vec<String> {
    dates_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn find_party_size(text: &str) -> Option<u32> {
    party_size_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn find_brand(lower: &str) -> Option<&'static str> {
    BRANDS
        .iter()
        .find(|(term, _)| has_term(lower, term))
        .map(|(_, display)| *display)
}

fn find_amenities(lower: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for amenity in AMENITIES {
        if has_term(lower, amenity)
            && !found
                .iter()
                .any(|f| f.contains(amenity) || amenity.contains(f.as_str()))
        {
            found.push(amenity.to_string());
        }
    }
    found
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

/// Constraints as "kind:value" strings, most important first
///
/// Order: destination, dates, budget, proximity, brand, rating, amenities.
pub fn extract_constraints(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut constraints = Vec::new();

    if let Some(destination) = find_destination(text) {
        constraints.push(format!("destination:{}", destination));
    }
    if let Some(date) = find_dates(text).into_iter().next() {
        constraints.push(format!("dates:{}", date));
    }
    if let Some(amount) = find_budget(text) {
        constraints.push(format!("budget:under ${}", format_amount(amount)));
    } else if has_term(&lower, "cheap") || has_term(&lower, "affordable") {
        constraints.push("budget:low".to_string());
    }
    if let Some(near) = find_proximity(text) {
        constraints.push(format!("location:{}", near));
    }
    if let Some(brand) = find_brand(&lower) {
        constraints.push(format!("brand:{}", brand));
    }
    if let Some(rating) = find_rating(text) {
        constraints.push(format!("rating:{}+ stars", rating));
    } else if ["highly rated", "top rated", "top-rated", "best rated", "well reviewed"]
        .iter()
        .any(|phrase| has_term(&lower, phrase))
    {
        constraints.push("rating:highly rated".to_string());
    }
    for amenity in find_amenities(&lower) {
        constraints.push(format!("amenities:{}", amenity));
    }

    constraints
}

/// Entities, locations and concepts named in the text
pub fn extract_entities(text: &str) -> ExtractedEntities {
    let lower = text.to_lowercase();
    let mut entities = ExtractedEntities::default();

    if let Some(brand) = find_brand(&lower) {
        entities.entities.push(brand.to_string());
    }
    for place in [find_origin(text), find_destination(text)].into_iter().flatten() {
        if !entities.locations.contains(&place) {
            entities.locations.push(place);
        }
    }
    if let Some(near) = find_proximity(text) {
        entities.concepts.push(near);
    }
    entities.concepts.extend(find_amenities(&lower));

    entities
}

/// Look up a dictionary-ambiguous term and resolve it from context
///
/// An interpretation is resolved only when it has at least one cue in the
/// utterance or history and every other interpretation has none.
pub fn detect_ambiguity(text: &str, history: &[Message]) -> Option<AmbiguityInfo> {
    let lower = text.to_lowercase();
    let (term, senses) = AMBIGUOUS_TERMS
        .iter()
        .find(|(term, _)| has_term(&lower, term))?;

    let mut context = lower.clone();
    for message in history {
        context.push(' ');
        context.push_str(&message.content.to_lowercase());
    }

    let info = AmbiguityInfo {
        term: term.to_string(),
        interpretations: senses.iter().map(|(name, _)| name.to_string()).collect(),
        resolved: None,
    };
    Some(resolve_ambiguity(info, &context))
}

/// Resolve an ambiguity using dictionary cues found in `context`
///
/// Leaves `resolved` untouched when the term is not in the dictionary.
pub fn resolve_ambiguity(mut info: AmbiguityInfo, context: &str) -> AmbiguityInfo {
    let term = info.term.to_lowercase();
    let Some((_, senses)) = AMBIGUOUS_TERMS.iter().find(|(t, _)| *t == term) else {
        return info;
    };

    let lower = context.to_lowercase();
    let hits: Vec<(&str, usize)> = senses
        .iter()
        .map(|(name, cues)| (*name, count_terms(&lower, cues)))
        .collect();

    let supported: Vec<&(&str, usize)> = hits.iter().filter(|(_, n)| *n > 0).collect();
    if let [(name, _)] = supported.as_slice() {
        info.resolved = Some(name.to_string());
    }
    info
}

/// Airport soft constraint for utterances that mention an airport without a code
///
/// The state is city-only when a city is known (from the utterance or the
/// fallback), otherwise unresolved.
pub fn detect_airport_constraint(text: &str, city_fallback: Option<&str>) -> Option<SoftConstraint> {
    let lower = text.to_lowercase();
    if !has_term(&lower, "airport") {
        return None;
    }

    let has_code = airport_code_re()
        .find_iter(text)
        .any(|m| !NOT_AIRPORT_CODES.contains(&m.as_str()));
    if has_code {
        return None;
    }

    let city = find_destination(text).or_else(|| city_fallback.map(str::to_string));
    Some(SoftConstraint {
        slot: "airport".to_string(),
        state: if city.is_some() {
            SlotState::CityOnly
        } else {
            SlotState::Unresolved
        },
        value: city,
    })
}

/// Filters for `vertical` from its slice of the utterance
///
/// `city_fallback` fills the destination when the slice names none.
pub fn filters_for(vertical: Vertical, slice: &str, city_fallback: Option<&str>) -> Option<VerticalFilters> {
    let lower = slice.to_lowercase();
    let dates = find_dates(slice);
    let destination = find_destination(slice).or_else(|| city_fallback.map(str::to_string));

    let filters = match vertical {
        Vertical::Product => VerticalFilters::Product(ProductFilters {
            category: PRODUCT_CATEGORIES
                .iter()
                .find(|c| has_term(&lower, c))
                .map(|c| c.to_string()),
            brand: find_brand(&lower).map(str::to_string),
            price_min: None,
            price_max: find_budget(slice),
            rating_min: find_rating(slice),
            features: Vec::new(),
        }),
        Vertical::Hotel => VerticalFilters::Hotel(HotelFilters {
            destination,
            check_in: dates.first().cloned(),
            check_out: dates.get(1).cloned(),
            guests: find_party_size(slice),
            budget: find_budget(slice),
            amenities: find_amenities(&lower),
        }),
        Vertical::Flight => VerticalFilters::Flight(FlightFilters {
            origin: find_origin(slice),
            destination,
            depart_date: dates.first().cloned(),
            return_date: dates.get(1).cloned(),
            passengers: find_party_size(slice),
            cabin: CABINS
                .iter()
                .find(|c| has_term(&lower, c))
                .map(|c| c.to_string()),
        }),
        Vertical::Movie => VerticalFilters::Movie(MovieFilters {
            title: None,
            genre: GENRES
                .iter()
                .find(|g| has_term(&lower, g))
                .map(|g| g.to_string()),
            year: year_re()
                .captures(slice)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok()),
        }),
        Vertical::Other => return None,
    };
    Some(filters)
}

/// Items being compared ("iphone 15 vs pixel 8" -> ["iphone 15", "pixel 8"])
///
/// Returns an empty list unless at least two items are found. At most
/// [`MAX_SUB_QUERIES`] items are returned.
pub fn comparison_sub_queries(text: &str) -> Vec<String> {
    let stripped = comparison_prefix_re().replace(text.trim(), "");
    let items: Vec<String> = comparison_split_re()
        .split(&stripped)
        .map(|item| item.trim().trim_end_matches(['?', '.', '!']).trim().to_string())
        .filter(|item| !item.is_empty())
        .take(MAX_SUB_QUERIES)
        .collect();

    if items.len() >= 2 {
        items
    } else {
        Vec::new()
    }
}
