//! Error types for Clonar
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Clonar operations
///
/// Collaborator failures (LLM, search backends) are normally caught at the
/// boundary of the component that calls them. Only `InvalidInput` and
/// `Cancelled` are expected to surface from an action run as hard stops.
#[derive(Error, Debug)]
pub enum ClonarError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (LLM API calls, malformed completions)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Search backend errors (document index, catalog search)
    #[error("Search error: {0}")]
    Search(String),

    /// Caller-supplied action input failed validation
    #[error("Invalid action input: {0}")]
    InvalidInput(String),

    /// The turn's cancellation signal was raised
    #[error("Operation cancelled")]
    Cancelled,

    /// No action registered under the requested name
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The action exists but is not enabled for this request
    #[error("Action not enabled for this request: {0}")]
    ActionDisabled(String),

    /// An action with the same name was already registered
    #[error("Action already registered: {0}")]
    DuplicateAction(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClonarError {
    /// Returns true if the error chain carries a cancellation outcome
    ///
    /// # Examples
    ///
    /// ```
    /// use clonar::error::ClonarError;
    ///
    /// let err: anyhow::Error = ClonarError::Cancelled.into();
    /// assert!(ClonarError::is_cancellation(&err));
    /// ```
    pub fn is_cancellation(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<ClonarError>(), Some(ClonarError::Cancelled))
    }

    /// Returns true if the error chain carries an input validation failure
    pub fn is_invalid_input(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<ClonarError>(),
            Some(ClonarError::InvalidInput(_))
        )
    }
}

/// Result type alias for Clonar operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ClonarError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_provider_error_display() {
        let error = ClonarError::Provider("API timeout".to_string());
        assert_eq!(error.to_string(), "Provider error: API timeout");
    }

    #[test]
    fn test_invalid_input_display() {
        let error = ClonarError::InvalidInput("queries must not be empty".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid action input: queries must not be empty"
        );
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(ClonarError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancellation_through_anyhow() {
        let err: anyhow::Error = ClonarError::Cancelled.into();
        assert!(ClonarError::is_cancellation(&err));
        assert!(!ClonarError::is_invalid_input(&err));
    }

    #[test]
    fn test_is_invalid_input_through_anyhow() {
        let err: anyhow::Error = ClonarError::InvalidInput("bad".to_string()).into();
        assert!(ClonarError::is_invalid_input(&err));
        assert!(!ClonarError::is_cancellation(&err));
    }

    #[test]
    fn test_plain_anyhow_is_neither() {
        let err = anyhow::anyhow!("backend exploded");
        assert!(!ClonarError::is_cancellation(&err));
        assert!(!ClonarError::is_invalid_input(&err));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: ClonarError = json_error.into();
        assert!(matches!(error, ClonarError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: ClonarError = yaml_error.into();
        assert!(matches!(error, ClonarError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClonarError>();
    }
}
