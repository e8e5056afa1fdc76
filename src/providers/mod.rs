//! Provider module for Clonar
//!
//! This module contains the LLM completion abstraction and the Ollama
//! implementation.

pub mod base;
pub mod ollama;

pub use base::{CompletionOptions, CompletionResponse, Message, Provider, TokenUsage};
pub use ollama::OllamaProvider;

use crate::config::ProviderConfig;
use crate::error::{ClonarError, Result};

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match config.provider_type.as_str() {
        "ollama" => Ok(Box::new(OllamaProvider::new(config.ollama.clone())?)),
        other => Err(ClonarError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}
