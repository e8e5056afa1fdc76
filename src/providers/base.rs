//! Base provider trait and common types for Clonar
//!
//! This module defines the Provider trait that LLM completion backends
//! implement, along with the message, option and response types shared by
//! the query normalizer and the planner.

use crate::error::{ClonarError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message structure for conversation
///
/// Represents a message exchanged with the completion provider. Conversation
/// history handed to the planner uses the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use clonar::providers::Message;
    ///
    /// let msg = Message::user("hotels in Lisbon");
    /// assert_eq!(msg.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Returns true for messages authored by the user
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// Sampling options for a single completion call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum completion tokens
    pub max_tokens: Option<u32>,
    /// Ask the provider to constrain output to a JSON object
    pub json_mode: bool,
}

impl CompletionOptions {
    /// Low-temperature plain-text options
    ///
    /// # Examples
    ///
    /// ```
    /// use clonar::providers::CompletionOptions;
    ///
    /// let options = CompletionOptions::deterministic(0.1, 64);
    /// assert_eq!(options.temperature, Some(0.1));
    /// assert!(!options.json_mode);
    /// ```
    pub fn deterministic(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
            json_mode: false,
        }
    }

    /// Returns the same options with JSON mode enabled
    pub fn with_json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Token usage information from a completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use clonar::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Completion response with message and optional token usage
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The assistant message
    pub message: Message,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a response without usage information
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    /// Create a response with usage information
    pub fn with_usage(message: Message, usage: TokenUsage) -> Self {
        Self {
            message,
            usage: Some(usage),
        }
    }
}

/// Provider trait for LLM completion backends
///
/// The language model is an opaque text-completion collaborator. Calls are
/// fallible and may time out; callers decide how to degrade.
///
/// # Examples
///
/// ```no_run
/// use clonar::providers::{CompletionOptions, CompletionResponse, Message, Provider};
/// use clonar::error::Result;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         _options: &CompletionOptions,
///     ) -> Result<CompletionResponse> {
///         let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
///         Ok(CompletionResponse::new(Message::assistant(last)))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation with the given messages
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails or response is invalid
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse>;

    /// Completes and returns the trimmed assistant text
    ///
    /// # Errors
    ///
    /// Returns `ClonarError::Provider` when the completion is empty
    async fn complete_text(&self, messages: &[Message], options: &CompletionOptions) -> Result<String> {
        let response = self.complete(messages, options).await?;
        let text = response.message.content.trim().to_string();
        if text.is_empty() {
            return Err(ClonarError::Provider("Provider returned an empty completion".to_string()).into());
        }
        Ok(text)
    }

    /// Get the name of the currently active model
    ///
    /// # Default Implementation
    ///
    /// The default implementation returns an error.
    fn get_current_model(&self) -> Result<String> {
        Err(ClonarError::Provider(
            "Current model information is not available from this provider".to_string(),
        )
        .into())
    }
}
