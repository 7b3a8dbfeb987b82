//! Error types for the expert builder.

use std::time::Duration;

/// Top-level error type for a conversation turn.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Text shown to the person chatting when a turn fails.
    ///
    /// Routing and graph errors are contract violations upstream, so they
    /// never leak their details into the conversation.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Llm(LlmError::RateLimited { .. }) => {
                "I'm getting a lot of requests right now. Please try again in a moment."
            }
            _ => "Sorry, something went wrong on my side. Please try again.",
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors. Extraction failures reuse these.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// The Message Manager asked for an action that does not match any known shape.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Unknown action requested: {name}")]
    UnknownAction { name: String },

    #[error("Invalid arguments for action {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Expected at most one action per turn, got {count}")]
    MultipleActions { count: usize },
}

/// Turn-loop errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Turn exceeded the recursion limit of {limit} node executions")]
    RecursionLimit { limit: usize },

    #[error("Action {call_id} has no answer yet; cannot run the message manager")]
    UnansweredAction { call_id: String },
}

/// Persistent store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for the expert builder.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_hides_routing_details() {
        let err = Error::from(RoutingError::UnknownAction {
            name: "delete_everything".to_string(),
        });
        assert!(!err.user_message().contains("delete_everything"));
        assert!(err.user_message().contains("try again"));
    }

    #[test]
    fn rate_limit_gets_its_own_message() {
        let err = Error::from(LlmError::RateLimited {
            provider: "anthropic".to_string(),
            retry_after: None,
        });
        assert!(err.user_message().contains("moment"));
    }
}
