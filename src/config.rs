//! Process configuration.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::graph::GraphConfig;
use crate::llm::{LlmBackend, LlmConfig};

/// Process-level configuration for the assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub backend: LlmBackend,
    pub model: String,
    /// Key for the selected backend. `None` when the env var is unset.
    pub api_key: Option<SecretString>,
    /// libSQL file for persisted profiles. In-memory store when unset.
    pub db_path: Option<PathBuf>,
    pub graph: GraphConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::OpenAi,
            model: "gpt-4o".to_string(),
            api_key: None,
            db_path: None,
            graph: GraphConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Unset keys take their defaults;
    /// set keys that fail to parse are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match lookup("EXPERT_LLM_BACKEND") {
            Some(raw) => LlmBackend::from_str(&raw).map_err(|message| ConfigError::InvalidValue {
                key: "EXPERT_LLM_BACKEND".to_string(),
                message,
            })?,
            None => defaults.backend,
        };

        let model = lookup("EXPERT_MODEL").unwrap_or_else(|| match backend {
            LlmBackend::Anthropic => "claude-sonnet-4-20250514".to_string(),
            LlmBackend::OpenAi => defaults.model.clone(),
        });

        let key_var = match backend {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        };
        let api_key = lookup(key_var)
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let db_path = lookup("EXPERT_DB_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let graph = GraphConfig {
            message_manager_temperature: parse_or(
                &lookup,
                "EXPERT_TEMPERATURE",
                defaults.graph.message_manager_temperature,
            )?,
            field_help_temperature: parse_or(
                &lookup,
                "EXPERT_FIELD_HELP_TEMPERATURE",
                defaults.graph.field_help_temperature,
            )?,
            max_tokens: parse_or(&lookup, "EXPERT_MAX_TOKENS", defaults.graph.max_tokens)?,
            recent_assistant_window: parse_or(
                &lookup,
                "EXPERT_RECENT_WINDOW",
                defaults.graph.recent_assistant_window,
            )?,
            recursion_limit: parse_or(
                &lookup,
                "EXPERT_RECURSION_LIMIT",
                defaults.graph.recursion_limit,
            )?,
        };
        if graph.recursion_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EXPERT_RECURSION_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            backend,
            model,
            api_key,
            db_path,
            graph,
        })
    }

    /// Provider settings, failing if the backend's key is missing.
    pub fn llm_config(&self) -> Result<LlmConfig, ConfigError> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            ConfigError::MissingEnvVar(
                match self.backend {
                    LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
                    LlmBackend::OpenAi => "OPENAI_API_KEY",
                }
                .to_string(),
            )
        })?;
        Ok(LlmConfig {
            backend: self.backend,
            api_key,
            model: self.model.clone(),
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AssistantConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, LlmBackend::OpenAi);
        assert_eq!(config.model, "gpt-4o");
        assert!(config.api_key.is_none());
        assert!(config.db_path.is_none());
        assert_eq!(config.graph, GraphConfig::default());
        assert_eq!(config.graph.recent_assistant_window, 3);
        assert_eq!(config.graph.recursion_limit, 25);
    }

    #[test]
    fn anthropic_backend_reads_its_own_key() {
        let config = AssistantConfig::from_lookup(lookup(&[
            ("EXPERT_LLM_BACKEND", "Anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("EXPERT_DB_PATH", "./data/experts.db"),
        ]))
        .unwrap();
        assert_eq!(config.backend, LlmBackend::Anthropic);
        assert!(config.model.starts_with("claude"));
        let llm = config.llm_config().unwrap();
        assert_eq!(llm.api_key.expose_secret(), "sk-ant-test");
        assert_eq!(config.db_path, Some(PathBuf::from("./data/experts.db")));
    }

    #[test]
    fn missing_key_is_reported_by_name() {
        let config = AssistantConfig::from_lookup(lookup(&[])).unwrap();
        let err = config.llm_config().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "OPENAI_API_KEY"));
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = AssistantConfig::from_lookup(lookup(&[("EXPERT_MAX_TOKENS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "EXPERT_MAX_TOKENS"));

        let err = AssistantConfig::from_lookup(lookup(&[("EXPERT_RECURSION_LIMIT", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let err = AssistantConfig::from_lookup(lookup(&[("EXPERT_LLM_BACKEND", "llama")]))
            .unwrap_err();
        assert!(err.to_string().contains("llama"));
    }
}
