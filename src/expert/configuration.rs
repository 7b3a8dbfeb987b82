//! Per-invocation run configuration.
//!
//! The caller passes a JSON object (optionally wrapped in a `"configurable"`
//! key). Resolution never fails: unknown keys are ignored and missing or
//! mistyped keys fall back to their defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::store::Namespace;

pub const DEFAULT_THREAD_ID: &str = "default-thread";
pub const DEFAULT_TENANT_ID: &str = "default-tenant";
pub const DEFAULT_EXPERT_ID: &str = "default-expert";

/// Profile values supplied by the front end for this run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOverride {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
}

/// A complete, defaulted run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub thread_id: String,
    pub tenant_id: String,
    pub expert_id: String,
    pub profile_override: ProfileOverride,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            thread_id: DEFAULT_THREAD_ID.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            expert_id: DEFAULT_EXPERT_ID.to_string(),
            profile_override: ProfileOverride::default(),
        }
    }
}

impl ResolvedConfig {
    /// Resolve a possibly absent run configuration.
    pub fn resolve(config: Option<&Value>) -> Self {
        let mut resolved = Self::default();
        let Some(config) = config else {
            return resolved;
        };

        let configurable = match config.get("configurable") {
            Some(inner @ Value::Object(_)) => inner,
            _ => config,
        };
        let Some(map) = configurable.as_object() else {
            debug!("Run configuration is not an object; using defaults");
            return resolved;
        };

        if let Some(v) = string_key(map, "thread_id") {
            resolved.thread_id = v;
        }
        if let Some(v) = string_key(map, "tenant_id") {
            resolved.tenant_id = v;
        }
        if let Some(v) = string_key(map, "expert_id") {
            resolved.expert_id = v;
        }
        match map.get("expert_profile") {
            Some(Value::Object(profile)) => {
                resolved.profile_override = ProfileOverride {
                    name: string_key(profile, "name"),
                    description: string_key(profile, "description"),
                    instructions: string_key(profile, "instructions"),
                };
            }
            None | Some(Value::Null) => {}
            Some(other) => debug!(value = %other, "Ignoring non-object expert_profile"),
        }
        resolved
    }

    /// Persistent-store namespace for this run's expert.
    pub fn namespace(&self) -> Namespace {
        Namespace::for_expert(&self.tenant_id, &self.expert_id)
    }
}

/// Read a string-valued key; other JSON types are treated as absent.
fn string_key(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => None,
        Some(other) => {
            debug!(key, value = %other, "Ignoring non-string configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn absent_config_uses_defaults() {
        let resolved = ResolvedConfig::resolve(None);
        assert_eq!(resolved.tenant_id, "default-tenant");
        assert_eq!(resolved.expert_id, "default-expert");
        assert_eq!(resolved.thread_id, "default-thread");
        assert_eq!(resolved.profile_override, ProfileOverride::default());
    }

    #[test]
    fn configurable_wrapper_is_unwrapped() {
        let config = json!({
            "configurable": {
                "thread_id": "1",
                "tenant_id": "brais",
                "expert_id": "42",
                "expert_profile": {"name": "Brais"}
            }
        });
        let resolved = ResolvedConfig::resolve(Some(&config));
        assert_eq!(resolved.thread_id, "1");
        assert_eq!(resolved.tenant_id, "brais");
        assert_eq!(resolved.expert_id, "42");
        assert_eq!(resolved.profile_override.name.as_deref(), Some("Brais"));
        assert!(resolved.profile_override.description.is_none());
    }

    #[test]
    fn flat_config_is_accepted() {
        let config = json!({"tenant_id": "acme"});
        let resolved = ResolvedConfig::resolve(Some(&config));
        assert_eq!(resolved.tenant_id, "acme");
        assert_eq!(resolved.expert_id, "default-expert");
    }

    #[test]
    fn unknown_and_mistyped_keys_are_ignored() {
        let config = json!({
            "tenant_id": 7,
            "model": "gpt-4o",
            "expert_profile": {"name": ["not", "a", "string"], "instructions": "Be brief."}
        });
        let resolved = ResolvedConfig::resolve(Some(&config));
        assert_eq!(resolved.tenant_id, "default-tenant");
        assert!(resolved.profile_override.name.is_none());
        assert_eq!(
            resolved.profile_override.instructions.as_deref(),
            Some("Be brief.")
        );
    }

    #[test]
    fn non_object_config_is_defaulted() {
        let resolved = ResolvedConfig::resolve(Some(&json!("nonsense")));
        assert_eq!(resolved, ResolvedConfig::default());
        let resolved = ResolvedConfig::resolve(Some(&json!({"expert_profile": 3})));
        assert_eq!(resolved.profile_override, ProfileOverride::default());
    }

    #[test]
    fn namespace_scopes_tenant_and_expert() {
        let config = json!({"tenant_id": "t1", "expert_id": "e1"});
        let ns = ResolvedConfig::resolve(Some(&config)).namespace();
        assert_eq!(ns.parts(), &["t1", "experts", "e1"]);
    }
}
