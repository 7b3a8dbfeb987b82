//! Aligns the in-flight profile with the profile supplied by the run
//! configuration and records what changed.

use tracing::{debug, info};

use crate::expert::{ExpertProfile, FieldValue, ProfileField, ProfileOverride};
use crate::graph::state::{ConversationState, StateUpdate};
use crate::llm::ChatMessage;

/// Result of synchronizing one profile against an override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub profile: ExpertProfile,
    pub changes: Vec<String>,
}

impl SyncOutcome {
    /// Status text appended to the conversation.
    pub fn status_message(&self) -> String {
        let rendered = self.profile.render();
        if self.changes.is_empty() {
            format!("Profile synchronized. No changes detected.\n\nCurrent Expert State:\n{rendered}")
        } else {
            let bullets: Vec<String> = self.changes.iter().map(|c| format!("• {c}")).collect();
            format!(
                "Profile synchronization detected:\n{}\n\nCurrent Expert State:\n{rendered}",
                bullets.join("\n")
            )
        }
    }
}

/// Resolve each field from the override (blank means `NOT SET`) and diff it
/// against `current`, where `None` reads as all-unset.
pub fn synchronize(current: Option<&ExpertProfile>, overrides: &ProfileOverride) -> SyncOutcome {
    let resolved = ExpertProfile {
        name: FieldValue::from_input(overrides.name.as_deref()),
        description: FieldValue::from_input(overrides.description.as_deref()),
        instructions: FieldValue::from_input(overrides.instructions.as_deref()),
    };
    let prior = current.cloned().unwrap_or_default();

    let changes = ProfileField::ALL
        .into_iter()
        .filter(|field| prior.get(*field) != resolved.get(*field))
        .map(|field| {
            let (old, new) = (prior.get(field), resolved.get(field));
            match field {
                ProfileField::Name => format!("Expert's name changed from '{old}' to '{new}'"),
                ProfileField::Description => {
                    format!("Expert's description updated from '{old}' to '{new}'")
                }
                ProfileField::Instructions => "Expert's instructions have been modified".to_string(),
            }
        })
        .collect();

    SyncOutcome {
        profile: resolved,
        changes,
    }
}

/// Node entry point.
pub fn run(state: &ConversationState, overrides: &ProfileOverride) -> StateUpdate {
    let outcome = synchronize(state.profile.as_ref(), overrides);
    if outcome.changes.is_empty() {
        debug!("Profile unchanged by synchronization");
    } else {
        info!(changes = outcome.changes.len(), "Profile synchronized from run configuration");
    }
    StateUpdate::message(ChatMessage::system(outcome.status_message())).with_profile(outcome.profile)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::expert::NOT_SET;

    fn name_only(name: &str) -> ProfileOverride {
        ProfileOverride {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn first_sync_reports_only_the_overridden_field() {
        let outcome = synchronize(None, &name_only("Brais"));
        assert_eq!(outcome.profile.name.as_str(), "Brais");
        assert_eq!(outcome.profile.description.as_str(), NOT_SET);
        assert_eq!(
            outcome.changes,
            vec!["Expert's name changed from 'NOT SET' to 'Brais'".to_string()]
        );
        let status = outcome.status_message();
        assert!(status.starts_with("Profile synchronization detected:\n• Expert's name"));
        assert!(status.ends_with("Current Expert State:\nName: Brais\nDescription: NOT SET\nInstructions: NOT SET"));
    }

    #[test]
    fn second_sync_reports_no_changes() {
        let first = synchronize(None, &name_only("Brais"));
        let second = synchronize(Some(&first.profile), &name_only("Brais"));
        assert!(second.changes.is_empty());
        assert_eq!(second.profile, first.profile);
        assert!(second.status_message().starts_with("Profile synchronized. No changes detected."));
    }

    #[test]
    fn instructions_change_withholds_content() {
        let overrides = ProfileOverride {
            instructions: Some("secret system prompt text".to_string()),
            ..Default::default()
        };
        let outcome = synchronize(None, &overrides);
        assert_eq!(outcome.changes, vec!["Expert's instructions have been modified".to_string()]);
        assert!(!outcome.changes[0].contains("secret"));
    }

    #[test]
    fn override_replaces_state_values() {
        let current = ExpertProfile {
            description: FieldValue::set("old"),
            ..Default::default()
        };
        let overrides = ProfileOverride {
            description: Some("new".to_string()),
            ..Default::default()
        };
        let outcome = synchronize(Some(&current), &overrides);
        assert_eq!(
            outcome.changes,
            vec!["Expert's description updated from 'old' to 'new'".to_string()]
        );
    }

    #[test]
    fn run_appends_one_status_message() {
        let state = ConversationState::new().with_user_message("hi");
        let update = run(&state, &name_only("Brais"));
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].role, crate::llm::Role::System);
        assert_eq!(update.profile.unwrap().name.as_str(), "Brais");
    }

    fn override_value() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            Just(Some("   ".to_string())),
            Just(Some(NOT_SET.to_string())),
            ".{0,20}".prop_map(Some),
        ]
    }

    fn overrides() -> impl Strategy<Value = ProfileOverride> {
        (override_value(), override_value(), override_value()).prop_map(
            |(name, description, instructions)| ProfileOverride {
                name,
                description,
                instructions,
            },
        )
    }

    proptest! {
        #[test]
        fn synced_fields_are_sentinel_or_non_empty(o in overrides()) {
            let outcome = synchronize(None, &o);
            for field in ProfileField::ALL {
                let value = outcome.profile.get(field).as_str();
                prop_assert!(value == NOT_SET || !value.trim().is_empty());
            }
        }

        #[test]
        fn sync_is_idempotent(o in overrides()) {
            let first = synchronize(None, &o);
            let second = synchronize(Some(&first.profile), &o);
            prop_assert!(second.changes.is_empty());
            prop_assert_eq!(second.profile, first.profile);
        }
    }
}
