//! Merges evidence from the most recent exchange into the profile.

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::expert::actions::UPDATE_PROFILE_TOOL;
use crate::expert::prompts::{extraction_instructions, transcript};
use crate::expert::ExpertProfile;
use crate::graph::state::{ConversationState, StateUpdate};
use crate::llm::{ChatMessage, Role};
use crate::memory::{ExistingRecord, ExtractionRequest, ProfileExtractor};
use crate::store::{ExpertStore, Namespace};

/// Key the reconciled profile is stored under.
pub const PROFILE_KEY: &str = "profile";

/// Acknowledgement content of the tool result.
pub const UPDATED_ACK: &str = "updated expert";

/// The last user message plus up to `max_assistant` non-empty assistant
/// replies that precede it, oldest first.
pub fn recent_window(messages: &[ChatMessage], max_assistant: usize) -> Vec<ChatMessage> {
    let Some(user_idx) = messages.iter().rposition(|m| m.role == Role::User) else {
        return Vec::new();
    };
    let mut window: Vec<ChatMessage> = messages[..user_idx]
        .iter()
        .rev()
        .filter(|m| m.role == Role::Assistant && !m.content.trim().is_empty())
        .take(max_assistant)
        .cloned()
        .collect();
    window.reverse();
    window.push(messages[user_idx].clone());
    window
}

/// Profiles previously stored for this expert.
async fn existing_records(
    store: &dyn ExpertStore,
    namespace: &Namespace,
) -> Result<Vec<ExistingRecord>, Error> {
    let records = store.search(namespace).await?;
    Ok(records
        .into_iter()
        .filter(|r| r.key == PROFILE_KEY)
        .filter_map(|r| match serde_json::from_value::<ExpertProfile>(r.value) {
            Ok(profile) => Some(ExistingRecord {
                key: r.key,
                profile,
            }),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Skipping unreadable stored profile");
                None
            }
        })
        .collect())
}

/// Reconciled profile plus what the graph should persist after the turn.
#[derive(Debug, Clone)]
pub struct ReconcileOutput {
    pub update: StateUpdate,
    pub usage: crate::llm::TokenUsage,
    pub profile: ExpertProfile,
}

/// Node entry point.
pub async fn run(
    extractor: &dyn ProfileExtractor,
    store: Option<(&dyn ExpertStore, &Namespace)>,
    state: &ConversationState,
    call_id: &str,
    max_assistant: usize,
) -> Result<ReconcileOutput, Error> {
    let current = state.profile_or_unset();
    let window = recent_window(&state.messages, max_assistant);
    debug!(window = window.len(), call_id, "Reconciling profile");

    let existing = match store {
        Some((store, namespace)) => existing_records(store, namespace).await?,
        None => Vec::new(),
    };

    let request = ExtractionRequest {
        instructions: extraction_instructions(&transcript(&window), &current),
        messages: window,
        existing,
    };
    let extraction = extractor
        .extract(request)
        .await
        .inspect_err(|e| warn!(error = %e, "Profile extraction failed"))?;

    let profile = match extraction.profile {
        Some(extracted) => {
            let merged = current.merged_with(&extracted);
            if merged != current {
                info!(missing = ?merged.missing_fields(), "Expert profile updated");
            }
            merged
        }
        None => {
            warn!("Extraction returned no profile; keeping the current one");
            current
        }
    };

    let ack = ChatMessage::tool_result(call_id, UPDATE_PROFILE_TOOL, UPDATED_ACK);
    Ok(ReconcileOutput {
        update: StateUpdate::message(ack).with_profile(profile.clone()),
        usage: extraction.usage,
        profile,
    })
}
