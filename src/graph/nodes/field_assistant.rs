//! Drafts content for one profile field. Never touches the profile.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::expert::ProfileField;
use crate::expert::actions::FIELD_HELP_TOOL;
use crate::expert::prompts::{FIELD_HELP_SYSTEM, field_help_prompt};
use crate::graph::GraphConfig;
use crate::graph::state::{ConversationState, StateUpdate};
use crate::llm::{ChatMessage, LlmProvider, Reasoning, ReasoningContext};

use super::NodeOutput;

pub async fn run(
    llm: &Arc<dyn LlmProvider>,
    state: &ConversationState,
    call_id: &str,
    field: ProfileField,
    content_hint: Option<&str>,
    config: &GraphConfig,
) -> Result<NodeOutput, Error> {
    let mut messages: Vec<ChatMessage> = state
        .messages
        .iter()
        .filter(|m| m.is_dialogue())
        .cloned()
        .collect();
    messages.push(ChatMessage::user(field_help_prompt(field, content_hint)));

    let reasoning = Reasoning::new(Arc::clone(llm))
        .with_system_prompt(FIELD_HELP_SYSTEM.to_string())
        .with_temperature(config.field_help_temperature)
        .with_max_tokens(config.max_tokens);
    let (suggestion, usage) = reasoning
        .respond(&ReasoningContext::new().with_messages(messages))
        .await
        .inspect_err(|e| warn!(error = %e, field = %field, "Field help generation failed"))?;
    debug!(field = %field, chars = suggestion.len(), "Field suggestion generated");

    Ok(NodeOutput {
        update: StateUpdate::message(ChatMessage::tool_result(
            call_id,
            FIELD_HELP_TOOL,
            suggestion,
        )),
        usage,
    })
}
