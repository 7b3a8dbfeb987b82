//! Decides, once per pass, between a conversational reply and exactly one
//! requested action.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, GraphError, RoutingError};
use crate::expert::action_tools;
use crate::expert::prompts::message_manager_prompt;
use crate::graph::GraphConfig;
use crate::graph::state::{ConversationState, StateUpdate};
use crate::llm::{
    ChatMessage, LlmProvider, Reasoning, ReasoningContext, RespondResult, Role,
};

use super::NodeOutput;

/// History sent to the model: everything except superseded sync statuses.
fn history(state: &ConversationState) -> Vec<ChatMessage> {
    let last_system = state.messages.iter().rposition(|m| m.role == Role::System);
    state
        .messages
        .iter()
        .enumerate()
        .filter(|(i, m)| m.role != Role::System || Some(*i) == last_system)
        .map(|(_, m)| m.clone())
        .collect()
}

/// Node entry point. Plain-text output is forwarded to `tokens` when given.
pub async fn run(
    llm: &Arc<dyn LlmProvider>,
    state: &ConversationState,
    config: &GraphConfig,
    tokens: Option<mpsc::UnboundedSender<String>>,
) -> Result<NodeOutput, Error> {
    if let Some(call_id) = state.unanswered_action() {
        return Err(GraphError::UnansweredAction {
            call_id: call_id.to_string(),
        }
        .into());
    }

    let profile = state.profile_or_unset();
    let reasoning = Reasoning::new(Arc::clone(llm))
        .with_system_prompt(message_manager_prompt(&profile))
        .with_temperature(config.message_manager_temperature)
        .with_max_tokens(config.max_tokens);
    let context = ReasoningContext::new()
        .with_messages(history(state))
        .with_tools(action_tools());

    let output = match tokens {
        Some(tokens) => reasoning.stream_with_tools(&context, tokens).await,
        None => reasoning.respond_with_tools(&context).await,
    }
    .inspect_err(|e| warn!(error = %e, "Message manager generation failed"))?;

    let message = match output.result {
        RespondResult::Text(text) => {
            debug!(chars = text.len(), "Message manager replied");
            ChatMessage::assistant(text)
        }
        RespondResult::ToolCalls {
            tool_calls,
            content,
        } => {
            if tool_calls.len() > 1 {
                return Err(RoutingError::MultipleActions {
                    count: tool_calls.len(),
                }
                .into());
            }
            debug!(
                action = %tool_calls[0].name,
                call_id = %tool_calls[0].id,
                "Message manager requested an action"
            );
            ChatMessage::assistant_with_tool_calls(content, tool_calls)
        }
    };

    Ok(NodeOutput {
        update: StateUpdate::message(message),
        usage: output.usage,
    })
}
