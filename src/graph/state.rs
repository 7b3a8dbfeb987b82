//! Conversation state carried between nodes and between turns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::expert::ExpertProfile;
use crate::llm::{ChatMessage, Role};

/// Message history plus the in-flight profile for one thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    /// `None` until the first synchronization.
    pub profile: Option<ExpertProfile>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message.
    pub fn with_user_message(mut self, text: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(text));
        self
    }

    /// The current profile, treating an absent one as all-unset.
    pub fn profile_or_unset(&self) -> ExpertProfile {
        self.profile.clone().unwrap_or_default()
    }

    /// Id of the first assistant tool call that has no tool-result answer.
    pub fn unanswered_action(&self) -> Option<&str> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .map(|call| call.id.as_str())
            .find(|id| !answered.contains(id))
    }

    /// Most recent plain assistant reply, if any.
    pub fn last_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
            .map(|m| m.content.as_str())
    }

    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(profile) = update.profile {
            self.profile = Some(profile);
        }
    }
}

/// Output of one node: messages to append and, optionally, a whole
/// replacement profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<ChatMessage>,
    pub profile: Option<ExpertProfile>,
}

impl StateUpdate {
    pub fn message(message: ChatMessage) -> Self {
        Self {
            messages: vec![message],
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: ExpertProfile) -> Self {
        self.profile = Some(profile);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::expert::FieldValue;
    use crate::llm::ToolCall;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            call_id: None,
            name: "update_profile".to_string(),
            arguments: json!({}),
        }
    }

    #[test]
    fn apply_appends_and_replaces_profile() {
        let mut state = ConversationState::new().with_user_message("hi");
        let profile = ExpertProfile {
            name: FieldValue::set("Ana"),
            ..Default::default()
        };
        state.apply(StateUpdate::message(ChatMessage::assistant("hello")).with_profile(profile.clone()));
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.profile, Some(profile.clone()));

        state.apply(StateUpdate::message(ChatMessage::assistant("again")));
        assert_eq!(state.profile, Some(profile));
    }

    #[test]
    fn unanswered_action_tracks_tool_results() {
        let mut state = ConversationState::new().with_user_message("x");
        assert_eq!(state.unanswered_action(), None);

        state
            .messages
            .push(ChatMessage::assistant_with_tool_calls(None, vec![call("c1")]));
        assert_eq!(state.unanswered_action(), Some("c1"));

        state
            .messages
            .push(ChatMessage::tool_result("c1", "update_profile", "updated expert"));
        assert_eq!(state.unanswered_action(), None);
    }

    #[test]
    fn last_reply_skips_tool_traffic() {
        let mut state = ConversationState::new();
        assert_eq!(state.last_reply(), None);
        state.messages.push(ChatMessage::assistant("Done!"));
        state
            .messages
            .push(ChatMessage::assistant_with_tool_calls(None, vec![call("c2")]));
        state
            .messages
            .push(ChatMessage::tool_result("c2", "update_profile", "updated expert"));
        assert_eq!(state.last_reply(), Some("Done!"));
    }

    #[test]
    fn absent_profile_reads_as_unset() {
        assert_eq!(ConversationState::new().profile_or_unset(), ExpertProfile::unset());
    }
}
