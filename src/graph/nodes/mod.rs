//! The four graph nodes. Each reads the state and returns a [`StateUpdate`];
//! none of them mutate state directly.

pub mod field_assistant;
pub mod message_manager;
pub mod sync_profile;
pub mod update_expert;

use crate::graph::state::StateUpdate;
use crate::llm::TokenUsage;

/// Output of a node that called a model.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    pub update: StateUpdate,
    pub usage: TokenUsage,
}
