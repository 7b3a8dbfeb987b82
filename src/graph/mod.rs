//! The conversation graph.
//!
//! Node set and edges are fixed:
//!
//! ```text
//! sync_profile -> message_manager -> route?
//!                       ^              |-- end
//!                       |              |-- update_expert ----+
//!                       |              '-- field_assistant --+
//!                       '------------------------------------'
//! ```
//!
//! [`ExpertGraph::run_turn`] is a function of (state, run configuration) to a
//! new state. It works on a private copy of the state, so a failed turn
//! leaves the caller's state exactly as it was. Profile writes to the
//! optional persistent store are deferred until the turn has succeeded.

pub mod nodes;
pub mod router;
pub mod state;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{Error, GraphError};
use crate::expert::{ExpertProfile, ProfileField, ResolvedConfig};
use crate::llm::{LlmProvider, TokenUsage};
use crate::memory::ProfileExtractor;
use crate::store::ExpertStore;

pub use router::{Route, route};
pub use state::{ConversationState, StateUpdate};

use nodes::update_expert::PROFILE_KEY;

/// Tunables for one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    pub message_manager_temperature: f32,
    pub field_help_temperature: f32,
    pub max_tokens: u32,
    /// Assistant replies included in the reconciler's window.
    pub recent_assistant_window: usize,
    /// Node executions allowed per turn.
    pub recursion_limit: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            message_manager_temperature: 0.0,
            field_help_temperature: 0.7,
            max_tokens: 2048,
            recent_assistant_window: 3,
            recursion_limit: 25,
        }
    }
}

/// Graph node identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeName {
    SyncProfile,
    MessageManager,
    UpdateExpert,
    FieldAssistant,
}

impl NodeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyncProfile => "sync_profile",
            Self::MessageManager => "message_manager",
            Self::UpdateExpert => "update_expert",
            Self::FieldAssistant => "expert_field_assistant",
        }
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress notifications from a streaming turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    NodeStarted(NodeName),
    /// Reply text from the message manager's plain-reply path.
    Token(String),
    ProfileUpdated(ExpertProfile),
    Finished { reply: String },
}

/// Result of a successful turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub usage: TokenUsage,
    pub visited: Vec<NodeName>,
}

impl TurnOutcome {
    /// The reply that ended the turn.
    pub fn reply(&self) -> &str {
        self.state.last_reply().unwrap_or_default()
    }
}

enum Step {
    Sync,
    Manager,
    Update {
        call_id: String,
    },
    Help {
        call_id: String,
        field: ProfileField,
        content_hint: Option<String>,
    },
}

impl Step {
    fn node(&self) -> NodeName {
        match self {
            Self::Sync => NodeName::SyncProfile,
            Self::Manager => NodeName::MessageManager,
            Self::Update { .. } => NodeName::UpdateExpert,
            Self::Help { .. } => NodeName::FieldAssistant,
        }
    }
}

/// The compiled conversation graph and its injected capabilities.
pub struct ExpertGraph {
    llm: Arc<dyn LlmProvider>,
    extractor: Arc<dyn ProfileExtractor>,
    store: Option<Arc<dyn ExpertStore>>,
    config: GraphConfig,
}

impl ExpertGraph {
    pub fn new(llm: Arc<dyn LlmProvider>, extractor: Arc<dyn ProfileExtractor>) -> Self {
        Self {
            llm,
            extractor,
            store: None,
            config: GraphConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ExpertStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Run one turn to completion.
    pub async fn run_turn(
        &self,
        state: &ConversationState,
        run: &ResolvedConfig,
    ) -> Result<TurnOutcome, Error> {
        self.run(state, run, None).await
    }

    /// Run one turn, emitting [`TurnEvent`]s as it progresses.
    ///
    /// Tokens are sent as soon as they are produced, so a turn that fails
    /// later may already have emitted some.
    pub async fn run_turn_streaming(
        &self,
        state: &ConversationState,
        run: &ResolvedConfig,
        events: mpsc::UnboundedSender<TurnEvent>,
    ) -> Result<TurnOutcome, Error> {
        self.run(state, run, Some(&events)).await
    }

    async fn run(
        &self,
        state: &ConversationState,
        run: &ResolvedConfig,
        events: Option<&mpsc::UnboundedSender<TurnEvent>>,
    ) -> Result<TurnOutcome, Error> {
        let emit = |event: TurnEvent| {
            if let Some(events) = events {
                let _ = events.send(event);
            }
        };

        let mut working = state.clone();
        let mut usage = TokenUsage::default();
        let mut visited = Vec::new();
        let mut profile_write: Option<ExpertProfile> = None;
        let mut step = Step::Sync;

        loop {
            if visited.len() >= self.config.recursion_limit {
                return Err(GraphError::RecursionLimit {
                    limit: self.config.recursion_limit,
                }
                .into());
            }
            let node = step.node();
            visited.push(node);
            emit(TurnEvent::NodeStarted(node));
            debug!(node = %node, thread_id = %run.thread_id, "Running node");

            step = match step {
                Step::Sync => {
                    let update = nodes::sync_profile::run(&working, &run.profile_override);
                    working.apply(update);
                    Step::Manager
                }
                Step::Manager => {
                    let output = match events {
                        Some(events) => self.manager_streaming(&working, events).await?,
                        None => {
                            nodes::message_manager::run(&self.llm, &working, &self.config, None)
                                .await?
                        }
                    };
                    let next = match output.update.messages.last() {
                        Some(message) => route(message)?,
                        None => Route::End,
                    };
                    usage += output.usage;
                    working.apply(output.update);

                    match next {
                        Route::End => break,
                        Route::UpdateExpert { call_id } => Step::Update { call_id },
                        Route::FieldAssistant {
                            call_id,
                            field,
                            content_hint,
                        } => Step::Help {
                            call_id,
                            field,
                            content_hint,
                        },
                    }
                }
                Step::Update { call_id } => {
                    let namespace = run.namespace();
                    let store = self
                        .store
                        .as_deref()
                        .map(|store| (store, &namespace));
                    let output = nodes::update_expert::run(
                        self.extractor.as_ref(),
                        store,
                        &working,
                        &call_id,
                        self.config.recent_assistant_window,
                    )
                    .await?;
                    usage += output.usage;
                    working.apply(output.update);
                    emit(TurnEvent::ProfileUpdated(output.profile.clone()));
                    profile_write = Some(output.profile);
                    Step::Manager
                }
                Step::Help {
                    call_id,
                    field,
                    content_hint,
                } => {
                    let output = nodes::field_assistant::run(
                        &self.llm,
                        &working,
                        &call_id,
                        field,
                        content_hint.as_deref(),
                        &self.config,
                    )
                    .await?;
                    usage += output.usage;
                    working.apply(output.update);
                    Step::Manager
                }
            };
        }

        if let (Some(store), Some(profile)) = (&self.store, &profile_write) {
            let value = serde_json::to_value(profile)
                .map_err(|e| crate::error::StoreError::Serialization(e.to_string()))?;
            store.upsert(&run.namespace(), PROFILE_KEY, &value).await?;
        }

        let outcome = TurnOutcome {
            state: working,
            usage,
            visited,
        };
        info!(
            thread_id = %run.thread_id,
            tenant_id = %run.tenant_id,
            expert_id = %run.expert_id,
            nodes = outcome.visited.len(),
            tokens = usage.total(),
            cost_usd = %usage.cost(self.llm.cost_per_token()),
            "Turn complete"
        );
        emit(TurnEvent::Finished {
            reply: outcome.reply().to_string(),
        });
        Ok(outcome)
    }

    /// Message manager pass that forwards reply tokens as events.
    async fn manager_streaming(
        &self,
        state: &ConversationState,
        events: &mpsc::UnboundedSender<TurnEvent>,
    ) -> Result<nodes::NodeOutput, Error> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let forward = async {
            while let Some(token) = rx.recv().await {
                let _ = events.send(TurnEvent::Token(token));
            }
        };
        let (result, ()) = tokio::join!(
            nodes::message_manager::run(&self.llm, state, &self.config, Some(tx)),
            forward
        );
        result
    }
}
