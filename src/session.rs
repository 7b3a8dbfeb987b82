//! Conversation entry point with per-thread checkpointing.
//!
//! Each thread's state lives behind its own async mutex, so turns on one
//! thread run one at a time while different threads proceed independently.
//! A turn's result replaces the checkpoint only when the whole turn succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{info, warn};

use crate::error::Error;
use crate::expert::{ExpertProfile, ResolvedConfig};
use crate::graph::{ConversationState, ExpertGraph, TurnEvent, TurnOutcome};
use crate::llm::{ChatMessage, TokenUsage};

/// In-memory checkpoints keyed by thread id.
#[derive(Default)]
pub struct ThreadStore {
    threads: RwLock<HashMap<String, Arc<Mutex<ConversationState>>>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `thread_id`, created empty on first use.
    async fn slot(&self, thread_id: &str) -> Arc<Mutex<ConversationState>> {
        if let Some(slot) = self.threads.read().await.get(thread_id) {
            return Arc::clone(slot);
        }
        let mut threads = self.threads.write().await;
        Arc::clone(threads.entry(thread_id.to_string()).or_default())
    }

    /// A copy of the committed state for `thread_id`.
    pub async fn snapshot(&self, thread_id: &str) -> Option<ConversationState> {
        let slot = self.threads.read().await.get(thread_id).cloned()?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    /// Drop the checkpoint for `thread_id`, returning it if one existed.
    ///
    /// A turn already running on the thread finishes against its own slot
    /// and is not recorded.
    pub async fn remove(&self, thread_id: &str) -> Option<ConversationState> {
        let slot = self.threads.write().await.remove(thread_id)?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

/// What the caller gets back from a successful turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub reply: String,
    pub profile: ExpertProfile,
    pub usage: TokenUsage,
}

impl From<&TurnOutcome> for TurnReply {
    fn from(outcome: &TurnOutcome) -> Self {
        Self {
            reply: outcome.reply().to_string(),
            profile: outcome.state.profile_or_unset(),
            usage: outcome.usage,
        }
    }
}

/// Chat front door: resolves run configuration, loads the thread, runs a
/// turn and commits it.
pub struct ExpertAssistant {
    graph: ExpertGraph,
    threads: ThreadStore,
}

impl ExpertAssistant {
    pub fn new(graph: ExpertGraph) -> Self {
        Self {
            graph,
            threads: ThreadStore::new(),
        }
    }

    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    /// Send one user message and wait for the reply.
    pub async fn send(&self, run_config: Option<&Value>, text: &str) -> Result<TurnReply, Error> {
        self.turn(run_config, text, None).await
    }

    /// Like [`send`](Self::send), emitting [`TurnEvent`]s while the turn runs.
    pub async fn send_streaming(
        &self,
        run_config: Option<&Value>,
        text: &str,
        events: mpsc::UnboundedSender<TurnEvent>,
    ) -> Result<TurnReply, Error> {
        self.turn(run_config, text, Some(events)).await
    }

    async fn turn(
        &self,
        run_config: Option<&Value>,
        text: &str,
        events: Option<mpsc::UnboundedSender<TurnEvent>>,
    ) -> Result<TurnReply, Error> {
        let run = ResolvedConfig::resolve(run_config);
        let slot = self.threads.slot(&run.thread_id).await;
        let mut committed = slot.lock().await;

        let mut input = committed.clone();
        input.messages.push(ChatMessage::user(text));

        let result = match events {
            Some(events) => self.graph.run_turn_streaming(&input, &run, events).await,
            None => self.graph.run_turn(&input, &run).await,
        };
        let outcome = result.inspect_err(|e| {
            warn!(thread_id = %run.thread_id, error = %e, "Turn failed; thread state unchanged");
        })?;

        *committed = outcome.state.clone();
        info!(
            thread_id = %run.thread_id,
            messages = committed.messages.len(),
            "Thread checkpoint committed"
        );
        Ok(TurnReply::from(&outcome))
    }
}
