//! Scripted LLM provider for node-level tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, ToolCall,
    ToolCompletionRequest, ToolCompletionResponse,
};

enum Scripted {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    Fail(LlmError),
}

/// Returns queued responses in order and records every request.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Scripted>>,
    completions: Mutex<Vec<CompletionRequest>>,
    tool_completions: Mutex<Vec<ToolCompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            completions: Mutex::new(Vec::new()),
            tool_completions: Mutex::new(Vec::new()),
        }
    }

    pub fn push_text(&self, text: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Text(text.to_string()));
    }

    pub fn push_tool_call(&self, id: &str, name: &str, arguments: serde_json::Value) {
        self.push_tool_calls(vec![ToolCall {
            id: id.to_string(),
            call_id: None,
            name: name.to_string(),
            arguments,
        }]);
    }

    pub fn push_tool_calls(&self, calls: Vec<ToolCall>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::ToolCalls(calls));
    }

    pub fn push_error(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: reason.to_string(),
            }));
    }

    pub fn completions(&self) -> Vec<CompletionRequest> {
        self.completions.lock().unwrap().clone()
    }

    pub fn tool_requests(&self) -> Vec<ToolCompletionRequest> {
        self.tool_completions.lock().unwrap().clone()
    }

    fn next(&self) -> Result<Scripted, LlmError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: "script exhausted".to_string(),
            })
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.completions.lock().unwrap().push(request);
        let content = match self.next()? {
            Scripted::Text(text) => text,
            Scripted::ToolCalls(_) => String::new(),
            Scripted::Fail(e) => return Err(e),
        };
        Ok(CompletionResponse {
            content,
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: FinishReason::Stop,
        })
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        self.tool_completions.lock().unwrap().push(request);
        let (content, tool_calls, finish_reason) = match self.next()? {
            Scripted::Text(text) => (Some(text), Vec::new(), FinishReason::Stop),
            Scripted::ToolCalls(calls) => (None, calls, FinishReason::ToolUse),
            Scripted::Fail(e) => return Err(e),
        };
        Ok(ToolCompletionResponse {
            content,
            tool_calls,
            input_tokens: 10,
            output_tokens: 5,
            finish_reason,
        })
    }
}
