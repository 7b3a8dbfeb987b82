//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use rig::OneOrMany;
use rig::completion::{
    self, CompletionError, CompletionModel, CompletionRequestBuilder, GetTokenUsage,
};
use rig::message::{self, AssistantContent, Message, ToolResultContent, UserContent};
use rig::streaming::{StreamedAssistantContent, StreamingCompletionResponse};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::llm::costs;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role, ToolCall,
    ToolCompletionRequest, ToolCompletionResponse, ToolDefinition,
};

/// Adapter from any rig completion model to `LlmProvider`.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Text of every system message, joined into a single preamble.
fn preamble(messages: &[ChatMessage]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Provider correlation ids of every tool call in `messages`, keyed by our id.
fn provider_call_ids(messages: &[ChatMessage]) -> HashMap<&str, &str> {
    messages
        .iter()
        .flat_map(|m| m.tool_calls.iter())
        .filter_map(|tc| tc.call_id.as_deref().map(|call_id| (tc.id.as_str(), call_id)))
        .collect()
}

fn to_rig_message(msg: &ChatMessage, call_ids: &HashMap<&str, &str>) -> Option<Message> {
    match msg.role {
        Role::System => None,
        Role::User => Some(Message::user(msg.content.clone())),
        Role::Assistant if msg.tool_calls.is_empty() => {
            Some(Message::assistant(msg.content.clone()))
        }
        Role::Assistant => {
            let mut content: Vec<AssistantContent> = Vec::new();
            if !msg.content.is_empty() {
                content.push(AssistantContent::text(msg.content.clone()));
            }
            content.extend(msg.tool_calls.iter().map(|tc| match &tc.call_id {
                Some(call_id) => AssistantContent::tool_call_with_call_id(
                    tc.id.clone(),
                    call_id.clone(),
                    tc.name.clone(),
                    tc.arguments.clone(),
                ),
                None => {
                    AssistantContent::tool_call(tc.id.clone(), tc.name.clone(), tc.arguments.clone())
                }
            }));
            OneOrMany::many(content)
                .ok()
                .map(|content| Message::Assistant { id: None, content })
        }
        Role::Tool => {
            let id = msg.tool_call_id.clone().unwrap_or_default();
            let result = OneOrMany::one(ToolResultContent::text(msg.content.clone()));
            let content = match call_ids.get(id.as_str()) {
                Some(call_id) => UserContent::tool_result_with_call_id(id, call_id.to_string(), result),
                None => UserContent::tool_result(id, result),
            };
            Some(Message::User {
                content: OneOrMany::one(content),
            })
        }
    }
}

fn from_rig_tool_call(tc: message::ToolCall) -> ToolCall {
    ToolCall {
        // tool results are correlated by id, so never leave it blank
        id: if tc.id.is_empty() {
            format!("call_{}", uuid::Uuid::new_v4().simple())
        } else {
            tc.id
        },
        call_id: tc.call_id,
        name: tc.function.name,
        arguments: tc.function.arguments,
    }
}

fn tool_response(
    text: String,
    tool_calls: Vec<ToolCall>,
    usage: completion::Usage,
) -> ToolCompletionResponse {
    let finish_reason = if tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolUse
    };
    ToolCompletionResponse {
        content: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        input_tokens: u32::try_from(usage.input_tokens).unwrap_or(u32::MAX),
        output_tokens: u32::try_from(usage.output_tokens).unwrap_or(u32::MAX),
        finish_reason,
    }
}

/// Drain a rig stream, forwarding text deltas to `tokens` as they arrive.
async fn collect_stream<R>(
    provider: &str,
    mut stream: StreamingCompletionResponse<R>,
    tokens: &mpsc::UnboundedSender<String>,
) -> Result<(String, Vec<ToolCall>, completion::Usage), LlmError>
where
    R: Clone + Unpin + GetTokenUsage,
{
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut usage = completion::Usage::new();
    while let Some(chunk) = stream.next().await {
        match chunk.map_err(|e| map_error(provider, e))? {
            StreamedAssistantContent::Text(t) => {
                // Text that trails a tool call belongs to the action, not the reply.
                if tool_calls.is_empty() && !t.text.is_empty() {
                    let _ = tokens.send(t.text.clone());
                }
                text.push_str(&t.text);
            }
            StreamedAssistantContent::ToolCall { tool_call, .. } => {
                tool_calls.push(from_rig_tool_call(tool_call));
            }
            StreamedAssistantContent::Final(response) => {
                if let Some(reported) = response.token_usage() {
                    usage = reported;
                }
            }
            _ => {}
        }
    }
    Ok((text, tool_calls, usage))
}

fn to_rig_tool(tool: &ToolDefinition) -> completion::ToolDefinition {
    completion::ToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: tool.parameters.clone(),
    }
}

fn map_error(provider: &str, err: CompletionError) -> LlmError {
    let reason = err.to_string();
    if reason.contains("429") || reason.to_lowercase().contains("rate limit") {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    } else if reason.contains("401") {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason,
        }
    }
}

impl<M> RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn request(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<CompletionRequestBuilder<M>, LlmError> {
        let call_ids = provider_call_ids(messages);
        let mut history: Vec<Message> = messages
            .iter()
            .filter_map(|m| to_rig_message(m, &call_ids))
            .collect();
        let prompt = history.pop().ok_or_else(|| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: "request has no conversation messages".to_string(),
        })?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble(messages) {
            builder = builder.preamble(preamble);
        }
        if !tools.is_empty() {
            builder = builder.tools(tools.iter().map(to_rig_tool).collect());
        }
        if let Some(temperature) = temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        Ok(builder)
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let response = self
            .request(messages, tools, temperature, max_tokens)?
            .send()
            .await
            .map_err(|e| map_error(&self.model_name, e))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for content in response.choice.into_iter() {
            match content {
                AssistantContent::Text(t) => text.push_str(&t.text),
                AssistantContent::ToolCall(tc) => tool_calls.push(from_rig_tool_call(tc)),
                _ => {}
            }
        }
        Ok(tool_response(text, tool_calls, response.usage))
    }

    fn warn_parallel(&self, request: &ToolCompletionRequest, response: &ToolCompletionResponse) {
        if !request.parallel_tool_calls && response.tool_calls.len() > 1 {
            tracing::warn!(
                model = %self.model_name,
                count = response.tool_calls.len(),
                "Provider returned several tool calls despite parallel calls being disabled"
            );
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        costs::model_cost(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .send(
                &request.messages,
                &[],
                request.temperature,
                request.max_tokens,
            )
            .await?;
        Ok(CompletionResponse {
            content: response.content.unwrap_or_default(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            finish_reason: response.finish_reason,
        })
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let response = self
            .send(
                &request.messages,
                &request.tools,
                request.temperature,
                request.max_tokens,
            )
            .await?;
        self.warn_parallel(&request, &response);
        Ok(response)
    }

    async fn stream_with_tools(
        &self,
        request: ToolCompletionRequest,
        tokens: mpsc::UnboundedSender<String>,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let stream = self
            .request(
                &request.messages,
                &request.tools,
                request.temperature,
                request.max_tokens,
            )?
            .stream()
            .await
            .map_err(|e| map_error(&self.model_name, e))?;

        let (text, tool_calls, usage) = collect_stream(&self.model_name, stream, &tokens).await?;
        let response = tool_response(text, tool_calls, usage);
        self.warn_parallel(&request, &response);
        Ok(response)
    }
}
