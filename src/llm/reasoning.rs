//! Reasoning layer: wraps an LLM provider with tool calling support.
//!
//! Nodes call `respond_with_tools()` (or the streaming variant) and get back
//! either text or tool calls, plus the token usage of the call.

use std::ops::AddAssign;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::error::LlmError;
use crate::llm::{
    ChatMessage, CompletionRequest, LlmProvider, ToolCall, ToolCompletionRequest, ToolDefinition,
};

/// Context for a reasoning operation.
pub struct ReasoningContext {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

impl ReasoningContext {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

impl Default for ReasoningContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Token usage from one or more LLM calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Estimated cost in USD given (input, output) per-token prices.
    pub fn cost(&self, (input_price, output_price): (Decimal, Decimal)) -> Decimal {
        input_price * Decimal::from(self.input_tokens)
            + output_price * Decimal::from(self.output_tokens)
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// Result of a reasoning call: either text or tool calls.
#[derive(Debug)]
pub enum RespondResult {
    /// The model responded with text.
    Text(String),
    /// The model wants to call tools.
    ToolCalls {
        tool_calls: Vec<ToolCall>,
        /// Optional text content alongside tool calls.
        content: Option<String>,
    },
}

/// Output from a respond_with_tools call.
#[derive(Debug)]
pub struct RespondOutput {
    pub result: RespondResult,
    pub usage: TokenUsage,
}

/// Reasoning layer that wraps an LLM provider.
pub struct Reasoning {
    llm: Arc<dyn LlmProvider>,
    system_prompt: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl Reasoning {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn messages(&self, context: &ReasoningContext) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(context.messages.len() + 1);
        if let Some(ref prompt) = self.system_prompt {
            messages.push(ChatMessage::system(prompt));
        }
        messages.extend(context.messages.iter().cloned());
        messages
    }

    fn tool_request(&self, context: &ReasoningContext) -> ToolCompletionRequest {
        let mut request = ToolCompletionRequest::new(self.messages(context), context.tools.clone())
            .with_parallel_tool_calls(false);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    /// Call the LLM for plain text, without tools.
    pub async fn respond(&self, context: &ReasoningContext) -> Result<(String, TokenUsage), LlmError> {
        let mut request = CompletionRequest::new(self.messages(context));
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        let response = self.llm.complete(request).await?;
        Ok((
            response.content,
            TokenUsage {
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
            },
        ))
    }

    /// Call the LLM with tool definitions, returning either text or tool calls.
    pub async fn respond_with_tools(
        &self,
        context: &ReasoningContext,
    ) -> Result<RespondOutput, LlmError> {
        if context.tools.is_empty() {
            let (text, usage) = self.respond(context).await?;
            return Ok(RespondOutput {
                result: RespondResult::Text(text),
                usage,
            });
        }

        let response = self.llm.complete_with_tools(self.tool_request(context)).await?;
        Ok(Self::into_output(
            response.content,
            response.tool_calls,
            response.input_tokens,
            response.output_tokens,
        ))
    }

    /// Streaming variant of `respond_with_tools`: plain-text output is
    /// forwarded to `tokens` as it arrives.
    pub async fn stream_with_tools(
        &self,
        context: &ReasoningContext,
        tokens: mpsc::UnboundedSender<String>,
    ) -> Result<RespondOutput, LlmError> {
        let response = self
            .llm
            .stream_with_tools(self.tool_request(context), tokens)
            .await?;
        Ok(Self::into_output(
            response.content,
            response.tool_calls,
            response.input_tokens,
            response.output_tokens,
        ))
    }

    fn into_output(
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
        input_tokens: u32,
        output_tokens: u32,
    ) -> RespondOutput {
        let usage = TokenUsage {
            input_tokens,
            output_tokens,
        };
        if tool_calls.is_empty() {
            // No tool calls, treat as text response
            RespondOutput {
                result: RespondResult::Text(content.unwrap_or_default()),
                usage,
            }
        } else {
            RespondOutput {
                result: RespondResult::ToolCalls {
                    tool_calls,
                    content,
                },
                usage,
            }
        }
    }
}
