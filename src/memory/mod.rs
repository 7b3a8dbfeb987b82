//! Profile extraction: turn a window of recent conversation into an updated
//! [`ExpertProfile`].
//!
//! The extractor sees only what it is handed. Choosing the window and
//! merging the result into the live profile are the caller's job.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::expert::ExpertProfile;
use crate::expert::prompts::{EXTRACTION_FORMAT, extract_json_object};
use crate::llm::{ChatMessage, LlmProvider, Reasoning, ReasoningContext, TokenUsage};

/// A previously stored profile offered to the extractor as a starting point.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingRecord {
    pub key: String,
    pub profile: ExpertProfile,
}

/// Input to one extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Task instructions, including the current profile.
    pub instructions: String,
    /// The recent messages to extract from.
    pub messages: Vec<ChatMessage>,
    pub existing: Vec<ExistingRecord>,
}

/// Result of one extraction call. `profile` is `None` when nothing was found.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub profile: Option<ExpertProfile>,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    async fn extract(&self, request: ExtractionRequest) -> Result<Extraction, LlmError>;
}

/// Extractor backed by a chat model that answers in JSON.
pub struct LlmProfileExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl LlmProfileExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    fn system_prompt(request: &ExtractionRequest) -> String {
        let mut prompt = request.instructions.clone();
        if !request.existing.is_empty() {
            prompt.push_str("\n\nExisting stored records:\n");
            for record in &request.existing {
                let json = serde_json::to_string(&record.profile).unwrap_or_default();
                prompt.push_str(&format!("- {}: {}\n", record.key, json));
            }
        }
        prompt.push_str("\n\n");
        prompt.push_str(EXTRACTION_FORMAT);
        prompt
    }

    fn parse(&self, text: &str) -> Result<Option<ExpertProfile>, LlmError> {
        let invalid = |reason: String| LlmError::InvalidResponse {
            provider: self.llm.model_name().to_string(),
            reason,
        };
        let Some(json) = extract_json_object(text) else {
            return Err(invalid(format!(
                "extraction output contains no JSON object: {}",
                truncate(text, 200)
            )));
        };
        if json == "null" {
            return Ok(None);
        }
        let profile: ExpertProfile = serde_json::from_str(json)
            .map_err(|e| invalid(format!("extraction output is not a profile: {e}")))?;
        Ok((profile != ExpertProfile::unset()).then_some(profile))
    }
}

#[async_trait]
impl ProfileExtractor for LlmProfileExtractor {
    async fn extract(&self, request: ExtractionRequest) -> Result<Extraction, LlmError> {
        let reasoning = Reasoning::new(Arc::clone(&self.llm))
            .with_system_prompt(Self::system_prompt(&request))
            .with_temperature(0.0);
        let context = ReasoningContext::new().with_messages(request.messages);

        let (text, usage) = reasoning.respond(&context).await?;
        let profile = self.parse(&text)?;
        match profile {
            Some(ref p) => debug!(missing = ?p.missing_fields(), "Extracted expert profile"),
            None => warn!("Extraction produced no profile"),
        }
        Ok(Extraction { profile, usage })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expert::FieldValue;
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::Role;

    fn request() -> ExtractionRequest {
        ExtractionRequest {
            instructions: "Capture the expert".to_string(),
            messages: vec![
                ChatMessage::assistant("What should it be called?"),
                ChatMessage::user("Call it Chef Bot"),
            ],
            existing: vec![],
        }
    }

    #[tokio::test]
    async fn parses_fenced_json_profile() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_text("```json\n{\"name\": \"Chef Bot\", \"description\": null}\n```");
        let extractor = LlmProfileExtractor::new(llm.clone());

        let extraction = extractor.extract(request()).await.unwrap();
        let profile = extraction.profile.unwrap();
        assert_eq!(profile.name, FieldValue::set("Chef Bot"));
        assert!(!profile.description.is_set());
        assert_eq!(extraction.usage.total(), 15);

        let sent = &llm.completions()[0];
        assert_eq!(sent.messages[0].role, Role::System);
        assert!(sent.messages[0].content.contains("Capture the expert"));
        assert_eq!(sent.messages.last().unwrap().content, "Call it Chef Bot");
        assert_eq!(sent.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn null_and_all_unset_mean_nothing_found() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_text("null");
        llm.push_text(r#"{"name": null, "description": null, "instructions": null}"#);
        let extractor = LlmProfileExtractor::new(llm);

        assert!(extractor.extract(request()).await.unwrap().profile.is_none());
        assert!(extractor.extract(request()).await.unwrap().profile.is_none());
    }

    #[tokio::test]
    async fn prose_output_is_invalid() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_text("I could not find anything, sorry.");
        let extractor = LlmProfileExtractor::new(llm);

        let err = extractor.extract(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn existing_records_are_offered() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_text("null");
        let extractor = LlmProfileExtractor::new(llm.clone());

        let mut req = request();
        req.existing.push(ExistingRecord {
            key: "profile".to_string(),
            profile: ExpertProfile {
                name: FieldValue::set("Old Name"),
                ..Default::default()
            },
        });
        extractor.extract(req).await.unwrap();

        let system = &llm.completions()[0].messages[0].content;
        assert!(system.contains("- profile: {\"name\":\"Old Name\""));
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_error("boom");
        let extractor = LlmProfileExtractor::new(llm);
        assert!(matches!(
            extractor.extract(request()).await,
            Err(LlmError::RequestFailed { .. })
        ));
    }
}
