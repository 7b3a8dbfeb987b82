//! System prompts for the dialogue nodes and the profile extractor.

use crate::llm::{ChatMessage, Role};

use super::model::{ExpertProfile, ProfileField};

/// Build the message manager's system prompt.
///
/// The profile rendered here is the only authoritative source of truth; the
/// model is told to prefer it over anything implied by earlier turns.
pub fn message_manager_prompt(profile: &ExpertProfile) -> String {
    let missing = profile.missing_fields();
    let completeness = if missing.is_empty() {
        "All fields are set. Help the user refine them if they want to.".to_string()
    } else {
        let names: Vec<&str> = missing.iter().map(ProfileField::as_str).collect();
        format!("Fields still NOT SET: {}.", names.join(", "))
    };

    format!(
        "\
You are a helpful assistant that helps the user create and update a custom Expert profile.

The Expert profile has three fields:
1. **Name:** The Expert's name.
2. **Description:** A brief overview of the Expert's purpose and capabilities.
3. **Instructions:** Detailed guidelines (a system prompt) that define the Expert's behavior.

Here is the current Expert profile. It is the single source of truth: if earlier messages in
the conversation say something different, this profile wins. \"NOT SET\" means the user has not
provided that field yet.
<expert_profile>
{profile}
</expert_profile>
{completeness}

How to handle the user's latest message:
1. If it contains new or changed information about the Expert's name, description, or
   instructions, call the `update_profile` tool. Call it once; do not answer in text at the
   same time.
2. If the user explicitly asks for help writing or improving one specific field, call the
   `field_help` tool with that field.
3. Otherwise reply conversationally. Address at most one profile field per reply. When a
   field is NOT SET, ask for it in a casual, friendly way.
4. After a tool result comes back, acknowledge what changed (e.g. \"I've updated the
   Expert's description.\") or share the suggestion, then guide the user to the next missing
   field.

Never call more than one tool per reply.",
        profile = profile.render(),
    )
}

/// System message for the field assistant.
pub const FIELD_HELP_SYSTEM: &str = "You are an AI subroutine that helps generate and refine \
the Expert's name, description, and instructions.";

/// Build the field-specific request appended after the chat history.
pub fn field_help_prompt(field: ProfileField, content_hint: Option<&str>) -> String {
    let extra = match field {
        ProfileField::Instructions => {
            "\nEnsure the proposed instructions follow best practices:\n\
             1. Clarity and conciseness.\n\
             2. A structured format, with bullet points where useful.\n\
             3. Every component needed to guide the Expert's behavior.\n"
        }
        ProfileField::Name | ProfileField::Description => "",
    };
    let hint = content_hint
        .map(|h| format!("\nThe user mentioned: \"{h}\"\n"))
        .unwrap_or_default();

    format!(
        "\
You are an expert content assistant for a custom \"Expert\" profile. The profile has these fields:
- Name: a simple, clear identifier.
- Description: a brief summary.
- Instructions: a system prompt that guides the Expert's behavior and follows best practices.

The user is asking for help with the \"{field}\" field.
For the \"{field}\" field, provide clear and actionable suggestions to generate or refine its content.
{extra}{hint}
Respond with a concise suggestion for the \"{field}\" field."
    )
}

/// Render messages as a `Human:` / `AI:` transcript.
pub fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|m| {
            let speaker = match m.role {
                Role::User => "Human",
                Role::Assistant => "AI",
                Role::System | Role::Tool => return None,
            };
            Some(format!("{speaker}: {}", m.content))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Instructions for the profile extractor.
pub fn extraction_instructions(recent_messages: &str, current: &ExpertProfile) -> String {
    format!(
        "\
You are a memory manager that captures details about a custom \"Expert\" the user is defining.

Recent Messages:
{recent_messages}

Current Expert Profile:
{current}

Update the Expert profile based only on these inputs. Do not consider any older conversation.

Steps:
1. Review the Recent Messages for changes or additions to the Expert's name, description, or instructions.
2. Merge those changes into the Current Expert Profile. Keep fields the messages do not mention.
3. Output one updated Expert profile that is concise, consistent, and free of contradictions.",
        current = current.render(),
    )
}

/// JSON shape the extractor must produce.
pub const EXTRACTION_FORMAT: &str = r#"Respond with ONLY a JSON object of this shape, no other text:
{"name": "string or null", "description": "string or null", "instructions": "string or null"}
Use null for a field that is not known. If the messages contain nothing about the Expert, respond with null."#;

/// Extract a JSON object (or a bare `null`) from LLM output that might
/// contain markdown fences or surrounding text.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') || trimmed == "null" {
        return Some(trimmed);
    }

    // Wrapped in a markdown code block
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') || inner == "null" {
                return Some(inner);
            }
        }
    }

    // Try to find object bounds
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}
