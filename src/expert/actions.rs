//! Actions the message manager can request, and their tool schemas.

use serde_json::json;

use crate::error::RoutingError;
use crate::llm::{ToolCall, ToolDefinition};

use super::model::ProfileField;

pub const UPDATE_PROFILE_TOOL: &str = "update_profile";
pub const FIELD_HELP_TOOL: &str = "field_help";

/// What the message manager asked the graph to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedAction {
    /// Merge new information from the conversation into the profile.
    UpdateProfile,
    /// Draft or refine content for one field.
    FieldHelp {
        field: ProfileField,
        content_hint: Option<String>,
    },
}

/// A decoded action together with the call id its answer must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub call_id: String,
    pub action: RequestedAction,
}

impl TryFrom<&ToolCall> for PendingAction {
    type Error = RoutingError;

    fn try_from(call: &ToolCall) -> Result<Self, Self::Error> {
        let action = match call.name.as_str() {
            UPDATE_PROFILE_TOOL => RequestedAction::UpdateProfile,
            FIELD_HELP_TOOL => {
                let invalid = |reason: String| RoutingError::InvalidArguments {
                    name: call.name.clone(),
                    reason,
                };
                let field = call
                    .arguments
                    .get("field")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| invalid("missing string argument 'field'".to_string()))?
                    .parse::<ProfileField>()
                    .map_err(invalid)?;
                let content_hint = call
                    .arguments
                    .get("content_hint")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .map(String::from);
                RequestedAction::FieldHelp {
                    field,
                    content_hint,
                }
            }
            other => {
                return Err(RoutingError::UnknownAction {
                    name: other.to_string(),
                });
            }
        };
        Ok(Self {
            call_id: call.id.clone(),
            action,
        })
    }
}

/// Tool definitions bound to the message manager's generation call.
pub fn action_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: UPDATE_PROFILE_TOOL.to_string(),
            description: "Record new or changed information about the Expert's name, \
                          description, or instructions from the latest user message."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: FIELD_HELP_TOOL.to_string(),
            description: "Generate or refine content for one Expert field when the user \
                          explicitly asks for help writing it."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "field": {
                        "type": "string",
                        "enum": ["name", "description", "instructions"],
                        "description": "The field the user wants help with"
                    },
                    "content_hint": {
                        "type": "string",
                        "description": "Anything the user said about what the field should contain"
                    }
                },
                "required": ["field"],
                "additionalProperties": false
            }),
        },
    ]
}
