//! Picks the next node from the message manager's last output.

use crate::error::RoutingError;
use crate::expert::{PendingAction, ProfileField, RequestedAction};
use crate::llm::ChatMessage;

/// Where the turn goes after the message manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    End,
    UpdateExpert {
        call_id: String,
    },
    FieldAssistant {
        call_id: String,
        field: ProfileField,
        content_hint: Option<String>,
    },
}

/// Decode the action on `last` and map it to a route.
///
/// A message without tool calls ends the turn. More than one call, an
/// unknown tool or malformed arguments are errors, never a silent `End`.
pub fn route(last: &ChatMessage) -> Result<Route, RoutingError> {
    match last.tool_calls.as_slice() {
        [] => Ok(Route::End),
        [call] => {
            let PendingAction { call_id, action } = PendingAction::try_from(call)?;
            Ok(match action {
                RequestedAction::UpdateProfile => Route::UpdateExpert { call_id },
                RequestedAction::FieldHelp {
                    field,
                    content_hint,
                } => Route::FieldAssistant {
                    call_id,
                    field,
                    content_hint,
                },
            })
        }
        calls => Err(RoutingError::MultipleActions { count: calls.len() }),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::llm::ToolCall;

    fn with_calls(calls: Vec<ToolCall>) -> ChatMessage {
        ChatMessage::assistant_with_tool_calls(None, calls)
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_9".to_string(),
            call_id: None,
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn plain_reply_ends_turn() {
        assert_eq!(route(&ChatMessage::assistant("Hello!")), Ok(Route::End));
    }

    #[test]
    fn update_profile_goes_to_reconciler() {
        let msg = with_calls(vec![call("update_profile", json!({}))]);
        assert_eq!(
            route(&msg),
            Ok(Route::UpdateExpert {
                call_id: "call_9".to_string()
            })
        );
    }

    #[test]
    fn field_help_goes_to_field_assistant() {
        let msg = with_calls(vec![call("field_help", json!({"field": "description"}))]);
        assert_eq!(
            route(&msg),
            Ok(Route::FieldAssistant {
                call_id: "call_9".to_string(),
                field: ProfileField::Description,
                content_hint: None,
            })
        );
    }

    #[test]
    fn two_actions_are_rejected() {
        let msg = with_calls(vec![
            call("update_profile", json!({})),
            call("field_help", json!({"field": "name"})),
        ]);
        assert_eq!(route(&msg), Err(RoutingError::MultipleActions { count: 2 }));
    }

    #[test]
    fn malformed_action_is_an_error_not_end() {
        let msg = with_calls(vec![call("field_help", json!({"field": 12}))]);
        assert!(matches!(
            route(&msg),
            Err(RoutingError::InvalidArguments { .. })
        ));
    }

    fn field_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("name".to_string()),
            Just("description".to_string()),
            Just("instructions".to_string()),
            "[a-z]{0,12}",
        ]
    }

    proptest! {
        #[test]
        fn route_is_total(
            name in prop_oneof![
                Just("update_profile".to_string()),
                Just("field_help".to_string()),
                "[A-Za-z_]{0,16}",
            ],
            field in field_name(),
            extra_calls in 0usize..3,
        ) {
            let mut calls = vec![call(&name, json!({"field": field}))];
            for i in 0..extra_calls {
                calls.push(ToolCall { id: format!("extra_{i}"), ..calls[0].clone() });
            }
            let result = route(&with_calls(calls.clone()));

            let known_field = field.parse::<ProfileField>().is_ok();
            match (calls.len(), name.as_str(), result) {
                (n, _, Err(RoutingError::MultipleActions { count })) => {
                    prop_assert!(n > 1);
                    prop_assert_eq!(count, n);
                }
                (1, "update_profile", Ok(Route::UpdateExpert { .. })) => {}
                (1, "field_help", Ok(Route::FieldAssistant { .. })) => prop_assert!(known_field),
                (1, "field_help", Err(RoutingError::InvalidArguments { .. })) => prop_assert!(!known_field),
                (1, other, Err(RoutingError::UnknownAction { name })) => {
                    prop_assert_ne!(other, "update_profile");
                    prop_assert_ne!(other, "field_help");
                    prop_assert_eq!(name.as_str(), other);
                }
                (n, name, result) => prop_assert!(false, "unexpected route for {n} x {name}: {result:?}"),
            }
        }
    }
}
