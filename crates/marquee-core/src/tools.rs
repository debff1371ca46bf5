//! Agent-facing tool surface.
//!
//! Maps a tool name plus JSON arguments onto a [`SessionCommand`] (or one of
//! the read-only calls) after checking the arguments against the schema the
//! catalog advertises.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::action::ActionKind;
use crate::catalog::{available_actions, empty_schema, ActionDescriptor};
use crate::display::{DisplayEvent, DisplayState};
use crate::error::ActionError;
use crate::input::{FieldType, MultiFieldPrompt, SingleFieldPrompt};
use crate::session::SessionCommand;

pub const WAIT_FOR_INPUT: &str = "wait_for_input";
pub const GET_STATE: &str = "get_state";

/// A parsed agent call.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCall {
    Command(SessionCommand),
    GetState,
    WaitForInput {
        request_id: String,
        timeout_ms: Option<u64>,
    },
}

pub fn parse_call(name: &str, arguments: &Value) -> Result<AgentCall, ActionError> {
    let empty = Map::new();
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(ActionError::InvalidArgument {
                action: name.to_string(),
                message: "arguments must be an object".to_string(),
            })
        }
    };

    if name == GET_STATE {
        return Ok(AgentCall::GetState);
    }
    if name == WAIT_FOR_INPUT {
        let request_id = required_string(name, args, "requestId")?;
        let timeout_ms = match args.get("timeoutMs") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_u64().ok_or_else(|| ActionError::InvalidArgument {
                action: name.to_string(),
                message: "timeoutMs must be a non-negative integer".to_string(),
            })?),
        };
        return Ok(AgentCall::WaitForInput {
            request_id,
            timeout_ms,
        });
    }

    let kind = ActionKind::from_str(name).ok_or_else(|| ActionError::UnknownAction {
        name: name.to_string(),
    })?;
    let command = match kind {
        ActionKind::SetText => {
            SessionCommand::Display(DisplayEvent::SetText(required_string(name, args, "text")?))
        }
        ActionKind::SetMarkdown => SessionCommand::Display(DisplayEvent::SetMarkdown(
            required_string(name, args, "markdown")?,
        )),
        ActionKind::AppendText => SessionCommand::Display(DisplayEvent::AppendText(
            required_string(name, args, "text")?,
        )),
        ActionKind::ClearText => SessionCommand::Display(DisplayEvent::ClearText),
        ActionKind::Undo => SessionCommand::Display(DisplayEvent::Undo),
        ActionKind::Reset => SessionCommand::Display(DisplayEvent::Reset),
        ActionKind::ShowInput => {
            required_string(name, args, "prompt")?;
            SessionCommand::ShowInput(decode::<SingleFieldPrompt>(name, arguments)?)
        }
        ActionKind::ShowMultiForm => {
            if !args.contains_key("fields") {
                return Err(ActionError::MissingArgument {
                    action: name.to_string(),
                    field: "fields".to_string(),
                });
            }
            let prompt = decode::<MultiFieldPrompt>(name, arguments)?;
            validate_multi_form(&prompt).map_err(|message| ActionError::InvalidArgument {
                action: name.to_string(),
                message,
            })?;
            SessionCommand::ShowMultiForm(prompt)
        }
        // Lifecycle markers, not callable.
        ActionKind::InputSubmitted | ActionKind::MultiFormSubmitted | ActionKind::InputCancelled => {
            return Err(ActionError::UnknownAction {
                name: name.to_string(),
            })
        }
    };
    Ok(AgentCall::Command(command))
}

fn required_string(
    action: &str,
    args: &Map<String, Value>,
    field: &str,
) -> Result<String, ActionError> {
    match args.get(field) {
        None | Some(Value::Null) => Err(ActionError::MissingArgument {
            action: action.to_string(),
            field: field.to_string(),
        }),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(ActionError::InvalidArgument {
            action: action.to_string(),
            message: format!("{field} must be a string"),
        }),
    }
}

fn decode<T: DeserializeOwned>(action: &str, arguments: &Value) -> Result<T, ActionError> {
    serde_json::from_value(arguments.clone()).map_err(|err| ActionError::InvalidArgument {
        action: action.to_string(),
        message: err.to_string(),
    })
}

/// Structural checks serde cannot express.
pub fn validate_multi_form(prompt: &MultiFieldPrompt) -> Result<(), String> {
    if prompt.fields.is_empty() {
        return Err("fields must not be empty".to_string());
    }
    let mut seen = HashSet::new();
    for field in &prompt.fields {
        if field.key.trim().is_empty() {
            return Err("field key must not be empty".to_string());
        }
        if !seen.insert(field.key.as_str()) {
            return Err(format!("duplicate field key {:?}", field.key));
        }
        if field.field_type == FieldType::Select
            && field.options.as_ref().map_or(true, Vec::is_empty)
        {
            return Err(format!("select field {:?} requires options", field.key));
        }
    }
    Ok(())
}

/// Tools that are always callable, independent of display state.
pub fn input_tool_descriptors() -> Vec<ActionDescriptor> {
    vec![
        ActionDescriptor::new(
            ActionKind::ShowInput.as_str(),
            "Show an input field to the user and wait for their response",
            json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "The prompt to show the user" },
                    "inputType": {
                        "type": "string",
                        "enum": ["text", "textarea", "number"],
                        "description": "Type of input field",
                    },
                    "placeholder": { "type": "string", "description": "Placeholder text" },
                    "defaultValue": { "type": "string", "description": "Pre-filled value" },
                    "content": { "type": "string", "description": "Markdown shown above the input" },
                },
                "required": ["prompt"],
            }),
        ),
        ActionDescriptor::new(
            ActionKind::ShowMultiForm.as_str(),
            "Show a form with multiple fields and wait for the user to submit it",
            json!({
                "type": "object",
                "properties": {
                    "fields": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "key": { "type": "string" },
                                "label": { "type": "string" },
                                "type": {
                                    "type": "string",
                                    "enum": ["text", "textarea", "number", "checkbox", "select"],
                                },
                                "placeholder": { "type": "string" },
                                "defaultValue": {},
                                "required": { "type": "boolean" },
                                "options": { "type": "array", "items": { "type": "string" } },
                            },
                            "required": ["key", "label"],
                        },
                    },
                    "content": { "type": "string", "description": "Markdown shown above the form" },
                },
                "required": ["fields"],
            }),
        ),
        ActionDescriptor::new(
            WAIT_FOR_INPUT,
            "Wait until the user answers or cancels an input request",
            json!({
                "type": "object",
                "properties": {
                    "requestId": { "type": "string", "description": "Id returned by show_input or show_multi_form" },
                    "timeoutMs": { "type": "integer", "minimum": 0, "description": "Give up waiting after this many milliseconds" },
                },
                "required": ["requestId"],
            }),
        ),
        ActionDescriptor::new(GET_STATE, "Get the current display state", empty_schema()),
    ]
}

/// The full tool list: current display catalog, then the input tools.
pub fn tool_catalog(state: &DisplayState) -> Vec<ActionDescriptor> {
    let mut tools = available_actions(state);
    tools.extend(input_tool_descriptors());
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{FieldSpec, InputType};

    fn parse(name: &str, args: Value) -> Result<AgentCall, ActionError> {
        parse_call(name, &args)
    }

    #[test]
    fn display_actions_parse_into_events() {
        assert_eq!(
            parse("set_text", json!({ "text": "hi" })),
            Ok(AgentCall::Command(SessionCommand::Display(DisplayEvent::SetText(
                "hi".into()
            ))))
        );
        assert_eq!(
            parse("set_markdown", json!({ "markdown": "# t" })),
            Ok(AgentCall::Command(SessionCommand::Display(
                DisplayEvent::SetMarkdown("# t".into())
            )))
        );
        assert_eq!(
            parse("undo", Value::Null),
            Ok(AgentCall::Command(SessionCommand::Display(DisplayEvent::Undo)))
        );
        assert_eq!(
            parse("clear_text", json!({})),
            Ok(AgentCall::Command(SessionCommand::Display(DisplayEvent::ClearText)))
        );
    }

    #[test]
    fn missing_and_mistyped_arguments_are_rejected() {
        assert_eq!(
            parse("set_text", json!({})),
            Err(ActionError::MissingArgument {
                action: "set_text".into(),
                field: "text".into()
            })
        );
        assert!(matches!(
            parse("append_text", json!({ "text": 5 })),
            Err(ActionError::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse("set_text", json!(["hi"])),
            Err(ActionError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn unknown_and_marker_names_are_rejected() {
        assert_eq!(
            parse("explode", json!({})),
            Err(ActionError::UnknownAction {
                name: "explode".into()
            })
        );
        assert!(matches!(
            parse("input_submitted", json!({})),
            Err(ActionError::UnknownAction { .. })
        ));
    }

    #[test]
    fn show_input_uses_defaults() {
        let call = parse("show_input", json!({ "prompt": "Name?" }))
            .unwrap_or_else(|err| panic!("parse show_input: {err}"));
        match call {
            AgentCall::Command(SessionCommand::ShowInput(prompt)) => {
                assert_eq!(prompt.prompt, "Name?");
                assert_eq!(prompt.input_type, InputType::Text);
                assert_eq!(prompt.default_value, None);
            }
            other => panic!("unexpected call {other:?}"),
        }
        assert!(matches!(
            parse("show_input", json!({ "inputType": "number" })),
            Err(ActionError::MissingArgument { .. })
        ));
    }

    #[test]
    fn show_multi_form_validates_fields() {
        let ok = parse(
            "show_multi_form",
            json!({
                "fields": [
                    { "key": "name", "label": "Name" },
                    { "key": "tier", "label": "Tier", "type": "select", "options": ["a", "b"] },
                ],
            }),
        );
        assert!(matches!(
            ok,
            Ok(AgentCall::Command(SessionCommand::ShowMultiForm(_)))
        ));

        let cases = [
            json!({ "fields": [] }),
            json!({ "fields": [{ "key": "a", "label": "A" }, { "key": "a", "label": "B" }] }),
            json!({ "fields": [{ "key": "t", "label": "T", "type": "select" }] }),
            json!({ "fields": [{ "key": " ", "label": "Blank" }] }),
        ];
        for args in cases {
            assert!(
                matches!(
                    parse("show_multi_form", args.clone()),
                    Err(ActionError::InvalidArgument { .. })
                ),
                "expected rejection for {args}"
            );
        }
        assert!(matches!(
            parse("show_multi_form", json!({})),
            Err(ActionError::MissingArgument { .. })
        ));
    }

    #[test]
    fn wait_for_input_and_get_state() {
        assert_eq!(
            parse("wait_for_input", json!({ "requestId": "r1", "timeoutMs": 250 })),
            Ok(AgentCall::WaitForInput {
                request_id: "r1".into(),
                timeout_ms: Some(250)
            })
        );
        assert_eq!(
            parse("wait_for_input", json!({ "requestId": "r1" })),
            Ok(AgentCall::WaitForInput {
                request_id: "r1".into(),
                timeout_ms: None
            })
        );
        assert!(matches!(
            parse("wait_for_input", json!({ "requestId": "r1", "timeoutMs": -1 })),
            Err(ActionError::InvalidArgument { .. })
        ));
        assert_eq!(parse("get_state", Value::Null), Ok(AgentCall::GetState));
    }

    #[test]
    fn tool_catalog_appends_input_tools_after_display_catalog() {
        let tools = tool_catalog(&DisplayState::default());
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "set_text",
                "set_markdown",
                "append_text",
                "reset",
                "show_input",
                "show_multi_form",
                "wait_for_input",
                "get_state"
            ]
        );
        assert_eq!(tools[4].required_fields(), vec!["prompt"]);
    }

    #[test]
    fn validate_multi_form_accepts_checkbox_without_options() {
        let prompt = MultiFieldPrompt {
            fields: vec![FieldSpec {
                key: "agree".into(),
                label: "Agree".into(),
                field_type: FieldType::Checkbox,
                placeholder: None,
                default_value: Some(Value::Bool(false)),
                required: None,
                options: None,
            }],
            content: None,
        };
        assert_eq!(validate_multi_form(&prompt), Ok(()));
    }
}
