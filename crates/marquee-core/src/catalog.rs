//! Action catalog: which display operations are legal right now.
//!
//! The catalog is a pure function of [`DisplayState`]. Order is fixed:
//! `set_text`, `set_markdown`, `append_text`, then `clear_text` and `undo`
//! when displaying, and `reset` last. Callers select actions by name.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::action::ActionKind;
use crate::display::{DisplayPhase, DisplayState};

/// A legal action and the parameters it takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionDescriptor {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Names listed under the schema's `required` key.
    pub fn required_fields(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Schema for an action taking one required string parameter.
pub fn string_param_schema(field: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            field: { "type": "string", "description": description },
        },
        "required": [field],
    })
}

/// Schema for an action without parameters.
pub fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn available_actions(state: &DisplayState) -> Vec<ActionDescriptor> {
    let mut actions = vec![
        ActionDescriptor::new(
            ActionKind::SetText.as_str(),
            "Set the displayed text to a new value",
            string_param_schema("text", "The text to display"),
        ),
        ActionDescriptor::new(
            ActionKind::SetMarkdown.as_str(),
            "Set the displayed content to markdown with Mermaid diagram support",
            string_param_schema("markdown", "The markdown content to display"),
        ),
        ActionDescriptor::new(
            ActionKind::AppendText.as_str(),
            "Append text to the current display",
            string_param_schema("text", "The text to append"),
        ),
    ];

    if state.phase == DisplayPhase::Displaying {
        actions.push(ActionDescriptor::new(
            ActionKind::ClearText.as_str(),
            "Clear all text from the display",
            empty_schema(),
        ));

        let undoable = state.history_count();
        if undoable > 0 {
            actions.push(
                ActionDescriptor::new(
                    ActionKind::Undo.as_str(),
                    "Undo the last text change",
                    empty_schema(),
                )
                .with_reason(format!("Can undo {undoable} change(s)")),
            );
        }
    }

    actions.push(ActionDescriptor::new(
        ActionKind::Reset.as_str(),
        "Reset the display to initial state",
        empty_schema(),
    ));

    actions
}
