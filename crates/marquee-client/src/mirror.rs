//! Local mirror of the server's snapshot plus the derived action log.
//!
//! Each `state_update` replaces the mirror wholesale. When the update carries
//! a `lastAction` different from the previous one, a log entry is prepended;
//! the log keeps the newest `limit` entries.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use marquee_core::action::ActionKind;
use marquee_core::input::InputForm;
use marquee_core::snapshot::{ServerMessage, Snapshot};

use crate::error::ClientError;

pub const DEFAULT_ACTION_LOG_LIMIT: usize = 20;
const DETAIL_MAX_CHARS: usize = 100;
const EMPTY: &str = "(empty)";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
    pub action: ActionKind,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct ClientMirror {
    state: Snapshot,
    log: VecDeque<ActionLogEntry>,
    limit: usize,
}

impl Default for ClientMirror {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_LOG_LIMIT)
    }
}

impl ClientMirror {
    pub fn new(limit: usize) -> Self {
        Self {
            state: Snapshot::default(),
            log: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn state(&self) -> &Snapshot {
        &self.state
    }

    /// Newest first.
    pub fn action_log(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.log.iter()
    }

    /// Decode and apply one server frame.
    pub fn apply_text(&mut self, text: &str) -> Result<Option<ActionLogEntry>, ClientError> {
        let message: ServerMessage = serde_json::from_str(text).map_err(ClientError::Decode)?;
        Ok(self.apply_message(message))
    }

    /// Replace the mirrored state. Returns the new log entry, if any.
    pub fn apply_message(&mut self, message: ServerMessage) -> Option<ActionLogEntry> {
        let ServerMessage::StateUpdate { timestamp, data } = message;
        let previous = self.state.last_action;
        self.state = data;

        let action = self.state.last_action?;
        if Some(action) == previous {
            return None;
        }
        let entry = ActionLogEntry {
            action,
            timestamp,
            detail: action_detail(&self.state),
        };
        self.log.push_front(entry.clone());
        self.log.truncate(self.limit);
        Some(entry)
    }
}

/// Short human-readable description of the snapshot's `lastAction`.
pub fn action_detail(state: &Snapshot) -> String {
    let request = state.input_request.as_ref().map(|r| &r.form);
    match state.last_action {
        Some(ActionKind::SetText) | Some(ActionKind::SetMarkdown) => {
            truncate(&state.text, DETAIL_MAX_CHARS)
        }
        Some(ActionKind::AppendText) => format!(
            "Appended to text (now {} chars)",
            state.text.chars().count()
        ),
        Some(ActionKind::ShowInput) => match request {
            Some(InputForm::SingleField(prompt)) if !prompt.prompt.is_empty() => {
                prompt.prompt.clone()
            }
            _ => "Input requested".to_string(),
        },
        Some(ActionKind::ShowMultiForm) => match request {
            Some(InputForm::MultiField(form)) => format!("{} field form", form.fields.len()),
            _ => "Multi-field form".to_string(),
        },
        Some(ActionKind::InputSubmitted) => match state.user_input.as_deref() {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => EMPTY.to_string(),
        },
        Some(ActionKind::MultiFormSubmitted) => match &state.multi_field_input {
            Some(values) => format!("{} values submitted", values.len()),
            None => "Form submitted".to_string(),
        },
        Some(ActionKind::InputCancelled) => "User cancelled input".to_string(),
        Some(ActionKind::ClearText) => "Text cleared".to_string(),
        Some(ActionKind::Undo) => "Restored previous state".to_string(),
        Some(ActionKind::Reset) => "Reset to initial state".to_string(),
        None if state.text.is_empty() => EMPTY.to_string(),
        None => state.text.clone(),
    }
}

/// Cut `s` to `max_chars` characters with a trailing `...`; empty input
/// reads as `(empty)`.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.is_empty() {
        return EMPTY.to_string();
    }
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{json, Value};

    use marquee_core::input::{
        FieldSpec, FieldType, InputRequest, InputType, MultiFieldPrompt, SingleFieldPrompt,
    };

    use super::*;

    fn update(state: Snapshot) -> ServerMessage {
        ServerMessage::state_update(state)
    }

    fn with_action(action: ActionKind, text: &str) -> Snapshot {
        Snapshot {
            text: text.to_string(),
            last_action: Some(action),
            ..Snapshot::default()
        }
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("", 5), "(empty)");
        assert_eq!(truncate("short", 5), "short");
        assert_eq!(truncate("toolong", 3), "too...");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn set_text_detail_truncates_at_100() {
        let long = "x".repeat(150);
        let detail = action_detail(&with_action(ActionKind::SetText, &long));
        assert_eq!(detail.len(), 103);
        assert!(detail.ends_with("..."));
        assert_eq!(
            action_detail(&with_action(ActionKind::SetMarkdown, "")),
            "(empty)"
        );
    }

    #[test]
    fn fixed_details() {
        let cases = [
            (ActionKind::AppendText, "Appended to text (now 5 chars)"),
            (ActionKind::ClearText, "Text cleared"),
            (ActionKind::Undo, "Restored previous state"),
            (ActionKind::Reset, "Reset to initial state"),
            (ActionKind::InputCancelled, "User cancelled input"),
            (ActionKind::ShowInput, "Input requested"),
            (ActionKind::ShowMultiForm, "Multi-field form"),
            (ActionKind::InputSubmitted, "(empty)"),
            (ActionKind::MultiFormSubmitted, "Form submitted"),
        ];
        for (action, expected) in cases {
            assert_eq!(action_detail(&with_action(action, "hello")), expected, "{action}");
        }
    }

    #[test]
    fn input_details_use_request_and_answer() {
        let mut state = with_action(ActionKind::ShowInput, "");
        state.input_request = Some(InputRequest {
            request_id: "r1".into(),
            form: InputForm::SingleField(SingleFieldPrompt {
                prompt: "Name?".into(),
                input_type: InputType::Text,
                placeholder: None,
                default_value: None,
                content: None,
            }),
        });
        assert_eq!(action_detail(&state), "Name?");

        state.last_action = Some(ActionKind::InputSubmitted);
        state.user_input = Some("Alice".into());
        assert_eq!(action_detail(&state), "Alice");

        let field = |key: &str| FieldSpec {
            key: key.into(),
            label: key.into(),
            field_type: FieldType::Text,
            placeholder: None,
            default_value: None,
            required: None,
            options: None,
        };
        state.last_action = Some(ActionKind::ShowMultiForm);
        state.input_request = Some(InputRequest {
            request_id: "r2".into(),
            form: InputForm::MultiField(MultiFieldPrompt {
                fields: vec![field("a"), field("b"), field("c")],
                content: None,
            }),
        });
        assert_eq!(action_detail(&state), "3 field form");

        let mut values = BTreeMap::new();
        values.insert("a".to_string(), Value::from("1"));
        values.insert("b".to_string(), json!(true));
        state.last_action = Some(ActionKind::MultiFormSubmitted);
        state.multi_field_input = Some(values);
        assert_eq!(action_detail(&state), "2 values submitted");
    }

    #[test]
    fn log_only_on_action_change() {
        let mut mirror = ClientMirror::default();
        assert!(mirror.apply_message(update(Snapshot::default())).is_none());

        let entry = mirror
            .apply_message(update(with_action(ActionKind::SetText, "a")))
            .unwrap_or_else(|| panic!("expected entry"));
        assert_eq!(entry.action, ActionKind::SetText);
        assert_eq!(entry.detail, "a");

        // Same action again: state replaced, no new entry.
        assert!(mirror
            .apply_message(update(with_action(ActionKind::SetText, "b")))
            .is_none());
        assert_eq!(mirror.state().text, "b");

        mirror.apply_message(update(with_action(ActionKind::AppendText, "bc")));
        let actions: Vec<ActionKind> = mirror.action_log().map(|e| e.action).collect();
        assert_eq!(actions, vec![ActionKind::AppendText, ActionKind::SetText]);
    }

    #[test]
    fn log_is_bounded_newest_first() {
        let mut mirror = ClientMirror::new(3);
        let actions = [
            ActionKind::SetText,
            ActionKind::AppendText,
            ActionKind::ClearText,
            ActionKind::SetMarkdown,
            ActionKind::Undo,
        ];
        for action in actions {
            mirror.apply_message(update(with_action(action, "t")));
        }
        let logged: Vec<ActionKind> = mirror.action_log().map(|e| e.action).collect();
        assert_eq!(
            logged,
            vec![ActionKind::Undo, ActionKind::SetMarkdown, ActionKind::ClearText]
        );
    }

    #[test]
    fn apply_text_rejects_garbage_without_touching_state() {
        let mut mirror = ClientMirror::default();
        mirror.apply_message(update(with_action(ActionKind::SetText, "keep")));
        assert!(matches!(
            mirror.apply_text("{\"type\":\"nope\"}"),
            Err(ClientError::Decode(_))
        ));
        assert_eq!(mirror.state().text, "keep");

        let encoded = serde_json::to_string(&update(with_action(ActionKind::Reset, "")))
            .unwrap_or_else(|err| panic!("encode: {err}"));
        let entry = mirror
            .apply_text(&encoded)
            .unwrap_or_else(|err| panic!("apply: {err}"));
        assert_eq!(entry.map(|e| e.detail).as_deref(), Some("Reset to initial state"));
    }
}
