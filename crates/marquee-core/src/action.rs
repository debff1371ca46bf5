//! Names of the operations that can take effect on a session.

use serde::{Deserialize, Serialize};

/// Every operation whose name can appear as a snapshot's `lastAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SetText,
    SetMarkdown,
    AppendText,
    ClearText,
    Undo,
    Reset,
    ShowInput,
    ShowMultiForm,
    InputSubmitted,
    MultiFormSubmitted,
    InputCancelled,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetText => "set_text",
            Self::SetMarkdown => "set_markdown",
            Self::AppendText => "append_text",
            Self::ClearText => "clear_text",
            Self::Undo => "undo",
            Self::Reset => "reset",
            Self::ShowInput => "show_input",
            Self::ShowMultiForm => "show_multi_form",
            Self::InputSubmitted => "input_submitted",
            Self::MultiFormSubmitted => "multi_form_submitted",
            Self::InputCancelled => "input_cancelled",
        }
    }

    /// Parse an action from its wire name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "set_text" => Some(Self::SetText),
            "set_markdown" => Some(Self::SetMarkdown),
            "append_text" => Some(Self::AppendText),
            "clear_text" => Some(Self::ClearText),
            "undo" => Some(Self::Undo),
            "reset" => Some(Self::Reset),
            "show_input" => Some(Self::ShowInput),
            "show_multi_form" => Some(Self::ShowMultiForm),
            "input_submitted" => Some(Self::InputSubmitted),
            "multi_form_submitted" => Some(Self::MultiFormSubmitted),
            "input_cancelled" => Some(Self::InputCancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ActionKind;

    #[test]
    fn wire_names_round_trip() {
        let all = [
            ActionKind::SetText,
            ActionKind::SetMarkdown,
            ActionKind::AppendText,
            ActionKind::ClearText,
            ActionKind::Undo,
            ActionKind::Reset,
            ActionKind::ShowInput,
            ActionKind::ShowMultiForm,
            ActionKind::InputSubmitted,
            ActionKind::MultiFormSubmitted,
            ActionKind::InputCancelled,
        ];
        for kind in all {
            assert_eq!(ActionKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionKind::from_str("bogus"), None);
    }

    #[test]
    fn serde_matches_as_str() {
        let encoded = serde_json::to_string(&ActionKind::MultiFormSubmitted)
            .unwrap_or_else(|err| panic!("encode action kind: {err}"));
        assert_eq!(encoded, "\"multi_form_submitted\"");
    }
}
