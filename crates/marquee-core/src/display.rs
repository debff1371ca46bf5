//! Display state machine.
//!
//! Holds the single shared text/markdown value and a stack of prior values
//! for undo. Every transition is total: an event either takes effect, is
//! rejected with `last_error` set, or is ignored without touching state.

use serde::{Deserialize, Serialize};

use crate::action::ActionKind;

/// Error recorded when `Undo` finds nothing to restore.
pub const NO_HISTORY_ERROR: &str = "No history to undo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Markdown,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayPhase {
    #[default]
    Idle,
    Displaying,
}

impl DisplayPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Displaying => "displaying",
        }
    }
}

impl std::fmt::Display for DisplayPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A previously displayed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub text: String,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub phase: DisplayPhase,
    pub text: String,
    pub content_type: ContentType,
    pub history: Vec<HistoryEntry>,
    pub last_action: Option<ActionKind>,
    pub last_error: Option<String>,
}

impl DisplayState {
    pub fn history_count(&self) -> usize {
        self.history.len()
    }

    fn push_history(&mut self, limit: Option<usize>) {
        self.history.push(HistoryEntry {
            text: self.text.clone(),
            content_type: self.content_type,
        });
        if let Some(limit) = limit {
            if self.history.len() > limit {
                let overflow = self.history.len() - limit;
                self.history.drain(..overflow);
            }
        }
    }

    fn mark(&mut self, action: ActionKind) {
        self.last_action = Some(action);
        self.last_error = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    SetText(String),
    SetMarkdown(String),
    AppendText(String),
    ClearText,
    Undo,
    Reset,
}

impl DisplayEvent {
    pub fn action(&self) -> ActionKind {
        match self {
            Self::SetText(_) => ActionKind::SetText,
            Self::SetMarkdown(_) => ActionKind::SetMarkdown,
            Self::AppendText(_) => ActionKind::AppendText,
            Self::ClearText => ActionKind::ClearText,
            Self::Undo => ActionKind::Undo,
            Self::Reset => ActionKind::Reset,
        }
    }
}

/// What a transition did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The event took effect.
    Applied,
    /// Recoverable no-op: only `last_error` changed.
    Rejected,
    /// The event has no meaning in the current phase; nothing changed.
    Ignored,
}

/// Compute the next display state for `event`.
///
/// `history_limit` caps the undo stack; `None` keeps it unbounded.
pub fn transition(
    mut state: DisplayState,
    event: DisplayEvent,
    history_limit: Option<usize>,
) -> (DisplayState, Effect) {
    let action = event.action();
    match event {
        DisplayEvent::SetText(text) => {
            state.push_history(history_limit);
            state.text = text;
            state.content_type = ContentType::Text;
            state.phase = DisplayPhase::Displaying;
            state.mark(action);
            (state, Effect::Applied)
        }
        DisplayEvent::SetMarkdown(markdown) => {
            state.push_history(history_limit);
            state.text = markdown;
            state.content_type = ContentType::Markdown;
            state.phase = DisplayPhase::Displaying;
            state.mark(action);
            (state, Effect::Applied)
        }
        DisplayEvent::AppendText(appended) => {
            state.push_history(history_limit);
            state.text.push_str(&appended);
            state.phase = DisplayPhase::Displaying;
            state.mark(action);
            (state, Effect::Applied)
        }
        DisplayEvent::ClearText => {
            if state.phase != DisplayPhase::Displaying {
                return (state, Effect::Ignored);
            }
            state.push_history(history_limit);
            state.text.clear();
            state.phase = DisplayPhase::Idle;
            state.mark(action);
            (state, Effect::Applied)
        }
        DisplayEvent::Undo => {
            let restored = if state.phase == DisplayPhase::Displaying {
                state.history.pop()
            } else {
                None
            };
            match restored {
                Some(entry) => {
                    state.text = entry.text;
                    state.content_type = entry.content_type;
                    state.mark(action);
                    (state, Effect::Applied)
                }
                None => {
                    state.last_error = Some(NO_HISTORY_ERROR.to_string());
                    (state, Effect::Rejected)
                }
            }
        }
        DisplayEvent::Reset => (DisplayState::default(), Effect::Applied),
    }
}

/// Owns a [`DisplayState`] and applies events to it in arrival order.
#[derive(Debug, Clone, Default)]
pub struct DisplayMachine {
    state: DisplayState,
    history_limit: Option<usize>,
}

impl DisplayMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(history_limit: Option<usize>) -> Self {
        Self {
            state: DisplayState::default(),
            history_limit,
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn history_limit(&self) -> Option<usize> {
        self.history_limit
    }

    pub fn apply(&mut self, event: DisplayEvent) -> Effect {
        let current = std::mem::take(&mut self.state);
        let (next, effect) = transition(current, event, self.history_limit);
        self.state = next;
        effect
    }
}
