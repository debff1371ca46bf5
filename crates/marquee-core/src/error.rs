//! Error types for session operations.
//!
//! Recoverable outcomes (undo on empty history, stale request ids) are not
//! errors; they surface as data in the snapshot or as an ignored outcome.
//! These types cover calls the caller must be told were rejected.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Another request is still waiting for the human.
    #[error("input request {request_id:?} is still pending")]
    AlreadyPending { request_id: String },
}

/// An agent call that does not match any action or its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("unknown action {name:?}")]
    UnknownAction { name: String },

    #[error("action {action:?} requires argument {field:?}")]
    MissingArgument { action: String, field: String },

    #[error("invalid arguments for {action:?}: {message}")]
    InvalidArgument { action: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

impl SessionError {
    /// Stable machine-readable code for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Input(InputError::AlreadyPending { .. }) => "already_pending",
            Self::Action(ActionError::UnknownAction { .. }) => "unknown_action",
            Self::Action(ActionError::MissingArgument { .. }) => "missing_argument",
            Self::Action(ActionError::InvalidArgument { .. }) => "invalid_argument",
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Input(InputError::AlreadyPending { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let pending = SessionError::from(InputError::AlreadyPending {
            request_id: "r1".into(),
        });
        assert_eq!(pending.code(), "already_pending");
        assert!(pending.is_retryable());

        let unknown = SessionError::from(ActionError::UnknownAction {
            name: "explode".into(),
        });
        assert_eq!(unknown.code(), "unknown_action");
        assert!(!unknown.is_retryable());
    }

    #[test]
    fn messages_name_the_offending_values() {
        let err = ActionError::MissingArgument {
            action: "set_text".into(),
            field: "text".into(),
        };
        assert_eq!(
            err.to_string(),
            "action \"set_text\" requires argument \"text\""
        );
        let err = InputError::AlreadyPending {
            request_id: "r9".into(),
        };
        assert_eq!(err.to_string(), "input request \"r9\" is still pending");
    }
}
