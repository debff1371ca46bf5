//! Wire types exchanged with UI clients.
//!
//! The server pushes a complete [`Snapshot`] on every change; clients replace
//! their local copy wholesale. Clients answer input requests with
//! [`ClientEvent`]s. History contents never leave the server, only its length.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::ActionKind;
use crate::catalog::ActionDescriptor;
use crate::display::{ContentType, DisplayPhase};
use crate::input::{InputRequest, InputStatus};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub current_state: DisplayPhase,
    pub text: String,
    pub content_type: ContentType,
    pub history_count: usize,
    pub last_action: Option<ActionKind>,
    pub last_error: Option<String>,
    pub available_actions: Vec<ActionDescriptor>,
    pub input_request: Option<InputRequest>,
    pub input_status: InputStatus,
    pub user_input: Option<String>,
    pub multi_field_input: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub user_context: Map<String, Value>,
}

/// Server to client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    StateUpdate {
        timestamp: DateTime<Utc>,
        data: Snapshot,
    },
}

impl ServerMessage {
    pub fn state_update(data: Snapshot) -> Self {
        Self::StateUpdate {
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Client to server messages, `{"type": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    SubmitInput {
        value: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    CancelInput {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    SubmitMultiForm {
        values: BTreeMap<String, Value>,
        #[serde(rename = "requestId")]
        request_id: String,
    },
}

impl ClientEvent {
    pub fn request_id(&self) -> &str {
        match self {
            Self::SubmitInput { request_id, .. }
            | Self::CancelInput { request_id }
            | Self::SubmitMultiForm { request_id, .. } => request_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SubmitInput { .. } => "submit_input",
            Self::CancelInput { .. } => "cancel_input",
            Self::SubmitMultiForm { .. } => "submit_multi_form",
        }
    }
}
