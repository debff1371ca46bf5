//! Human-input requests.
//!
//! At most one request is outstanding at a time. A request is correlated with
//! its answer by an opaque generated id; replies carrying any other id are
//! ignored so that late or duplicate client messages cannot corrupt state.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Textarea,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Number,
    Checkbox,
    Select,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Checkbox => "checkbox",
            Self::Select => "select",
        }
    }
}

/// One field of a multi-field form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Choices for `select` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleFieldPrompt {
    pub prompt: String,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Markdown shown above the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFieldPrompt {
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The form shown to the human, discriminated by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputForm {
    SingleField(SingleFieldPrompt),
    MultiField(MultiFieldPrompt),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRequest {
    pub request_id: String,
    #[serde(flatten)]
    pub form: InputForm,
}

impl InputRequest {
    pub fn is_multi_field(&self) -> bool {
        matches!(self.form, InputForm::MultiField(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputStatus {
    #[default]
    Idle,
    Pending,
    Submitted,
    Cancelled,
}

impl InputStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for InputStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The human's answer: a scalar for single-field requests, a key/value
/// mapping for multi-field forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputAnswer {
    Value(String),
    Fields(BTreeMap<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputRequestState {
    pub request: Option<InputRequest>,
    pub status: InputStatus,
    pub answer: Option<InputAnswer>,
}

/// Result of a submit or cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Accepted,
    Ignored(IgnoreReason),
}

impl InputOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NoPendingRequest,
    RequestIdMismatch { expected: String, received: String },
    VariantMismatch { request_id: String },
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPendingRequest => f.write_str("no input request is pending"),
            Self::RequestIdMismatch { expected, received } => {
                write!(f, "request id {received:?} does not match pending {expected:?}")
            }
            Self::VariantMismatch { request_id } => {
                write!(f, "answer shape does not match request {request_id:?}")
            }
        }
    }
}

pub type RequestIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

pub fn default_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

/// Tracks the single outstanding input request and its lifecycle.
pub struct InputRequestManager {
    state: InputRequestState,
    next_id: RequestIdGenerator,
}

impl Default for InputRequestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InputRequestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputRequestManager")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl InputRequestManager {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(default_request_id))
    }

    pub fn with_id_generator(next_id: RequestIdGenerator) -> Self {
        Self {
            state: InputRequestState::default(),
            next_id,
        }
    }

    pub fn state(&self) -> &InputRequestState {
        &self.state
    }

    pub fn pending_request_id(&self) -> Option<&str> {
        match (&self.state.request, self.state.status) {
            (Some(request), InputStatus::Pending) => Some(request.request_id.as_str()),
            _ => None,
        }
    }

    /// Issue a new request. Fails while another request is pending.
    pub fn issue(&mut self, form: InputForm) -> Result<InputRequest, InputError> {
        if let Some(pending) = self.pending_request_id() {
            return Err(InputError::AlreadyPending {
                request_id: pending.to_string(),
            });
        }

        let request = InputRequest {
            request_id: (self.next_id)(),
            form,
        };
        self.state = InputRequestState {
            request: Some(request.clone()),
            status: InputStatus::Pending,
            answer: None,
        };
        Ok(request)
    }

    pub fn submit(&mut self, request_id: &str, answer: InputAnswer) -> InputOutcome {
        let request = match self.match_pending(request_id) {
            Ok(request) => request,
            Err(reason) => return InputOutcome::Ignored(reason),
        };

        let shape_matches = matches!(
            (&request.form, &answer),
            (InputForm::SingleField(_), InputAnswer::Value(_))
                | (InputForm::MultiField(_), InputAnswer::Fields(_))
        );
        if !shape_matches {
            return InputOutcome::Ignored(IgnoreReason::VariantMismatch {
                request_id: request_id.to_string(),
            });
        }

        self.state.status = InputStatus::Submitted;
        self.state.answer = Some(answer);
        InputOutcome::Accepted
    }

    pub fn cancel(&mut self, request_id: &str) -> InputOutcome {
        if let Err(reason) = self.match_pending(request_id) {
            return InputOutcome::Ignored(reason);
        }
        self.state.status = InputStatus::Cancelled;
        self.state.answer = None;
        InputOutcome::Accepted
    }

    /// Drop any request, pending or answered.
    pub fn reset(&mut self) {
        self.state = InputRequestState::default();
    }

    fn match_pending(&self, request_id: &str) -> Result<&InputRequest, IgnoreReason> {
        let request = match (&self.state.request, self.state.status) {
            (Some(request), InputStatus::Pending) => request,
            _ => return Err(IgnoreReason::NoPendingRequest),
        };
        if request.request_id != request_id {
            return Err(IgnoreReason::RequestIdMismatch {
                expected: request.request_id.clone(),
                received: request_id.to_string(),
            });
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    fn sequential_manager() -> InputRequestManager {
        let counter = Arc::new(AtomicU64::new(0));
        InputRequestManager::with_id_generator(Arc::new(move || {
            let seq = counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("r{seq}")
        }))
    }

    fn name_prompt() -> InputForm {
        InputForm::SingleField(SingleFieldPrompt {
            prompt: "Name?".into(),
            input_type: InputType::Text,
            placeholder: None,
            default_value: None,
            content: None,
        })
    }

    fn two_field_form() -> InputForm {
        InputForm::MultiField(MultiFieldPrompt {
            fields: vec![
                FieldSpec {
                    key: "name".into(),
                    label: "Name".into(),
                    field_type: FieldType::Text,
                    placeholder: None,
                    default_value: None,
                    required: Some(true),
                    options: None,
                },
                FieldSpec {
                    key: "agree".into(),
                    label: "Agree".into(),
                    field_type: FieldType::Checkbox,
                    placeholder: None,
                    default_value: Some(Value::Bool(false)),
                    required: None,
                    options: None,
                },
            ],
            content: None,
        })
    }

    #[test]
    fn issue_moves_to_pending_with_fresh_id() {
        let mut manager = sequential_manager();
        let request = manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        assert_eq!(request.request_id, "r1");
        assert_eq!(manager.state().status, InputStatus::Pending);
        assert_eq!(manager.pending_request_id(), Some("r1"));
        assert_eq!(manager.state().answer, None);
    }

    #[test]
    fn default_ids_are_unique() {
        let mut manager = InputRequestManager::new();
        let first = manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        manager.cancel(&first.request_id);
        let second = manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        assert_ne!(first.request_id, second.request_id);
        assert!(first.request_id.starts_with("req_"));
    }

    #[test]
    fn issue_while_pending_fails_and_keeps_existing_request() {
        let mut manager = sequential_manager();
        let first = manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        let err = match manager.issue(two_field_form()) {
            Ok(_) => panic!("second issue should fail"),
            Err(err) => err,
        };
        assert_eq!(
            err,
            InputError::AlreadyPending {
                request_id: "r1".into()
            }
        );
        assert_eq!(manager.state().request.as_ref(), Some(&first));
        assert_eq!(manager.state().status, InputStatus::Pending);
    }

    #[test]
    fn submit_then_cancel_is_ignored() {
        let mut manager = sequential_manager();
        let request = manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        let outcome = manager.submit(&request.request_id, InputAnswer::Value("Alice".into()));
        assert_eq!(outcome, InputOutcome::Accepted);
        assert_eq!(manager.state().status, InputStatus::Submitted);
        assert_eq!(
            manager.state().answer,
            Some(InputAnswer::Value("Alice".into()))
        );

        let outcome = manager.cancel(&request.request_id);
        assert_eq!(outcome, InputOutcome::Ignored(IgnoreReason::NoPendingRequest));
        assert_eq!(manager.state().status, InputStatus::Submitted);
        assert_eq!(
            manager.state().answer,
            Some(InputAnswer::Value("Alice".into()))
        );
    }

    #[test]
    fn cancel_with_wrong_id_keeps_pending() {
        let mut manager = sequential_manager();
        manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        let outcome = manager.cancel("wrong-id");
        assert_eq!(
            outcome,
            InputOutcome::Ignored(IgnoreReason::RequestIdMismatch {
                expected: "r1".into(),
                received: "wrong-id".into(),
            })
        );
        assert_eq!(manager.state().status, InputStatus::Pending);
    }

    #[test]
    fn submit_with_stale_id_is_ignored() {
        let mut manager = sequential_manager();
        let first = manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        manager.cancel(&first.request_id);
        manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));

        let outcome = manager.submit(&first.request_id, InputAnswer::Value("late".into()));
        assert!(!outcome.is_accepted());
        assert_eq!(manager.state().status, InputStatus::Pending);
        assert_eq!(manager.state().answer, None);
    }

    #[test]
    fn cancel_clears_answer() {
        let mut manager = sequential_manager();
        let request = manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        assert!(manager.cancel(&request.request_id).is_accepted());
        assert_eq!(manager.state().status, InputStatus::Cancelled);
        assert_eq!(manager.state().answer, None);
        assert!(manager.state().request.is_some());
    }

    #[test]
    fn multi_field_submission_stores_mapping() {
        let mut manager = sequential_manager();
        let request = manager
            .issue(two_field_form())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        let mut values = BTreeMap::new();
        values.insert("name".to_string(), Value::String("Bob".into()));
        values.insert("agree".to_string(), Value::Bool(true));

        let outcome = manager.submit(&request.request_id, InputAnswer::Fields(values.clone()));
        assert!(outcome.is_accepted());
        assert_eq!(manager.state().answer, Some(InputAnswer::Fields(values)));
    }

    #[test]
    fn mismatched_answer_shape_is_ignored() {
        let mut manager = sequential_manager();
        let request = manager
            .issue(two_field_form())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        let outcome = manager.submit(&request.request_id, InputAnswer::Value("x".into()));
        assert_eq!(
            outcome,
            InputOutcome::Ignored(IgnoreReason::VariantMismatch {
                request_id: "r1".into()
            })
        );
        assert_eq!(manager.state().status, InputStatus::Pending);
    }

    #[test]
    fn new_request_allowed_after_resolution() {
        let mut manager = sequential_manager();
        let first = manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        manager.submit(&first.request_id, InputAnswer::Value("a".into()));
        let second = manager
            .issue(two_field_form())
            .unwrap_or_else(|err| panic!("issue after submit: {err}"));
        assert_eq!(second.request_id, "r2");
        assert_eq!(manager.state().answer, None);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut manager = sequential_manager();
        manager
            .issue(name_prompt())
            .unwrap_or_else(|err| panic!("issue: {err}"));
        manager.reset();
        assert_eq!(manager.state(), &InputRequestState::default());
        assert_eq!(manager.pending_request_id(), None);
    }

    #[test]
    fn request_serializes_with_kind_tag() {
        let request = InputRequest {
            request_id: "r1".into(),
            form: name_prompt(),
        };
        let encoded =
            serde_json::to_value(&request).unwrap_or_else(|err| panic!("encode request: {err}"));
        assert_eq!(encoded["kind"], "single_field");
        assert_eq!(encoded["requestId"], "r1");
        assert_eq!(encoded["prompt"], "Name?");
        assert_eq!(encoded["inputType"], "text");

        let decoded: InputRequest =
            serde_json::from_value(encoded).unwrap_or_else(|err| panic!("decode request: {err}"));
        assert_eq!(decoded, request);
    }
}
