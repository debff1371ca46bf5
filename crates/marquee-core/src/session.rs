//! The session: one display machine plus one input request lifecycle.
//!
//! A `Session` is a plain value owned by whoever drives it. It processes one
//! event at a time and never blocks; callers that share it across tasks wrap
//! it in a lock and publish [`Session::snapshot`] after every call.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::action::ActionKind;
use crate::catalog::{available_actions, ActionDescriptor};
use crate::display::{DisplayEvent, DisplayMachine, DisplayState, Effect};
use crate::error::InputError;
use crate::input::{
    InputAnswer, InputForm, InputOutcome, InputRequest, InputRequestManager, InputRequestState,
    MultiFieldPrompt, RequestIdGenerator, SingleFieldPrompt,
};
use crate::snapshot::{ClientEvent, Snapshot};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    /// Maximum undo depth; `None` keeps every prior value.
    pub history_limit: Option<usize>,
    /// Static metadata passed through to clients in every snapshot.
    pub user_context: Map<String, Value>,
}

/// A mutation an agent may request.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Display(DisplayEvent),
    ShowInput(SingleFieldPrompt),
    ShowMultiForm(MultiFieldPrompt),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Display(Effect),
    Issued(InputRequest),
}

#[derive(Debug, Default)]
pub struct Session {
    display: DisplayMachine,
    input: InputRequestManager,
    last_action: Option<ActionKind>,
    user_context: Map<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SessionOptions) -> Self {
        Self {
            display: DisplayMachine::with_history_limit(options.history_limit),
            input: InputRequestManager::new(),
            last_action: None,
            user_context: options.user_context,
        }
    }

    /// Replace the request id generator (deterministic ids in tests).
    pub fn with_id_generator(mut self, next_id: RequestIdGenerator) -> Self {
        self.input = InputRequestManager::with_id_generator(next_id);
        self
    }

    pub fn display_state(&self) -> &DisplayState {
        self.display.state()
    }

    pub fn input_state(&self) -> &InputRequestState {
        self.input.state()
    }

    pub fn pending_request_id(&self) -> Option<&str> {
        self.input.pending_request_id()
    }

    pub fn last_action(&self) -> Option<ActionKind> {
        self.last_action
    }

    pub fn available_actions(&self) -> Vec<ActionDescriptor> {
        available_actions(self.display.state())
    }

    pub fn apply_display(&mut self, event: DisplayEvent) -> Effect {
        let action = event.action();
        let is_reset = matches!(event, DisplayEvent::Reset);
        let effect = self.display.apply(event);
        if effect == Effect::Applied {
            if is_reset {
                self.input.reset();
            }
            self.last_action = Some(action);
        }
        effect
    }

    pub fn show_input(&mut self, prompt: SingleFieldPrompt) -> Result<InputRequest, InputError> {
        let request = self.input.issue(InputForm::SingleField(prompt))?;
        self.last_action = Some(ActionKind::ShowInput);
        Ok(request)
    }

    pub fn show_multi_form(
        &mut self,
        prompt: MultiFieldPrompt,
    ) -> Result<InputRequest, InputError> {
        let request = self.input.issue(InputForm::MultiField(prompt))?;
        self.last_action = Some(ActionKind::ShowMultiForm);
        Ok(request)
    }

    pub fn submit_input(&mut self, request_id: &str, value: String) -> InputOutcome {
        let outcome = self.input.submit(request_id, InputAnswer::Value(value));
        self.record_input(&outcome, ActionKind::InputSubmitted);
        outcome
    }

    pub fn submit_multi_form(
        &mut self,
        request_id: &str,
        values: BTreeMap<String, Value>,
    ) -> InputOutcome {
        let outcome = self.input.submit(request_id, InputAnswer::Fields(values));
        self.record_input(&outcome, ActionKind::MultiFormSubmitted);
        outcome
    }

    pub fn cancel_input(&mut self, request_id: &str) -> InputOutcome {
        let outcome = self.input.cancel(request_id);
        self.record_input(&outcome, ActionKind::InputCancelled);
        outcome
    }

    pub fn handle_client_event(&mut self, event: ClientEvent) -> InputOutcome {
        match event {
            ClientEvent::SubmitInput { value, request_id } => {
                self.submit_input(&request_id, value)
            }
            ClientEvent::CancelInput { request_id } => self.cancel_input(&request_id),
            ClientEvent::SubmitMultiForm { values, request_id } => {
                self.submit_multi_form(&request_id, values)
            }
        }
    }

    pub fn execute(&mut self, command: SessionCommand) -> Result<CommandOutcome, InputError> {
        match command {
            SessionCommand::Display(event) => Ok(CommandOutcome::Display(self.apply_display(event))),
            SessionCommand::ShowInput(prompt) => self.show_input(prompt).map(CommandOutcome::Issued),
            SessionCommand::ShowMultiForm(prompt) => {
                self.show_multi_form(prompt).map(CommandOutcome::Issued)
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let display = self.display.state();
        let input = self.input.state();
        let (user_input, multi_field_input) = match &input.answer {
            Some(InputAnswer::Value(value)) => (Some(value.clone()), None),
            Some(InputAnswer::Fields(values)) => (None, Some(values.clone())),
            None => (None, None),
        };

        Snapshot {
            current_state: display.phase,
            text: display.text.clone(),
            content_type: display.content_type,
            history_count: display.history_count(),
            last_action: self.last_action,
            last_error: display.last_error.clone(),
            available_actions: available_actions(display),
            input_request: input.request.clone(),
            input_status: input.status,
            user_input,
            multi_field_input,
            user_context: self.user_context.clone(),
        }
    }

    fn record_input(&mut self, outcome: &InputOutcome, action: ActionKind) {
        if outcome.is_accepted() {
            self.last_action = Some(action);
        }
    }
}
