//! The shared session and its publication point.
//!
//! Every mutation runs under one lock, so agent calls and client replies are
//! applied strictly in arrival order. The resulting snapshot is published
//! before the lock is released, which keeps broadcast order equal to
//! mutation order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use marquee_core::catalog::ActionDescriptor;
use marquee_core::display::Effect;
use marquee_core::error::SessionError;
use marquee_core::input::{InputAnswer, InputOutcome, InputRequestState, InputStatus};
use marquee_core::session::{CommandOutcome, Session, SessionCommand};
use marquee_core::snapshot::{ClientEvent, Snapshot};
use marquee_core::tools::tool_catalog;

use crate::broadcast::StateBroadcaster;

/// How a wait on an input request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Submitted(InputAnswer),
    Cancelled,
    /// The request was reset away before it was answered, or never existed.
    Superseded,
    /// The wait timed out or was interrupted; the request may still be open.
    Pending,
}

impl WaitOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Submitted(_) => "submitted",
            Self::Cancelled => "cancelled",
            Self::Superseded => "superseded",
            Self::Pending => "pending",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Submitted(InputAnswer::Value(value)) => {
                json!({ "status": self.status(), "value": value })
            }
            Self::Submitted(InputAnswer::Fields(values)) => {
                json!({ "status": self.status(), "values": values })
            }
            _ => json!({ "status": self.status() }),
        }
    }
}

/// Settled requests remembered for late waiters.
const SETTLED_RETAINED: usize = 16;

/// What waiters observe: the live request plus recently settled ones, so an
/// answer is not lost when a new request replaces it before anyone waits.
#[derive(Debug, Clone, Default)]
struct InputWatch {
    current: InputRequestState,
    settled: VecDeque<(String, WaitOutcome)>,
}

impl InputWatch {
    fn new(current: InputRequestState) -> Self {
        let mut observed = Self::default();
        observed.record(current);
        observed
    }

    fn record(&mut self, current: InputRequestState) {
        if let Some((request_id, outcome)) = settled_outcome(&current) {
            if !self.settled.iter().any(|(id, _)| *id == request_id) {
                self.settled.push_front((request_id, outcome));
                self.settled.truncate(SETTLED_RETAINED);
            }
        }
        self.current = current;
    }
}

fn settled_outcome(state: &InputRequestState) -> Option<(String, WaitOutcome)> {
    let request_id = state.request.as_ref()?.request_id.clone();
    let outcome = match (state.status, &state.answer) {
        (InputStatus::Submitted, Some(answer)) => WaitOutcome::Submitted(answer.clone()),
        (InputStatus::Cancelled, _) => WaitOutcome::Cancelled,
        _ => return None,
    };
    Some((request_id, outcome))
}

fn resolve_wait(observed: &InputWatch, request_id: &str) -> Option<WaitOutcome> {
    let pending = observed.current.status == InputStatus::Pending
        && matches!(&observed.current.request, Some(request) if request.request_id == request_id);
    if pending {
        return None;
    }
    let settled = observed
        .settled
        .iter()
        .find(|(id, _)| id == request_id)
        .map(|(_, outcome)| outcome.clone());
    Some(settled.unwrap_or(WaitOutcome::Superseded))
}

pub fn effect_name(effect: Effect) -> &'static str {
    match effect {
        Effect::Applied => "applied",
        Effect::Rejected => "rejected",
        Effect::Ignored => "ignored",
    }
}

pub struct SessionHub {
    session: Mutex<Session>,
    broadcaster: Arc<StateBroadcaster>,
    input_tx: watch::Sender<InputWatch>,
}

impl SessionHub {
    /// Wrap `session` and publish its initial state.
    pub fn new(session: Session, broadcaster: Arc<StateBroadcaster>) -> Self {
        let (input_tx, _) = watch::channel(InputWatch::new(session.input_state().clone()));
        let hub = Self {
            session: Mutex::new(session),
            broadcaster,
            input_tx,
        };
        {
            let session = lock_session(&hub.session);
            hub.publish(&session);
        }
        hub
    }

    pub fn broadcaster(&self) -> &Arc<StateBroadcaster> {
        &self.broadcaster
    }

    pub fn snapshot(&self) -> Snapshot {
        lock_session(&self.session).snapshot()
    }

    /// Current display catalog followed by the input tools.
    pub fn tools(&self) -> Vec<ActionDescriptor> {
        tool_catalog(lock_session(&self.session).display_state())
    }

    pub fn execute(&self, command: SessionCommand) -> Result<CommandOutcome, SessionError> {
        let mut session = lock_session(&self.session);
        let outcome = session.execute(command)?;
        match &outcome {
            CommandOutcome::Display(Effect::Ignored) => {
                debug!("display event ignored in current phase");
            }
            CommandOutcome::Display(effect) => {
                debug!(effect = effect_name(*effect), "display event applied");
                self.publish(&session);
            }
            CommandOutcome::Issued(request) => {
                info!(request_id = %request.request_id, "input request issued");
                self.publish(&session);
            }
        }
        Ok(outcome)
    }

    pub fn handle_client_event(&self, event: ClientEvent) -> InputOutcome {
        let kind = event.kind();
        let request_id = event.request_id().to_string();
        let mut session = lock_session(&self.session);
        let outcome = session.handle_client_event(event);
        match &outcome {
            InputOutcome::Accepted => {
                info!(request_id = %request_id, event = kind, "input request answered");
                self.publish(&session);
            }
            InputOutcome::Ignored(reason) => {
                warn!(request_id = %request_id, event = kind, reason = %reason, "ignoring client event");
            }
        }
        outcome
    }

    /// Wait until `request_id` is answered, cancelled, or superseded. An
    /// answer given before the wait started is still reported, even if a
    /// newer request has since been issued.
    ///
    /// With `timeout` the wait gives up with [`WaitOutcome::Pending`]; the
    /// request itself stays open. `cancel` interrupts the wait the same way.
    pub async fn wait_for_input(
        &self,
        request_id: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        let mut rx = self.input_tx.subscribe();
        let settled = async {
            loop {
                let resolved = resolve_wait(&rx.borrow_and_update(), request_id);
                if let Some(outcome) = resolved {
                    return outcome;
                }
                if rx.changed().await.is_err() {
                    return WaitOutcome::Superseded;
                }
            }
        };
        let expired = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            outcome = settled => outcome,
            _ = cancel.cancelled() => WaitOutcome::Pending,
            _ = expired => WaitOutcome::Pending,
        }
    }

    fn publish(&self, session: &Session) {
        let delivered = self.broadcaster.publish(session.snapshot());
        debug!(subscribers = delivered, "state update published");
        let current = session.input_state().clone();
        self.input_tx.send_modify(|observed| observed.record(current));
    }
}

fn lock_session(lock: &Mutex<Session>) -> MutexGuard<'_, Session> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
