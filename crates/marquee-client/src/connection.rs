//! Reconnecting WebSocket connection to the display daemon.
//!
//! The connection task retries with a fixed delay. On every (re)connect the
//! server sends the current snapshot, so nothing is replayed locally: replies
//! queued while disconnected are discarded, and replies attempted while
//! disconnected fail with [`ClientError::NotConnected`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use marquee_core::config::ClientConfig;
use marquee_core::snapshot::{ClientEvent, Snapshot};

use crate::error::ClientError;
use crate::mirror::{ActionLogEntry, ClientMirror};

const OUTBOUND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    pub url: String,
    pub reconnect_delay: Duration,
    pub action_log_limit: usize,
}

impl From<&ClientConfig> for SyncOptions {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            url: cfg.url.clone(),
            reconnect_delay: cfg.reconnect_delay(),
            action_log_limit: cfg.action_log_limit,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// Notifications from the connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    /// A new snapshot was mirrored; `logged` is the action log entry it
    /// produced, if any.
    Updated {
        state: Box<Snapshot>,
        logged: Option<ActionLogEntry>,
    },
}

struct Shared {
    connected: AtomicBool,
    mirror: Mutex<ClientMirror>,
}

/// Handle to a running connection task.
#[derive(Clone)]
pub struct ClientSync {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<ClientEvent>,
}

impl ClientSync {
    /// Start the connection task. It runs until `shutdown` fires or every
    /// handle is dropped. Events are dropped if the receiver falls behind;
    /// [`ClientSync::state`] always reflects the latest snapshot.
    pub fn connect(
        options: SyncOptions,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            mirror: Mutex::new(ClientMirror::new(options.action_log_limit)),
        });
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(sync_loop(
            options,
            Arc::clone(&shared),
            outbound_rx,
            events_tx,
            shutdown,
        ));
        (Self { shared, outbound }, events_rx)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Copy of the mirrored snapshot.
    pub fn state(&self) -> Snapshot {
        lock_mirror(&self.shared.mirror).state().clone()
    }

    /// Newest first.
    pub fn action_log(&self) -> Vec<ActionLogEntry> {
        lock_mirror(&self.shared.mirror)
            .action_log()
            .cloned()
            .collect()
    }

    pub fn submit_input(&self, value: String, request_id: String) -> Result<(), ClientError> {
        self.send(ClientEvent::SubmitInput { value, request_id })
    }

    pub fn cancel_input(&self, request_id: String) -> Result<(), ClientError> {
        self.send(ClientEvent::CancelInput { request_id })
    }

    pub fn submit_multi_form(
        &self,
        values: BTreeMap<String, Value>,
        request_id: String,
    ) -> Result<(), ClientError> {
        self.send(ClientEvent::SubmitMultiForm { values, request_id })
    }

    fn send(&self, event: ClientEvent) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        match self.outbound.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ClientError::NotConnected),
            Err(TrySendError::Closed(_)) => Err(ClientError::Closed),
        }
    }
}

async fn sync_loop(
    options: SyncOptions,
    shared: Arc<Shared>,
    mut outbound: mpsc::Receiver<ClientEvent>,
    events: mpsc::Sender<SyncEvent>,
    shutdown: CancellationToken,
) {
    loop {
        // Replies queued before this connection belong to a stale view.
        while outbound.try_recv().is_ok() {}

        let connect = tokio::select! {
            _ = shutdown.cancelled() => return,
            connect = connect_async(options.url.as_str()) => connect,
        };
        let ws = match connect {
            Ok((ws, _)) => ws,
            Err(err) => {
                warn!(url = %options.url, error = %err, "connect failed");
                if wait_or_shutdown(options.reconnect_delay, &shutdown).await {
                    return;
                }
                continue;
            }
        };

        info!(url = %options.url, "connected");
        shared.connected.store(true, Ordering::SeqCst);
        notify(&events, SyncEvent::Connected);

        let (mut sink, mut stream) = ws.split();
        let stop = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break true,
                reply = outbound.recv() => match reply {
                    Some(event) => {
                        let encoded = match serde_json::to_string(&event) {
                            Ok(encoded) => encoded,
                            Err(err) => {
                                warn!(error = %err, "failed to encode client event");
                                continue;
                            }
                        };
                        if let Err(err) = sink.send(Message::Text(encoded)).await {
                            debug!(error = %err, "send failed");
                            break false;
                        }
                    }
                    None => break true,
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let applied = {
                            let mut mirror = lock_mirror(&shared.mirror);
                            mirror
                                .apply_text(&text)
                                .map(|logged| (mirror.state().clone(), logged))
                        };
                        match applied {
                            Ok((state, logged)) => notify(
                                &events,
                                SyncEvent::Updated {
                                    state: Box::new(state),
                                    logged,
                                },
                            ),
                            Err(err) => warn!(error = %err, "dropping malformed server message"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break false,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "receive failed");
                        break false;
                    }
                },
            }
        };

        shared.connected.store(false, Ordering::SeqCst);
        let _ = sink.close().await;
        notify(&events, SyncEvent::Disconnected);
        if stop {
            return;
        }
        info!(delay = ?options.reconnect_delay, "disconnected; reconnecting");
        if wait_or_shutdown(options.reconnect_delay, &shutdown).await {
            return;
        }
    }
}

/// Notifications are advisory; the mirror is authoritative, so a caller that
/// stops draining them never stalls the connection.
fn notify(events: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
    match events.try_send(event) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(_)) => debug!("event receiver lagging; dropping notification"),
    }
}

/// Sleep for `delay`; returns true if `shutdown` fired first.
async fn wait_or_shutdown(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

fn lock_mirror(lock: &Mutex<ClientMirror>) -> MutexGuard<'_, ClientMirror> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
