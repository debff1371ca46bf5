//! WebSocket endpoint for UI clients.
//!
//! Each connection subscribes to the broadcaster, receives the current
//! snapshot at once, then every later `state_update`. Text frames from the
//! client are decoded as [`ClientEvent`]s; anything else is dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use marquee_core::input::InputOutcome;
use marquee_core::snapshot::ClientEvent;

use crate::hub::SessionHub;

/// Accept connections until `shutdown` fires.
pub async fn serve(listener: TcpListener, hub: Arc<SessionHub>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        Arc::clone(&hub),
                        shutdown.clone(),
                    ));
                }
                Err(err) => warn!(error = %err, "accept failed"),
            },
        }
    }
    debug!("websocket listener stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: Arc<SessionHub>,
    shutdown: CancellationToken,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%peer, error = %err, "websocket handshake failed");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();
    let mut updates = hub.broadcaster().subscribe();
    let sub_id = updates.id().to_string();
    info!(subscriber = %sub_id, %peer, "client connected");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            update = updates.recv() => match update {
                Some(text) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        debug!(subscriber = %sub_id, error = %err, "send failed");
                        break;
                    }
                }
                None => break,
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    handle_client_text(&hub, &sub_id, &text);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(subscriber = %sub_id, error = %err, "receive failed");
                    break;
                }
            },
        }
    }

    hub.broadcaster().unsubscribe(&sub_id);
    let _ = sink.close().await;
    info!(subscriber = %sub_id, %peer, "client disconnected");
}

/// Decode and apply one client frame. Malformed frames are logged and
/// dropped; they never reach the session.
pub fn handle_client_text(hub: &SessionHub, subscriber: &str, text: &str) -> Option<InputOutcome> {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => Some(hub.handle_client_event(event)),
        Err(err) => {
            warn!(subscriber, error = %err, "dropping malformed client message");
            None
        }
    }
}
