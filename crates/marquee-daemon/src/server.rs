//! Daemon wiring: session, broadcaster, WebSocket listener, agent endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use marquee_core::config::ConfigError;
use marquee_core::session::{Session, SessionOptions};

use crate::bootstrap::DaemonOptions;
use crate::broadcast::StateBroadcaster;
use crate::hub::SessionHub;
use crate::{agent, ws};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("agent endpoint: {0}")]
    Agent(std::io::Error),
}

/// A bound, not yet serving daemon.
pub struct Daemon {
    listener: TcpListener,
    hub: Arc<SessionHub>,
    agent_stdio: bool,
}

impl Daemon {
    /// Build the session and bind the WebSocket listener.
    pub async fn bind(opts: &DaemonOptions) -> Result<Self, DaemonError> {
        let addr = opts.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| DaemonError::Bind { addr, source })?;

        let session = Session::with_options(SessionOptions {
            history_limit: opts.history_limit,
            user_context: opts.user_context.clone(),
        });
        let broadcaster = Arc::new(StateBroadcaster::new());
        let hub = Arc::new(SessionHub::new(session, broadcaster));

        Ok(Self {
            listener,
            hub,
            agent_stdio: opts.agent_stdio,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn hub(&self) -> Arc<SessionHub> {
        Arc::clone(&self.hub)
    }

    /// Serve until `shutdown` fires. With the agent endpoint enabled, closing
    /// stdin also shuts the daemon down.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DaemonError> {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "websocket endpoint listening");
        }
        let listener_task = tokio::spawn(ws::serve(
            self.listener,
            Arc::clone(&self.hub),
            shutdown.clone(),
        ));

        let mut result = Ok(());
        if self.agent_stdio {
            info!("agent endpoint serving on stdio");
            if let Err(err) = agent::serve_stdio(Arc::clone(&self.hub), shutdown.clone()).await {
                result = Err(DaemonError::Agent(err));
            }
            shutdown.cancel();
        } else {
            shutdown.cancelled().await;
        }

        if let Err(err) = listener_task.await {
            warn!(error = %err, "websocket listener task failed");
        }
        result
    }
}
