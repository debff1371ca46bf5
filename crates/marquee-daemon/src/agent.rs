//! Agent tool endpoint: newline-delimited JSON over a byte stream.
//!
//! Requests look like `{"id":1,"method":"tools/call","params":{...}}`; each
//! one gets exactly one response line carrying the same `id`. Calls run on
//! their own tasks so a long `wait_for_input` never stalls other calls;
//! responses are written in completion order.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use marquee_core::error::SessionError;
use marquee_core::session::CommandOutcome;
use marquee_core::tools::{parse_call, AgentCall};

use crate::hub::{effect_name, SessionHub};

pub const METHOD_LIST: &str = "tools/list";
pub const METHOD_CALL: &str = "tools/call";

#[derive(Debug, Deserialize)]
struct AgentRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AgentErrorBody>,
}

impl AgentResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: &str, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(AgentErrorBody {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }
}

impl From<(Value, SessionError)> for AgentResponse {
    fn from((id, err): (Value, SessionError)) -> Self {
        Self::err(id, err.code(), err.to_string())
    }
}

/// Handle one request line.
pub async fn handle_line(hub: &SessionHub, line: &str, cancel: &CancellationToken) -> AgentResponse {
    let request: AgentRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "unparsable agent request");
            return AgentResponse::err(Value::Null, "parse_error", err.to_string());
        }
    };
    let id = request.id;

    match request.method.as_str() {
        METHOD_LIST => AgentResponse::ok(id, json!({ "tools": hub.tools() })),
        METHOD_CALL => {
            let params: CallParams = match serde_json::from_value(request.params) {
                Ok(params) => params,
                Err(err) => return AgentResponse::err(id, "invalid_params", err.to_string()),
            };
            debug!(tool = %params.name, "agent call");
            call_tool(hub, id, &params.name, &params.arguments, cancel).await
        }
        other => AgentResponse::err(id, "unknown_method", format!("unknown method {other:?}")),
    }
}

async fn call_tool(
    hub: &SessionHub,
    id: Value,
    name: &str,
    arguments: &Value,
    cancel: &CancellationToken,
) -> AgentResponse {
    let call = match parse_call(name, arguments) {
        Ok(call) => call,
        Err(err) => return (id, SessionError::from(err)).into(),
    };

    match call {
        AgentCall::GetState => match serde_json::to_value(hub.snapshot()) {
            Ok(snapshot) => AgentResponse::ok(id, snapshot),
            Err(err) => AgentResponse::err(id, "internal", err.to_string()),
        },
        AgentCall::WaitForInput {
            request_id,
            timeout_ms,
        } => {
            let outcome = hub
                .wait_for_input(&request_id, timeout_ms.map(Duration::from_millis), cancel)
                .await;
            AgentResponse::ok(id, outcome.to_json())
        }
        AgentCall::Command(command) => match hub.execute(command) {
            Ok(CommandOutcome::Issued(request)) => {
                AgentResponse::ok(id, json!({ "requestId": request.request_id }))
            }
            Ok(CommandOutcome::Display(effect)) => {
                let snapshot = hub.snapshot();
                AgentResponse::ok(
                    id,
                    json!({
                        "effect": effect_name(effect),
                        "text": snapshot.text,
                        "contentType": snapshot.content_type,
                        "historyCount": snapshot.history_count,
                        "lastError": snapshot.last_error,
                    }),
                )
            }
            Err(err) => (id, err).into(),
        },
    }
}

/// Serve requests from `reader` until EOF or `shutdown`, writing responses to
/// `writer`. Once input stops, in-flight waits are interrupted and answer
/// `pending`; returns after every call has answered.
pub async fn serve<R, W>(
    hub: Arc<SessionHub>,
    reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<AgentResponse>(64);
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = rx.recv().await {
            let mut encoded = match serde_json::to_string(&response) {
                Ok(encoded) => encoded,
                Err(err) => {
                    warn!(error = %err, "failed to encode agent response");
                    continue;
                }
            };
            encoded.push('\n');
            writer.write_all(encoded.as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    let calls = shutdown.child_token();
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("agent input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let hub = Arc::clone(&hub);
        let tx = tx.clone();
        let cancel = calls.clone();
        tokio::spawn(async move {
            let response = handle_line(&hub, &line, &cancel).await;
            let _ = tx.send(response).await;
        });
    }

    calls.cancel();
    drop(tx);
    match writer_task.await {
        Ok(result) => result,
        Err(err) => Err(std::io::Error::other(err)),
    }
}

/// Serve on the process's stdin/stdout.
pub async fn serve_stdio(hub: Arc<SessionHub>, shutdown: CancellationToken) -> std::io::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(hub, stdin, tokio::io::stdout(), shutdown).await
}
