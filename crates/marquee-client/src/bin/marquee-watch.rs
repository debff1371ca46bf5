//! Line-oriented viewer for a marquee display (`marquee-watch`).
//!
//! Prints every new display value and action log entry. While a request is
//! pending, a line on stdin answers it: plain text for a single field, a JSON
//! object for a multi-field form, `:cancel` to cancel.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use marquee_client::connection::{ClientSync, SyncEvent, SyncOptions};
use marquee_client::error::ClientError;
use marquee_core::config::Config;
use marquee_core::input::{InputForm, InputRequest, InputStatus};
use marquee_core::snapshot::Snapshot;

const CANCEL_COMMAND: &str = ":cancel";

#[derive(Debug, Parser)]
#[command(name = "marquee-watch", version, about = "Follow a shared display")]
struct WatchArgs {
    /// WebSocket URL of the daemon.
    #[arg(long)]
    url: Option<String>,

    /// Path to a YAML config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// trace, debug, info, warn or error.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = WatchArgs::parse();
    let mut cfg = match Config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("marquee-watch: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = args.url {
        cfg.client.url = url;
    }
    if let Some(level) = args.log_level {
        cfg.logging.level = level;
    }
    if let Err(err) = cfg.validate() {
        eprintln!("marquee-watch: invalid config: {err}");
        return ExitCode::FAILURE;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.logging.level.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let shutdown = CancellationToken::new();
    let (client, mut events) = ClientSync::connect(SyncOptions::from(&cfg.client), shutdown.clone());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut shown_text: Option<String> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(SyncEvent::Connected) => println!("-- connected to {}", cfg.client.url),
                Some(SyncEvent::Disconnected) => println!("-- disconnected"),
                Some(SyncEvent::Updated { state, logged }) => {
                    if shown_text.as_deref() != Some(state.text.as_str()) {
                        print_display(&state);
                        shown_text = Some(state.text.clone());
                    }
                    if let Some(entry) = logged {
                        println!(
                            "[{}] {}: {}",
                            entry.timestamp.format("%H:%M:%S"),
                            entry.action,
                            entry.detail
                        );
                        if let Some(request) = pending_request(&state) {
                            print_prompt(request);
                        }
                    }
                    if let Some(error) = &state.last_error {
                        println!("!! {error}");
                    }
                }
                None => break,
            },
            line = stdin.next_line() => match line {
                Ok(Some(line)) => answer(&client, line.trim()),
                Ok(None) | Err(_) => break,
            },
        }
    }

    shutdown.cancel();
    ExitCode::SUCCESS
}

fn pending_request(state: &Snapshot) -> Option<&InputRequest> {
    match state.input_status {
        InputStatus::Pending => state.input_request.as_ref(),
        _ => None,
    }
}

fn print_display(state: &Snapshot) {
    println!("== {} ({}) ==", state.current_state, state.content_type.as_str());
    if state.text.is_empty() {
        println!("(empty)");
    } else {
        println!("{}", state.text);
    }
}

fn print_prompt(request: &InputRequest) {
    match &request.form {
        InputForm::SingleField(prompt) => {
            if let Some(content) = &prompt.content {
                println!("{content}");
            }
            println!("?? {} (answer on stdin, {CANCEL_COMMAND} to cancel)", prompt.prompt);
        }
        InputForm::MultiField(form) => {
            if let Some(content) = &form.content {
                println!("{content}");
            }
            for field in &form.fields {
                println!("   {} [{}] {}", field.key, field.field_type.as_str(), field.label);
            }
            println!("?? answer with a JSON object keyed by field, {CANCEL_COMMAND} to cancel");
        }
    }
}

fn answer(client: &ClientSync, line: &str) {
    if line.is_empty() {
        return;
    }
    let state = client.state();
    let Some(request) = pending_request(&state) else {
        println!("-- no input request is pending");
        return;
    };
    let request_id = request.request_id.clone();

    let sent = if line == CANCEL_COMMAND {
        client.cancel_input(request_id)
    } else {
        match &request.form {
            InputForm::SingleField(_) => client.submit_input(line.to_string(), request_id),
            InputForm::MultiField(_) => match serde_json::from_str::<BTreeMap<String, Value>>(line) {
                Ok(values) => client.submit_multi_form(values, request_id),
                Err(err) => {
                    println!("-- expected a JSON object: {err}");
                    return;
                }
            },
        }
    };
    match sent {
        Ok(()) => {}
        Err(ClientError::NotConnected) => println!("-- not connected; answer not sent"),
        Err(err) => println!("-- {err}"),
    }
}
