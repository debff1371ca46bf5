//! Entry point for the display daemon (`marqueed`).

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use marquee_core::config::Config;
use marquee_daemon::bootstrap::{build_daemon_options, init_tracing, DaemonArgs, VersionInfo};
use marquee_daemon::server::{Daemon, DaemonError};

#[tokio::main]
async fn main() -> ExitCode {
    let args = DaemonArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "marqueed failed");
            eprintln!("marqueed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: DaemonArgs) -> Result<(), DaemonError> {
    let cfg = Config::load(args.config.as_deref())?;
    let (opts, log_cfg) = build_daemon_options(&args, &cfg)?;
    init_tracing(&log_cfg);

    let version = VersionInfo::default();
    info!(version = %version.version, commit = %version.commit, "marqueed starting");

    let daemon = Daemon::bind(&opts).await?;
    info!(bind = %opts.bind_addr(), "marqueed ready");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received; shutting down");
            }
            shutdown.cancel();
        });
    }

    daemon.run(shutdown).await
}
