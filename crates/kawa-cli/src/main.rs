//! CLI harness for the Code Awareness IPC client.
//!
//! `kawa` drives the client stack the way the editor plugin would: it
//! registers with the backend's catalog, connects the per-client channel,
//! issues an `auth:info` request, and logs every inbound event until
//! interrupted. Useful for probing a local backend without an IDE.

use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use tracing::{error, info, warn};

use kawa_client::{AwarenessService, EventHandler, HandlerError, ServiceError};
use kawa_config::{Config, ConfigError, LogFormat};
use kawa_proto::{AuthInfo, Message, decode_data, requests};

mod telemetry;

use telemetry::TelemetryError;

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::run");

/// Inbound events the harness subscribes to.
const WATCHED_EVENTS: &[&str] = &[
    "code:active-path",
    "code:peer:select",
    "code:peer:unselect",
    "code:branch:select",
    "code:diff-peer",
    "code:open-peer-file",
];

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "kawa", about = "Probe the Code Awareness backend over local IPC")]
struct CliArgs {
    /// Directory holding the backend's socket files (Unix transports).
    #[arg(long)]
    socket_dir: Option<Utf8PathBuf>,
    /// Log filter expression, e.g. `info` or `kawa_client=debug`.
    #[arg(long)]
    log_filter: Option<String>,
    /// Log output format: `compact` or `json`.
    #[arg(long)]
    log_format: Option<String>,
}

/// Errors that terminate the harness.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid log format '{0}'")]
    LogFormat(String),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Logs every message dispatched for one routing key.
struct EventLogger {
    action: &'static str,
}

impl EventHandler for EventLogger {
    fn action(&self) -> &str {
        self.action
    }

    fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        info!(
            target: CLI_TARGET,
            action = self.action,
            flow = message.flow.as_str(),
            data = ?message.data,
            "inbound event"
        );
        Ok(())
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be installed yet; report on stderr directly.
            eprintln!("kawa: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let args = CliArgs::parse();
    let config = resolve_config(&args)?;
    telemetry::initialise(&config)?;

    let service = AwarenessService::new(config);
    info!(target: CLI_TARGET, guid = %service.guid(), "starting awareness probe");

    for action in WATCHED_EVENTS.iter().copied() {
        service
            .dispatcher()
            .register_handler(Arc::new(EventLogger { action }));
    }

    service.connect()?;
    request_auth_info(&service);

    wait_for_shutdown();

    info!(target: CLI_TARGET, "shutting down");
    service.disconnect();
    Ok(())
}

fn resolve_config(args: &CliArgs) -> Result<Config, AppError> {
    let mut config = Config::load()?;
    if let Some(socket_dir) = &args.socket_dir {
        config.set_socket_dir(socket_dir.clone());
    }
    if let Some(filter) = &args.log_filter {
        config.set_log_filter(filter.clone());
    }
    if let Some(format) = &args.log_format {
        let format: LogFormat = format
            .parse()
            .map_err(|_| AppError::LogFormat(format.clone()))?;
        config.set_log_format(format);
    }
    Ok(config)
}

/// Asks the backend who is signed in and logs the answer.
fn request_auth_info(service: &AwarenessService) {
    let request = requests::auth_info(service.guid().as_str());
    let outcome = service.session().send_with_handler(
        &request,
        Box::new(|message: &Message| match decode_data::<AuthInfo>(message) {
            Ok(info) => {
                info!(
                    target: CLI_TARGET,
                    authenticated = info.authenticated.unwrap_or(false),
                    user = info.user.and_then(|u| u.name).as_deref().unwrap_or("<unknown>"),
                    "auth info"
                );
            }
            Err(error) => warn!(target: CLI_TARGET, %error, "malformed auth:info payload"),
        }),
    );
    if let Err(error) = outcome {
        warn!(target: CLI_TARGET, %error, "auth:info request failed");
    }
}

#[cfg(unix)]
fn wait_for_shutdown() {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            if let Some(signal) = signals.forever().next() {
                info!(target: CLI_TARGET, signal, "signal received");
            }
        }
        Err(error) => {
            error!(target: CLI_TARGET, %error, "failed to install signal handler");
        }
    }
}

#[cfg(not(unix))]
fn wait_for_shutdown() {
    // No signal iterator on this platform; park until the process is
    // terminated externally.
    std::thread::park();
}
