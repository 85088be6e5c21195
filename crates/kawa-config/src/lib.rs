//! Shared configuration for the Code Awareness IPC client.
//!
//! The crate owns the endpoint model (`unix://` socket files and `pipe://`
//! named pipes), the default locations of the backend's catalog and
//! per-client channels, the connect retry schedule, the notifier debounce
//! windows, and the logging format used by the binaries. Both the client
//! library and the CLI resolve their settings through [`Config`] so every
//! component agrees on the same endpoint layout.

mod defaults;
mod endpoint;
mod logging;
mod settings;

use std::env;

use camino::Utf8PathBuf;
use thiserror::Error;

pub use defaults::{
    CATALOG_NAME, DEFAULT_LOG_FILTER, ENDPOINT_PREFIX, catalog_endpoint, client_endpoint,
    default_log_filter, default_log_format, default_socket_dir,
};
pub use endpoint::{EndpointParseError, PipeEndpoint};
pub use logging::{LogFormat, LogFormatParseError};
pub use settings::{DebounceSettings, RetryPolicy};

/// Environment variable overriding the socket directory.
pub const ENV_SOCKET_DIR: &str = "KAWA_SOCKET_DIR";
/// Environment variable overriding the log filter expression.
pub const ENV_LOG_FILTER: &str = "KAWA_LOG_FILTER";
/// Environment variable overriding the log output format.
pub const ENV_LOG_FORMAT: &str = "KAWA_LOG_FORMAT";

/// Resolved configuration shared by the client library and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    socket_dir: Utf8PathBuf,
    log_filter: String,
    log_format: LogFormat,
    retry: RetryPolicy,
    debounce: DebounceSettings,
}

impl Config {
    /// Loads configuration from defaults and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingHomeDirectory`] when no home directory
    /// can be resolved and no override is present, or a parse error when an
    /// override holds an invalid value.
    pub fn load() -> Result<Self, ConfigError> {
        let socket_dir = match env::var(ENV_SOCKET_DIR) {
            Ok(dir) => Utf8PathBuf::from(dir),
            Err(_) => default_socket_dir().ok_or(ConfigError::MissingHomeDirectory)?,
        };
        let log_filter =
            env::var(ENV_LOG_FILTER).unwrap_or_else(|_| default_log_filter().to_owned());
        let log_format = match env::var(ENV_LOG_FORMAT) {
            Ok(raw) => raw
                .parse()
                .map_err(|source| ConfigError::LogFormat { raw, source })?,
            Err(_) => default_log_format(),
        };
        Ok(Self {
            socket_dir,
            log_filter,
            log_format,
            retry: RetryPolicy::default(),
            debounce: DebounceSettings::default(),
        })
    }

    /// Builds a configuration rooted at an explicit socket directory.
    ///
    /// Used by tests and by CLI flags that bypass the environment.
    #[must_use]
    pub fn with_socket_dir(socket_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
            retry: RetryPolicy::default(),
            debounce: DebounceSettings::default(),
        }
    }

    /// Directory holding the backend's socket files on Unix platforms.
    #[must_use]
    pub fn socket_dir(&self) -> &Utf8PathBuf {
        &self.socket_dir
    }

    /// Log filter expression applied by the telemetry subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Logging output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Connect retry schedule.
    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Debounce windows for the outbound notifiers.
    #[must_use]
    pub fn debounce(&self) -> DebounceSettings {
        self.debounce
    }

    /// Replaces the log filter expression.
    pub fn set_log_filter(&mut self, filter: impl Into<String>) {
        self.log_filter = filter.into();
    }

    /// Replaces the logging output format.
    pub fn set_log_format(&mut self, format: LogFormat) {
        self.log_format = format;
    }

    /// Replaces the socket directory.
    pub fn set_socket_dir(&mut self, socket_dir: impl Into<Utf8PathBuf>) {
        self.socket_dir = socket_dir.into();
    }

    /// Replaces the connect retry schedule.
    pub fn set_retry(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    /// Replaces the notifier debounce windows.
    pub fn set_debounce(&mut self, debounce: DebounceSettings) {
        self.debounce = debounce;
    }

    /// Resolves the catalog (discovery) endpoint.
    #[must_use]
    pub fn catalog_endpoint(&self) -> PipeEndpoint {
        catalog_endpoint(&self.socket_dir)
    }

    /// Resolves the private endpoint for the given client GUID.
    #[must_use]
    pub fn client_endpoint(&self, guid: &str) -> PipeEndpoint {
        client_endpoint(&self.socket_dir, guid)
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory was available to derive the socket directory.
    #[error("no home directory available; set {ENV_SOCKET_DIR} explicitly")]
    MissingHomeDirectory,
    /// The log format override held an unknown value.
    #[error("invalid log format '{raw}': {source}")]
    LogFormat {
        raw: String,
        #[source]
        source: LogFormatParseError,
    },
}
