//! Connection establishment with retry, and endpoint readiness polling.
//!
//! The manager wraps one transport stream with the configured retry
//! schedule and serialises physical writes so concurrent senders cannot
//! interleave frame bytes. Reads bypass the write lock: the read loop may
//! stay parked in a blocking read while other threads send.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use kawa_config::{PipeEndpoint, RetryPolicy};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transport::{PipeStream, TransportError};

const MANAGER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::manager");

/// Initial delay of the endpoint readiness poll.
const POLL_INITIAL: Duration = Duration::from_millis(100);
/// Upper bound on the readiness poll delay.
const POLL_CAP: Duration = Duration::from_millis(1_000);

/// Error returned when every connection attempt has failed.
#[derive(Debug, Error)]
#[error("connection to {endpoint} failed after {attempts} attempts")]
pub struct ConnectError {
    /// Display form of the endpoint.
    pub endpoint: String,
    /// Number of attempts made.
    pub attempts: u32,
    /// Last underlying failure.
    #[source]
    pub source: TransportError,
}

/// Manages one transport connection with retry and write serialisation.
pub struct ConnectionManager {
    endpoint: PipeEndpoint,
    retry: RetryPolicy,
    stream: Mutex<Option<Arc<PipeStream>>>,
    write_lock: Mutex<()>,
}

impl ConnectionManager {
    /// Creates a manager for the given endpoint and retry schedule.
    #[must_use]
    pub fn new(endpoint: PipeEndpoint, retry: RetryPolicy) -> Self {
        Self {
            endpoint,
            retry,
            stream: Mutex::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Endpoint this manager connects to.
    #[must_use]
    pub fn endpoint(&self) -> &PipeEndpoint {
        &self.endpoint
    }

    /// Connects, retrying with exponential backoff.
    ///
    /// Each failed attempt is logged; the caller sleeps for the current
    /// delay before the next attempt, doubling up to the policy cap.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] wrapping the last underlying failure once
    /// every attempt is exhausted.
    pub fn connect(&self) -> Result<(), ConnectError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut delay = self.retry.initial_delay();
        let mut last_error: Option<TransportError> = None;

        for attempt in 1..=max_attempts {
            info!(
                target: MANAGER_TARGET,
                endpoint = %self.endpoint,
                attempt,
                max_attempts,
                "connection attempt"
            );
            match PipeStream::connect(&self.endpoint) {
                Ok(stream) => {
                    info!(target: MANAGER_TARGET, endpoint = %self.endpoint, "connected");
                    *self.stream_slot() = Some(Arc::new(stream));
                    return Ok(());
                }
                Err(error) => {
                    warn!(
                        target: MANAGER_TARGET,
                        endpoint = %self.endpoint,
                        attempt,
                        %error,
                        "connection attempt failed"
                    );
                    last_error = Some(error);
                    if attempt < max_attempts {
                        debug!(target: MANAGER_TARGET, delay_ms = delay.as_millis() as u64, "retrying");
                        thread::sleep(delay);
                        delay = self.retry.next_delay(delay);
                    }
                }
            }
        }

        Err(ConnectError {
            endpoint: self.endpoint.to_string(),
            attempts: max_attempts,
            source: last_error.unwrap_or(TransportError::NotConnected),
        })
    }

    /// Writes one serialised frame, holding the write lock for its duration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] without a stream, or the
    /// underlying I/O failure.
    pub fn write(&self, frame: &str) -> Result<(), TransportError> {
        let stream = self.current_stream().ok_or(TransportError::NotConnected)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        stream.write_all(frame.as_bytes())
    }

    /// Blocks until any data arrives and returns it as one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] without a stream, or the
    /// underlying I/O failure (EOF included).
    pub fn read(&self) -> Result<String, TransportError> {
        let stream = self.current_stream().ok_or(TransportError::NotConnected)?;
        stream.read_chunk()
    }

    /// Blocks until a delimiter-terminated frame arrives.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] without a stream,
    /// [`TransportError::ClosedBeforeDelimiter`] when the peer disconnects
    /// mid-frame, or the underlying I/O failure.
    pub fn read_until_delimiter(&self, delimiter: u8) -> Result<String, TransportError> {
        let stream = self.current_stream().ok_or(TransportError::NotConnected)?;
        stream.read_until(delimiter)
    }

    /// Reports whether a stream is currently established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream_slot().is_some()
    }

    /// Drops the current stream, severing the connection.
    ///
    /// Safe to call from any thread and idempotent; a reader blocked in
    /// [`Self::read_until_delimiter`] observes the shutdown as EOF.
    pub fn close(&self) {
        if let Some(stream) = self.stream_slot().take() {
            stream.shutdown();
            info!(target: MANAGER_TARGET, endpoint = %self.endpoint, "connection closed");
        }
    }

    fn current_stream(&self) -> Option<Arc<PipeStream>> {
        self.stream_slot().clone()
    }

    fn stream_slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<PipeStream>>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Polls for the endpoint to appear on the filesystem.
///
/// The poll delay starts at 100ms and doubles up to 1s until the deadline.
/// Named pipes have no filesystem presence, so the wait trivially succeeds
/// and the caller proceeds straight to a connection attempt.
#[must_use]
pub fn wait_for_endpoint(endpoint: &PipeEndpoint, max_wait: Duration) -> bool {
    debug!(target: MANAGER_TARGET, %endpoint, "waiting for endpoint");
    let deadline = Instant::now() + max_wait;
    let mut delay = POLL_INITIAL;

    while Instant::now() < deadline {
        if endpoint.exists() {
            debug!(target: MANAGER_TARGET, %endpoint, "endpoint available");
            return true;
        }
        thread::sleep(delay.min(deadline.saturating_duration_since(Instant::now())));
        delay = delay.saturating_mul(2).min(POLL_CAP);
    }

    if endpoint.exists() {
        return true;
    }
    warn!(target: MANAGER_TARGET, %endpoint, "timed out waiting for endpoint");
    false
}
