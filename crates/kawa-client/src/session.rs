//! Long-lived session channel to the backend.
//!
//! After catalog registration the backend creates a private endpoint named
//! after the client identity. The session connection waits for it, connects
//! through the retrying [`ConnectionManager`], and runs one background read
//! loop that reassembles frames and routes each decoded message: pending
//! one-shot response handlers are offered the message first, and anything
//! unclaimed goes to the configured general callback off the read-loop
//! thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use kawa_config::Config;
use kawa_proto::{DELIMITER, DELIMITER_BYTE, Message, MessageParser, ProtocolError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dispatch::{ResponseCallback, ResponseRegistry};
use crate::identity::ClientGuid;
use crate::manager::{ConnectError, ConnectionManager, wait_for_endpoint};
use crate::transport::TransportError;

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// How long `connect` waits for the backend to create the private endpoint.
const ENDPOINT_WAIT: Duration = Duration::from_secs(10);
/// Bounded wait for the reader thread during close.
const READER_JOIN_WAIT: Duration = Duration::from_secs(1);

/// Lifecycle states of the session connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No channel established.
    Disconnected,
    /// Waiting for the endpoint or performing connection attempts.
    Connecting,
    /// Channel established, read loop running.
    Connected,
}

/// Errors surfaced by the session connection.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend never created the private endpoint within the deadline.
    #[error("endpoint {endpoint} not available after {waited_ms}ms")]
    EndpointUnavailable {
        /// Display form of the endpoint waited for.
        endpoint: String,
        /// Milliseconds spent waiting.
        waited_ms: u64,
    },
    /// Every connection attempt failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),
    /// Transport failure while sending.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Message failed to serialise.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Send attempted while the session is not connected.
    #[error("not connected to the awareness backend")]
    NotConnected,
}

/// General callback receiving messages unclaimed by a response handler.
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

struct Shared {
    state: Mutex<SessionState>,
    running: AtomicBool,
    callback: Mutex<Option<MessageCallback>>,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The long-lived IPC channel to the backend.
///
/// Created once per service lifetime and reusable across reconnects: after
/// a close or a connection loss, `connect` may be called again with the
/// same identity.
pub struct IpcConnection {
    guid: ClientGuid,
    manager: Arc<ConnectionManager>,
    responses: Arc<ResponseRegistry>,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl IpcConnection {
    /// Creates a session channel for the given identity.
    #[must_use]
    pub fn new(config: &Config, guid: ClientGuid, responses: Arc<ResponseRegistry>) -> Self {
        let endpoint = config.client_endpoint(guid.as_str());
        Self {
            guid,
            manager: Arc::new(ConnectionManager::new(endpoint, config.retry())),
            responses,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Disconnected),
                running: AtomicBool::new(false),
                callback: Mutex::new(None),
            }),
            reader: Mutex::new(None),
        }
    }

    /// Installs the general message callback.
    ///
    /// Messages not consumed by a pending response handler are passed to
    /// the callback asynchronously, never on the read-loop thread.
    pub fn set_message_callback(&self, callback: impl Fn(&Message) + Send + Sync + 'static) {
        *self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Client identity bound to this channel.
    #[must_use]
    pub fn guid(&self) -> &ClientGuid {
        &self.guid
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Reports whether the channel is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.state() == SessionState::Connected && self.manager.is_connected()
    }

    /// Connects to the private endpoint and starts the read loop.
    ///
    /// Blocks up to ten seconds waiting for the backend to create the
    /// endpoint after catalog registration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EndpointUnavailable`] when the endpoint
    /// never appears, or [`SessionError::Connect`] when every connection
    /// attempt fails.
    pub fn connect(&self) -> Result<(), SessionError> {
        if self.shared.state() == SessionState::Connected {
            warn!(target: SESSION_TARGET, "session already connected");
            return Ok(());
        }
        self.shared.set_state(SessionState::Connecting);
        info!(target: SESSION_TARGET, endpoint = %self.manager.endpoint(), "connecting session");

        if !wait_for_endpoint(self.manager.endpoint(), ENDPOINT_WAIT) {
            self.shared.set_state(SessionState::Disconnected);
            return Err(SessionError::EndpointUnavailable {
                endpoint: self.manager.endpoint().to_string(),
                waited_ms: ENDPOINT_WAIT.as_millis() as u64,
            });
        }

        if let Err(source) = self.manager.connect() {
            self.shared.set_state(SessionState::Disconnected);
            return Err(source.into());
        }

        self.shared.set_state(SessionState::Connected);
        self.spawn_reader();
        info!(target: SESSION_TARGET, "session connected");
        Ok(())
    }

    /// Serialises and sends one message.
    ///
    /// # Errors
    ///
    /// Fails fast with [`SessionError::NotConnected`] when no channel is
    /// established; otherwise surfaces serialisation or write failures.
    pub fn send_message(&self, message: &Message) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        let frame = kawa_proto::serialize(message)?;
        self.manager.write(&frame)?;
        debug!(
            target: SESSION_TARGET,
            action = message.action.as_deref().unwrap_or(""),
            "sent message"
        );
        Ok(())
    }

    /// Sends a request after registering a one-shot handler for its reply.
    ///
    /// The handler is keyed by the request's routing key, so the matching
    /// response is routed back to the caller exactly once.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::send_message`]. The handler is
    /// registered before the write, so a reply racing the send cannot be
    /// missed; it is removed again if the send fails.
    pub fn send_with_handler(
        &self,
        message: &Message,
        handler: ResponseCallback,
    ) -> Result<(), SessionError> {
        let Some(key) = message.routing_key() else {
            warn!(target: SESSION_TARGET, "request without routing key cannot be correlated");
            return self.send_message(message);
        };
        self.responses.register(key.clone(), handler);
        let sent = self.send_message(message);
        if sent.is_err() {
            self.responses.remove(&key);
        }
        sent
    }

    /// Stops the read loop and closes the channel. Idempotent.
    ///
    /// The reader is unblocked by shutting the socket down and joined with
    /// a bounded wait; if it fails to exit in time the thread is leaked
    /// rather than hanging shutdown.
    pub fn close(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.manager.close();

        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let deadline = Instant::now() + READER_JOIN_WAIT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!(target: SESSION_TARGET, "reader thread panicked");
                }
            } else {
                warn!(target: SESSION_TARGET, "reader thread did not stop in time; leaking it");
            }
        }

        self.shared.set_state(SessionState::Disconnected);
        info!(target: SESSION_TARGET, "session closed");
    }

    /// Starts exactly one background reader for this connection.
    fn spawn_reader(&self) {
        self.shared.running.store(true, Ordering::SeqCst);
        let manager = Arc::clone(&self.manager);
        let responses = Arc::clone(&self.responses);
        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || run_read_loop(&manager, &responses, &shared));
        *self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}

/// Body of the background read loop.
fn run_read_loop(manager: &ConnectionManager, responses: &ResponseRegistry, shared: &Shared) {
    debug!(target: SESSION_TARGET, "reader thread started");
    let mut parser = MessageParser::new();

    while shared.running.load(Ordering::SeqCst) {
        match manager.read_until_delimiter(DELIMITER_BYTE) {
            Ok(chunk) => {
                if chunk.is_empty() {
                    continue;
                }
                let mut framed = chunk;
                framed.push(DELIMITER);
                for message in parser.parse(&framed) {
                    handle_message(&message, responses, shared);
                }
            }
            Err(source) => {
                if shared.running.load(Ordering::SeqCst) {
                    error!(target: SESSION_TARGET, error = %source, "read loop lost the connection");
                }
                shared.set_state(SessionState::Disconnected);
                break;
            }
        }
    }

    debug!(target: SESSION_TARGET, "reader thread stopped");
}

/// Routes one inbound message: response registry first, then the general
/// callback on its own thread, else log and drop.
fn handle_message(message: &Message, responses: &ResponseRegistry, shared: &Shared) {
    let Some(key) = message.routing_key() else {
        debug!(target: SESSION_TARGET, "dropping inbound message without routing key");
        return;
    };

    if responses.handle(&key, message) {
        debug!(target: SESSION_TARGET, key, "message consumed by response handler");
        return;
    }

    let callback = shared
        .callback
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Some(callback) = callback {
        let message = message.clone();
        thread::spawn(move || callback(&message));
    } else {
        debug!(target: SESSION_TARGET, key, "no handler for message");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::sync::mpsc::channel;

    use camino::Utf8PathBuf;
    use kawa_config::Config;

    use super::*;

    fn test_config(dir: &tempfile::TempDir) -> Config {
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 tempdir");
        Config::with_socket_dir(path)
    }

    fn read_frame(stream: &mut UnixStream) -> String {
        let mut frame = Vec::new();
        let mut byte = [0_u8; 1];
        loop {
            let read = stream.read(&mut byte).expect("read");
            if read == 0 || byte[0] == DELIMITER_BYTE {
                break;
            }
            frame.push(byte[0]);
        }
        String::from_utf8(frame).expect("utf8 frame")
    }

    #[test]
    fn send_fails_fast_when_disconnected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(&dir);
        let guid = ClientGuid::parse("000001-000002").expect("guid");
        let session = IpcConnection::new(&config, guid, Arc::new(ResponseRegistry::new()));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(matches!(
            session.send_message(&Message::request("*", "auth:info")),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn read_loop_routes_responses_and_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(&dir);
        let guid = ClientGuid::parse("123456-789012").expect("guid");

        let socket_path = dir.path().join("caw.123456-789012");
        let listener = UnixListener::bind(&socket_path).expect("bind");

        let daemon = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            // Expect the auth request, then answer it and push an event.
            let request = read_frame(&mut stream);
            assert!(request.contains("auth:info"), "unexpected request: {request}");
            let reply = "{\"flow\":\"res\",\"domain\":\"*\",\"action\":\"auth:info\",\
                         \"data\":{\"authenticated\":true}}\u{000C}";
            stream.write_all(reply.as_bytes()).expect("write reply");
            let event = "{\"flow\":\"res\",\"domain\":\"code\",\"action\":\"peer:select\"}\u{000C}";
            stream.write_all(event.as_bytes()).expect("write event");
            // Hold the channel open until the client closes it.
            let mut sink = Vec::new();
            stream.read_to_end(&mut sink).ok();
        });

        let responses = Arc::new(ResponseRegistry::new());
        let session = IpcConnection::new(&config, guid, Arc::clone(&responses));

        let (event_tx, event_rx) = channel();
        session.set_message_callback(move |message: &Message| {
            event_tx.send(message.clone()).ok();
        });

        session.connect().expect("connect");
        assert_eq!(session.state(), SessionState::Connected);

        let (reply_tx, reply_rx) = channel();
        session
            .send_with_handler(
                &kawa_proto::requests::auth_info("123456-789012"),
                Box::new(move |message: &Message| {
                    reply_tx.send(message.clone()).ok();
                }),
            )
            .expect("send");

        let reply = reply_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("correlated reply");
        assert_eq!(reply.routing_key().as_deref(), Some("*:auth:info"));

        let event = event_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("dispatched event");
        assert_eq!(event.routing_key().as_deref(), Some("code:peer:select"));

        session.close();
        assert_eq!(session.state(), SessionState::Disconnected);
        session.close();
        daemon.join().expect("daemon join");
    }

    #[test]
    fn peer_disconnect_marks_the_session_disconnected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(&dir);
        let guid = ClientGuid::parse("222222-333333").expect("guid");

        let socket_path = dir.path().join("caw.222222-333333");
        let listener = UnixListener::bind(&socket_path).expect("bind");
        let daemon = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            drop(stream);
        });

        let session = IpcConnection::new(&config, guid, Arc::new(ResponseRegistry::new()));
        session.connect().expect("connect");
        daemon.join().expect("daemon join");

        // The reader observes EOF and degrades to disconnected.
        let deadline = Instant::now() + Duration::from_secs(2);
        while session.state() != SessionState::Disconnected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(session.state(), SessionState::Disconnected);
        session.close();
    }
}
