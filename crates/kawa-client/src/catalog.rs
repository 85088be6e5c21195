//! One-shot registration with the backend's discovery endpoint.
//!
//! The catalog is contacted once per client lifetime: the client announces
//! its identity so the backend can create the private per-client channel.
//! On close, a courtesy `clientDisconnect` is sent on a best-effort basis;
//! failures there are logged and swallowed.

use kawa_config::Config;
use kawa_proto::{ProtocolError, requests, serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::identity::ClientGuid;
use crate::manager::{ConnectError, ConnectionManager};
use crate::transport::TransportError;

const CATALOG_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::catalog");

/// Errors surfaced while registering with the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Every connection attempt to the catalog failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),
    /// Registration frame failed to serialise.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Registration frame failed to send.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Short-lived connection to the discovery endpoint.
pub struct CatalogConnection {
    guid: ClientGuid,
    manager: ConnectionManager,
    connected: bool,
}

impl CatalogConnection {
    /// Connects to the catalog and registers this client's identity.
    ///
    /// # Errors
    ///
    /// Connection failure is fatal to the registration and is propagated;
    /// the caller decides whether to retry the whole flow later.
    pub fn connect(config: &Config, guid: &ClientGuid) -> Result<Self, CatalogError> {
        let manager = ConnectionManager::new(config.catalog_endpoint(), config.retry());
        manager.connect()?;

        let frame = serialize(&requests::client_id(guid.as_str()))?;
        manager.write(&frame)?;
        info!(target: CATALOG_TARGET, guid = %guid, "registered with catalog");

        Ok(Self {
            guid: guid.clone(),
            manager,
            connected: true,
        })
    }

    /// Reports whether the catalog channel is still open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected && self.manager.is_connected()
    }

    /// Sends the courtesy disconnect and closes the channel. Idempotent.
    pub fn close(&mut self) {
        if !self.connected {
            return;
        }
        match serialize(&requests::client_disconnect(self.guid.as_str())) {
            Ok(frame) => {
                if let Err(error) = self.manager.write(&frame) {
                    warn!(target: CATALOG_TARGET, %error, "client-disconnect notification failed");
                }
            }
            Err(error) => {
                warn!(target: CATALOG_TARGET, %error, "client-disconnect frame failed to build");
            }
        }
        self.manager.close();
        self.connected = false;
        info!(target: CATALOG_TARGET, "catalog connection closed");
    }
}

impl Drop for CatalogConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixListener;
    use std::thread;

    use camino::Utf8PathBuf;
    use kawa_proto::DELIMITER_BYTE;

    use super::*;

    fn read_frame(stream: &mut impl Read) -> String {
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
    fn registration_and_courtesy_disconnect_reach_the_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket_dir =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 tempdir");
        let config = Config::with_socket_dir(socket_dir);
        let listener = UnixListener::bind(dir.path().join("caw.catalog")).expect("bind");

        let daemon = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let registration = read_frame(&mut stream);
            let farewell = read_frame(&mut stream);
            (registration, farewell)
        });

        let guid = ClientGuid::parse("123456-789012").expect("guid");
        let mut catalog = CatalogConnection::connect(&config, &guid).expect("connect");
        assert!(catalog.is_connected());
        catalog.close();
        assert!(!catalog.is_connected());
        catalog.close();

        let (registration, farewell) = daemon.join().expect("daemon join");
        assert!(registration.contains("clientId"));
        assert!(registration.contains("123456-789012"));
        assert!(farewell.contains("clientDisconnect"));
    }

    #[test]
    fn connect_failure_is_propagated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket_dir =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 tempdir");
        let mut config = Config::with_socket_dir(socket_dir);
        // Keep the test quick: a single attempt against a missing socket.
        config.set_retry(kawa_config::RetryPolicy {
            max_attempts: 1,
            initial_delay_ms: 10,
            max_delay_ms: 10,
        });
        let guid = ClientGuid::parse("123456-789012").expect("guid");
        let result = CatalogConnection::connect(&config, &guid);
        assert!(matches!(result, Err(CatalogError::Connect(_))));
    }
}
