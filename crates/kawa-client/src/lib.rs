//! IPC client for the Code Awareness backend.
//!
//! The crate owns the communication core of the editor plugin: connecting to
//! the backend's catalog and per-client channels over Unix domain sockets or
//! Windows named pipes, framing and reassembling the form-feed-delimited
//! JSON protocol, correlating responses, fanning events out to registered
//! handlers, and debouncing the high-frequency editor notifications into
//! rate-limited outbound requests.
//!
//! ## Connection flow
//!
//! 1. [`AwarenessService`] generates a process-lifetime [`ClientGuid`].
//! 2. [`CatalogConnection`] registers the identity with the backend's
//!    discovery endpoint.
//! 3. The backend creates a private channel named after the identity;
//!    [`IpcConnection`] waits for it, connects, and starts the background
//!    read loop.
//! 4. Inbound messages are offered to the [`ResponseRegistry`] first and
//!    fall through to the [`EventDispatcher`] otherwise.
//!
//! The service degrades to a disconnected state on failure and can
//! reconnect later without minting a fresh identity.

pub mod catalog;
pub mod dispatch;
pub mod identity;
pub mod manager;
pub mod notify;
pub mod service;
pub mod session;
pub mod transport;

pub use catalog::{CatalogConnection, CatalogError};
pub use dispatch::{
    EventDispatcher, EventHandler, HandlerError, ResponseCallback, ResponseRegistry,
};
pub use identity::{ClientGuid, InvalidGuid};
pub use manager::{ConnectError, ConnectionManager, wait_for_endpoint};
pub use notify::{ActiveFileTracker, Debouncer, FileSaveTracker, PathFilter};
pub use service::{AwarenessService, ServiceError};
pub use session::{IpcConnection, SessionError, SessionState};
pub use transport::TransportError;
