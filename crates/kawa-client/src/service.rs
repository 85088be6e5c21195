//! Application-level session object owning the whole connection stack.
//!
//! One service instance is created at plugin startup and disposed at
//! shutdown; collaborators receive a shared handle instead of looking up
//! ambient global state. The service owns the client identity, the event
//! dispatcher, the response registry, and both connections, and wires the
//! dispatcher in as the session's general message callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use kawa_config::Config;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{CatalogConnection, CatalogError};
use crate::dispatch::{EventDispatcher, ResponseRegistry};
use crate::identity::ClientGuid;
use crate::session::{IpcConnection, SessionError};

const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");

/// Errors surfaced while bringing the service up.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Catalog registration failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Session channel failed to come up.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Owner of the client's connection state.
///
/// Lifecycle is single-writer: the embedder creates the service at
/// startup, calls [`AwarenessService::connect`] and
/// [`AwarenessService::disconnect`] from its lifecycle hooks, and drops
/// the service at shutdown. A failed or lost connection leaves the
/// service disconnected; calling `connect` again reuses the same
/// identity.
pub struct AwarenessService {
    config: Config,
    guid: ClientGuid,
    dispatcher: Arc<EventDispatcher>,
    responses: Arc<ResponseRegistry>,
    session: Arc<IpcConnection>,
    catalog: Mutex<Option<CatalogConnection>>,
    connected: AtomicBool,
}

impl AwarenessService {
    /// Creates a service with a freshly generated identity.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_guid(config, ClientGuid::generate())
    }

    /// Creates a service bound to an explicit identity.
    #[must_use]
    pub fn with_guid(config: Config, guid: ClientGuid) -> Self {
        let responses = Arc::new(ResponseRegistry::new());
        let dispatcher = Arc::new(EventDispatcher::new());
        let session = Arc::new(IpcConnection::new(
            &config,
            guid.clone(),
            Arc::clone(&responses),
        ));

        let dispatch = Arc::clone(&dispatcher);
        session.set_message_callback(move |message| {
            dispatch.dispatch(message);
        });

        info!(target: SERVICE_TARGET, %guid, "awareness service initialised");
        Self {
            config,
            guid,
            dispatcher,
            responses,
            session,
            catalog: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// This client's identity.
    #[must_use]
    pub fn guid(&self) -> &ClientGuid {
        &self.guid
    }

    /// Event dispatcher collaborators register their handlers with.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Registry of pending one-shot response handlers.
    #[must_use]
    pub fn responses(&self) -> &Arc<ResponseRegistry> {
        &self.responses
    }

    /// The long-lived session channel.
    #[must_use]
    pub fn session(&self) -> &Arc<IpcConnection> {
        &self.session
    }

    /// Resolved configuration the service was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reports whether the backend connection is fully established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.session.is_connected()
    }

    /// Brings the backend connection up.
    ///
    /// Registers the identity with the catalog, waits for the private
    /// channel, connects the session, and marks the service connected. On
    /// any failure the partial state is torn down and the service stays
    /// disconnected, ready for a later retry.
    ///
    /// # Errors
    ///
    /// Returns the catalog or session failure that stopped the bring-up.
    pub fn connect(&self) -> Result<(), ServiceError> {
        if self.connected.load(Ordering::SeqCst) {
            warn!(target: SERVICE_TARGET, "already connected to the awareness backend");
            return Ok(());
        }
        info!(target: SERVICE_TARGET, "connecting to the awareness backend");

        let catalog = CatalogConnection::connect(&self.config, &self.guid)?;
        *self.catalog_slot() = Some(catalog);

        if let Err(source) = self.session.connect() {
            self.teardown();
            return Err(source.into());
        }

        self.connected.store(true, Ordering::SeqCst);
        info!(target: SERVICE_TARGET, "connected to the awareness backend");
        Ok(())
    }

    /// Tears the backend connection down. Idempotent.
    ///
    /// The session closes first; the catalog close then delivers the
    /// best-effort `clientDisconnect` courtesy notification.
    pub fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) && self.catalog_slot().is_none() {
            return;
        }
        info!(target: SERVICE_TARGET, "disconnecting from the awareness backend");
        self.teardown();
    }

    fn teardown(&self) {
        self.session.close();
        if let Some(mut catalog) = self.catalog_slot().take() {
            catalog.close();
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    fn catalog_slot(&self) -> std::sync::MutexGuard<'_, Option<CatalogConnection>> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AwarenessService {
    fn drop(&mut self) {
        self.disconnect();
    }
}
