use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use kawa_proto::Message;
use tracing::{debug, error, info, warn};

use super::DISPATCH_TARGET;
use super::handler::EventHandler;

/// Routes inbound events to every interested handler.
///
/// The registry maps routing keys to lists of handlers, so several
/// independent subscribers can observe the same backend event. Matching is
/// a three-tier lookup: exact `domain:action` key, bare `action` fallback,
/// then a linear scan over every handler's [`EventHandler::can_handle`]
/// predicate. All matched handlers run on their own threads; one handler
/// failing or panicking does not affect the others.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Mutex<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its action key.
    ///
    /// Multiple handlers may share a key; each is invoked on a match.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        let action = handler.action().to_owned();
        if action.is_empty() {
            warn!(target: DISPATCH_TARGET, "refusing to register handler with empty action");
            return;
        }
        let mut handlers = self.lock_handlers();
        let entry = handlers.entry(action.clone()).or_default();
        entry.push(handler);
        info!(
            target: DISPATCH_TARGET,
            action,
            count = entry.len(),
            "registered event handler"
        );
    }

    /// Unregisters one handler instance, pruning the key when it empties.
    pub fn unregister_handler(&self, handler: &Arc<dyn EventHandler>) {
        let action = handler.action().to_owned();
        let mut handlers = self.lock_handlers();
        if let Some(entry) = handlers.get_mut(&action) {
            entry.retain(|registered| !Arc::ptr_eq(registered, handler));
            let remaining = entry.len();
            if entry.is_empty() {
                handlers.remove(&action);
            }
            info!(
                target: DISPATCH_TARGET,
                action,
                remaining,
                "unregistered event handler"
            );
        }
    }

    /// Removes every handler registered under the given action.
    pub fn unregister_all(&self, action: &str) {
        if let Some(removed) = self.lock_handlers().remove(action) {
            debug!(
                target: DISPATCH_TARGET,
                action,
                count = removed.len(),
                "unregistered all handlers for action"
            );
        }
    }

    /// Removes every registered handler.
    pub fn clear(&self) {
        self.lock_handlers().clear();
    }

    /// Total number of registered handler instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_handlers().values().map(Vec::len).sum()
    }

    /// Reports whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_handlers().is_empty()
    }

    /// Reports whether any handler is registered for the action.
    #[must_use]
    pub fn has_handler(&self, action: &str) -> bool {
        self.lock_handlers()
            .get(action)
            .is_some_and(|entry| !entry.is_empty())
    }

    /// Number of handlers registered for the action.
    #[must_use]
    pub fn handler_count(&self, action: &str) -> usize {
        self.lock_handlers().get(action).map_or(0, Vec::len)
    }

    /// Dispatches a message to every matching handler.
    ///
    /// Handlers run asynchronously on background threads with no ordering
    /// guarantee and without waiting for completion. Returns whether at
    /// least one handler was invoked; a routing miss is logged.
    pub fn dispatch(&self, message: &Message) -> bool {
        let matched = self.resolve(message);
        let key = message
            .routing_key()
            .unwrap_or_else(|| "<no routing key>".to_owned());

        if matched.is_empty() {
            warn!(
                target: DISPATCH_TARGET,
                key,
                flow = message.flow.as_str(),
                "no handler found for message"
            );
            return false;
        }

        debug!(
            target: DISPATCH_TARGET,
            key,
            count = matched.len(),
            "dispatching message"
        );
        let shared = Arc::new(message.clone());
        for handler in matched {
            let message = Arc::clone(&shared);
            thread::spawn(move || invoke(&handler, &message));
        }
        true
    }

    /// Resolves candidate handlers via the three-tier lookup.
    fn resolve(&self, message: &Message) -> Vec<Arc<dyn EventHandler>> {
        let handlers = self.lock_handlers();

        if let Some(key) = message.routing_key()
            && let Some(entry) = handlers.get(&key)
            && !entry.is_empty()
        {
            return entry.clone();
        }

        if let Some(action) = message.action.as_deref()
            && let Some(entry) = handlers.get(action)
            && !entry.is_empty()
        {
            return entry.clone();
        }

        handlers
            .values()
            .flatten()
            .filter(|handler| handler.can_handle(message))
            .cloned()
            .collect()
    }

    fn lock_handlers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Arc<dyn EventHandler>>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs one handler, isolating failures and panics from the rest.
fn invoke(handler: &Arc<dyn EventHandler>, message: &Message) {
    let action = handler.action().to_owned();
    let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(message)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(source)) => {
            error!(target: DISPATCH_TARGET, action, error = %source, "event handler failed");
        }
        Err(_) => {
            error!(target: DISPATCH_TARGET, action, "event handler panicked");
        }
    }
}
