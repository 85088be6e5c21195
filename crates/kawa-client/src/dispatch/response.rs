use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, PoisonError};

use kawa_proto::Message;
use tracing::{debug, warn};

use super::DISPATCH_TARGET;

/// One-shot callback invoked with the correlated reply.
pub type ResponseCallback = Box<dyn FnOnce(&Message) + Send>;

/// Registry of pending one-shot response handlers, keyed by routing key.
///
/// A callback is consumed by the first matching reply and removed
/// atomically, so it runs exactly once. Registering a second callback for
/// an already-pending key replaces the first silently; callers must keep
/// in-flight correlation keys unique.
#[derive(Default)]
pub struct ResponseRegistry {
    handlers: Mutex<HashMap<String, ResponseCallback>>,
}

impl ResponseRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a one-shot callback for the given routing key.
    ///
    /// An existing callback for the same key is replaced.
    pub fn register(&self, key: impl Into<String>, callback: ResponseCallback) {
        let key = key.into();
        let replaced = self.lock_handlers().insert(key.clone(), callback);
        if replaced.is_some() {
            debug!(target: DISPATCH_TARGET, key, "replaced pending response handler");
        } else {
            debug!(target: DISPATCH_TARGET, key, "registered response handler");
        }
    }

    /// Consumes and invokes the callback for the key, when one is pending.
    ///
    /// Returns whether a callback was found. The callback is removed before
    /// invocation; a failure inside it is logged and still counts as
    /// handled.
    pub fn handle(&self, key: &str, message: &Message) -> bool {
        let Some(callback) = self.lock_handlers().remove(key) else {
            debug!(target: DISPATCH_TARGET, key, "no response handler for key");
            return false;
        };

        if catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
            warn!(target: DISPATCH_TARGET, key, "response handler panicked");
        } else {
            debug!(target: DISPATCH_TARGET, key, "response handler consumed");
        }
        true
    }

    /// Removes a pending callback without invoking it.
    pub fn remove(&self, key: &str) {
        self.lock_handlers().remove(key);
    }

    /// Drops every pending callback.
    pub fn clear(&self) {
        self.lock_handlers().clear();
    }

    /// Number of pending callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_handlers().len()
    }

    /// Reports whether no callbacks are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_handlers().is_empty()
    }

    fn lock_handlers(&self) -> std::sync::MutexGuard<'_, HashMap<String, ResponseCallback>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, mpsc::channel};

    use kawa_proto::Message;

    use super::*;

    #[test]
    fn handler_runs_exactly_once() {
        let registry = ResponseRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register(
            "auth:info",
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let reply = Message::response("*", "auth:info");
        assert!(registry.handle("auth:info", &reply));
        assert!(!registry.handle("auth:info", &reply));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn handler_receives_the_reply_message() {
        let registry = ResponseRegistry::new();
        let (tx, rx) = channel();
        registry.register(
            "code:diff-peer",
            Box::new(move |message: &Message| {
                tx.send(message.clone()).ok();
            }),
        );

        let reply = Message::response("code", "diff-peer");
        assert!(registry.handle("code:diff-peer", &reply));
        assert_eq!(rx.recv().expect("reply"), reply);
    }

    #[test]
    fn second_registration_replaces_the_first() {
        let registry = ResponseRegistry::new();
        let (tx, rx) = channel();
        let first = tx.clone();
        registry.register(
            "k",
            Box::new(move |_| {
                first.send("first").ok();
            }),
        );
        registry.register(
            "k",
            Box::new(move |_| {
                tx.send("second").ok();
            }),
        );
        assert_eq!(registry.len(), 1);

        assert!(registry.handle("k", &Message::response("*", "k")));
        assert_eq!(rx.recv().expect("value"), "second");
    }

    #[test]
    fn panicking_handler_still_counts_as_handled() {
        let registry = ResponseRegistry::new();
        registry.register("k", Box::new(|_| panic!("boom")));
        assert!(registry.handle("k", &Message::response("*", "k")));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_discards_without_invoking() {
        let registry = ResponseRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register(
            "k",
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        registry.remove("k");
        assert!(!registry.handle("k", &Message::response("*", "k")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
