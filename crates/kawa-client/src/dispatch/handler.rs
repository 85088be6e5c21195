use kawa_proto::Message;

/// Error type handlers may surface; caught and logged at the dispatch
/// boundary, never propagated to the read loop or to other handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A long-lived subscriber for inbound backend events.
///
/// Handlers are registered with the [`super::EventDispatcher`] under the
/// routing key returned by [`EventHandler::action`] and invoked on
/// background threads, concurrently and in no particular order.
pub trait EventHandler: Send + Sync {
    /// Routing key this handler subscribes to, e.g. `code:peer:select`.
    fn action(&self) -> &str;

    /// Processes one inbound message.
    ///
    /// # Errors
    ///
    /// Any error is logged by the dispatcher and isolated from other
    /// handlers.
    fn handle(&self, message: &Message) -> Result<(), HandlerError>;

    /// Predicate consulted when no handler matched by key.
    ///
    /// The default accepts a message whose full or bare routing key equals
    /// this handler's action. Implementations may override it to match on
    /// payload contents.
    fn can_handle(&self, message: &Message) -> bool {
        let Some(key) = message.routing_key() else {
            return false;
        };
        self.action() == key || message.action.as_deref() == Some(self.action())
    }
}
