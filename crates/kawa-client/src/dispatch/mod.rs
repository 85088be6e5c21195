//! Event fan-out and response correlation for inbound messages.
//!
//! Two registries share the routing-key namespace: the [`ResponseRegistry`]
//! holds one-shot callbacks consumed by the first matching reply, and the
//! [`EventDispatcher`] holds long-lived handlers that observe every
//! matching event. The session offers each inbound message to the response
//! registry first and falls through to the dispatcher.

mod dispatcher;
mod handler;
mod response;

pub use self::dispatcher::EventDispatcher;
pub use self::handler::{EventHandler, HandlerError};
pub use self::response::{ResponseCallback, ResponseRegistry};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
