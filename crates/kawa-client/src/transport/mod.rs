//! Blocking transport over Unix domain sockets and Windows named pipes.
//!
//! The transport layer exposes one stream type with identical semantics on
//! both platforms, selected from the endpoint variant at connect time.

mod errors;
mod stream;

pub use self::errors::TransportError;
pub(crate) use self::stream::PipeStream;

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
