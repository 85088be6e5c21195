//! Wire protocol for the Code Awareness backend.
//!
//! Messages are UTF-8 JSON objects terminated by a single ASCII form-feed
//! byte. Every frame carries a required `flow` tag (`req`, `res`, or `err`)
//! plus optional `domain`, `action`, `data`, and `caw` fields. The
//! `domain:action` pair (or the bare `action` when no domain is present)
//! forms the routing key used for dispatch and response correlation.
//!
//! The crate is transport-agnostic: [`codec`] turns messages into delimited
//! frames and back, [`MessageParser`] reassembles frames from arbitrarily
//! fragmented transport reads, and [`requests`] builds the outbound request
//! catalog understood by the backend.

mod codec;
mod events;
mod message;
mod parser;
pub mod requests;

pub use codec::{DELIMITER, DELIMITER_BYTE, ProtocolError, deserialize, serialize};
pub use events::{ActivePathInfo, AuthInfo, PeerFileInfo, UserInfo, decode_data};
pub use message::{Flow, Message};
pub use parser::MessageParser;
