use std::io;

use thiserror::Error;

/// Errors surfaced by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation attempted without an established connection.
    #[error("not connected")]
    NotConnected,

    /// Peer closed the channel before the frame delimiter was observed.
    #[error("connection closed before delimiter ({buffered} bytes buffered)")]
    ClosedBeforeDelimiter {
        /// Bytes accumulated before the channel was severed.
        buffered: usize,
    },

    /// Endpoint variant is not usable on this platform.
    #[error("endpoint '{endpoint}' is not supported on this platform")]
    UnsupportedTransport {
        /// Display form of the offending endpoint.
        endpoint: String,
    },

    /// Frame bytes were not valid UTF-8.
    #[error("frame is not valid UTF-8: {source}")]
    Utf8 {
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}
