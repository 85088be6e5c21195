use std::io::{self, Read, Write};

use kawa_config::PipeEndpoint;
use tracing::{debug, trace};

#[cfg(unix)]
use std::net::Shutdown;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(windows)]
use std::fs::{File, OpenOptions};

use super::{TRANSPORT_TARGET, TransportError};

/// Connected stream to a backend endpoint.
///
/// Unix endpoints are regular domain socket connections; Windows named
/// pipes are opened read/write as files, which is how a pipe client
/// attaches to an existing pipe server. Reads and writes go through the
/// standard library's shared-reference implementations, so one thread can
/// block in a read while another writes, as long as callers serialise
/// writes themselves.
pub(crate) enum PipeStream {
    /// Unix domain socket connection.
    #[cfg(unix)]
    Unix(UnixStream),
    /// Windows named pipe handle.
    #[cfg(windows)]
    Pipe(File),
}

impl PipeStream {
    /// Connects to the given endpoint.
    pub(crate) fn connect(endpoint: &PipeEndpoint) -> Result<Self, TransportError> {
        match endpoint {
            PipeEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    debug!(target: TRANSPORT_TARGET, %endpoint, "connecting unix socket");
                    let stream = UnixStream::connect(path.as_std_path())?;
                    Ok(Self::Unix(stream))
                }
                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(TransportError::UnsupportedTransport {
                        endpoint: endpoint.to_string(),
                    })
                }
            }
            PipeEndpoint::Pipe { name } => {
                #[cfg(windows)]
                {
                    debug!(target: TRANSPORT_TARGET, %endpoint, "connecting named pipe");
                    let path = format!(r"\\.\pipe\{name}");
                    let pipe = OpenOptions::new().read(true).write(true).open(path)?;
                    Ok(Self::Pipe(pipe))
                }
                #[cfg(not(windows))]
                {
                    let _ = name;
                    Err(TransportError::UnsupportedTransport {
                        endpoint: endpoint.to_string(),
                    })
                }
            }
        }
    }

    /// Writes the whole buffer, then flushes.
    ///
    /// Partial writes are retried until every byte is on the wire; callers
    /// must serialise concurrent writers to keep frames contiguous.
    pub(crate) fn write_all(&self, bytes: &[u8]) -> Result<(), TransportError> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => {
                let mut writer: &UnixStream = stream;
                writer.write_all(bytes)?;
                writer.flush()?;
            }
            #[cfg(windows)]
            Self::Pipe(pipe) => {
                let mut writer: &File = pipe;
                writer.write_all(bytes)?;
                writer.flush()?;
            }
        }
        trace!(target: TRANSPORT_TARGET, len = bytes.len(), "wrote frame bytes");
        Ok(())
    }

    /// Reads until the delimiter byte is observed.
    ///
    /// The delimiter is consumed but excluded from the result. Blocks until
    /// a full frame arrives; a peer disconnect mid-frame surfaces as
    /// [`TransportError::ClosedBeforeDelimiter`].
    pub(crate) fn read_until(&self, delimiter: u8) -> Result<String, TransportError> {
        let mut frame = Vec::new();
        loop {
            match self.read_byte()? {
                None => {
                    return Err(TransportError::ClosedBeforeDelimiter {
                        buffered: frame.len(),
                    });
                }
                Some(byte) if byte == delimiter => break,
                Some(byte) => frame.push(byte),
            }
        }
        trace!(target: TRANSPORT_TARGET, len = frame.len(), "read frame until delimiter");
        String::from_utf8(frame).map_err(|source| TransportError::Utf8 { source })
    }

    /// Reads one chunk of whatever is available, blocking until data
    /// arrives. EOF surfaces as an I/O error since the protocol never ends
    /// a healthy connection between reads.
    pub(crate) fn read_chunk(&self) -> Result<String, TransportError> {
        let mut buffer = [0_u8; 8_192];
        let read = self.read_some(&mut buffer)?;
        if read == 0 {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        trace!(target: TRANSPORT_TARGET, len = read, "read chunk");
        String::from_utf8(buffer[..read].to_vec())
            .map_err(|source| TransportError::Utf8 { source })
    }

    /// Reads a single byte, retrying on interrupts. `None` signals EOF.
    fn read_byte(&self) -> io::Result<Option<u8>> {
        let mut byte = [0_u8; 1];
        match self.read_some(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Reads into the buffer, retrying on interrupts.
    fn read_some(&self, buffer: &mut [u8]) -> io::Result<usize> {
        loop {
            let read = match self {
                #[cfg(unix)]
                Self::Unix(stream) => {
                    let mut reader: &UnixStream = stream;
                    reader.read(buffer)
                }
                #[cfg(windows)]
                Self::Pipe(pipe) => {
                    let mut reader: &File = pipe;
                    reader.read(buffer)
                }
            };
            match read {
                Ok(count) => return Ok(count),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }
        }
    }

    /// Severs the connection, unblocking any thread parked in a read.
    ///
    /// Named pipes have no shutdown primitive; dropping the handle is the
    /// only teardown, so a reader blocked on a pipe may be left to finish
    /// on its own (bounded by the session's join timeout).
    pub(crate) fn shutdown(&self) {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => {
                if let Err(error) = stream.shutdown(Shutdown::Both) {
                    debug!(target: TRANSPORT_TARGET, %error, "socket shutdown failed");
                }
            }
            #[cfg(windows)]
            Self::Pipe(_) => {}
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixListener;
    use std::thread;

    use kawa_config::PipeEndpoint;

    use super::*;

    fn listener_in_tempdir() -> (tempfile::TempDir, UnixListener, PipeEndpoint) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("caw.test");
        let listener = UnixListener::bind(&path).expect("bind");
        let endpoint = PipeEndpoint::unix(path.to_str().expect("utf8 path"));
        (dir, listener, endpoint)
    }

    #[test]
    fn read_until_excludes_and_consumes_the_delimiter() {
        let (_dir, listener, endpoint) = listener_in_tempdir();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream.write_all(b"hello\x0cworld\x0c").expect("write");
        });

        let stream = PipeStream::connect(&endpoint).expect("connect");
        assert_eq!(stream.read_until(0x0C).expect("first frame"), "hello");
        assert_eq!(stream.read_until(0x0C).expect("second frame"), "world");
        server.join().expect("join");
    }

    #[test]
    fn eof_mid_frame_is_a_distinct_error() {
        let (_dir, listener, endpoint) = listener_in_tempdir();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream.write_all(b"par").expect("write");
        });

        let stream = PipeStream::connect(&endpoint).expect("connect");
        let result = stream.read_until(0x0C);
        assert!(matches!(
            result,
            Err(TransportError::ClosedBeforeDelimiter { buffered: 3 })
        ));
        server.join().expect("join");
    }

    #[test]
    fn connect_to_missing_socket_fails() {
        let endpoint = PipeEndpoint::unix("/nonexistent/caw.test");
        assert!(matches!(
            PipeStream::connect(&endpoint),
            Err(TransportError::Io(_))
        ));
    }

    #[test]
    fn pipe_endpoints_are_unsupported_on_unix() {
        let endpoint = PipeEndpoint::pipe("caw.test");
        assert!(matches!(
            PipeStream::connect(&endpoint),
            Err(TransportError::UnsupportedTransport { .. })
        ));
    }
}
