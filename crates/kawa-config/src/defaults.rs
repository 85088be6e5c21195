use camino::Utf8PathBuf;

use crate::endpoint::PipeEndpoint;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File or pipe name of the backend's discovery endpoint.
pub const CATALOG_NAME: &str = "caw.catalog";

/// Prefix shared by every endpoint the backend creates.
pub const ENDPOINT_PREFIX: &str = "caw";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Computes the default directory holding the backend's socket files.
///
/// Unix transports place socket files under `~/.kawa-code/sockets`; the
/// named pipe transport ignores the directory entirely.
#[must_use]
pub fn default_socket_dir() -> Option<Utf8PathBuf> {
    let home = dirs::home_dir()?;
    let mut base = Utf8PathBuf::from_path_buf(home).ok()?;
    base.push(".kawa-code");
    base.push("sockets");
    Some(base)
}

/// Resolves the catalog (discovery) endpoint for this platform.
#[must_use]
pub fn catalog_endpoint(socket_dir: &Utf8PathBuf) -> PipeEndpoint {
    endpoint_for(socket_dir, CATALOG_NAME)
}

/// Resolves the private per-client endpoint for the given client GUID.
///
/// The backend creates this endpoint some time after catalog registration;
/// its name is the shared prefix suffixed with the client identity.
#[must_use]
pub fn client_endpoint(socket_dir: &Utf8PathBuf, guid: &str) -> PipeEndpoint {
    endpoint_for(socket_dir, &format!("{ENDPOINT_PREFIX}.{guid}"))
}

#[cfg(unix)]
fn endpoint_for(socket_dir: &Utf8PathBuf, name: &str) -> PipeEndpoint {
    PipeEndpoint::unix(socket_dir.join(name))
}

#[cfg(not(unix))]
fn endpoint_for(_socket_dir: &Utf8PathBuf, name: &str) -> PipeEndpoint {
    PipeEndpoint::pipe(name)
}
