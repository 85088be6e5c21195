use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use kawa_proto::requests;
use tracing::{debug, warn};

use crate::session::IpcConnection;

use super::NOTIFY_TARGET;
use super::debounce::Debouncer;
use super::filter::PathFilter;

/// Tracks the file currently focused in the editor.
///
/// Tab switches arrive in bursts while the user cycles through files; the
/// tracker debounces them and sends one `code:active-path` request for the
/// file that stays focused. Sends are skipped silently while the session
/// is disconnected; the next focus change re-triggers naturally.
pub struct ActiveFileTracker {
    filter: PathFilter,
    debouncer: Debouncer<Utf8PathBuf>,
}

impl ActiveFileTracker {
    /// Creates a tracker notifying through the given session.
    #[must_use]
    pub fn new(
        session: Arc<IpcConnection>,
        project_root: impl Into<Utf8PathBuf>,
        delay: Duration,
    ) -> Self {
        let debouncer = Debouncer::new(delay, move |path: Utf8PathBuf| {
            send_active_path(&session, &path);
        });
        Self {
            filter: PathFilter::new(project_root),
            debouncer,
        }
    }

    /// Records a focus change to the given file.
    ///
    /// Paths outside the project or inside excluded directories are
    /// dropped before the debounce stage. Re-focusing the already-tracked
    /// file is a no-op.
    pub fn file_activated(&self, path: &Utf8Path) {
        if !self.filter.accepts(path) {
            return;
        }
        self.debouncer.observe(path.to_owned());
    }

    /// Path of the most recently focused file, updated ahead of the send.
    #[must_use]
    pub fn current(&self) -> Option<Utf8PathBuf> {
        self.debouncer.current()
    }

    /// Stops the debounce worker, discarding any pending send.
    pub fn shutdown(&mut self) {
        self.debouncer.shutdown();
    }
}

fn send_active_path(session: &IpcConnection, path: &Utf8Path) {
    if !session.is_connected() {
        debug!(target: NOTIFY_TARGET, "not connected - skipping active-path notification");
        return;
    }
    let doc = path.file_name().unwrap_or_default();
    let message = requests::active_path(session.guid().as_str(), path.as_str(), doc);
    match session.send_message(&message) {
        Ok(()) => debug!(target: NOTIFY_TARGET, %path, "sent active-path notification"),
        Err(error) => warn!(target: NOTIFY_TARGET, %error, "active-path notification failed"),
    }
}
