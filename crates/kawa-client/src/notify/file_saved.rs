use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use kawa_proto::requests;
use tracing::{debug, warn};

use crate::session::IpcConnection;

use super::NOTIFY_TARGET;
use super::debounce::Debouncer;
use super::filter::PathFilter;

/// Tracks file saves and notifies the backend at a bounded rate.
///
/// Auto-save can fire on every keystroke; the tracker debounces saves and
/// sends one `code:file-saved` request per quiet period, carrying the last
/// saved path. Sends are skipped silently while the session is
/// disconnected.
pub struct FileSaveTracker {
    filter: PathFilter,
    debouncer: Debouncer<Utf8PathBuf>,
}

impl FileSaveTracker {
    /// Creates a tracker notifying through the given session.
    #[must_use]
    pub fn new(
        session: Arc<IpcConnection>,
        project_root: impl Into<Utf8PathBuf>,
        delay: Duration,
    ) -> Self {
        let debouncer = Debouncer::new(delay, move |path: Utf8PathBuf| {
            send_file_saved(&session, &path);
        });
        Self {
            filter: PathFilter::new(project_root),
            debouncer,
        }
    }

    /// Records that the given file was saved.
    ///
    /// Paths outside the project or inside excluded directories are
    /// dropped before the debounce stage.
    pub fn file_saved(&self, path: &Utf8Path) {
        if !self.filter.accepts(path) {
            return;
        }
        self.debouncer.observe(path.to_owned());
    }

    /// Path of the most recently saved file, updated ahead of the send.
    #[must_use]
    pub fn current(&self) -> Option<Utf8PathBuf> {
        self.debouncer.current()
    }

    /// Stops the debounce worker, discarding any pending send.
    pub fn shutdown(&mut self) {
        self.debouncer.shutdown();
    }
}

fn send_file_saved(session: &IpcConnection, path: &Utf8Path) {
    if !session.is_connected() {
        debug!(target: NOTIFY_TARGET, "not connected - skipping file-saved notification");
        return;
    }
    let doc = path.file_name().unwrap_or_default();
    let message = requests::file_saved(session.guid().as_str(), path.as_str(), doc);
    match session.send_message(&message) {
        Ok(()) => debug!(target: NOTIFY_TARGET, %path, "sent file-saved notification"),
        Err(error) => warn!(target: NOTIFY_TARGET, %error, "file-saved notification failed"),
    }
}
