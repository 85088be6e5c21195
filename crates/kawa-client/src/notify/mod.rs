//! Debounced outbound notifiers.
//!
//! Editor activity arrives in bursts: every keystroke can trigger a save,
//! every tab switch an active-file change. The notifiers collapse those
//! bursts into rate-limited backend requests: an observation updates the
//! tracked value immediately, supersedes any pending send, and restarts
//! the quiet period; after the quiet period the latest value is sent once.
//! Paths outside the project root or inside build output directories are
//! filtered out before reaching the debounce stage.

mod active_file;
mod debounce;
mod file_saved;
mod filter;

pub use self::active_file::ActiveFileTracker;
pub use self::debounce::Debouncer;
pub use self::file_saved::FileSaveTracker;
pub use self::filter::{EXCLUDED_DIRS, PathFilter};

pub(crate) const NOTIFY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::notify");
