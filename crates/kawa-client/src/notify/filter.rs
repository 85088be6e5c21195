use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::NOTIFY_TARGET;

/// Directory names whose contents never reach the backend.
pub const EXCLUDED_DIRS: &[&str] = &["build", "out", "target", ".gradle", ".idea"];

/// Filters observations down to files that belong to the tracked project.
///
/// A path passes when it sits under the project root and none of its parent
/// directories is a build or IDE output directory.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: Utf8PathBuf,
}

impl PathFilter {
    /// Creates a filter rooted at the project directory.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root this filter tracks.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Reports whether the path should reach the debounce stage.
    #[must_use]
    pub fn accepts(&self, path: &Utf8Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            debug!(target: NOTIFY_TARGET, %path, "skipping file outside project root");
            return false;
        };
        let excluded = relative
            .parent()
            .is_some_and(|parents| {
                parents
                    .components()
                    .any(|component| EXCLUDED_DIRS.contains(&component.as_str()))
            });
        if excluded {
            debug!(target: NOTIFY_TARGET, %path, "skipping file in excluded directory");
        }
        !excluded
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::source_file("/proj/src/lib.rs", true)]
    #[case::top_level("/proj/README.md", true)]
    #[case::outside_root("/elsewhere/src/lib.rs", false)]
    #[case::build_output("/proj/build/lib.rs", false)]
    #[case::nested_target("/proj/crates/a/target/debug/lib.rs", false)]
    #[case::gradle_cache("/proj/.gradle/cache.bin", false)]
    #[case::ide_metadata("/proj/.idea/workspace.xml", false)]
    #[case::out_dir("/proj/out/main.js", false)]
    #[case::file_named_out("/proj/out", true)]
    fn accepts_follows_root_and_exclusions(#[case] path: &str, #[case] accepted: bool) {
        let filter = PathFilter::new("/proj");
        assert_eq!(filter.accepts(Utf8Path::new(path)), accepted, "{path}");
    }
}
