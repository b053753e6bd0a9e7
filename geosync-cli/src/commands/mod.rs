pub mod plan;
pub mod sync;

use std::path::{Path, PathBuf};

use geosync_sync::journal;

/// `--journal` if given, otherwise `<csv>.log` next to the source.
pub fn journal_path(source: &Path, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| journal::default_path_for(source))
}
