//! Persisted-state layout: one database file per installation.

use std::path::PathBuf;

/// Directory holding the index database.
///
/// `SOURCERACK_DATA_DIR` overrides the default of
/// `~/.local/share/sourcerack` (platform data dir).
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SOURCERACK_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sourcerack")
}

/// Default database path.
pub fn database_path() -> PathBuf {
    data_dir().join("sqi.sqlite")
}
