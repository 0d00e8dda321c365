//! Default on-disk locations.

use std::path::{Path, PathBuf};

/// Default task store database path.
///
/// `FOCUSPORT_DB_PATH` overrides; otherwise the platform data directory
/// (falling back to the current directory when the platform has none).
pub fn default_database_path() -> PathBuf {
    if let Ok(path) = std::env::var("FOCUSPORT_DB_PATH") {
        return PathBuf::from(path);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("focusport")
        .join("tasks.sqlite3")
}

/// Create the parent directory of `path` if it does not exist yet.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_ends_with_database_file() {
        let path = default_database_path();
        assert_eq!(path.file_name().unwrap(), "tasks.sqlite3");
    }
}
