//! Where the comic finder stores its own data (config, cached index).
//!
//! The dataset stays wherever the user keeps it. Only app state lives here.

use std::path::PathBuf;

/// Returns the directory where config and the persisted index live.
/// On macOS: `~/Library/Application Support/ComicRag/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "ComicRag", "ComicRag")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
