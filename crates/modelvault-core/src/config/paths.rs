//! Config path resolution helpers.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "modelvault.toml";

/// `<config_dir>/modelvault`, e.g. `~/.config/modelvault` on Linux.
pub fn default_global_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("modelvault"))
}

/// Config files to try, in priority order: project, then global.
pub fn config_candidates(project_root: &Path, global_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = vec![project_root.join(CONFIG_FILE_NAME)];
    if let Some(global) = global_dir {
        candidates.push(global.join(CONFIG_FILE_NAME));
    }
    candidates
}
