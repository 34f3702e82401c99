//! Crash-safe file placement
//!
//! Versions are assembled in a staging directory and renamed into place, and
//! the active artifact is replaced through a temp file + rename. A reader
//! therefore sees either the old state or the complete new one.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;

/// Copy `src` to `dst`, carrying over permissions and access/modification times.
///
/// Returns the number of bytes copied.
pub fn copy_preserving_times(src: &Path, dst: &Path) -> std::io::Result<u64> {
    let bytes = fs::copy(src, dst)?;
    let meta = fs::metadata(src)?;
    filetime::set_file_times(
        dst,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )?;
    Ok(bytes)
}

/// Move a fully written staging directory to its final location.
///
/// `target` must not exist yet.
pub fn publish_dir(staging: &Path, target: &Path) -> std::io::Result<()> {
    fs::rename(staging, target)
}

/// Replace `dst` with a copy of `src` without ever exposing a partial file.
pub fn replace_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(dst);

    if let Err(e) = copy_preserving_times(src, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    // Windows rename does not replace an existing file
    if cfg!(windows) && dst.exists() {
        fs::remove_file(dst)?;
    }
    if let Err(e) = fs::rename(&tmp, dst) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()))
}
