//! Active artifact layout.
//!
//! The serving layer loads one file per model from the active directory.
//! Rollback overwrites it; `create` uses it to find what to snapshot.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{VersionError, VersionResult, validate_component};

/// Locates the currently served artifact for each model.
#[derive(Debug, Clone)]
pub struct ActiveArtifacts {
    dir: PathBuf,
    extension: String,
}

impl ActiveArtifacts {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact extension without the leading dot (e.g. `pkl`).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `<dir>/<model>_model.<ext>`
    pub fn path_for(&self, model_name: &str) -> VersionResult<PathBuf> {
        validate_component(model_name)?;
        Ok(self
            .dir
            .join(format!("{}_model.{}", model_name, self.extension)))
    }

    /// True when `path` carries the artifact extension.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension() == Some(OsStr::new(&self.extension))
    }

    /// Find the file to snapshot for `model_name`.
    ///
    /// Tries `<model>_model.<ext>`, then `<model>.<ext>`, then the first
    /// `<model>_*.<ext>` in name order. Returns `None` when nothing matches.
    pub fn resolve_source(&self, model_name: &str) -> VersionResult<Option<PathBuf>> {
        let primary = self.path_for(model_name)?;
        if primary.is_file() {
            return Ok(Some(primary));
        }

        let bare = self.dir.join(format!("{}.{}", model_name, self.extension));
        if bare.is_file() {
            return Ok(Some(bare));
        }

        if !self.dir.is_dir() {
            return Ok(None);
        }
        let prefix = format!("{}_", model_name);
        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(|e| VersionError::io(&self.dir, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.matches_extension(path))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        candidates.sort();

        Ok(candidates.into_iter().next())
    }
}
