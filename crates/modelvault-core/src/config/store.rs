//! Config store for locating and loading modelvault.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use super::{
    ConfigFile, StoreConfig, parser,
    paths::{config_candidates, default_global_dir},
};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: Option<PathBuf>,
    project_root: PathBuf,
}

impl ConfigStore {
    /// Discover the config from the current directory and the user config dir.
    ///
    /// An explicit path wins and must exist.
    pub fn discover(explicit: Option<PathBuf>) -> anyhow::Result<Self> {
        let project_root = std::env::current_dir().context("Failed to read current directory")?;
        Self::from_paths(explicit, project_root, default_global_dir())
    }

    pub fn from_paths(
        explicit: Option<PathBuf>,
        project_root: PathBuf,
        global_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path)
            }
            None => config_candidates(&project_root, global_dir.as_deref())
                .into_iter()
                .find(|candidate| candidate.is_file()),
        };
        Ok(Self {
            config_path,
            project_root,
        })
    }

    /// The file that will be loaded, if any was found.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Load and resolve settings.
    ///
    /// Relative paths in the file are anchored at the file's directory;
    /// without a file, defaults are anchored at the project root.
    pub fn load(&self) -> anyhow::Result<StoreConfig> {
        let Some(path) = &self.config_path else {
            debug!(root = %self.project_root.display(), "No config file, using defaults");
            return Ok(ConfigFile::default().resolve(&self.project_root));
        };

        let file = parser::parse_config_toml(path)?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(self.project_root.as_path());
        debug!(path = %path.display(), "Loaded config");
        Ok(file.resolve(base))
    }
}
