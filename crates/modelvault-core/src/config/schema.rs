//! Configuration schema for modelvault.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_VERSIONS_ROOT: &str = "model_versions";
pub const DEFAULT_ACTIVE_DIR: &str = "models";
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "pkl";

/// modelvault.toml as written by the user. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Directory holding `<model>/<version>/` trees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions_root: Option<PathBuf>,

    /// Directory holding the served `<model>_model.<ext>` files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_dir: Option<PathBuf>,

    /// Artifact extension without the dot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_extension: Option<String>,

    /// Author recorded on new versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl ConfigFile {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(ext) = &self.artifact_extension {
            if ext.is_empty() {
                anyhow::bail!("artifact_extension must not be empty");
            }
            if ext.starts_with('.') || ext.contains(['/', '\\']) {
                anyhow::bail!(
                    "artifact_extension must be a bare extension like \"pkl\", got {:?}",
                    ext
                );
            }
        }
        if self.created_by.as_deref().is_some_and(|s| s.trim().is_empty()) {
            anyhow::bail!("created_by must not be blank");
        }
        Ok(())
    }

    /// Fill in defaults; relative paths are taken relative to `base_dir`.
    pub fn resolve(&self, base_dir: &Path) -> StoreConfig {
        let anchor = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base_dir.join(p)
            }
        };

        StoreConfig {
            versions_root: anchor(
                self.versions_root
                    .as_deref()
                    .unwrap_or(Path::new(DEFAULT_VERSIONS_ROOT)),
            ),
            active_dir: anchor(
                self.active_dir
                    .as_deref()
                    .unwrap_or(Path::new(DEFAULT_ACTIVE_DIR)),
            ),
            artifact_extension: self
                .artifact_extension
                .clone()
                .unwrap_or_else(|| DEFAULT_ARTIFACT_EXTENSION.to_string()),
            created_by: self.created_by.clone().unwrap_or_else(default_author),
        }
    }
}

/// Fully resolved store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreConfig {
    pub versions_root: PathBuf,
    pub active_dir: PathBuf,
    pub artifact_extension: String,
    pub created_by: String,
}

impl StoreConfig {
    /// Defaults anchored at `base_dir`.
    pub fn with_base(base_dir: &Path) -> Self {
        ConfigFile::default().resolve(base_dir)
    }
}

/// Login name from the environment, or "unknown".
pub fn default_author() -> String {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_anchor_at_base() {
        let config = StoreConfig::with_base(Path::new("/srv/app"));
        assert_eq!(config.versions_root, PathBuf::from("/srv/app/model_versions"));
        assert_eq!(config.active_dir, PathBuf::from("/srv/app/models"));
        assert_eq!(config.artifact_extension, "pkl");
        assert!(!config.created_by.is_empty());
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let file = ConfigFile {
            versions_root: Some(PathBuf::from("/data/versions")),
            active_dir: Some(PathBuf::from("serving")),
            artifact_extension: Some("onnx".into()),
            created_by: Some("ci".into()),
        };
        let config = file.resolve(Path::new("/srv/app"));
        assert_eq!(config.versions_root, PathBuf::from("/data/versions"));
        assert_eq!(config.active_dir, PathBuf::from("/srv/app/serving"));
        assert_eq!(config.artifact_extension, "onnx");
        assert_eq!(config.created_by, "ci");
    }

    #[test]
    fn test_validate_rejects_dotted_extension() {
        let file = ConfigFile {
            artifact_extension: Some(".pkl".into()),
            ..Default::default()
        };
        assert!(file.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_author() {
        let file = ConfigFile {
            created_by: Some("  ".into()),
            ..Default::default()
        };
        assert!(file.validate().is_err());
    }
}
