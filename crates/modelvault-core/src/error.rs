//! Error taxonomy for version store operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used by every store operation.
pub type VersionResult<T> = Result<T, VersionError>;

/// Version store errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// The artifact to snapshot does not exist or is not a regular file
    #[error("Source artifact not found: {0}")]
    SourceNotFound(PathBuf),

    /// No version directory for this model/version pair
    #[error("Version {version} of model '{model}' not found")]
    VersionNotFound { model: String, version: String },

    /// Model name or version id is not a single safe path component
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Same id already published for different content
    #[error("Version {version} of model '{model}' already exists with different content")]
    VersionCollision { model: String, version: String },

    /// Version directory exists but has no metadata record
    #[error("Version {version} of model '{model}' is incomplete: directory exists without metadata")]
    IncompleteVersion { model: String, version: String },

    /// Version directory exists but holds no artifact file
    #[error("Version {version} of model '{model}' has no artifact file")]
    MissingArtifact { model: String, version: String },

    /// Filesystem failure
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata file could not be read or written as JSON
    #[error("Invalid metadata at {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl VersionError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn not_found(model: &str, version: &str) -> Self {
        Self::VersionNotFound {
            model: model.to_string(),
            version: version.to_string(),
        }
    }

    /// True for every "does not exist" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound(_) | Self::VersionNotFound { .. } | Self::MissingArtifact { .. }
        )
    }
}

/// Reject anything that is not a single, non-hidden path component.
pub(crate) fn validate_component(name: &str) -> VersionResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(VersionError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_component_accepts_plain_names() {
        assert!(validate_component("fraud_detection").is_ok());
        assert!(validate_component("v20250603_191259_ab12cd34").is_ok());
        assert!(validate_component("price-prediction.v2").is_ok());
    }

    #[test]
    fn test_validate_component_rejects_traversal() {
        for bad in ["", ".", "..", ".staging", "a/b", "a\\b", "../etc", "nul\0"] {
            assert!(
                matches!(validate_component(bad), Err(VersionError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_is_not_found() {
        assert!(VersionError::not_found("m", "v").is_not_found());
        assert!(VersionError::SourceNotFound(PathBuf::from("/x")).is_not_found());
        assert!(!VersionError::InvalidName("..".into()).is_not_found());
    }
}
