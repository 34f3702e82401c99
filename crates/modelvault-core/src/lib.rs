//! Modelvault Core Library
//!
//! Provides a file-system backed version store for trained model artifacts:
//! snapshot an artifact under a timestamp+digest id, list and compare
//! snapshots, and restore one as the active artifact a serving layer loads.

pub mod active;
pub mod config;
pub mod error;
pub mod fs;
pub mod types;
pub mod version;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, StoreConfig};

    // Errors
    pub use crate::error::{VersionError, VersionResult};

    // Active artifacts
    pub use crate::active::ActiveArtifacts;

    // Records
    pub use crate::types::{ModelSummary, VerifyReport, VersionComparison, VersionRecord};

    // Version
    pub use crate::version::{Clock, SystemClock, VersionId, VersionStore};
}
