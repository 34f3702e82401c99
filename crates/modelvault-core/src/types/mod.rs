//! Records shared by the store, the CLI and anything serving models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied metadata attached to a version. Opaque to the store.
pub type Metadata = Map<String, Value>;

/// Immutable description of one snapshot of a model artifact.
///
/// Serialized as `metadata.json` inside the version directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version id, `v<YYYYMMDD_HHMMSS>_<hash8>`
    pub version: String,
    pub model_name: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Hex digest of the artifact at creation time
    pub file_hash: String,
    pub file_size_bytes: u64,
}

/// Result of comparing two versions of the same model.
///
/// Carries both records in full so callers can show what changed besides
/// the artifact itself, such as the metrics in each version's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub model_name: String,
    pub version_a: VersionRecord,
    pub version_b: VersionRecord,
    pub same_hash: bool,
    /// `b.file_size_bytes - a.file_size_bytes`
    pub size_difference: i64,
    /// True when b was created strictly after a
    pub b_is_newer: bool,
}

impl VersionComparison {
    pub fn between(model_name: &str, a: VersionRecord, b: VersionRecord) -> Self {
        Self {
            model_name: model_name.to_string(),
            same_hash: a.file_hash == b.file_hash,
            size_difference: b.file_size_bytes as i64 - a.file_size_bytes as i64,
            b_is_newer: b.created_at > a.created_at,
            version_a: a,
            version_b: b,
        }
    }
}

/// Per-model overview used by `models` listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_name: String,
    pub total_versions: usize,
    pub latest_version: Option<VersionRecord>,
}

/// Outcome of re-hashing a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub model_name: String,
    pub version: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub expected_size: u64,
    pub actual_size: u64,
}

impl VerifyReport {
    pub fn is_intact(&self) -> bool {
        self.expected_hash == self.actual_hash && self.expected_size == self.actual_size
    }
}

/// Fixed-width RFC 3339 timestamps (`2025-06-03T19:12:59.123456Z`).
///
/// Every stored `created_at` has the same shape, so textual order equals
/// chronological order.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
