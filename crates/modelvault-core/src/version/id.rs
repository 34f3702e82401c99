//! Version id derivation
//!
//! Ids have the shape `v<YYYYMMDD_HHMMSS>_<hash8>`: the UTC creation second
//! followed by the first 8 hex characters of the artifact digest. Two
//! snapshots of identical content taken in the same second share an id.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{VersionError, VersionResult};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const HASH_PREFIX_LEN: usize = 8;

/// Source of "now" for version creation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant. Useful for reproducible ids.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Identifier of one version of a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionId(String);

impl VersionId {
    /// Build the id for an artifact with digest `hex` created at `at`.
    pub fn derive(at: DateTime<Utc>, hex: &str) -> Self {
        let prefix = hex.get(..HASH_PREFIX_LEN).unwrap_or(hex);
        Self(format!("v{}_{}", at.format(TIMESTAMP_FORMAT), prefix))
    }

    /// Parse and validate an id string.
    pub fn parse(raw: &str) -> VersionResult<Self> {
        let invalid = || VersionError::InvalidName(raw.to_string());

        let rest = raw.strip_prefix('v').ok_or_else(invalid)?;
        if rest.len() != TIMESTAMP_LEN + 1 + HASH_PREFIX_LEN || !rest.is_ascii() {
            return Err(invalid());
        }
        let (stamp, tail) = rest.split_at(TIMESTAMP_LEN);
        let hash = tail.strip_prefix('_').ok_or_else(invalid)?;

        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).map_err(|_| invalid())?;
        if !hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(invalid());
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<VersionId> for String {
    fn from(id: VersionId) -> Self {
        id.0
    }
}
