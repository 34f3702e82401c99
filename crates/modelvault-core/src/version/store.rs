//! On-disk version store
//!
//! Layout: `<root>/<model_name>/<version_id>/{<artifact>, metadata.json}`.
//!
//! Every read is a directory scan: listing costs O(n) in the number of
//! versions of the model and there is no index file. Writes are staged in a
//! hidden `.staging-*` directory next to the versions and published with a
//! single rename, so a crash mid-copy never produces a visible half-written
//! version.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::active::ActiveArtifacts;
use crate::config::StoreConfig;
use crate::error::{VersionError, VersionResult, validate_component};
use crate::fs::{copy_preserving_times, hash_file, publish_dir, replace_file};
use crate::types::{Metadata, ModelSummary, VerifyReport, VersionComparison, VersionRecord};
use crate::version::id::{Clock, SystemClock, VersionId};

/// Name of the metadata record inside each version directory.
pub const METADATA_FILE: &str = "metadata.json";

const STAGING_PREFIX: &str = ".staging-";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Versioned snapshots of model artifacts
///
/// Constructed once with its root directory and handed to whoever needs
/// it; there is no process-wide instance. The store does no locking:
/// concurrent rollbacks of one model race and the last rename wins.
pub struct VersionStore {
    root: PathBuf,
    active: ActiveArtifacts,
    created_by: String,
    clock: Box<dyn Clock>,
}

impl fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionStore")
            .field("root", &self.root)
            .field("active", &self.active)
            .field("created_by", &self.created_by)
            .finish_non_exhaustive()
    }
}

impl VersionStore {
    /// Create a store rooted at `root`.
    ///
    /// # Parameters
    /// - `root`: versions root; created lazily on first write
    /// - `active`: where rollback writes the served artifact
    /// - `created_by`: recorded on every version this store creates
    pub fn new(
        root: impl Into<PathBuf>,
        active: ActiveArtifacts,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            active,
            created_by: created_by.into(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            config.versions_root.clone(),
            ActiveArtifacts::new(config.active_dir.clone(), config.artifact_extension.clone()),
            config.created_by.clone(),
        )
    }

    /// Replace the clock used to stamp new versions.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn active(&self) -> &ActiveArtifacts {
        &self.active
    }

    pub fn model_dir(&self, model_name: &str) -> VersionResult<PathBuf> {
        validate_component(model_name)?;
        Ok(self.root.join(model_name))
    }

    pub fn version_dir(&self, model_name: &str, version: &str) -> VersionResult<PathBuf> {
        validate_component(version)?;
        Ok(self.model_dir(model_name)?.join(version))
    }

    /// Snapshot `source` as a new version of `model_name`.
    ///
    /// Returns the version id. Calling twice within one second on identical
    /// content returns the same id and leaves a single version.
    ///
    /// # Errors
    /// - `SourceNotFound` if `source` is not a readable file
    /// - `VersionCollision` if the id is taken by different content
    pub fn create_version(
        &self,
        model_name: &str,
        source: &Path,
        metadata: Metadata,
    ) -> VersionResult<VersionId> {
        self.create_version_by(model_name, source, metadata, &self.created_by)
    }

    /// Same as [`create_version`](Self::create_version) with an explicit author.
    pub fn create_version_by(
        &self,
        model_name: &str,
        source: &Path,
        metadata: Metadata,
        created_by: &str,
    ) -> VersionResult<VersionId> {
        let model_dir = self.model_dir(model_name)?;
        if !source.is_file() {
            return Err(VersionError::SourceNotFound(source.to_path_buf()));
        }
        let file_name = source
            .file_name()
            .filter(|name| *name != METADATA_FILE)
            .ok_or_else(|| VersionError::InvalidName(source.display().to_string()))?;

        fs::create_dir_all(&model_dir).map_err(|e| VersionError::io(&model_dir, e))?;
        let staging = model_dir.join(format!(
            "{}{}-{}",
            STAGING_PREFIX,
            std::process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let result =
            self.stage_and_publish(model_name, source, file_name, &staging, metadata, created_by);
        if staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        result
    }

    fn stage_and_publish(
        &self,
        model_name: &str,
        source: &Path,
        file_name: &std::ffi::OsStr,
        staging: &Path,
        metadata: Metadata,
        created_by: &str,
    ) -> VersionResult<VersionId> {
        fs::create_dir_all(staging).map_err(|e| VersionError::io(staging, e))?;

        // Hash the copy, not the source, so the record describes what was stored
        let staged_artifact = staging.join(file_name);
        copy_preserving_times(source, &staged_artifact).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VersionError::SourceNotFound(source.to_path_buf()),
            _ => VersionError::io(source, e),
        })?;
        let digest = hash_file(&staged_artifact).map_err(|e| VersionError::io(&staged_artifact, e))?;

        let created_at = self.clock.now();
        let id = VersionId::derive(created_at, &digest.hex);
        let target = staging
            .parent()
            .map(|dir| dir.join(id.as_str()))
            .ok_or_else(|| VersionError::InvalidName(model_name.to_string()))?;

        if target.exists() {
            return resolve_existing(&target, model_name, id, &digest.hex);
        }

        let record = VersionRecord {
            version: id.to_string(),
            model_name: model_name.to_string(),
            created_at,
            created_by: created_by.to_string(),
            metadata,
            file_hash: digest.hex,
            file_size_bytes: digest.size,
        };
        write_record(staging, &record)?;

        if let Err(e) = publish_dir(staging, &target) {
            // Another writer published the same id between the check and the rename
            if target.is_dir() {
                return resolve_existing(&target, model_name, id, &record.file_hash);
            }
            return Err(VersionError::io(&target, e));
        }
        info!(
            model = model_name,
            version = %id,
            size = record.file_size_bytes,
            "Created version"
        );
        Ok(id)
    }

    /// All versions of `model_name`, newest first.
    ///
    /// Directories without a metadata file are skipped; so are staging
    /// directories and metadata that fails to parse (logged). A model with
    /// no versions yields an empty list.
    pub fn list_versions(&self, model_name: &str) -> VersionResult<Vec<VersionRecord>> {
        let model_dir = self.model_dir(model_name)?;
        if !model_dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&model_dir).map_err(|e| VersionError::io(&model_dir, e))?;
        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VersionError::io(&model_dir, e))?;
            let path = entry.path();
            if is_hidden(&path) || !path.is_dir() {
                continue;
            }
            match read_record(&path) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable version"),
            }
        }

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.version.cmp(&a.version))
        });
        debug!(model = model_name, count = records.len(), "Listed versions");
        Ok(records)
    }

    /// Newest version of `model_name`, if any.
    pub fn get_latest_version(&self, model_name: &str) -> VersionResult<Option<VersionRecord>> {
        Ok(self.list_versions(model_name)?.into_iter().next())
    }

    /// Metadata of one version; `None` when it does not exist.
    pub fn get_version(&self, model_name: &str, version: &str) -> VersionResult<Option<VersionRecord>> {
        let dir = self.version_dir(model_name, version)?;
        if !dir.is_dir() {
            return Ok(None);
        }
        read_record(&dir)
    }

    /// Make `version` the active artifact of `model_name`.
    ///
    /// Returns `Ok(false)` when the version directory holds no file with the
    /// artifact extension. The active artifact is untouched on any failure.
    ///
    /// # Errors
    /// `VersionNotFound` if the version directory does not exist.
    pub fn rollback_to_version(&self, model_name: &str, version: &str) -> VersionResult<bool> {
        let dir = self.version_dir(model_name, version)?;
        if !dir.is_dir() {
            return Err(VersionError::not_found(model_name, version));
        }

        let Some(artifact) = self.rollback_artifact(&dir)? else {
            warn!(
                model = model_name,
                version,
                extension = self.active.extension(),
                "No artifact with expected extension, rollback skipped"
            );
            return Ok(false);
        };

        let active_path = self.active.path_for(model_name)?;
        replace_file(&artifact, &active_path).map_err(|e| VersionError::io(&active_path, e))?;
        info!(
            model = model_name,
            version,
            active = %active_path.display(),
            "Rolled back"
        );
        Ok(true)
    }

    /// Remove a version permanently.
    ///
    /// Returns `false` if it did not exist.
    pub fn delete_version(&self, model_name: &str, version: &str) -> VersionResult<bool> {
        let dir = self.version_dir(model_name, version)?;
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| VersionError::io(&dir, e))?;
        info!(model = model_name, version, "Deleted version");
        Ok(true)
    }

    /// Compare two versions of one model.
    ///
    /// # Errors
    /// `VersionNotFound` naming the first missing version.
    pub fn compare_versions(
        &self,
        model_name: &str,
        version_a: &str,
        version_b: &str,
    ) -> VersionResult<VersionComparison> {
        let a = self
            .get_version(model_name, version_a)?
            .ok_or_else(|| VersionError::not_found(model_name, version_a))?;
        let b = self
            .get_version(model_name, version_b)?
            .ok_or_else(|| VersionError::not_found(model_name, version_b))?;
        Ok(VersionComparison::between(model_name, a, b))
    }

    /// Names of all models with a version directory, sorted.
    pub fn list_models(&self) -> VersionResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|e| VersionError::io(&self.root, e))?;
        let mut models = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VersionError::io(&self.root, e))?;
            let path = entry.path();
            if is_hidden(&path) || !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                models.push(name.to_string());
            }
        }
        models.sort();
        Ok(models)
    }

    pub fn model_summaries(&self) -> VersionResult<Vec<ModelSummary>> {
        self.list_models()?
            .into_iter()
            .map(|model_name| -> VersionResult<ModelSummary> {
                let versions = self.list_versions(&model_name)?;
                Ok(ModelSummary {
                    total_versions: versions.len(),
                    latest_version: versions.into_iter().next(),
                    model_name,
                })
            })
            .collect()
    }

    /// Re-hash a stored artifact and compare it with its metadata.
    pub fn verify_version(&self, model_name: &str, version: &str) -> VersionResult<VerifyReport> {
        let record = self
            .get_version(model_name, version)?
            .ok_or_else(|| VersionError::not_found(model_name, version))?;
        let dir = self.version_dir(model_name, version)?;
        let artifact = stored_artifact(&dir)?.ok_or_else(|| VersionError::MissingArtifact {
            model: model_name.to_string(),
            version: version.to_string(),
        })?;
        let digest = hash_file(&artifact).map_err(|e| VersionError::io(&artifact, e))?;

        let report = VerifyReport {
            model_name: model_name.to_string(),
            version: version.to_string(),
            expected_hash: record.file_hash,
            actual_hash: digest.hex,
            expected_size: record.file_size_bytes,
            actual_size: digest.size,
        };
        if !report.is_intact() {
            warn!(model = model_name, version, "Stored artifact does not match its metadata");
        }
        Ok(report)
    }

    fn rollback_artifact(&self, dir: &Path) -> VersionResult<Option<PathBuf>> {
        Ok(artifact_files(dir)?
            .into_iter()
            .find(|path| self.active.matches_extension(path)))
    }
}

/// Decide what an already published directory at `target` means for a new
/// snapshot with digest `hex`: same content is idempotent, anything else fails.
fn resolve_existing(
    target: &Path,
    model_name: &str,
    id: VersionId,
    hex: &str,
) -> VersionResult<VersionId> {
    match read_record(target)? {
        Some(existing) if existing.file_hash == hex => {
            debug!(model = model_name, version = %id, "Identical version already present");
            Ok(id)
        }
        Some(_) => Err(VersionError::VersionCollision {
            model: model_name.to_string(),
            version: id.to_string(),
        }),
        None => Err(VersionError::IncompleteVersion {
            model: model_name.to_string(),
            version: id.to_string(),
        }),
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Regular files in a version directory other than the metadata, name order.
fn artifact_files(dir: &Path) -> VersionResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| VersionError::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.file_name().is_some_and(|n| n != METADATA_FILE))
        .collect();
    files.sort();
    Ok(files)
}

fn stored_artifact(dir: &Path) -> VersionResult<Option<PathBuf>> {
    Ok(artifact_files(dir)?.into_iter().next())
}

fn read_record(dir: &Path) -> VersionResult<Option<VersionRecord>> {
    let path = dir.join(METADATA_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(|e| VersionError::io(&path, e))?;
    let record = serde_json::from_slice(&bytes).map_err(|source| VersionError::Metadata {
        path: path.clone(),
        source,
    })?;
    Ok(Some(record))
}

fn write_record(dir: &Path, record: &VersionRecord) -> VersionResult<()> {
    let path = dir.join(METADATA_FILE);
    let bytes = serde_json::to_vec_pretty(record).map_err(|source| VersionError::Metadata {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, bytes).map_err(|e| VersionError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::id::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> VersionStore {
        VersionStore::new(
            tmp.path().join("versions"),
            ActiveArtifacts::new(tmp.path().join("models"), "pkl"),
            "tester",
        )
    }

    fn pinned(secs: i64) -> FixedClock {
        FixedClock(Utc.timestamp_opt(secs, 0).single().expect("valid timestamp"))
    }

    fn artifact(tmp: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, content).expect("write should succeed");
        path
    }

    #[test]
    fn test_create_writes_artifact_and_metadata() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp).with_clock(pinned(1_750_000_000));
        let src = artifact(&tmp, "demo_model.pkl", b"weights");

        let mut meta = Metadata::new();
        meta.insert("accuracy".into(), json!(0.97));
        let id = store
            .create_version("demo", &src, meta)
            .expect("create should succeed");

        let dir = store.version_dir("demo", id.as_str()).expect("valid");
        assert!(dir.join("demo_model.pkl").is_file());
        let record = read_record(&dir)
            .expect("read should succeed")
            .expect("metadata should exist");
        assert_eq!(record.version, id.as_str());
        assert_eq!(record.created_by, "tester");
        assert_eq!(record.metadata["accuracy"], json!(0.97));
        assert_eq!(record.file_hash, blake3::hash(b"weights").to_hex().to_string());
        assert_eq!(record.file_size_bytes, 7);
        assert!(id.as_str().starts_with("v20250615_"));
    }

    #[test]
    fn test_create_leaves_no_staging_dir() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp);
        let src = artifact(&tmp, "a.pkl", b"a");

        store
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");

        let names: Vec<_> = fs::read_dir(store.model_dir("demo").expect("valid"))
            .expect("read_dir should succeed")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!names[0].starts_with(STAGING_PREFIX));
    }

    #[test]
    fn test_same_second_same_content_is_idempotent() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp).with_clock(pinned(1_750_000_000));
        let src = artifact(&tmp, "a.pkl", b"same");

        let first = store
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");
        let second = store
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");

        assert_eq!(first, second);
        assert_eq!(store.list_versions("demo").expect("list").len(), 1);
    }

    #[test]
    fn test_prefix_collision_with_different_content_is_rejected() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp).with_clock(pinned(1_750_000_000));
        let src = artifact(&tmp, "a.pkl", b"real");

        let id = store
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");

        // Tamper with the recorded hash to simulate another artifact sharing the prefix
        let meta_path = store.version_dir("demo", id.as_str()).expect("valid").join(METADATA_FILE);
        let mut record: VersionRecord =
            serde_json::from_slice(&fs::read(&meta_path).expect("read")).expect("parse");
        record.file_hash = format!("{}{}", &record.file_hash[..8], "0".repeat(56));
        fs::write(&meta_path, serde_json::to_vec(&record).expect("serialize")).expect("write");

        let err = store
            .create_version("demo", &src, Metadata::new())
            .expect_err("collision should fail");
        assert!(matches!(err, VersionError::VersionCollision { .. }));
    }

    #[test]
    fn test_create_missing_source() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp);

        let err = store
            .create_version("demo", &tmp.path().join("missing.pkl"), Metadata::new())
            .expect_err("missing source should fail");
        assert!(matches!(err, VersionError::SourceNotFound(_)));
        assert!(!store.root().join("demo").exists());
    }

    #[test]
    fn test_leftover_dir_without_metadata_is_incomplete() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let clock = pinned(1_750_000_000);
        let store = store_in(&tmp).with_clock(clock);
        let src = artifact(&tmp, "a.pkl", b"payload");

        let expected = VersionId::derive(clock.0, &blake3::hash(b"payload").to_hex().to_string());
        let leftover = store.version_dir("demo", expected.as_str()).expect("valid");
        fs::create_dir_all(&leftover).expect("create_dir_all should succeed");
        fs::write(leftover.join("a.pkl"), b"partial").expect("write should succeed");

        let err = store
            .create_version("demo", &src, Metadata::new())
            .expect_err("leftover directory should block creation");
        assert!(matches!(err, VersionError::IncompleteVersion { .. }));
        assert!(err.to_string().contains("incomplete"));
    }

    #[test]
    fn test_create_rejects_bad_model_name() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp);
        let src = artifact(&tmp, "a.pkl", b"a");

        let err = store
            .create_version("../escape", &src, Metadata::new())
            .expect_err("bad name should fail");
        assert!(matches!(err, VersionError::InvalidName(_)));
    }

    #[test]
    fn test_list_sorts_newest_first_and_skips_stray_dirs() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let src = artifact(&tmp, "a.pkl", b"a");
        let older = store_in(&tmp)
            .with_clock(pinned(1_700_000_000))
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");
        let newer = store_in(&tmp)
            .with_clock(pinned(1_700_000_100))
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");

        let store = store_in(&tmp);
        let model_dir = store.model_dir("demo").expect("valid");
        fs::create_dir_all(model_dir.join("no_metadata")).expect("create_dir_all");
        fs::create_dir_all(model_dir.join(".staging-1-0")).expect("create_dir_all");
        fs::write(model_dir.join(".staging-1-0").join(METADATA_FILE), b"{}").expect("write");

        let ids: Vec<_> = store
            .list_versions("demo")
            .expect("list should succeed")
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(ids, vec![newer.to_string(), older.to_string()]);
    }

    #[test]
    fn test_list_skips_corrupt_metadata() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp);
        let broken = store.model_dir("demo").expect("valid").join("v20250101_000000_00000000");
        fs::create_dir_all(&broken).expect("create_dir_all");
        fs::write(broken.join(METADATA_FILE), b"not json").expect("write");

        assert!(store.list_versions("demo").expect("list should succeed").is_empty());
        assert!(matches!(
            store.get_version("demo", "v20250101_000000_00000000"),
            Err(VersionError::Metadata { .. })
        ));
    }

    #[test]
    fn test_rollback_without_matching_extension_returns_false() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp);
        let src = artifact(&tmp, "a.bin", b"X");
        let id = store
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");

        let active = store.active().path_for("demo").expect("valid");
        fs::create_dir_all(active.parent().expect("parent")).expect("create_dir_all");
        fs::write(&active, b"current").expect("write");

        let rolled = store
            .rollback_to_version("demo", id.as_str())
            .expect("rollback should not error");
        assert!(!rolled);
        assert_eq!(fs::read(&active).expect("read"), b"current");
    }

    #[test]
    fn test_verify_detects_tampering() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp);
        let src = artifact(&tmp, "a.pkl", b"original");
        let id = store
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");

        let report = store.verify_version("demo", id.as_str()).expect("verify");
        assert!(report.is_intact());

        let stored = store.version_dir("demo", id.as_str()).expect("valid").join("a.pkl");
        fs::write(&stored, b"tampered!").expect("write");
        let report = store.verify_version("demo", id.as_str()).expect("verify");
        assert!(!report.is_intact());
        assert_eq!(report.actual_size, 9);
    }

    #[test]
    fn test_verify_missing_artifact() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = store_in(&tmp);
        let src = artifact(&tmp, "a.pkl", b"x");
        let id = store
            .create_version("demo", &src, Metadata::new())
            .expect("create should succeed");
        fs::remove_file(store.version_dir("demo", id.as_str()).expect("valid").join("a.pkl"))
            .expect("remove");

        let err = store.verify_version("demo", id.as_str()).expect_err("should fail");
        assert!(matches!(err, VersionError::MissingArtifact { .. }));
    }
}
