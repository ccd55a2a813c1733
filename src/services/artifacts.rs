//! Versioned artifact blobs on disk with a per-package latest pointer.
//!
//! Layout under the root:
//!
//! ```text
//! {root}/{owner}/{name}-{YYYYMMDD}-{counter}.{ext}   immutable blobs
//! {root}/{owner}/{name}-latest.{ext}                 pointer to the newest blob
//! ```
//!
//! Blobs are written to a temporary file, synced and renamed into place,
//! and the version index is written, before the pointer moves. The pointer itself is replaced by renaming a
//! freshly created link over it, so readers always see either the old or the
//! new artifact.

use super::clock::SharedClock;
use crate::database::SharedStore;
use crate::error::RegistryError;
use crate::models::keys;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    store: SharedStore,
    clock: SharedClock,
    extension: String,
}

impl ArtifactStore {
    pub fn open(
        root: impl Into<PathBuf>,
        store: SharedStore,
        clock: SharedClock,
        extension: &str,
    ) -> Result<Self, RegistryError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            store,
            clock,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// True if `filename` carries the configured artifact extension
    pub fn accepts(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && ext == self.extension)
    }

    fn owner_dir(&self, owner: &str) -> PathBuf {
        self.root.join(owner)
    }

    fn latest_name(&self, name: &str) -> String {
        format!("{name}-latest.{}", self.extension)
    }

    /// Stores `blob` as the newest artifact of `owner/name` and returns its file name
    pub fn put(
        &self,
        owner: &str,
        name: &str,
        version: &str,
        blob: &[u8],
    ) -> Result<String, RegistryError> {
        let dir = self.owner_dir(owner);
        fs::create_dir_all(&dir)?;

        let date = self.clock.now().format("%Y%m%d").to_string();
        let (filename, final_path) = self.reserve_slot(&dir, name, &date)?;

        if let Err(e) = write_durably(&dir, &filename, &final_path, blob) {
            let _ = fs::remove_file(&final_path);
            return Err(e);
        }

        let index = keys::artifacts(owner, name);
        let recorded = self
            .store
            .hget(&index, version)
            .and_then(|previous| {
                self.store.hset(&index, version, &filename)?;
                Ok(previous)
            });
        let previous = match recorded {
            Ok(previous) => previous,
            Err(e) => {
                let _ = fs::remove_file(&final_path);
                return Err(e);
            }
        };

        if let Err(e) = self.repoint_latest(&dir, name, &filename) {
            warn!("Failed to repoint latest for {owner}/{name}, keeping previous artifact: {e}");
            let restored = match &previous {
                Some(prior) => self.store.hset(&index, version, prior),
                None => self.store.hdel(&index, version).map(|_| ()),
            };
            if let Err(restore) = restored {
                warn!("Failed to restore version index of {owner}/{name}: {restore}");
            }
            let _ = fs::remove_file(&final_path);
            return Err(e);
        }

        debug!("Artifact stored: {owner}/{filename} ({} bytes)", blob.len());
        Ok(filename)
    }

    /// Claims the next free counter for the day by creating the file exclusively
    fn reserve_slot(
        &self,
        dir: &Path,
        name: &str,
        date: &str,
    ) -> Result<(String, PathBuf), RegistryError> {
        let mut counter = self
            .stored_files(dir, name)?
            .iter()
            .filter_map(|file| parse_stored_name(file, name, &self.extension))
            .filter(|(day, _)| day == date)
            .map(|(_, n)| n)
            .max()
            .unwrap_or(0)
            + 1;

        loop {
            let filename = format!("{name}-{date}-{counter}.{}", self.extension);
            let path = dir.join(&filename);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok((filename, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn repoint_latest(&self, dir: &Path, name: &str, filename: &str) -> Result<(), RegistryError> {
        let latest = dir.join(self.latest_name(name));
        let staged = dir.join(format!(
            ".{}.{}.tmp",
            self.latest_name(name),
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(e) = create_pointer(filename, &staged) {
            let _ = fs::remove_file(&staged);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&staged, &latest) {
            let _ = fs::remove_file(&staged);
            return Err(e.into());
        }

        Ok(())
    }

    /// File name the latest pointer resolves to, if it resolves to an existing blob
    pub fn latest_filename(&self, owner: &str, name: &str) -> Result<Option<String>, RegistryError> {
        let dir = self.owner_dir(owner);
        let latest = dir.join(self.latest_name(name));

        let target = match read_pointer(&latest) {
            Ok(target) => target,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if dir.join(&target).is_file() {
            Ok(Some(target))
        } else {
            warn!("Latest pointer for {owner}/{name} references missing {target}");
            Ok(None)
        }
    }

    /// Reads an explicit version, or the latest artifact when `version` is `None`
    pub fn get(
        &self,
        owner: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<StoredArtifact, RegistryError> {
        let filename = match version {
            Some(version) => self
                .store
                .hget(&keys::artifacts(owner, name), version)?
                .ok_or_else(|| {
                    RegistryError::NotFound(format!(
                        "No artifact for {owner}/{name} version {version}"
                    ))
                })?,
            None => self.latest_filename(owner, name)?.ok_or_else(|| {
                RegistryError::NotFound(format!("No artifact for {owner}/{name}"))
            })?,
        };

        match fs::read(self.owner_dir(owner).join(&filename)) {
            Ok(data) => Ok(StoredArtifact { filename, data }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RegistryError::NotFound(format!(
                "Artifact {filename} is missing"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the pointer first, then every blob, then the version index
    pub fn delete(&self, owner: &str, name: &str) -> Result<usize, RegistryError> {
        let dir = self.owner_dir(owner);

        match fs::remove_file(dir.join(self.latest_name(name))) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut removed = 0;
        for file in self.stored_files(&dir, name)? {
            if parse_stored_name(&file, name, &self.extension).is_none() {
                continue;
            }
            match fs::remove_file(dir.join(&file)) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(RegistryError::StorageFailure(format!(
                        "Failed to remove artifact {owner}/{file}: {e}"
                    )));
                }
            }
        }

        self.store.del(&keys::artifacts(owner, name))?;

        debug!("Removed {removed} artifact(s) for {owner}/{name}");
        Ok(removed)
    }

    /// Blob file names for `name`, sorted
    pub fn list(&self, owner: &str, name: &str) -> Result<Vec<String>, RegistryError> {
        let dir = self.owner_dir(owner);
        let mut files: Vec<String> = self
            .stored_files(&dir, name)?
            .into_iter()
            .filter(|file| parse_stored_name(file, name, &self.extension).is_some())
            .collect();
        files.sort();
        Ok(files)
    }

    fn stored_files(&self, dir: &Path, name: &str) -> Result<Vec<String>, RegistryError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{name}-");
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(file) = entry.file_name().to_str() {
                if file.starts_with(&prefix) {
                    files.push(file.to_string());
                }
            }
        }
        Ok(files)
    }
}

/// Splits `{name}-{YYYYMMDD}-{counter}.{ext}` into date and counter
pub fn parse_stored_name(file: &str, name: &str, extension: &str) -> Option<(String, u32)> {
    let rest = file.strip_prefix(name)?.strip_prefix('-')?;
    let rest = rest.strip_suffix(extension)?.strip_suffix('.')?;
    let (date, counter) = rest.split_once('-')?;

    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((date.to_string(), counter.parse().ok()?))
}

fn write_durably(
    dir: &Path,
    filename: &str,
    final_path: &Path,
    blob: &[u8],
) -> Result<(), RegistryError> {
    let temp = dir.join(format!(".{filename}.tmp"));

    let written = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp)?;
        file.write_all(blob)?;
        file.sync_all()?;
        fs::rename(&temp, final_path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(RegistryError::StorageFailure(format!(
            "Failed to write artifact {filename}: {e}"
        )));
    }

    Ok(())
}

#[cfg(unix)]
fn create_pointer(target: &str, at: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, at)
}

#[cfg(not(unix))]
fn create_pointer(target: &str, at: &Path) -> std::io::Result<()> {
    let mut file = File::create(at)?;
    file.write_all(target.as_bytes())?;
    file.sync_all()
}

#[cfg(unix)]
fn read_pointer(at: &Path) -> std::io::Result<String> {
    let target = fs::read_link(at)?;
    target
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidData, "pointer has no file name"))
}

#[cfg(not(unix))]
fn read_pointer(at: &Path) -> std::io::Result<String> {
    Ok(fs::read_to_string(at)?.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::database::faulty::FaultyStore;
    use crate::services::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_at(dir: &TempDir) -> (Arc<ManualClock>, ArtifactStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 17, 10, 0, 0).unwrap(),
        ));
        let artifacts = ArtifactStore::open(
            dir.path().join("repo"),
            Arc::new(MemoryStore::new()),
            clock.clone(),
            "napp",
        )
        .unwrap();
        (clock, artifacts)
    }

    #[test]
    fn test_parse_stored_name() {
        assert_eq!(
            parse_stored_name("flowmon-20240517-3.napp", "flowmon", "napp"),
            Some(("20240517".to_string(), 3))
        );
        assert_eq!(parse_stored_name("flowmon-latest.napp", "flowmon", "napp"), None);
        assert_eq!(
            parse_stored_name("flowmon-extra-20240517-1.napp", "flowmon", "napp"),
            None
        );
        assert_eq!(parse_stored_name("flowmon-20240517-1.zip", "flowmon", "napp"), None);
    }

    #[test]
    fn test_same_day_counter_increments() {
        let dir = TempDir::new().unwrap();
        let (clock, artifacts) = store_at(&dir);

        let first = artifacts.put("alice", "flowmon", "1.0", b"v1").unwrap();
        let second = artifacts.put("alice", "flowmon", "1.1", b"v2").unwrap();
        assert_eq!(first, "flowmon-20240517-1.napp");
        assert_eq!(second, "flowmon-20240517-2.napp");

        clock.advance(Duration::days(1));
        let next_day = artifacts.put("alice", "flowmon", "1.2", b"v3").unwrap();
        assert_eq!(next_day, "flowmon-20240518-1.napp");
    }

    #[test]
    fn test_latest_follows_last_put() {
        let dir = TempDir::new().unwrap();
        let (_clock, artifacts) = store_at(&dir);

        for (version, blob) in [
            ("1.0", &b"one"[..]),
            ("1.1", &b"two"[..]),
            ("1.2", &b"three"[..]),
        ] {
            artifacts.put("alice", "flowmon", version, blob).unwrap();
        }

        let latest = artifacts.get("alice", "flowmon", None).unwrap();
        assert_eq!(latest.data, b"three");

        let pinned = artifacts.get("alice", "flowmon", Some("1.0")).unwrap();
        assert_eq!(pinned.data, b"one");
        assert_eq!(pinned.filename, "flowmon-20240517-1.napp");
    }

    #[test]
    fn test_failed_index_write_keeps_previous_latest() {
        let dir = TempDir::new().unwrap();
        let backing = Arc::new(FaultyStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 17, 10, 0, 0).unwrap(),
        ));
        let artifacts =
            ArtifactStore::open(dir.path().join("repo"), backing.clone(), clock, "napp").unwrap();

        artifacts.put("alice", "flowmon", "1.0", b"v1").unwrap();

        backing.fail_hset(true);
        assert!(matches!(
            artifacts.put("alice", "flowmon", "1.1", b"v2"),
            Err(RegistryError::StorageFailure(_))
        ));

        let latest = artifacts.get("alice", "flowmon", None).unwrap();
        assert_eq!(latest.data, b"v1");
        assert_eq!(latest.filename, "flowmon-20240517-1.napp");
        assert_eq!(
            artifacts.list("alice", "flowmon").unwrap(),
            vec!["flowmon-20240517-1.napp".to_string()]
        );
        assert!(matches!(
            artifacts.get("alice", "flowmon", Some("1.1")),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_repoint_rolls_back_version_index() {
        let dir = TempDir::new().unwrap();
        let (_clock, artifacts) = store_at(&dir);

        // A non-empty directory where the pointer goes cannot be renamed over
        let blocked = artifacts.root().join("alice").join("flowmon-latest.napp");
        fs::create_dir_all(&blocked).unwrap();
        fs::write(blocked.join("keep"), b"x").unwrap();

        assert!(matches!(
            artifacts.put("alice", "flowmon", "1.0", b"v1"),
            Err(RegistryError::StorageFailure(_))
        ));
        assert!(matches!(
            artifacts.get("alice", "flowmon", Some("1.0")),
            Err(RegistryError::NotFound(_))
        ));
        assert!(artifacts.list("alice", "flowmon").unwrap().is_empty());
    }

    #[test]
    fn test_counter_skips_files_it_did_not_create() {
        let dir = TempDir::new().unwrap();
        let (_clock, artifacts) = store_at(&dir);
        let owner_dir = artifacts.root().join("alice");
        fs::create_dir_all(&owner_dir).unwrap();
        fs::write(owner_dir.join("flowmon-20240517-7.napp"), b"old").unwrap();

        let filename = artifacts.put("alice", "flowmon", "2.0", b"new").unwrap();
        assert_eq!(filename, "flowmon-20240517-8.napp");
    }

    #[test]
    fn test_delete_removes_blobs_and_pointer() {
        let dir = TempDir::new().unwrap();
        let (_clock, artifacts) = store_at(&dir);
        artifacts.put("alice", "flowmon", "1.0", b"v1").unwrap();
        artifacts.put("alice", "flowmon", "1.1", b"v2").unwrap();
        artifacts.put("alice", "flow", "0.1", b"other").unwrap();

        assert_eq!(artifacts.delete("alice", "flowmon").unwrap(), 2);
        assert!(artifacts.list("alice", "flowmon").unwrap().is_empty());
        assert!(matches!(
            artifacts.get("alice", "flowmon", None),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            artifacts.get("alice", "flowmon", Some("1.0")),
            Err(RegistryError::NotFound(_))
        ));

        assert_eq!(artifacts.get("alice", "flow", None).unwrap().data, b"other");
    }

    #[test]
    fn test_missing_package_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (_clock, artifacts) = store_at(&dir);
        assert!(artifacts.latest_filename("alice", "nothing").unwrap().is_none());
        assert!(matches!(
            artifacts.get("alice", "nothing", None),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_extension_check() {
        let dir = TempDir::new().unwrap();
        let (_clock, artifacts) = store_at(&dir);
        assert!(artifacts.accepts("flowmon.napp"));
        assert!(!artifacts.accepts("flowmon.zip"));
        assert!(!artifacts.accepts(".napp"));
        assert!(!artifacts.accepts("napp"));
    }
}
