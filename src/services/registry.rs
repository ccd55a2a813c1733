use super::artifacts::ArtifactStore;
use super::clock::SharedClock;
use super::comments::CommentLedger;
use super::credentials::CredentialStore;
use super::tokens::TokenManager;
use crate::database::SharedStore;
use crate::error::RegistryError;
use crate::models::account::Account;
use crate::models::comment::CommentTarget;
use crate::models::keys;
use crate::models::package::{ArtifactUpload, Package, PackageMetadata, PackageView};
use log::{debug, warn};

/// Owns package records and enforces that only the owner writes them
#[derive(Debug, Clone)]
pub struct PackageRegistry {
    store: SharedStore,
    credentials: CredentialStore,
    tokens: TokenManager,
    artifacts: ArtifactStore,
    comments: CommentLedger,
    clock: SharedClock,
}

impl PackageRegistry {
    pub fn new(
        store: SharedStore,
        credentials: CredentialStore,
        tokens: TokenManager,
        artifacts: ArtifactStore,
        comments: CommentLedger,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            credentials,
            tokens,
            artifacts,
            comments,
            clock,
        }
    }

    /// Resolves the account allowed to write on behalf of `token_hash`
    pub fn authorize(&self, token_hash: &str) -> Result<Account, RegistryError> {
        self.tokens.owner_of(token_hash)
    }

    /// Registers a new package, storing the artifact when one is supplied.
    ///
    /// Writes go metadata, owner index, global index. A failure part way
    /// removes what was already written.
    pub fn register(
        &self,
        metadata: PackageMetadata,
        owner: &Account,
        artifact: Option<ArtifactUpload>,
    ) -> Result<Package, RegistryError> {
        check_author(&metadata, owner)?;
        let blob = self.prepare_artifact(artifact.as_ref())?;

        let key = keys::package(&metadata.username, &metadata.name);
        if self.is_committed(&key)? {
            return Err(RegistryError::DuplicateEntry(format!(
                "Package {}/{} already exists",
                metadata.username, metadata.name
            )));
        }
        if self.has_partial_traces(&metadata.username, &key)? {
            warn!("Discarding partial registration of {key}");
            self.unindex(&metadata.username, &key)?;
        }

        let now = self.clock.now();
        let package = Package {
            versions: vec![metadata.version.clone()],
            metadata: with_resolved_readme(metadata),
            created_at: now,
            updated_at: now,
        };

        self.write_indexed(&package)?;

        if let Some(blob) = blob {
            if let Err(e) =
                self.artifacts
                    .put(package.owner(), package.name(), &package.metadata.version, &blob)
            {
                warn!("Artifact write failed for {key}, rolling back registration: {e}");
                self.unindex(package.owner(), &key)?;
                return Err(e);
            }
        }

        debug!("Package registered: {key}");
        Ok(package)
    }

    fn write_indexed(&self, package: &Package) -> Result<(), RegistryError> {
        let key = package.key();
        let owner_index = keys::account_packages(package.owner());

        self.store.hset_all(&key, &package.to_fields())?;

        if let Err(e) = self.store.sadd(&owner_index, &key) {
            warn!("Failed to index {key} for its owner, removing record: {e}");
            self.store.del(&key)?;
            return Err(e);
        }

        if let Err(e) = self.store.sadd(keys::PACKAGES, &key) {
            warn!("Failed to index {key} globally, removing record: {e}");
            self.store.srem(&owner_index, &key)?;
            self.store.del(&key)?;
            return Err(e);
        }

        Ok(())
    }

    /// Removes the global entry first, so a failure part way leaves the
    /// package unreadable rather than half deleted.
    fn unindex(&self, owner: &str, key: &str) -> Result<(), RegistryError> {
        self.store.srem(keys::PACKAGES, key)?;
        self.store.srem(&keys::account_packages(owner), key)?;
        self.store.del(key)?;
        Ok(())
    }

    fn is_committed(&self, key: &str) -> Result<bool, RegistryError> {
        Ok(self.store.sismember(keys::PACKAGES, key)? && self.store.exists(key)?)
    }

    /// True when an uncommitted package left a record or an index entry behind
    fn has_partial_traces(&self, owner: &str, key: &str) -> Result<bool, RegistryError> {
        Ok(self.store.exists(key)?
            || self.store.sismember(keys::PACKAGES, key)?
            || self.store.sismember(&keys::account_packages(owner), key)?)
    }

    fn prepare_artifact(
        &self,
        artifact: Option<&ArtifactUpload>,
    ) -> Result<Option<Vec<u8>>, RegistryError> {
        let Some(artifact) = artifact else {
            return Ok(None);
        };

        if !self.artifacts.accepts(&artifact.filename) {
            return Err(RegistryError::InvalidMetadata(format!(
                "Invalid file extension for {}, expected .{}",
                artifact.filename,
                self.artifacts.extension()
            )));
        }

        artifact.decode().map(Some)
    }

    /// Replaces the mutable fields of an existing package
    pub fn update(
        &self,
        owner_name: &str,
        name: &str,
        metadata: PackageMetadata,
        owner: &Account,
        artifact: Option<ArtifactUpload>,
    ) -> Result<Package, RegistryError> {
        if owner.username != owner_name {
            return Err(permission_denied(owner, owner_name, name));
        }
        check_author(&metadata, owner)?;
        if metadata.name != name {
            return Err(RegistryError::InvalidMetadata(format!(
                "Package name {} does not match {name}",
                metadata.name
            )));
        }

        let existing = self.load(owner_name, name)?;
        let blob = self.prepare_artifact(artifact.as_ref())?;

        let mut versions = existing.versions;
        if !versions.contains(&metadata.version) {
            versions.push(metadata.version.clone());
        }

        let package = Package {
            metadata: with_resolved_readme(metadata),
            versions,
            created_at: existing.created_at,
            updated_at: self.clock.now(),
        };

        if let Some(blob) = blob {
            self.artifacts
                .put(owner_name, name, &package.metadata.version, &blob)?;
        }

        self.store.hset_all(&package.key(), &package.to_fields())?;

        debug!("Package updated: {}", package.key());
        Ok(package)
    }

    /// Loads the stored record. Unindexed or missing records are not found.
    pub fn load(&self, owner: &str, name: &str) -> Result<Package, RegistryError> {
        let key = keys::package(owner, name);
        let not_found =
            || RegistryError::NotFound(format!("Package {name} not found for user {owner}"));

        if !self.store.sismember(keys::PACKAGES, &key)? {
            return Err(not_found());
        }

        let fields = self.store.hgetall(&key)?;
        if fields.is_empty() {
            warn!("Package {key} is indexed but has no record");
            return Err(not_found());
        }

        Package::from_fields(&key, &fields)
    }

    /// The package with its author profile, comment count and latest artifact
    pub fn get(&self, owner: &str, name: &str) -> Result<PackageView, RegistryError> {
        let package = self.load(owner, name)?;
        self.view(package)
    }

    fn view(&self, package: Package) -> Result<PackageView, RegistryError> {
        let author = self.credentials.public_profile(package.owner())?;
        let target = CommentTarget::Package {
            owner: package.owner().to_string(),
            name: package.name().to_string(),
        };
        let comment_count = self.comments.count(&target)?;
        let latest_artifact = self
            .artifacts
            .latest_filename(package.owner(), package.name())?;

        Ok(PackageView {
            package,
            author,
            comment_count,
            latest_artifact,
        })
    }

    /// Deletes artifacts first; the record is only removed once they are gone
    pub fn delete(&self, owner_name: &str, name: &str, owner: &Account) -> Result<(), RegistryError> {
        if owner.username != owner_name {
            return Err(permission_denied(owner, owner_name, name));
        }

        let key = keys::package(owner_name, name);
        match self.load(owner_name, name) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                if !self.has_partial_traces(owner_name, &key)? {
                    return Err(e);
                }
                warn!("Deleting partially registered package {key}");
            }
            Err(e) => return Err(e),
        }

        self.artifacts.delete(owner_name, name)?;
        self.unindex(owner_name, &key)?;
        self.comments.purge(&CommentTarget::Package {
            owner: owner_name.to_string(),
            name: name.to_string(),
        })?;

        debug!("Package deleted: {key}");
        Ok(())
    }

    /// All packages in index order, truncated to the first `limit` entries
    pub fn list_all(&self, limit: Option<usize>) -> Result<Vec<PackageView>, RegistryError> {
        let members = self.store.smembers(keys::PACKAGES)?;
        self.collect_views(members, limit)
    }

    pub fn list_for_owner(&self, owner: &str) -> Result<Vec<PackageView>, RegistryError> {
        self.credentials.get(owner)?;
        let members = self.store.smembers(&keys::account_packages(owner))?;
        self.collect_views(members, None)
    }

    fn collect_views(
        &self,
        members: Vec<String>,
        limit: Option<usize>,
    ) -> Result<Vec<PackageView>, RegistryError> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut views = Vec::new();

        for key in members {
            if views.len() >= limit {
                break;
            }
            let Some((owner, name)) = keys::split_package(&key) else {
                warn!("Skipping malformed package index entry {key}");
                continue;
            };
            match self.load(owner, name).and_then(|package| self.view(package)) {
                Ok(view) => views.push(view),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(views)
    }
}

fn check_author(metadata: &PackageMetadata, owner: &Account) -> Result<(), RegistryError> {
    if metadata.username != owner.username {
        return Err(RegistryError::InvalidOwner(format!(
            "Permission denied: {} cannot publish as {}",
            owner.username, metadata.username
        )));
    }
    Ok(())
}

fn permission_denied(owner: &Account, owner_name: &str, name: &str) -> RegistryError {
    RegistryError::InvalidOwner(format!(
        "Permission denied: {} does not own {owner_name}/{name}",
        owner.username
    ))
}

fn with_resolved_readme(mut metadata: PackageMetadata) -> PackageMetadata {
    metadata.readme = Some(metadata.resolved_readme());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{KeyValueStore, MemoryStore};
    use crate::models::account::NewAccount;
    use crate::services::clock::ManualClock;
    use crate::services::tokens::TokenLifetimes;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<MemoryStore>,
        credentials: CredentialStore,
        registry: PackageRegistry,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let credentials = CredentialStore::new(store.clone(), clock.clone(), 4);
        let tokens = TokenManager::new(
            store.clone(),
            credentials.clone(),
            clock.clone(),
            TokenLifetimes::default(),
        );
        let artifacts =
            ArtifactStore::open(dir.path().join("repo"), store.clone(), clock.clone(), "napp")
                .unwrap();
        let comments = CommentLedger::new(store.clone(), credentials.clone(), clock.clone());
        let registry = PackageRegistry::new(
            store.clone(),
            credentials.clone(),
            tokens,
            artifacts,
            comments,
            clock,
        );

        for username in ["alice", "bob"] {
            credentials
                .create(NewAccount {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    first_name: username.to_string(),
                    last_name: None,
                    password: "secret123".to_string(),
                    phone: None,
                    city: None,
                    state: None,
                    country: None,
                })
                .unwrap();
        }

        Fixture {
            _dir: dir,
            store,
            credentials,
            registry,
        }
    }

    fn metadata(owner: &str, version: &str) -> PackageMetadata {
        PackageMetadata::from_value(json!({
            "username": owner,
            "name": "flowmon",
            "description": "Flow monitor",
            "version": version,
            "license": "MIT",
        }))
        .unwrap()
    }

    fn upload(bytes: &[u8]) -> ArtifactUpload {
        ArtifactUpload {
            filename: "flowmon.napp".to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    #[test]
    fn test_register_indexes_package() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        f.registry
            .register(metadata("alice", "1.0"), &alice, Some(upload(b"v1")))
            .unwrap();

        let view = f.registry.get("alice", "flowmon").unwrap();
        assert_eq!(view.package.metadata.version, "1.0");
        assert_eq!(view.author.username, "alice");
        assert_eq!(view.package.metadata.readme.as_deref(), Some("Flow monitor"));
        assert!(view.latest_artifact.is_some());
        assert!(
            f.store
                .sismember(&keys::account_packages("alice"), "package:alice/flowmon")
                .unwrap()
        );
    }

    #[test]
    fn test_register_as_someone_else_is_rejected() {
        let f = fixture();
        let bob = f.credentials.get("bob").unwrap();
        assert!(matches!(
            f.registry.register(metadata("alice", "1.0"), &bob, None),
            Err(RegistryError::InvalidOwner(_))
        ));
        assert!(f.registry.list_all(None).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_registration_needs_update() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        f.registry
            .register(metadata("alice", "1.0"), &alice, None)
            .unwrap();

        assert!(matches!(
            f.registry.register(metadata("alice", "2.0"), &alice, None),
            Err(RegistryError::DuplicateEntry(_))
        ));

        let updated = f
            .registry
            .update("alice", "flowmon", metadata("alice", "2.0"), &alice, None)
            .unwrap();
        assert_eq!(updated.versions, vec!["1.0", "2.0"]);
    }

    #[test]
    fn test_foreign_update_and_delete_leave_package_alone() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        let bob = f.credentials.get("bob").unwrap();
        f.registry
            .register(metadata("alice", "1.0"), &alice, None)
            .unwrap();

        assert!(matches!(
            f.registry
                .update("alice", "flowmon", metadata("bob", "9.9"), &bob, None),
            Err(RegistryError::InvalidOwner(_))
        ));
        assert!(matches!(
            f.registry.delete("alice", "flowmon", &bob),
            Err(RegistryError::InvalidOwner(_))
        ));
        assert_eq!(
            f.registry.get("alice", "flowmon").unwrap().package.metadata.version,
            "1.0"
        );
    }

    #[test]
    fn test_bad_artifact_extension_writes_nothing() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        let mut artifact = upload(b"zip");
        artifact.filename = "flowmon.zip".to_string();

        assert!(matches!(
            f.registry
                .register(metadata("alice", "1.0"), &alice, Some(artifact)),
            Err(RegistryError::InvalidMetadata(_))
        ));
        assert!(!f.store.exists("package:alice/flowmon").unwrap());
    }

    #[test]
    fn test_delete_cascades_to_artifacts() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        f.registry
            .register(metadata("alice", "1.0"), &alice, Some(upload(b"v1")))
            .unwrap();

        f.registry.delete("alice", "flowmon", &alice).unwrap();
        assert!(matches!(
            f.registry.get("alice", "flowmon"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(f.credentials.delete("alice").is_ok());
    }

    #[test]
    fn test_listing_is_a_prefix_and_skips_broken_entries() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        for name in ["one", "two", "three"] {
            let mut meta = metadata("alice", "1.0");
            meta.name = name.to_string();
            f.registry.register(meta, &alice, None).unwrap();
        }
        f.store.sadd(keys::PACKAGES, "package:alice/ghost").unwrap();

        let all: Vec<String> = f
            .registry
            .list_all(None)
            .unwrap()
            .into_iter()
            .map(|v| v.package.metadata.name)
            .collect();
        assert_eq!(all, vec!["one", "two", "three"]);

        let first_two: Vec<String> = f
            .registry
            .list_all(Some(2))
            .unwrap()
            .into_iter()
            .map(|v| v.package.metadata.name)
            .collect();
        assert_eq!(first_two, all[..2]);
    }

    #[test]
    fn test_partial_registration_is_replaced() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();

        // Record and owner entry written, global index missing
        f.store.hset("package:alice/flowmon", "name", "flowmon").unwrap();
        f.store
            .sadd(&keys::account_packages("alice"), "package:alice/flowmon")
            .unwrap();
        assert!(matches!(
            f.registry.get("alice", "flowmon"),
            Err(RegistryError::NotFound(_))
        ));

        f.registry
            .register(metadata("alice", "1.0"), &alice, None)
            .unwrap();
        assert_eq!(
            f.registry.get("alice", "flowmon").unwrap().package.versions,
            vec!["1.0"]
        );
        assert_eq!(f.registry.list_all(None).unwrap().len(), 1);
    }

    #[test]
    fn test_indexed_package_without_record_is_replaced() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        f.store.sadd(keys::PACKAGES, "package:alice/flowmon").unwrap();
        f.store
            .sadd(&keys::account_packages("alice"), "package:alice/flowmon")
            .unwrap();

        f.registry
            .register(metadata("alice", "1.0"), &alice, None)
            .unwrap();
        assert!(f.registry.get("alice", "flowmon").is_ok());
    }

    #[test]
    fn test_partial_registration_can_be_deleted() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        f.store.hset("package:alice/flowmon", "name", "flowmon").unwrap();
        f.store
            .sadd(&keys::account_packages("alice"), "package:alice/flowmon")
            .unwrap();

        f.registry.delete("alice", "flowmon", &alice).unwrap();
        assert!(!f.store.exists("package:alice/flowmon").unwrap());
        assert_eq!(f.store.scard(&keys::account_packages("alice")).unwrap(), 0);

        assert!(matches!(
            f.registry.delete("alice", "flowmon", &alice),
            Err(RegistryError::NotFound(_))
        ));
        f.credentials.delete("alice").unwrap();
    }

    #[test]
    fn test_delete_keeps_record_when_artifacts_cannot_be_removed() {
        let f = fixture();
        let alice = f.credentials.get("alice").unwrap();
        f.registry
            .register(metadata("alice", "1.0"), &alice, Some(upload(b"v1")))
            .unwrap();

        // A non-empty directory named like a blob cannot be unlinked
        let stuck = f
            ._dir
            .path()
            .join("repo")
            .join("alice")
            .join("flowmon-20000101-1.napp");
        std::fs::create_dir_all(&stuck).unwrap();
        std::fs::write(stuck.join("keep"), b"x").unwrap();

        assert!(matches!(
            f.registry.delete("alice", "flowmon", &alice),
            Err(RegistryError::StorageFailure(_))
        ));
        assert!(f.registry.get("alice", "flowmon").is_ok());
        assert!(
            f.store
                .sismember(keys::PACKAGES, "package:alice/flowmon")
                .unwrap()
        );
    }
}
