use super::clock::SharedClock;
use super::credentials::CredentialStore;
use crate::database::SharedStore;
use crate::error::RegistryError;
use crate::models::account::Account;
use crate::models::comment::{Comment, CommentTarget, CommentView};
use crate::models::keys;
use log::{debug, warn};

/// Append-only comments on accounts and packages
#[derive(Debug, Clone)]
pub struct CommentLedger {
    store: SharedStore,
    credentials: CredentialStore,
    clock: SharedClock,
}

impl CommentLedger {
    pub fn new(store: SharedStore, credentials: CredentialStore, clock: SharedClock) -> Self {
        Self {
            store,
            credentials,
            clock,
        }
    }

    fn ensure_target(&self, target: &CommentTarget) -> Result<(), RegistryError> {
        let found = match target {
            CommentTarget::Account(username) => self.credentials.exists(username)?,
            CommentTarget::Package { .. } => {
                let key = target.record_key();
                self.store.sismember(keys::PACKAGES, &key)? && self.store.exists(&key)?
            }
        };

        if found {
            Ok(())
        } else {
            Err(RegistryError::NotFound(format!(
                "{} not found",
                target.record_key()
            )))
        }
    }

    pub fn add(
        &self,
        target: &CommentTarget,
        author: &Account,
        body: &str,
    ) -> Result<CommentView, RegistryError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(RegistryError::InvalidMetadata(
                "Comment body must not be empty".to_string(),
            ));
        }

        self.ensure_target(target)?;

        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            target: target.record_key(),
            author: author.username.clone(),
            created_at: self.clock.now(),
            body: body.to_string(),
        };

        let key = comment.key();
        self.store.hset_all(&key, &comment.to_fields())?;
        self.store.lpush(&target.list_key(), &key)?;

        debug!("Comment {} added to {}", comment.id, comment.target);
        Ok(CommentView::new(comment, author.public_profile()))
    }

    /// Comments oldest first, with author profiles resolved
    pub fn list_for(&self, target: &CommentTarget) -> Result<Vec<CommentView>, RegistryError> {
        self.ensure_target(target)?;

        let mut keys = self.store.lrange(&target.list_key(), 0, -1)?;
        keys.reverse();

        let mut views = Vec::with_capacity(keys.len());
        for key in keys {
            let fields = self.store.hgetall(&key)?;
            if fields.is_empty() {
                warn!("Skipping missing comment {key}");
                continue;
            }
            let comment = Comment::from_fields(&key, &fields)?;
            match self.credentials.public_profile(&comment.author) {
                Ok(author) => views.push(CommentView::new(comment, author)),
                Err(e) if e.is_not_found() => {
                    warn!("Skipping comment {} by removed user {}", comment.id, comment.author)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(views)
    }

    pub fn count(&self, target: &CommentTarget) -> Result<usize, RegistryError> {
        Ok(self.store.lrange(&target.list_key(), 0, -1)?.len())
    }

    /// Deletes every comment attached to `target`
    pub fn purge(&self, target: &CommentTarget) -> Result<usize, RegistryError> {
        let list_key = target.list_key();
        let keys = self.store.lrange(&list_key, 0, -1)?;
        for key in &keys {
            self.store.del(key)?;
        }
        self.store.del(&list_key)?;

        Ok(keys.len())
    }
}
