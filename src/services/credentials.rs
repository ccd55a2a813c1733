use super::clock::SharedClock;
use crate::database::SharedStore;
use crate::error::RegistryError;
use crate::models::account::{Account, NewAccount, PublicProfile};
use crate::models::codec::encode_bool;
use crate::models::keys;
use crate::models::validation::{validate_email, validate_identifier};
use log::{debug, warn};

/// Owns account records and password verification
#[derive(Debug, Clone)]
pub struct CredentialStore {
    store: SharedStore,
    clock: SharedClock,
    bcrypt_cost: u32,
}

impl CredentialStore {
    pub fn new(store: SharedStore, clock: SharedClock, bcrypt_cost: u32) -> Self {
        Self {
            store,
            clock,
            bcrypt_cost,
        }
    }

    /// Creates a disabled account. The set insert into the account index is
    /// the uniqueness claim; the record is written only once it succeeds.
    pub fn create(&self, new_account: NewAccount) -> Result<Account, RegistryError> {
        validate_identifier("username", &new_account.username)?;
        validate_email(&new_account.email)?;

        let password_hash = bcrypt::hash(&new_account.password, self.bcrypt_cost)?;
        let account = Account {
            username: new_account.username,
            email: new_account.email,
            first_name: new_account.first_name,
            last_name: new_account.last_name,
            phone: new_account.phone,
            city: new_account.city,
            state: new_account.state,
            country: new_account.country,
            password_hash,
            enabled: false,
            created_at: self.clock.now(),
        };

        let key = account.key();
        if !self.store.sadd(keys::ACCOUNTS, &key)? {
            return Err(RegistryError::DuplicateEntry(format!(
                "User {} already exists",
                account.username
            )));
        }

        if let Err(e) = self.store.hset_all(&key, &account.to_fields()) {
            warn!("Failed to write account {}, releasing username: {e}", account.username);
            self.store.srem(keys::ACCOUNTS, &key)?;
            return Err(e);
        }

        debug!("Account created: {}", account.username);
        Ok(account)
    }

    /// Returns the full record, password hash included
    pub fn get(&self, username: &str) -> Result<Account, RegistryError> {
        let key = keys::account(username);
        let not_found = || RegistryError::NotFound(format!("User {username} not found"));

        if !self.store.sismember(keys::ACCOUNTS, &key)? {
            return Err(not_found());
        }

        let fields = self.store.hgetall(&key)?;
        if fields.is_empty() {
            warn!("Account {username} is indexed but has no record");
            return Err(not_found());
        }

        Account::from_fields(&key, &fields)
    }

    pub fn exists(&self, username: &str) -> Result<bool, RegistryError> {
        match self.get(username) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn public_profile(&self, username: &str) -> Result<PublicProfile, RegistryError> {
        Ok(self.get(username)?.public_profile())
    }

    pub fn set_password(&self, username: &str, plaintext: &str) -> Result<(), RegistryError> {
        let account = self.get(username)?;
        let password_hash = bcrypt::hash(plaintext, self.bcrypt_cost)?;
        self.store.hset(&account.key(), "password", &password_hash)?;

        debug!("Password changed for {username}");
        Ok(())
    }

    /// True only when the account exists and the password matches
    pub fn check_auth(&self, username: &str, plaintext: &str) -> bool {
        match self.get(username) {
            Ok(account) => bcrypt::verify(plaintext, &account.password_hash).unwrap_or(false),
            Err(_) => false,
        }
    }

    pub fn enable(&self, username: &str) -> Result<(), RegistryError> {
        let account = self.get(username)?;
        self.store.hset(&account.key(), "enabled", &encode_bool(true))?;

        debug!("Account enabled: {username}");
        Ok(())
    }

    /// Disables the account and revokes its current token
    pub fn disable(&self, username: &str) -> Result<(), RegistryError> {
        let account = self.get(username)?;
        self.store.hset(&account.key(), "enabled", &encode_bool(false))?;

        let current = self.store.lrange(&keys::account_tokens(username), 0, 0)?;
        for token_key in current {
            self.revoke_token_key(&token_key)?;
        }

        debug!("Account disabled: {username}");
        Ok(())
    }

    /// Removes an account that owns no packages. Its tokens are revoked and
    /// kept; the token list and the record itself are removed.
    pub fn delete(&self, username: &str) -> Result<(), RegistryError> {
        let account = self.get(username)?;

        let owned = self.owned_packages(username)?;
        if owned > 0 {
            return Err(RegistryError::InvalidOperation(format!(
                "User {username} still owns {owned} package(s)"
            )));
        }

        let tokens_key = keys::account_tokens(username);
        for token_key in self.store.lrange(&tokens_key, 0, -1)? {
            self.revoke_token_key(&token_key)?;
        }

        let key = account.key();
        self.store.srem(keys::ACCOUNTS, &key)?;
        self.store.del(&key)?;
        self.store.del(&tokens_key)?;
        self.store.del(&keys::account_packages(username))?;

        debug!("Account deleted: {username}");
        Ok(())
    }

    /// Every readable account in index order
    pub fn list_all(&self) -> Result<Vec<Account>, RegistryError> {
        let mut accounts = Vec::new();
        for key in self.store.smembers(keys::ACCOUNTS)? {
            let Some(username) = keys::strip("user", &key) else {
                warn!("Skipping malformed account index entry {key}");
                continue;
            };
            match self.get(username) {
                Ok(account) => accounts.push(account),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(accounts)
    }

    /// Counts committed packages in the owner index. Entries left behind by
    /// an interrupted registration are dropped along with their records.
    fn owned_packages(&self, username: &str) -> Result<usize, RegistryError> {
        let owner_index = keys::account_packages(username);
        let mut owned = 0;

        for key in self.store.smembers(&owner_index)? {
            if self.store.sismember(keys::PACKAGES, &key)? && self.store.exists(&key)? {
                owned += 1;
                continue;
            }

            warn!("Dropping partial package {key} of {username}");
            self.store.srem(keys::PACKAGES, &key)?;
            self.store.del(&key)?;
            self.store.srem(&owner_index, &key)?;
        }

        Ok(owned)
    }

    fn revoke_token_key(&self, token_key: &str) -> Result<(), RegistryError> {
        if self.store.exists(token_key)? {
            self.store.hset(token_key, "expiration_time", "0")?;
        }
        Ok(())
    }
}
