use super::clock::SharedClock;
use super::credentials::CredentialStore;
use crate::database::SharedStore;
use crate::error::RegistryError;
use crate::models::account::Account;
use crate::models::keys;
use crate::models::token::{Token, TokenClass, TokenState};
use log::{debug, warn};
use rand::RngCore;

/// Lifetimes, in seconds, of each token class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub confirmation_secs: i64,
    pub session_secs: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            confirmation_secs: 86400,
            session_secs: 900,
        }
    }
}

impl TokenLifetimes {
    pub fn for_class(&self, class: TokenClass) -> i64 {
        match class {
            TokenClass::Confirmation => self.confirmation_secs,
            TokenClass::Session => self.session_secs,
        }
    }
}

/// Result of a successful validation
#[derive(Debug, Clone)]
pub struct TokenValidation {
    pub account: Account,
    pub remaining_secs: i64,
}

/// Issues, validates and revokes tokens
#[derive(Debug, Clone)]
pub struct TokenManager {
    store: SharedStore,
    credentials: CredentialStore,
    clock: SharedClock,
    lifetimes: TokenLifetimes,
}

impl TokenManager {
    pub fn new(
        store: SharedStore,
        credentials: CredentialStore,
        clock: SharedClock,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            store,
            credentials,
            clock,
            lifetimes,
        }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Issues a token for `username` and makes it the account's current token.
    /// Session tokens are only issued to enabled accounts.
    pub fn issue(&self, username: &str, class: TokenClass) -> Result<Token, RegistryError> {
        let account = self.credentials.get(username)?;
        if class == TokenClass::Session && !account.enabled {
            return Err(RegistryError::InvalidOperation(format!(
                "User {username} is not enabled"
            )));
        }

        self.issue_for(&account, self.lifetimes.for_class(class))
    }

    fn issue_for(&self, account: &Account, expiration_secs: i64) -> Result<Token, RegistryError> {
        let token = Token {
            hash: generate_hash(),
            created_at: self.clock.now(),
            owner: account.username.clone(),
            expiration_secs,
        };
        token.expires_at()?;

        let key = token.key();
        self.store.hset_all(&key, &token.to_fields())?;
        self.store.sadd(keys::TOKENS, &key)?;
        self.store
            .lpush(&keys::account_tokens(&account.username), &key)?;

        debug!(
            "Token issued for {} ({}s)",
            account.username, token.expiration_secs
        );
        Ok(token)
    }

    /// Loads a token record whatever its state
    pub fn find(&self, hash: &str) -> Result<Token, RegistryError> {
        if !is_well_formed(hash) {
            return Err(RegistryError::TokenNotFound);
        }

        let key = keys::token(hash);
        let fields = self.store.hgetall(&key)?;
        if fields.is_empty() {
            return Err(RegistryError::TokenNotFound);
        }

        Token::from_fields(&key, &fields)
    }

    /// Read-only check of a token against the clock
    pub fn validate(&self, hash: &str) -> Result<TokenValidation, RegistryError> {
        let token = self.find(hash)?;

        match token.state_at(self.clock.now())? {
            TokenState::Active { remaining_secs } => {
                let account = self.credentials.get(&token.owner).map_err(|e| {
                    if e.is_not_found() {
                        RegistryError::TokenNotFound
                    } else {
                        e
                    }
                })?;
                Ok(TokenValidation {
                    account,
                    remaining_secs,
                })
            }
            TokenState::Expired | TokenState::Revoked => Err(RegistryError::TokenExpired),
        }
    }

    /// Forces the token's duration to zero. Revoking twice is harmless.
    pub fn revoke(&self, hash: &str) -> Result<(), RegistryError> {
        let token = self.find(hash)?;
        self.store.hset(&token.key(), "expiration_time", "0")?;

        debug!("Token revoked for {}", token.owner);
        Ok(())
    }

    /// Owning account of an active token
    pub fn owner_of(&self, hash: &str) -> Result<Account, RegistryError> {
        Ok(self.validate(hash)?.account)
    }

    /// The most recently issued token of the account, if any
    pub fn current(&self, username: &str) -> Result<Option<Token>, RegistryError> {
        let head = self.store.lrange(&keys::account_tokens(username), 0, 0)?;
        let Some(token_key) = head.first() else {
            return Ok(None);
        };

        let Some(hash) = keys::strip("token", token_key) else {
            warn!("Malformed token reference {token_key} for {username}");
            return Ok(None);
        };

        match self.find(hash) {
            Ok(token) => Ok(Some(token)),
            Err(RegistryError::TokenNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Completes registration: the token must be the account's current,
    /// active token. On success the account is enabled and the token revoked.
    pub fn confirm_account(&self, username: &str, hash: &str) -> Result<Account, RegistryError> {
        self.credentials.get(username)?;

        let current = self
            .current(username)?
            .ok_or(RegistryError::TokenNotFound)?;
        if current.hash != hash {
            return Err(RegistryError::TokenNotFound);
        }

        let validation = self.validate(hash)?;
        if validation.account.username != username {
            return Err(RegistryError::TokenNotFound);
        }

        self.credentials.enable(username)?;
        self.revoke(hash)?;

        self.credentials.get(username)
    }
}

/// 256 random bits, hex encoded
pub fn generate_hash() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_well_formed(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}
