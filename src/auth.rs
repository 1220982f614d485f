// 🔑 Owner accounts
// Simulated login for the business owner, persisted in the key-value store.
// Passwords are kept and compared in plaintext; this is not real security.

use crate::config::SeedAccount;
use crate::error::AuthError;
use crate::store::{get_json, set_json, KeyValueStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const OWNERS_KEY: &str = "library_owners";
const CURRENT_USER_KEY: &str = "current_library_owner";

// ============================================================================
// TYPES
// ============================================================================

/// Owner as shown to callers (never carries the password).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub library_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredOwner {
    #[serde(flatten)]
    profile: OwnerProfile,
    password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub username: String,
    pub email: String,
    pub password: String,
    pub library_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultCredentials {
    pub username: String,
    pub email: String,
    pub password: String,
}

// ============================================================================
// AUTH SERVICE
// ============================================================================

pub struct AuthService<S: KeyValueStore> {
    store: S,
    seed: SeedAccount,
}

impl<S: KeyValueStore> AuthService<S> {
    pub fn new(store: S, seed: SeedAccount) -> Self {
        AuthService { store, seed }
    }

    fn seed_owner(&self) -> StoredOwner {
        StoredOwner {
            profile: OwnerProfile {
                id: format!("seed-{}", self.seed.username.to_lowercase()),
                username: self.seed.username.clone(),
                email: self.seed.email.clone(),
                library_name: self.seed.library_name.clone(),
                created_at: Utc::now(),
            },
            password: self.seed.password.clone(),
        }
    }

    /// Stored owners, with the seed account always present and carrying the
    /// configured password, email and library name.
    fn owners(&self) -> Result<Vec<StoredOwner>, AuthError> {
        let mut owners: Vec<StoredOwner> = match get_json(&self.store, OWNERS_KEY) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "stored owners unreadable, falling back to seed account");
                Vec::new()
            }
        };

        match owners
            .iter_mut()
            .find(|o| o.profile.username == self.seed.username)
        {
            Some(stored) => {
                stored.password = self.seed.password.clone();
                stored.profile.email = self.seed.email.clone();
                stored.profile.library_name = self.seed.library_name.clone();
            }
            None => owners.insert(0, self.seed_owner()),
        }

        Ok(owners)
    }

    /// Make sure the seed owner is persisted.
    pub fn initialize(&self) -> Result<(), AuthError> {
        let owners = self.owners()?;
        set_json(&self.store, OWNERS_KEY, &owners)?;
        Ok(())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<OwnerProfile, AuthError> {
        let owner = self
            .owners()?
            .into_iter()
            .find(|o| o.profile.username == username && o.password == password)
            .ok_or(AuthError::InvalidCredentials)?;

        set_json(&self.store, CURRENT_USER_KEY, &owner.profile)?;
        info!(username = %owner.profile.username, "owner logged in");

        Ok(owner.profile)
    }

    pub fn register(&self, data: RegisterData) -> Result<OwnerProfile, AuthError> {
        let mut owners = self.owners()?;

        let taken = owners
            .iter()
            .any(|o| o.profile.username == data.username || o.profile.email == data.email);
        if taken {
            return Err(AuthError::DuplicateAccount);
        }

        let owner = StoredOwner {
            profile: OwnerProfile {
                id: uuid::Uuid::new_v4().to_string(),
                username: data.username,
                email: data.email,
                library_name: data.library_name,
                created_at: Utc::now(),
            },
            password: data.password,
        };
        let profile = owner.profile.clone();

        owners.push(owner);
        set_json(&self.store, OWNERS_KEY, &owners)?;
        set_json(&self.store, CURRENT_USER_KEY, &profile)?;
        info!(username = %profile.username, "owner registered");

        Ok(profile)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.remove(CURRENT_USER_KEY)?;
        Ok(())
    }

    /// Logged-in owner; an unreadable session counts as logged out.
    pub fn current_user(&self) -> Option<OwnerProfile> {
        get_json(&self.store, CURRENT_USER_KEY).ok().flatten()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    pub fn default_credentials(&self) -> DefaultCredentials {
        DefaultCredentials {
            username: self.seed.username.clone(),
            email: self.seed.email.clone(),
            password: self.seed.password.clone(),
        }
    }

    /// Forget every registered owner except the seed, and log out.
    pub fn clear_all_credentials(&self) -> Result<(), AuthError> {
        set_json(&self.store, OWNERS_KEY, &[self.seed_owner()])?;
        self.store.remove(CURRENT_USER_KEY)?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
