//! In-process mock identity backend
//!
//! Holds accounts in memory with argon2-hashed secrets and simulates
//! network latency. Stands in for a real authentication service behind the
//! [`IdentityProvider`] seam; nothing outside this module may assume the
//! backend is local.

use crate::hash::{Argon2Hasher, PasswordHasher};
use crate::traits::{AuthOutcome, IdentityProvider, Role, User};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

struct MockAccount {
    uid: String,
    name: String,
    role: Role,
    password_hash: String,
    /// Hash of a legacy password still accepted at login; using it forces a
    /// password change.
    legacy_password_hash: Option<String>,
    must_change_password: bool,
}

/// Mock identity backend with a configurable account table
pub struct MockIdentityProvider {
    accounts: Mutex<HashMap<String, MockAccount>>,
    hasher: Argon2Hasher,
    latency: Duration,
}

impl MockIdentityProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            hasher: Argon2Hasher::development(),
            latency: Duration::from_millis(50),
        }
    }

    /// Provider pre-loaded with the demo HR accounts
    pub fn seeded() -> Self {
        let provider = Self::new();
        provider.add_account("admin@pdf.gov.mm", "admin123", "Administrator", Role::Admin);
        provider.set_legacy_password("admin@pdf.gov.mm", "pdf2024");
        provider.add_account("user@pdf.gov.mm", "user123", "Staff User", Role::User);
        provider
    }

    /// Set the simulated network latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add or replace an account
    pub fn add_account(&self, email: &str, password: &str, name: &str, role: Role) {
        let hash = self.hasher.hash_password(password).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "seeding hash failed, account will not authenticate");
            String::new()
        });
        let uid = format!("uid-{}", email);
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                email.to_string(),
                MockAccount {
                    uid,
                    name: name.to_string(),
                    role,
                    password_hash: hash,
                    legacy_password_hash: None,
                    must_change_password: false,
                },
            );
    }

    /// Attach a legacy password to an existing account. Logging in with it
    /// succeeds but flags the account for a mandatory password change.
    pub fn set_legacy_password(&self, email: &str, legacy_password: &str) {
        let hash = self.hasher.hash_password(legacy_password).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "seeding hash failed, legacy password disabled");
            String::new()
        });
        if let Some(account) = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(email)
        {
            account.legacy_password_hash = Some(hash);
        }
    }

    fn to_user(email: &str, account: &MockAccount, must_change: bool) -> User {
        User {
            uid: account.uid.clone(),
            email: email.to_string(),
            name: account.name.clone(),
            role: account.role,
            must_change_password: must_change,
        }
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::seeded()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn authenticate(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        tokio::time::sleep(self.latency).await;

        let accounts = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Unknown account and wrong password produce the identical error
        let account = accounts.get(email).ok_or(AuthError::InvalidCredentials)?;

        if self.hasher.verify_password(password, &account.password_hash)? {
            let must_change = account.must_change_password;
            return Ok(AuthOutcome {
                user: Self::to_user(email, account, must_change),
                requires_password_change: must_change,
            });
        }

        if let Some(legacy) = &account.legacy_password_hash {
            if self.hasher.verify_password(password, legacy)? {
                return Ok(AuthOutcome {
                    user: Self::to_user(email, account, true),
                    requires_password_change: true,
                });
            }
        }

        Err(AuthError::InvalidCredentials)
    }

    async fn change_password(&self, uid: &str, current: &str, new: &str) -> AuthResult<()> {
        tokio::time::sleep(self.latency).await;

        let mut accounts = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let account = accounts
            .values_mut()
            .find(|a| a.uid == uid)
            .ok_or(AuthError::InvalidCredentials)?;

        let current_ok = self
            .hasher
            .verify_password(current, &account.password_hash)?
            || match &account.legacy_password_hash {
                Some(legacy) => self.hasher.verify_password(current, legacy)?,
                None => false,
            };
        if !current_ok {
            return Err(AuthError::InvalidCredentials);
        }

        account.password_hash = self.hasher.hash_password(new)?;
        account.legacy_password_hash = None;
        account.must_change_password = false;
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
