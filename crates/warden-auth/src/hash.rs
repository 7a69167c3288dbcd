//! Password hashing

use crate::{AuthError, AuthResult};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use rand::thread_rng;

/// Password hasher seam
pub trait PasswordHasher: Send + Sync {
    /// Hash a password
    fn hash_password(&self, password: &str) -> AuthResult<String>;

    /// Verify a password against its hash
    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool>;

    /// Get the hasher name
    fn hasher_name(&self) -> &str;
}

/// Argon2id password hasher
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Argon2Hasher {
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Production parameters (64 MB, 3 iterations)
    pub fn production() -> Self {
        Self::new(65536, 3, 4)
    }

    /// Fast parameters for development and tests (4 MB, 2 iterations)
    pub fn development() -> Self {
        Self::new(4096, 2, 2)
    }

    fn instance(&self) -> AuthResult<Argon2<'static>> {
        let params =
            argon2::Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
                .map_err(|e| AuthError::crypto(e.to_string()))?;
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::production()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut thread_rng());
        let hash = self
            .instance()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::crypto(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| AuthError::crypto(e.to_string()))?;
        match self.instance()?.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    fn hasher_name(&self) -> &str {
        "argon2"
    }
}
