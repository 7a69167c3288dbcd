//! Security configuration types

use crate::password::PasswordPolicy;
use crate::upload::UploadPolicy;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the security primitives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Request rate limiting
    pub rate_limit: RateLimitConfig,

    /// Audit event log
    pub audit: AuditConfig,

    /// Password composition policy
    pub password: PasswordPolicy,

    /// File-upload acceptance policy
    pub upload: UploadPolicy,

    /// Key for the advisory obfuscator. Ships with the client; documented
    /// as obfuscation only, never a confidentiality boundary.
    #[serde(default = "default_obfuscation_key")]
    pub obfuscation_key: String,
}

/// Sliding-window rate limit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window per client identifier
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

/// Audit log capacities and mirror location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// In-memory buffer capacity
    #[serde(default = "default_audit_capacity")]
    pub capacity: usize,

    /// Durable mirror capacity
    #[serde(default = "default_mirror_capacity")]
    pub mirror_capacity: usize,

    /// Store key holding the mirrored events
    #[serde(default = "default_mirror_key")]
    pub mirror_key: String,
}

fn default_max_requests() -> u32 {
    10
}
fn default_window_seconds() -> u64 {
    15 * 60
}
fn default_audit_capacity() -> usize {
    10_000
}
fn default_mirror_capacity() -> usize {
    1_000
}
fn default_mirror_key() -> String {
    "warden.audit".to_string()
}
fn default_obfuscation_key() -> String {
    "warden-client-embedded-key".to_string()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: default_audit_capacity(),
            mirror_capacity: default_mirror_capacity(),
            mirror_key: default_mirror_key(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            audit: AuditConfig::default(),
            password: PasswordPolicy::default(),
            upload: UploadPolicy::default(),
            obfuscation_key: default_obfuscation_key(),
        }
    }
}

impl SecurityConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit.max_requests == 0 {
            return Err("rate_limit.max_requests must be at least 1".to_string());
        }
        if self.rate_limit.window_seconds == 0 {
            return Err("rate_limit.window_seconds must be at least 1".to_string());
        }
        if self.audit.capacity == 0 || self.audit.mirror_capacity == 0 {
            return Err("audit capacities must be at least 1".to_string());
        }
        if self.audit.mirror_capacity > self.audit.capacity {
            return Err("audit.mirror_capacity cannot exceed audit.capacity".to_string());
        }
        if self.obfuscation_key.is_empty() {
            return Err("obfuscation_key must not be empty".to_string());
        }
        self.password.check()?;
        Ok(())
    }
}
