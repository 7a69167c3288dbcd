//! # warden-security
//!
//! Security primitives for the warden client-session security core.
//! Provides input sanitization, password policy checks, request rate
//! limiting, audit event logging, key-value persistence seams, and client
//! fingerprinting.
//!
//! Everything in this crate is a leaf service: no module here knows about
//! authentication state or routing. The stateful pieces (sessions, login
//! state machine, security gate) live in `warden-auth` and are composed on
//! top of these primitives.

pub mod audit;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod fingerprint;
pub mod password;
pub mod rate_limit;
pub mod sanitize;
pub mod store;
pub mod upload;

// Re-export main types
pub use audit::{AuditLog, EventDraft, EventFilter, EventKind, SecurityEvent, Severity};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuditConfig, RateLimitConfig, SecurityConfig};
pub use crypto::Obfuscator;
pub use fingerprint::{ClientEnvironment, TransportScheme};
pub use password::PasswordPolicy;
pub use rate_limit::{RateLimitInfo, RateLimiter};
pub use sanitize::{sanitize_input, validate_email, InputKind, InputValidator, ValidatedInput};
pub use store::{FailingStore, KeyValueStore, MemoryStore};
pub use upload::{FileUpload, UploadPolicy};

/// Common result type for security operations
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Security-related errors
#[derive(thiserror::Error, Debug)]
pub enum SecurityError {
    #[error("storage operation failed: {message}")]
    Storage { message: String },

    #[error("obfuscation failed: {message}")]
    Obfuscation { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl SecurityError {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an obfuscation error
    pub fn obfuscation(message: impl Into<String>) -> Self {
        Self::Obfuscation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
