//! Authentication and session-security error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication errors
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// Wrong credentials. Deliberately generic: never reveals whether the
    /// email exists.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Account is locked after repeated failures
    #[error("Account locked. Try again in {retry_after_seconds} seconds")]
    AccountLocked { retry_after_seconds: i64 },

    /// Client identifier is throttled
    #[error("Too many attempts. Try again in {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: i64 },

    /// Input failed validation; carries every violated rule
    #[error("Validation failed: {}", messages.join("; "))]
    Validation { messages: Vec<String> },

    /// Session has expired
    #[error("Session expired")]
    SessionExpired,

    /// Session-related errors
    #[error("Session error: {message}")]
    Session { message: String },

    /// Identity backend failure
    #[error("Authentication service error: {message}")]
    Provider { message: String },

    /// Durable storage failure
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Authorization failure
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Cryptographic errors
    #[error("Cryptographic error: {message}")]
    Cryptographic { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AuthError {
    /// Stable code for API-style consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            AuthError::RateLimited { .. } => "RATE_LIMITED",
            AuthError::Validation { .. } => "VALIDATION_FAILED",
            AuthError::SessionExpired => "SESSION_EXPIRED",
            AuthError::Session { .. } => "SESSION_ERROR",
            AuthError::Provider { .. } => "PROVIDER_ERROR",
            AuthError::Storage { .. } => "STORAGE_ERROR",
            AuthError::AccessDenied { .. } => "ACCESS_DENIED",
            AuthError::Cryptographic { .. } => "CRYPTOGRAPHIC_ERROR",
            AuthError::Configuration { .. } => "CONFIGURATION_ERROR",
        }
    }

    /// Create a validation error from a single message
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            messages: vec![message.into()],
        }
    }

    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an access denied error
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Create a cryptographic error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Cryptographic {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<warden_security::SecurityError> for AuthError {
    fn from(err: warden_security::SecurityError) -> Self {
        match err {
            warden_security::SecurityError::Storage { message } => Self::Storage { message },
            warden_security::SecurityError::Obfuscation { message } => {
                Self::Cryptographic { message }
            }
            warden_security::SecurityError::Config { message } => Self::Configuration { message },
        }
    }
}
