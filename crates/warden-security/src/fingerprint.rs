//! Client environment probes and fingerprinting
//!
//! The fingerprint is a derived, non-cryptographic identifier used as the
//! rate-limiter key. It groups requests from one client environment; it
//! does not identify a person and is trivially spoofable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Transport the client reached the application over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportScheme {
    Http,
    Https,
}

/// Read-only signals sampled from the client environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEnvironment {
    pub user_agent: String,
    pub locale: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub timezone_offset_minutes: i32,
    pub canvas_signature: String,
    pub scheme: TransportScheme,
    pub storage_available: bool,
    pub crypto_available: bool,
}

impl Default for ClientEnvironment {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            locale: "en-US".to_string(),
            screen_width: 0,
            screen_height: 0,
            timezone_offset_minutes: 0,
            canvas_signature: String::new(),
            scheme: TransportScheme::Https,
            storage_available: true,
            crypto_available: true,
        }
    }
}

impl ClientEnvironment {
    /// Derive the rate-limiter key from the environment signals.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user_agent.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.locale.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.screen_width.to_le_bytes());
        hasher.update(self.screen_height.to_le_bytes());
        hasher.update(self.timezone_offset_minutes.to_le_bytes());
        hasher.update([0u8]);
        hasher.update(self.canvas_signature.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_secure_transport(&self) -> bool {
        self.scheme == TransportScheme::Https
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClientEnvironment {
        ClientEnvironment {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
            locale: "my-MM".to_string(),
            screen_width: 1920,
            screen_height: 1080,
            timezone_offset_minutes: -390,
            canvas_signature: "c4nv4s".to_string(),
            ..ClientEnvironment::default()
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_user_agent() {
        let mut other = sample();
        other.user_agent = "different".to_string();
        assert_ne!(sample().fingerprint(), other.fingerprint());
    }

    #[test]
    fn transport_check() {
        let mut env = sample();
        assert!(env.is_secure_transport());
        env.scheme = TransportScheme::Http;
        assert!(!env.is_secure_transport());
    }
}
