//! Token generation and advisory obfuscation
//!
//! The [`Obfuscator`] is a keystream cipher keyed by a value that ships
//! inside the client bundle. It hides data from casual inspection only.
//! It is NOT a confidentiality boundary: anyone who can read the client
//! can read the key. Nothing in this crate may treat it as secure storage.

use crate::clock::Clock;
use crate::{SecurityError, SecurityResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 16;

/// Generate `n_bytes` of CSPRNG-backed randomness, hex encoded.
pub fn secure_random_hex(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Generate an opaque session identifier.
///
/// Derived by hashing the current timestamp together with 32 random bytes;
/// practically unique, but the issuance time is folded into the digest, so
/// the ID is not unlinkable from when it was minted.
pub fn generate_session_id(clock: &dyn Clock) -> String {
    let mut random = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random);

    let mut hasher = Sha256::new();
    hasher.update(clock.now().timestamp_millis().to_le_bytes());
    hasher.update(random);
    hex::encode(hasher.finalize())
}

/// Generate a CSRF-style token (32 random bytes, hex)
pub fn generate_csrf_token() -> String {
    secure_random_hex(32)
}

/// Keystream obfuscator with a static, client-embedded key.
///
/// Output layout: base64(nonce || plaintext XOR keystream(key, nonce)).
#[derive(Debug, Clone)]
pub struct Obfuscator {
    key: Vec<u8>,
}

impl Obfuscator {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.as_bytes().to_vec(),
        }
    }

    fn keystream_block(&self, nonce: &[u8], counter: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        hasher.update(nonce);
        hasher.update(counter.to_le_bytes());
        hasher.finalize().into()
    }

    fn apply_keystream(&self, nonce: &[u8], data: &mut [u8]) {
        for (i, chunk) in data.chunks_mut(32).enumerate() {
            let block = self.keystream_block(nonce, i as u64);
            for (byte, key_byte) in chunk.iter_mut().zip(block.iter()) {
                *byte ^= key_byte;
            }
        }
    }

    /// Obfuscate a string. Infallible; fresh nonce per call.
    pub fn encode(&self, plaintext: &str) -> String {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut data = plaintext.as_bytes().to_vec();
        self.apply_keystream(&nonce, &mut data);

        let mut out = Vec::with_capacity(NONCE_LEN + data.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&data);
        BASE64.encode(out)
    }

    /// Reverse [`Obfuscator::encode`]. Fails on malformed input or a key
    /// mismatch that yields invalid UTF-8.
    pub fn decode(&self, encoded: &str) -> SecurityResult<String> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| SecurityError::obfuscation(format!("invalid base64: {}", e)))?;
        if raw.len() < NONCE_LEN {
            return Err(SecurityError::obfuscation("payload too short"));
        }
        let (nonce, data) = raw.split_at(NONCE_LEN);
        let mut data = data.to_vec();
        self.apply_keystream(nonce, &mut data);
        String::from_utf8(data)
            .map_err(|_| SecurityError::obfuscation("decoded payload is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn obfuscator_round_trips() {
        let obfuscator = Obfuscator::new("bundle-embedded-key");
        let encoded = obfuscator.encode("fingerprint:abc123");
        assert_ne!(encoded, "fingerprint:abc123");
        assert_eq!(obfuscator.decode(&encoded).unwrap(), "fingerprint:abc123");
    }

    #[test]
    fn obfuscator_uses_fresh_nonce_per_call() {
        let obfuscator = Obfuscator::new("key");
        assert_ne!(obfuscator.encode("same"), obfuscator.encode("same"));
    }

    #[test]
    fn decode_rejects_garbage() {
        let obfuscator = Obfuscator::new("key");
        assert!(obfuscator.decode("not base64 !!!").is_err());
        assert!(obfuscator.decode("c2hvcnQ=").is_err()); // shorter than nonce
    }

    #[test]
    fn session_ids_are_unique_hex_digests() {
        let clock = SystemClock;
        let a = generate_session_id(&clock);
        let b = generate_session_id(&clock);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn random_hex_has_requested_length() {
        assert_eq!(secure_random_hex(16).len(), 32);
        assert_eq!(generate_csrf_token().len(), 64);
    }
}
