use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Unguessable token that gates access to a channel handle.
///
/// Keys are drawn from the operating system CSPRNG and stored hex-encoded.
/// The `Debug` impl never prints the key material.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretKey(String);

impl SecretKey {
    /// Minimum number of random bytes behind a key.
    pub const MIN_BYTES: usize = 16;

    /// Default number of random bytes behind a key.
    pub const DEFAULT_BYTES: usize = 32;

    /// Generate a fresh key of `bytes` random bytes (at least [`Self::MIN_BYTES`]).
    pub fn generate(bytes: usize) -> Self {
        let mut buf = vec![0u8; bytes.max(Self::MIN_BYTES)];
        OsRng.fill_bytes(&mut buf);
        Self(hex::encode(buf))
    }

    /// Parse a hex-encoded key, e.g. one read back from a snapshot.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() < Self::MIN_BYTES {
            return Err(TypeError::SecretKeyTooShort {
                min: Self::MIN_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The hex-encoded key.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Compare against a presented token without short-circuiting on the
    /// first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let ours = self.0.as_bytes();
        let theirs = candidate.as_bytes();
        if ours.len() != theirs.len() {
            return false;
        }
        ours.iter()
            .zip(theirs)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl TryFrom<String> for SecretKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<SecretKey> for String {
    fn from(key: SecretKey) -> Self {
        key.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_keys_have_requested_length() {
        let key = SecretKey::generate(32);
        assert_eq!(key.expose().len(), 64);
    }

    #[test]
    fn short_requests_are_raised_to_minimum() {
        let key = SecretKey::generate(4);
        assert_eq!(key.expose().len(), SecretKey::MIN_BYTES * 2);
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(SecretKey::generate(32), SecretKey::generate(32));
    }

    #[test]
    fn debug_is_redacted() {
        let key = SecretKey::generate(32);
        let dbg = format!("{key:?}");
        assert_eq!(dbg, "SecretKey(..)");
        assert!(!dbg.contains(key.expose()));
    }

    #[test]
    fn from_hex_validates() {
        assert!(matches!(
            SecretKey::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
        assert_eq!(
            SecretKey::from_hex("abcd"),
            Err(TypeError::SecretKeyTooShort { min: 16, actual: 2 })
        );
    }

    #[test]
    fn serde_round_trip() {
        let key = SecretKey::generate(32);
        let json = serde_json::to_string(&key).unwrap();
        let back: SecretKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn serde_rejects_short_keys() {
        let result: Result<SecretKey, _> = serde_json::from_str("\"abcd\"");
        assert!(result.is_err());
    }

    #[test]
    fn matches_exact_token_only() {
        let key = SecretKey::generate(32);
        assert!(key.matches(key.expose()));
        assert!(!key.matches(""));
        assert!(!key.matches(&key.expose()[1..]));
        let mut tampered = key.expose().to_string();
        tampered.replace_range(0..1, if tampered.starts_with('0') { "1" } else { "0" });
        assert!(!key.matches(&tampered));
    }

    proptest! {
        #[test]
        fn hex_round_trip(bytes in proptest::collection::vec(any::<u8>(), 16..64)) {
            let encoded = hex::encode(&bytes);
            let key = SecretKey::from_hex(&encoded).unwrap();
            prop_assert_eq!(key.expose(), encoded.as_str());
        }
    }
}
