//! Reversible short tokens and keyed digests.
//!
//! # Token Scheme
//!
//! `short` rotates every character's alphabet position by a secret-derived
//! offset and base64url-encodes the resulting bytes:
//!
//! ```text
//! byte(c) = (position(c) - offset) mod N
//! token   = base64url(bytes)              (no padding)
//! ```
//!
//! `unshort` decodes and maps each byte `b` back to `alphabet[(b + offset) mod N]`.
//! This is obfuscation, not encryption. Integrity comes from [`Slugger::hash`],
//! an HMAC-SHA256 over the secret.
//!
//! # Example
//!
//! ```rust
//! use imagepack::codec::Slugger;
//!
//! let slugger = Slugger::new("my-secret").unwrap();
//! let token = slugger.short("/images/photo.jpeg").unwrap();
//! assert_eq!(slugger.unshort(&token).unwrap(), "/images/photo.jpeg");
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::alphabet::Alphabet;
use crate::error::CodecError;

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Slugger
// =============================================================================

/// Keyed codec producing reversible short tokens and one-way hashes.
#[derive(Debug, Clone)]
pub struct Slugger {
    alphabet: Alphabet,
    secret: String,
    offset: usize,
}

impl Slugger {
    /// Create a codec over the default printable alphabet.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NotConfigured`] for an empty secret and
    /// [`CodecError::UnknownCharacter`] if the secret is not printable ASCII.
    pub fn new(secret: &str) -> Result<Self, CodecError> {
        Self::with_alphabet(secret, Alphabet::printable())
    }

    /// Create a codec over a custom alphabet.
    pub fn with_alphabet(secret: &str, alphabet: Alphabet) -> Result<Self, CodecError> {
        if secret.is_empty() {
            return Err(CodecError::NotConfigured("empty secret"));
        }
        let offset = alphabet.offset(secret)?;
        Ok(Self {
            alphabet,
            secret: secret.to_string(),
            offset,
        })
    }

    /// The alphabet in use.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The secret-derived rotation.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Encode `text` into a reversible URL-safe token.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownCharacter`] if `text` contains a character
    /// absent from the alphabet.
    pub fn short(&self, text: &str) -> Result<String, CodecError> {
        let count = self.alphabet.len();
        let mut raw = Vec::with_capacity(text.len());

        for (position, character) in text.chars().enumerate() {
            let index = self
                .alphabet
                .position(character)
                .ok_or(CodecError::UnknownCharacter {
                    character,
                    position,
                })?;
            // count <= 256, so the rotated index always fits a byte
            raw.push(((index + count - self.offset) % count) as u8);
        }

        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Decode a token produced by [`short`](Self::short).
    ///
    /// Padded and unpadded input are both accepted. The recovered text is not
    /// checked for meaning.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] for malformed base64url.
    pub fn unshort(&self, token: &str) -> Result<String, CodecError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        let count = self.alphabet.len();
        raw.iter()
            .map(|&byte| {
                self.alphabet
                    .char_at((byte as usize + self.offset) % count)
                    .ok_or_else(|| CodecError::Decode(format!("byte {byte} outside alphabet")))
            })
            .collect()
    }

    /// JSON-encode `value`, then [`short`](Self::short) it.
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CodecError> {
        let json = serde_json::to_string(value).map_err(|e| CodecError::Json(e.to_string()))?;
        self.short(&json)
    }

    /// [`unshort`](Self::unshort) a token, then JSON-decode it.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the token is malformed or the text is
    /// not valid JSON for `T`.
    pub fn unserialize<T: DeserializeOwned>(&self, token: &str) -> Result<T, CodecError> {
        let json = self.unshort(token)?;
        serde_json::from_str(&json).map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Keyed digest of a structured value, JSON-encoded first.
    pub fn hash<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CodecError> {
        let json = serde_json::to_string(value).map_err(|e| CodecError::Json(e.to_string()))?;
        self.hash_str(&json)
    }

    /// Keyed digest of a raw string.
    pub fn hash_str(&self, value: &str) -> Result<String, CodecError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| CodecError::NotConfigured("invalid HMAC key"))?;
        mac.update(value.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Check `expected` against `hash(value)` in constant time.
    pub fn verify_hash<T: Serialize + ?Sized>(
        &self,
        expected: &str,
        value: &T,
    ) -> Result<bool, CodecError> {
        let computed = self.hash(value)?;
        Ok(constant_time_eq(expected, &computed))
    }

    /// Check `expected` against `hash_str(value)` in constant time.
    pub fn verify_hash_str(&self, expected: &str, value: &str) -> Result<bool, CodecError> {
        let computed = self.hash_str(value)?;
        Ok(constant_time_eq(expected, &computed))
    }

    /// Check `expected` against `serialize(value)` in constant time.
    pub fn verify_serialized<T: Serialize + ?Sized>(
        &self,
        expected: &str,
        value: &T,
    ) -> Result<bool, CodecError> {
        let computed = self.serialize(value)?;
        Ok(constant_time_eq(expected, &computed))
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slugger() -> Slugger {
        Slugger::new("test").unwrap()
    }

    #[test]
    fn test_short_round_trip() {
        let s = slugger();
        let token = s.short("hello").unwrap();
        assert_eq!(s.unshort(&token).unwrap(), "hello");
    }

    #[test]
    fn test_round_trip_every_symbol() {
        let s = slugger();
        let all: String = s.alphabet().symbols().collect();
        let token = s.short(&all).unwrap();
        assert_eq!(s.unshort(&token).unwrap(), all);
    }

    #[test]
    fn test_short_is_url_safe_without_padding() {
        let s = slugger();
        for text in ["a", "ab", "abc", "/some/path with spaces.png", "~!@#$%^&*()"] {
            let token = s.short(text).unwrap();
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
                "{token}"
            );
        }
    }

    #[test]
    fn test_short_is_deterministic() {
        assert_eq!(slugger().short("hello").unwrap(), slugger().short("hello").unwrap());
    }

    #[test]
    fn test_secret_changes_token() {
        let other = Slugger::new("other secret").unwrap();
        assert_ne!(slugger().offset(), other.offset());
        assert_ne!(slugger().short("hello").unwrap(), other.short("hello").unwrap());
    }

    #[test]
    fn test_unknown_character() {
        let err = slugger().short("caf\u{e9}").unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnknownCharacter {
                character: '\u{e9}',
                position: 3
            }
        ));
    }

    #[test]
    fn test_unshort_accepts_padding() {
        let s = slugger();
        let token = s.short("a").unwrap();
        assert_eq!(s.unshort(&format!("{token}==")).unwrap(), "a");
    }

    #[test]
    fn test_unshort_malformed() {
        assert!(matches!(slugger().unshort("not*base64"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_empty_secret() {
        assert!(matches!(Slugger::new(""), Err(CodecError::NotConfigured(_))));
    }

    #[test]
    fn test_serialize_round_trip() {
        let s = slugger();
        let value = json!(["c2hvcnQ", 480, 640, {"nested": [1.5, null, true]}]);
        let token = s.serialize(&value).unwrap();
        let back: serde_json::Value = s.unserialize(&token).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_unserialize_invalid_json() {
        let s = slugger();
        let token = s.short("{not json").unwrap();
        assert!(matches!(
            s.unserialize::<serde_json::Value>(&token),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_hash_deterministic_and_sensitive() {
        let s = slugger();
        let a = s.hash(&(256, 256, 15, 48.8566, 2.3522)).unwrap();
        let b = s.hash(&(256, 256, 15, 48.8566, 2.3522)).unwrap();
        let c = s.hash(&(256, 256, 15, 48.8566, 2.3523)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        // 32 byte digest, unpadded base64
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_hash_avalanche() {
        let s = slugger();
        let base = s.hash_str("parameter-0").unwrap();
        for i in 1..50 {
            assert_ne!(s.hash_str(&format!("parameter-{i}")).unwrap(), base);
        }
    }

    #[test]
    fn test_hash_depends_on_secret() {
        let other = Slugger::new("another").unwrap();
        assert_ne!(slugger().hash_str("x").unwrap(), other.hash_str("x").unwrap());
    }

    #[test]
    fn test_verify() {
        let s = slugger();
        let value = ["abc", "def"];
        let hash = s.hash(&value).unwrap();
        assert!(s.verify_hash(&hash, &value).unwrap());
        assert!(!s.verify_hash("tampered", &value).unwrap());

        let serialized = s.serialize(&value).unwrap();
        assert!(s.verify_serialized(&serialized, &value).unwrap());
        assert!(!s.verify_serialized(&hash, &value).unwrap());
    }
}
