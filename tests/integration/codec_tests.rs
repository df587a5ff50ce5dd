//! Token codec integration tests through the public API.

use imagepack::codec::{slug, Alphabet, Slugger};
use imagepack::error::CodecError;

#[test]
fn test_short_round_trip_with_shuffled_alphabet() {
    // All 95 printable characters, in a fixed shuffled order
    let mut symbols: Vec<char> = (' '..='~').collect();
    symbols.reverse();
    symbols.rotate_left(17);
    let alphabet = Alphabet::new(symbols).unwrap();
    assert_eq!(alphabet.len(), 95);

    let slugger = Slugger::with_alphabet("test", alphabet.clone()).unwrap();
    let token = slugger.short("hello").unwrap();
    assert_eq!(slugger.unshort(&token).unwrap(), "hello");

    let other = Slugger::with_alphabet("other secret", alphabet).unwrap();
    assert_ne!(other.short("hello").unwrap(), token);
}

#[test]
fn test_tokens_are_url_safe() {
    let slugger = Slugger::new("test").unwrap();
    let values = [
        "/photos/2024/summer beach.jpg",
        "7 * 2 + 4",
        "~!@#$%^&*()_+{}|:\"<>?",
    ];
    for value in values {
        let token = slugger.short(value).unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "{token}"
        );
        assert_eq!(slugger.unshort(&token).unwrap(), value);
    }
}

#[test]
fn test_serialized_tuple_round_trip() {
    let slugger = Slugger::new("test").unwrap();
    let token = slugger.serialize(&("abc", 52u32, 192u32)).unwrap();
    let (short, height, width): (String, u32, u32) = slugger.unserialize(&token).unwrap();
    assert_eq!((short.as_str(), height, width), ("abc", 52, 192));
    assert!(slugger
        .verify_serialized(&token, &("abc", 52u32, 192u32))
        .unwrap());
    assert!(!slugger
        .verify_serialized(&token, &("abc", 52u32, 193u32))
        .unwrap());
}

#[test]
fn test_hash_depends_on_secret() {
    let a = Slugger::new("test").unwrap();
    let b = Slugger::new("test2").unwrap();
    let value = (640u32, 640u32, 12u8, 48.8566f64, 2.3522f64);

    assert_eq!(a.hash(&value).unwrap(), a.hash(&value).unwrap());
    assert_ne!(a.hash(&value).unwrap(), b.hash(&value).unwrap());
    assert!(a.verify_hash(&a.hash(&value).unwrap(), &value).unwrap());
}

#[test]
fn test_unknown_character_rejected() {
    let slugger = Slugger::new("test").unwrap();
    assert!(matches!(
        slugger.short("café"),
        Err(CodecError::UnknownCharacter { character: 'é', position: 3 })
    ));
}

#[test]
fn test_slug() {
    assert_eq!(slug(Some("Hello, World!")).as_deref(), Some("hello-world"));
    assert_eq!(slug(Some("  Crème brûlée  ")).as_deref(), Some("creme-brulee"));
    assert_eq!(slug(None), None);
}

#[test]
fn test_hash_is_unpadded_base64url() {
    let slugger = Slugger::new("test").unwrap();
    let hash = slugger.hash(&(52u32, 192u32, "abc")).unwrap();

    // 32-byte HMAC-SHA256 digest
    assert_eq!(hash.len(), 43);
    assert!(hash
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    assert!(!hash.ends_with('='));
}
