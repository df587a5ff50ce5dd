//! Symbol table for the reversible token codec.
//!
//! An [`Alphabet`] is an ordered set of distinct characters. The codec maps a
//! character to its position (one byte) and back, so the table must be an
//! exact bijection with at most 256 entries.

use std::collections::HashMap;

use crate::error::CodecError;

/// Maximum number of symbols addressable with one byte.
pub const MAX_ALPHABET_LEN: usize = 256;

/// Character ranges concatenated, in order, to build the default alphabet.
///
/// A range whose start is greater than its end is walked downwards. Later
/// ranges overlap earlier ones; only the first occurrence of a character is
/// kept.
const DEFAULT_RANGES: [(char, char); 23] = [
    ('^', '['),
    ('V', 'Z'),
    ('9', '7'),
    ('L', 'O'),
    ('f', 'a'),
    ('_', '`'),
    ('3', '0'),
    ('E', 'H'),
    ('v', 'r'),
    ('+', '/'),
    ('K', 'I'),
    ('g', 'j'),
    ('=', ':'),
    ('>', '@'),
    ('m', 'k'),
    ('4', '6'),
    ('*', '%'),
    ('n', 'q'),
    ('U', 'P'),
    (' ', '$'),
    ('D', 'A'),
    ('w', 'z'),
    ('~', '!'),
];

// =============================================================================
// Alphabet
// =============================================================================

/// Ordered, duplicate-free character table.
///
/// `position(char_at(i)) == Some(i)` and `char_at(position(c)) == Some(c)` hold
/// for every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
    positions: HashMap<char, u8>,
}

impl Alphabet {
    /// Build an alphabet from an explicit sequence.
    ///
    /// # Errors
    ///
    /// - [`CodecError::NotConfigured`] if the sequence is empty
    /// - [`CodecError::InvalidAlphabet`] if a character appears twice
    /// - [`CodecError::AlphabetTooLarge`] if there are more than 256 symbols
    pub fn new(symbols: impl IntoIterator<Item = char>) -> Result<Self, CodecError> {
        let symbols: Vec<char> = symbols.into_iter().collect();

        if symbols.is_empty() {
            return Err(CodecError::NotConfigured("empty alphabet"));
        }
        if symbols.len() > MAX_ALPHABET_LEN {
            return Err(CodecError::AlphabetTooLarge { len: symbols.len() });
        }

        let mut positions = HashMap::with_capacity(symbols.len());
        for (position, &character) in symbols.iter().enumerate() {
            // position < 256 is guaranteed by the length check above
            if positions.insert(character, position as u8).is_some() {
                return Err(CodecError::InvalidAlphabet {
                    character,
                    position,
                });
            }
        }

        Ok(Self { symbols, positions })
    }

    /// Build an alphabet from a sequence that may repeat characters, keeping
    /// the first occurrence of each.
    pub fn deduplicated(sequence: impl IntoIterator<Item = char>) -> Result<Self, CodecError> {
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<char> = sequence.into_iter().filter(|c| seen.insert(*c)).collect();
        Self::new(unique)
    }

    /// The default alphabet: every printable ASCII character (95 symbols) in
    /// a fixed scrambled order.
    pub fn printable() -> Self {
        let mut seen = std::collections::HashSet::new();
        let symbols: Vec<char> = DEFAULT_RANGES
            .iter()
            .flat_map(|&(start, end)| char_range(start, end))
            .filter(|c| seen.insert(*c))
            .collect();

        let positions = symbols
            .iter()
            .enumerate()
            .map(|(position, &character)| (character, position as u8))
            .collect();

        Self { symbols, positions }
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false; construction rejects empty alphabets.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Position of `character`, if present.
    pub fn position(&self, character: char) -> Option<usize> {
        self.positions.get(&character).map(|&p| p as usize)
    }

    /// Character at `position`, if in range.
    pub fn char_at(&self, position: usize) -> Option<char> {
        self.symbols.get(position).copied()
    }

    /// Iterate over the symbols in order.
    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.symbols.iter().copied()
    }

    /// Rotation derived from a secret: sum of the secret's symbol positions
    /// plus its length, modulo the alphabet size.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownCharacter`] if the secret uses a character
    /// absent from the alphabet.
    pub fn offset(&self, secret: &str) -> Result<usize, CodecError> {
        let mut sum = 0usize;
        let mut len = 0usize;
        for (position, character) in secret.chars().enumerate() {
            let index = self
                .position(character)
                .ok_or(CodecError::UnknownCharacter {
                    character,
                    position,
                })?;
            sum += index;
            len += 1;
        }
        Ok((sum + len) % self.len())
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::printable()
    }
}

/// Inclusive character range, descending when `start > end`.
fn char_range(start: char, end: char) -> Box<dyn Iterator<Item = char>> {
    if start <= end {
        Box::new(start..=end)
    } else {
        Box::new((end..=start).rev())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_covers_ascii() {
        let alphabet = Alphabet::printable();
        assert_eq!(alphabet.len(), 95);
        for c in ' '..='~' {
            assert!(alphabet.position(c).is_some(), "missing {c:?}");
        }
    }

    #[test]
    fn test_printable_order() {
        let alphabet = Alphabet::printable();
        let head: String = alphabet.symbols().take(8).collect();
        assert_eq!(head, "^]\\[VWXY");
    }

    #[test]
    fn test_position_and_char_at_are_inverse() {
        let alphabet = Alphabet::printable();
        for i in 0..alphabet.len() {
            let c = alphabet.char_at(i).unwrap();
            assert_eq!(alphabet.position(c), Some(i));
        }
        assert_eq!(alphabet.char_at(alphabet.len()), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = Alphabet::new("abca".chars()).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidAlphabet {
                character: 'a',
                position: 3
            }
        );
    }

    #[test]
    fn test_deduplicated_keeps_first() {
        let alphabet = Alphabet::deduplicated("abcab".chars()).unwrap();
        assert_eq!(alphabet.len(), 3);
        assert_eq!(alphabet.position('a'), Some(0));
        assert_eq!(alphabet.position('c'), Some(2));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            Alphabet::new(std::iter::empty()),
            Err(CodecError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_too_large_rejected() {
        let symbols = (0u32..300).filter_map(|i| char::from_u32(0x100 + i));
        assert!(matches!(
            Alphabet::new(symbols),
            Err(CodecError::AlphabetTooLarge { len: 300 })
        ));
    }

    #[test]
    fn test_offset() {
        let alphabet = Alphabet::new("abcd".chars()).unwrap();
        // positions 1 + 2 = 3, plus length 2 => 5 % 4
        assert_eq!(alphabet.offset("bc").unwrap(), 1);
        assert_eq!(alphabet.offset("").unwrap(), 0);
        assert!(matches!(
            alphabet.offset("bz"),
            Err(CodecError::UnknownCharacter {
                character: 'z',
                position: 1
            })
        ));
    }
}
