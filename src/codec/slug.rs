//! ASCII slugs for file names and URL segments.

use icu_normalizer::DecomposingNormalizerBorrowed;

/// Default slug separator.
pub const DEFAULT_SEPARATOR: &str = "-";

/// Slugify `text` with the default separator.
///
/// `None` passes through unchanged.
///
/// ```rust
/// use imagepack::codec::slug;
///
/// assert_eq!(slug(Some("Héllo, Wörld!")), Some("hello-world".to_string()));
/// assert_eq!(slug(None), None);
/// ```
pub fn slug(text: Option<&str>) -> Option<String> {
    text.map(|t| slug_with(t, DEFAULT_SEPARATOR))
}

/// Slugify `text`: strip diacritics, lowercase, collapse every run of
/// non-alphanumeric characters into `separator`, trim it from both ends.
pub fn slug_with(text: &str, separator: &str) -> String {
    let decomposed = DecomposingNormalizerBorrowed::new_nfd().normalize(text);

    let mut out = String::with_capacity(decomposed.len());
    let mut pending_separator = false;

    for c in decomposed.chars() {
        if is_combining_mark(c) {
            continue;
        }

        let mut buf = [0u8; 4];
        let piece = if c.is_ascii_alphanumeric() {
            Some(&*c.to_ascii_lowercase().encode_utf8(&mut buf))
        } else {
            fold_letter(c)
        };

        match piece {
            Some(piece) => {
                if pending_separator && !out.is_empty() {
                    out.push_str(separator);
                }
                pending_separator = false;
                out.push_str(piece);
            }
            None => pending_separator = true,
        }
    }

    out
}

/// Combining diacritical mark blocks left over after NFD.
fn is_combining_mark(c: char) -> bool {
    matches!(
        c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F
    )
}

/// Letters without a canonical decomposition.
fn fold_letter(c: char) -> Option<&'static str> {
    Some(match c {
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        'ø' | 'Ø' => "o",
        'đ' | 'Đ' | 'ð' | 'Ð' => "d",
        'ł' | 'Ł' => "l",
        'þ' | 'Þ' => "th",
        'ı' => "i",
        _ => return None,
    })
}
