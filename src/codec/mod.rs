//! Reversible token codec.
//!
//! - [`Alphabet`]: bijective symbol table
//! - [`Slugger`]: `short`/`unshort`, `serialize`/`unserialize`, keyed `hash`
//! - [`slug`]: ASCII slugs

mod alphabet;
mod slug;
mod slugger;

pub use alphabet::{Alphabet, MAX_ALPHABET_LEN};
pub use slug::{slug, slug_with, DEFAULT_SEPARATOR};
pub use slugger::Slugger;
