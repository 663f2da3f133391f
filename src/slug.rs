//! Plugin and entry id derivation.
//!
//! Display names are free-form ("CPU Temp °C"); registry addresses need
//! stable ascii segments. `encode` turns a human name into its id:
//! diacritics stripped via NFKD, lowercased, anything that is neither
//! alphanumeric nor whitespace dropped, whitespace runs collapsed into a
//! single hyphen.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Derive a stable id from a human-readable name.
pub fn encode(name: &str) -> String {
    let stripped: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join("-")
}
