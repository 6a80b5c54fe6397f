//! Barcode helpers: GS1 checksum validation and placeholder identifiers.
//!
//! A placeholder EAN stands in for a variant whose barcode was not scraped.
//! It is derived from the store and the store's own product identifier (or
//! the product name when no identifier exists), so replaying the same scrape
//! yields the same placeholder. Placeholders always carry a non-digit prefix,
//! so they can never pass [`is_valid_ean`] or collide with a real barcode.

use sha2::{Digest, Sha256};

/// Marker that prefixes every placeholder EAN.
pub const PLACEHOLDER_PREFIX: &str = "TMP-";

/// Number of hex characters of the digest kept in a placeholder.
const PLACEHOLDER_HASH_LEN: usize = 16;

/// Returns `true` for an 8, 12, 13 or 14 digit code with a correct GS1 check digit.
#[must_use]
pub fn is_valid_ean(code: &str) -> bool {
    let bytes = code.as_bytes();
    if !matches!(bytes.len(), 8 | 12 | 13 | 14) || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let (body, check) = bytes.split_at(bytes.len() - 1);
    gs1_check_digit(body) == check[0] - b'0'
}

/// Computes the GS1 check digit for the digits preceding it.
///
/// Weights alternate 3,1,3,... starting from the rightmost body digit.
fn gs1_check_digit(body: &[u8]) -> u8 {
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| {
            let digit = u32::from(d - b'0');
            if i % 2 == 0 {
                digit * 3
            } else {
                digit
            }
        })
        .sum();
    // `sum % 10` is at most 9, the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation)]
    let rem = (sum % 10) as u8;
    (10 - rem) % 10
}

/// Strips whitespace and dashes that retailers sometimes print inside codes.
///
/// Returns `None` when nothing digit-like remains.
#[must_use]
pub fn clean_ean(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Deterministic placeholder for a variant without a scraped barcode.
///
/// `key` should be the store's own product identifier when available and the
/// product name otherwise.
#[must_use]
pub fn placeholder_ean(store: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(store.as_bytes());
    hasher.update(b"|");
    hasher.update(key.trim().to_lowercase().as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(PLACEHOLDER_HASH_LEN);
    for byte in digest.iter().take(PLACEHOLDER_HASH_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("{PLACEHOLDER_PREFIX}{hex}")
}

#[must_use]
pub fn is_placeholder_ean(code: &str) -> bool {
    code.starts_with(PLACEHOLDER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ean13_passes() {
        assert!(is_valid_ean("7790895000997"));
        assert!(is_valid_ean("4006381333931"));
    }

    #[test]
    fn valid_ean8_and_upc_pass() {
        assert!(is_valid_ean("96385074"));
        assert!(is_valid_ean("036000291452"));
    }

    #[test]
    fn wrong_check_digit_fails() {
        assert!(!is_valid_ean("4006381333932"));
    }

    #[test]
    fn wrong_length_or_non_digits_fail() {
        assert!(!is_valid_ean(""));
        assert!(!is_valid_ean("12345"));
        assert!(!is_valid_ean("40063813339a1"));
        assert!(!is_valid_ean("400638133393100"));
    }

    #[test]
    fn clean_ean_strips_separators() {
        assert_eq!(clean_ean(" 400-6381 333931 ").as_deref(), Some("4006381333931"));
        assert_eq!(clean_ean("  - "), None);
    }

    #[test]
    fn placeholder_is_deterministic_and_marked() {
        let a = placeholder_ean("carrefour", "12345");
        let b = placeholder_ean("carrefour", "12345");
        assert_eq!(a, b);
        assert!(is_placeholder_ean(&a));
        assert_eq!(a.len(), PLACEHOLDER_PREFIX.len() + PLACEHOLDER_HASH_LEN);
    }

    #[test]
    fn placeholder_differs_per_store() {
        assert_ne!(
            placeholder_ean("carrefour", "12345"),
            placeholder_ean("jumbo", "12345")
        );
    }

    #[test]
    fn placeholder_never_validates_as_real_barcode() {
        for key in ["1", "abc", "Leche Entera 1L", "7790895000997"] {
            let placeholder = placeholder_ean("dia", key);
            assert!(!is_valid_ean(&placeholder));
        }
    }

    #[test]
    fn real_barcode_is_not_placeholder() {
        assert!(!is_placeholder_ean("7790895000997"));
    }
}
