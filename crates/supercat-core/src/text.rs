//! Text similarity kernel shared by every matcher.
//!
//! All functions here are pure and deterministic. Callers that compare the
//! same string many times (sliding windows, candidate scans) should normalize
//! once with [`normalize`] and use [`normalized_similarity`] /
//! [`find_word_bounded`] on the normalized forms.

use std::collections::HashSet;

/// Words ignored by keyword scoring. Spanish retail titles are dominated by
/// these and they carry no brand or category signal.
pub const STOP_WORDS: &[&str] = &[
    "a", "al", "con", "de", "del", "e", "el", "en", "la", "las", "los", "o", "para", "por",
    "sin", "un", "una", "x", "y", "pack", "promo", "oferta",
];

/// Maximum bonus [`keyword_similarity`] adds for positionally aligned words.
const ORDER_BONUS: f64 = 0.2;

/// Lowercases, strips diacritics, replaces non-word characters with spaces and
/// collapses whitespace.
///
/// The output only contains lowercase word characters separated by single
/// spaces, so `normalize(normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        fold_into(c, &mut folded);
    }

    let mut out = String::with_capacity(folded.len());
    for word in folded.split(|c: char| !is_word_char(c)) {
        if word.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Splits normalized text into words.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Like [`tokenize`] but with [`STOP_WORDS`] removed.
#[must_use]
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// URL-safe slug: normalized words joined by `-`.
#[must_use]
pub fn slugify(text: &str) -> String {
    normalize(text)
        .split(|c: char| c == ' ' || c == '_')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Character-level Levenshtein distance.
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// `(max(|a|,|b|) - distance) / max(|a|,|b|)` over the normalized inputs.
///
/// Returns `1.0` when both inputs normalize to the empty string. Symmetric,
/// bounded to `[0, 1]`, and equal to `1.0` exactly when the normalized forms
/// are identical.
#[must_use]
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize(a), &normalize(b))
}

/// Same as [`levenshtein_similarity`] but assumes both inputs are already
/// normalized.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = edit_distance(a, b).min(max_len);
    (max_len - distance) as f64 / max_len as f64
}

/// Jaccard index over lowercase word sets plus a bonus of up to `0.2` for
/// words that appear at the same position in both sequences. Clamped to `1.0`.
///
/// Returns `0.0` when either side is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn keyword_similarity<A, B>(words_a: &[A], words_b: &[B]) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let a: Vec<String> = words_a.iter().map(|w| w.as_ref().to_lowercase()).collect();
    let b: Vec<String> = words_b.iter().map(|w| w.as_ref().to_lowercase()).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    let jaccard = intersection as f64 / union as f64;

    let aligned = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    let bonus = ORDER_BONUS * aligned as f64 / a.len().max(b.len()) as f64;

    (jaccard + bonus).min(1.0)
}

/// Finds `needle` inside `haystack` where both sides of the hit are a word
/// boundary. Both inputs must already be normalized. Returns the byte offset
/// of the first valid hit.
#[must_use]
pub fn find_word_bounded(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .match_indices(needle)
        .map(|(idx, _)| idx)
        .find(|&idx| is_boundary_at(haystack, idx, idx + needle.len()))
}

/// Whether `haystack[start..end]` is delimited by spaces or string edges.
#[must_use]
pub fn is_boundary_at(haystack: &str, start: usize, end: usize) -> bool {
    let before_ok = start == 0 || haystack[..start].ends_with(' ');
    let after_ok = end >= haystack.len() || haystack[end..].starts_with(' ');
    before_ok && after_ok
}

/// Converts a byte offset into a character offset.
#[must_use]
pub fn char_offset(s: &str, byte_offset: usize) -> usize {
    s[..byte_offset.min(s.len())].chars().count()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Appends the diacritic-free form of an already-lowercased character.
fn fold_into(c: char, out: &mut String) {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' => out.push('a'),
        'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => out.push('e'),
        'í' | 'ì' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => out.push('i'),
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'ō' | 'ő' => out.push('o'),
        'ú' | 'ù' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => out.push('u'),
        'ý' | 'ÿ' => out.push('y'),
        'ñ' | 'ń' | 'ň' => out.push('n'),
        'ç' | 'ć' | 'č' => out.push('c'),
        'š' | 'ś' => out.push('s'),
        'ž' | 'ź' | 'ż' => out.push('z'),
        'ł' => out.push('l'),
        'ř' => out.push('r'),
        'ď' => out.push('d'),
        'ť' => out.push('t'),
        'æ' => out.push_str("ae"),
        'œ' => out.push_str("oe"),
        'ß' => out.push_str("ss"),
        // Combining diacritical marks left behind by decomposed input.
        '\u{0300}'..='\u{036f}' => {}
        other => out.push(other),
    }
}

#[cfg(test)]
#[path = "text_test.rs"]
mod tests;
