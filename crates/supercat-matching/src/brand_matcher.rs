//! Resolves free-text product titles to canonical brands.
//!
//! Every brand expands into a set of variations (name, slug words, aliases,
//! acronyms, the no-space form and, for names of three or more words, the
//! initials). A title is run through a cascade that stops at the first method
//! whose best hit clears that method's threshold:
//!
//! 1. retailer title format (only with a retailer pattern)
//! 2. exact, word-bounded containment
//! 3. fuzzy sliding window
//! 4. keyword overlap
//! 5. contextual indicator (`®`, `™`, `marca`, `fabricante`)

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use supercat_core::text::{
    char_offset, content_tokens, find_word_bounded, keyword_similarity, normalize,
    normalized_similarity, STOP_WORDS,
};
use supercat_core::{Brand, BrandThresholds, CatalogStore, SupermarketPattern};
use uuid::Uuid;

use crate::error::MatchingError;

/// Variations shorter than this (normalized, in chars) are never matched.
const MIN_VARIATION_CHARS: usize = 2;

/// Variations shorter than this are too ambiguous for fuzzy windows.
const MIN_FUZZY_CHARS: usize = 4;

/// A contextual candidate must be more similar than this to a variation.
const CONTEXT_MIN_SIMILARITY: f64 = 0.8;

/// Contextual confidence is the similarity scaled by this factor.
const CONTEXT_WEIGHT: f64 = 0.8;

const INDICATOR_MARKS: [char; 2] = ['®', '™'];
const INDICATOR_WORDS: [&str; 2] = ["marca", "fabricante"];

const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Exact,
    Fuzzy,
    Keyword,
    Contextual,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMethod::Exact => write!(f, "exact"),
            MatchMethod::Fuzzy => write!(f, "fuzzy"),
            MatchMethod::Keyword => write!(f, "keyword"),
            MatchMethod::Contextual => write!(f, "contextual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandMatchResult {
    pub brand_id: Uuid,
    pub brand_name: String,
    pub confidence: f64,
    pub method: MatchMethod,
    pub matched_text: String,
    /// Character offset of the match in the normalized title.
    pub position: usize,
}

#[derive(Debug, Clone)]
struct Variation {
    original: String,
    normalized: String,
    chars: usize,
    tokens: Vec<String>,
}

#[derive(Debug, Clone)]
struct Candidate {
    id: Uuid,
    name: String,
    variations: Vec<Variation>,
}

/// Brand reference data plus thresholds. Immutable once built; rebuild it to
/// pick up catalog changes.
#[derive(Debug, Clone)]
pub struct BrandMatcher {
    candidates: Vec<Candidate>,
    thresholds: BrandThresholds,
}

struct PreparedTitle<'a> {
    raw: &'a str,
    normalized: String,
    chars: Vec<char>,
    /// Char index where each normalized word starts.
    word_starts: Vec<usize>,
}

impl<'a> PreparedTitle<'a> {
    fn new(raw: &'a str) -> Self {
        let normalized = normalize(raw);
        let chars: Vec<char> = normalized.chars().collect();
        let word_starts = chars
            .iter()
            .enumerate()
            .filter(|&(i, c)| *c != ' ' && (i == 0 || chars[i - 1] == ' '))
            .map(|(i, _)| i)
            .collect();
        Self {
            raw,
            normalized,
            chars,
            word_starts,
        }
    }

    /// Content words with their char offsets.
    fn content_words(&self) -> Vec<(String, usize)> {
        self.word_starts
            .iter()
            .map(|&start| {
                let word: String = self.chars[start..]
                    .iter()
                    .take_while(|c| **c != ' ')
                    .collect();
                (word, start)
            })
            .filter(|(w, _)| !STOP_WORDS.contains(&w.as_str()))
            .collect()
    }

    fn char_position_of(&self, normalized_needle: &str) -> usize {
        find_word_bounded(&self.normalized, normalized_needle)
            .map_or(0, |byte| char_offset(&self.normalized, byte))
    }
}

/// Expands a brand into its match variations, deduplicated by normalized form.
fn build_variations(brand: &Brand) -> Vec<Variation> {
    let mut raw: Vec<String> = vec![brand.name.clone(), brand.slug.replace('-', " ")];
    raw.extend(brand.aliases.iter().cloned());
    raw.extend(brand.acronyms.iter().cloned());

    let words: Vec<String> = normalize(&brand.name)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect();
    if words.len() > 1 {
        raw.push(words.concat());
    }
    if words.len() >= 3 {
        raw.push(words.iter().filter_map(|w| w.chars().next()).collect());
    }

    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|original| {
            let normalized = normalize(&original);
            let chars = normalized.chars().count();
            if chars < MIN_VARIATION_CHARS || !seen.insert(normalized.clone()) {
                return None;
            }
            Some(Variation {
                tokens: content_tokens(&normalized),
                original: original.trim().to_string(),
                normalized,
                chars,
            })
        })
        .collect()
}

impl BrandMatcher {
    /// Builds a matcher over the active brands in `brands`.
    #[must_use]
    pub fn new(brands: &[Brand], thresholds: BrandThresholds) -> Self {
        let candidates = brands
            .iter()
            .filter(|b| b.active)
            .map(|b| Candidate {
                id: b.id,
                name: b.name.clone(),
                variations: build_variations(b),
            })
            .filter(|c| !c.variations.is_empty())
            .collect();
        Self {
            candidates,
            thresholds,
        }
    }

    /// Loads every brand from the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`MatchingError::Store`] if the catalog cannot be read.
    pub async fn load(
        store: &dyn CatalogStore,
        thresholds: BrandThresholds,
    ) -> Result<Self, MatchingError> {
        let brands = store.list_brands().await?;
        let matcher = Self::new(&brands, thresholds);
        tracing::debug!(brands = matcher.candidates.len(), "brand matcher loaded");
        Ok(matcher)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[must_use]
    pub fn thresholds(&self) -> &BrandThresholds {
        &self.thresholds
    }

    /// Runs the matching cascade over `title`.
    ///
    /// `retailer` enables the title-format step and the fuzzy retailer bonus.
    #[must_use]
    pub fn extract_brand_from_title(
        &self,
        title: &str,
        retailer: Option<&SupermarketPattern>,
    ) -> Option<BrandMatchResult> {
        if self.candidates.is_empty() {
            return None;
        }
        let prepared = PreparedTitle::new(title);
        if prepared.normalized.is_empty() {
            return None;
        }

        let t = &self.thresholds;
        retailer
            .and_then(|p| self.match_retailer_format(&prepared, p))
            .filter(|m| m.confidence >= t.exact)
            .or_else(|| self.match_exact(&prepared).filter(|m| m.confidence >= t.exact))
            .or_else(|| {
                self.match_fuzzy(&prepared, retailer)
                    .filter(|m| m.confidence >= t.fuzzy)
            })
            .or_else(|| {
                self.match_keyword(&prepared)
                    .filter(|m| m.confidence >= t.keyword)
            })
            .or_else(|| {
                self.match_contextual(&prepared)
                    .filter(|m| m.confidence >= t.contextual)
            })
    }

    /// Whether a result is strong enough to create or attach a brand record.
    #[must_use]
    pub fn is_reliable_match(&self, result: &BrandMatchResult) -> bool {
        result.confidence >= self.thresholds.fuzzy
            && matches!(
                result.method,
                MatchMethod::Exact | MatchMethod::Fuzzy | MatchMethod::Keyword
            )
            && result.matched_text.trim().chars().count() >= 2
    }

    fn result(
        candidate: &Candidate,
        method: MatchMethod,
        confidence: f64,
        matched_text: String,
        position: usize,
    ) -> BrandMatchResult {
        BrandMatchResult {
            brand_id: candidate.id,
            brand_name: candidate.name.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            method,
            matched_text,
            position,
        }
    }

    /// Checks text captured by the retailer's title formats against known
    /// variations. Only equality or word-bounded containment counts.
    fn match_retailer_format(
        &self,
        title: &PreparedTitle<'_>,
        pattern: &SupermarketPattern,
    ) -> Option<BrandMatchResult> {
        for (format, captured) in pattern.detect(title.raw) {
            let captured = normalize(&captured);
            let best = self
                .candidates
                .iter()
                .flat_map(|c| c.variations.iter().map(move |v| (c, v)))
                .filter(|(_, v)| {
                    captured == v.normalized || find_word_bounded(&captured, &v.normalized).is_some()
                })
                .max_by_key(|(_, v)| v.chars);
            if let Some((candidate, variation)) = best {
                tracing::trace!(?format, brand = %candidate.name, "brand found via retailer title format");
                return Some(Self::result(
                    candidate,
                    MatchMethod::Exact,
                    1.0,
                    variation.original.clone(),
                    title.char_position_of(&variation.normalized),
                ));
            }
        }
        None
    }

    /// Longest word-bounded variation wins; ties go to the earliest hit.
    fn match_exact(&self, title: &PreparedTitle<'_>) -> Option<BrandMatchResult> {
        let mut best: Option<(&Candidate, &Variation, usize)> = None;
        for candidate in &self.candidates {
            for variation in &candidate.variations {
                let Some(byte) = find_word_bounded(&title.normalized, &variation.normalized)
                else {
                    continue;
                };
                let better = match best {
                    None => true,
                    Some((_, v, pos)) => {
                        variation.chars > v.chars || (variation.chars == v.chars && byte < pos)
                    }
                };
                if better {
                    best = Some((candidate, variation, byte));
                }
            }
        }
        best.map(|(candidate, variation, byte)| {
            Self::result(
                candidate,
                MatchMethod::Exact,
                1.0,
                variation.original.clone(),
                char_offset(&title.normalized, byte),
            )
        })
    }

    /// Slides windows of each variation's length (±1 char) across the title,
    /// starting at word starts and ending on word boundaries.
    fn match_fuzzy(
        &self,
        title: &PreparedTitle<'_>,
        retailer: Option<&SupermarketPattern>,
    ) -> Option<BrandMatchResult> {
        struct Hit<'c> {
            candidate: &'c Candidate,
            score: f64,
            distance: usize,
            text: String,
            position: usize,
        }

        let n = title.chars.len();
        let expected_word =
            retailer.map(|p| p.brand_position.expected_word(title.word_starts.len()));
        let mut best: Option<Hit<'_>> = None;

        for candidate in &self.candidates {
            let bonus = retailer.map_or(0.0, |p| p.bonus_for(&candidate.name));
            for variation in &candidate.variations {
                if variation.chars < MIN_FUZZY_CHARS {
                    continue;
                }
                for (word_idx, &start) in title.word_starts.iter().enumerate() {
                    for len in [variation.chars - 1, variation.chars, variation.chars + 1] {
                        let end = start + len;
                        if end > n || title.chars[end - 1] == ' ' || (end < n && title.chars[end] != ' ')
                        {
                            continue;
                        }
                        let window: String = title.chars[start..end].iter().collect();
                        let similarity = normalized_similarity(&window, &variation.normalized);
                        let score = (similarity + bonus).min(1.0);
                        let distance = expected_word.map_or(word_idx, |e| word_idx.abs_diff(e));
                        let better = match &best {
                            None => true,
                            Some(b) => {
                                score > b.score + SCORE_EPSILON
                                    || ((score - b.score).abs() <= SCORE_EPSILON
                                        && distance < b.distance)
                            }
                        };
                        if better {
                            best = Some(Hit {
                                candidate,
                                score,
                                distance,
                                text: window,
                                position: start,
                            });
                        }
                    }
                }
            }
        }

        best.map(|hit| {
            Self::result(
                hit.candidate,
                MatchMethod::Fuzzy,
                hit.score,
                hit.text,
                hit.position,
            )
        })
    }

    /// Scores windows of title content words against each variation's
    /// content words.
    fn match_keyword(&self, title: &PreparedTitle<'_>) -> Option<BrandMatchResult> {
        let words = title.content_words();
        if words.is_empty() {
            return None;
        }

        let mut best: Option<(&Candidate, f64, String, usize)> = None;
        for candidate in &self.candidates {
            for variation in &candidate.variations {
                if variation.tokens.is_empty() {
                    continue;
                }
                let k = variation.tokens.len();
                for size in [k, k + 1] {
                    let size = size.min(words.len());
                    for window in words.windows(size) {
                        let tokens: Vec<&str> = window.iter().map(|(w, _)| w.as_str()).collect();
                        let score = keyword_similarity(&tokens, &variation.tokens);
                        if best.as_ref().is_none_or(|b| score > b.1 + SCORE_EPSILON) {
                            best = Some((candidate, score, tokens.join(" "), window[0].1));
                        }
                    }
                }
            }
        }

        best.filter(|b| b.1 > 0.0).map(|(candidate, score, text, position)| {
            Self::result(candidate, MatchMethod::Keyword, score, text, position)
        })
    }

    /// Looks for brand indicators and confirms the neighbouring words against
    /// known variations by near-exact similarity.
    fn match_contextual(&self, title: &PreparedTitle<'_>) -> Option<BrandMatchResult> {
        let words: Vec<&str> = title.raw.split_whitespace().collect();
        let mut guesses: Vec<String> = Vec::new();

        for (i, word) in words.iter().enumerate() {
            if let Some(mark) = word.find(INDICATOR_MARKS) {
                let before = word[..mark].trim();
                if before.is_empty() {
                    if i > 0 {
                        guesses.push(words[i - 1].to_string());
                        if i > 1 {
                            guesses.push(format!("{} {}", words[i - 2], words[i - 1]));
                        }
                    }
                } else {
                    guesses.push(before.to_string());
                    if i > 0 {
                        guesses.push(format!("{} {before}", words[i - 1]));
                    }
                }
            }

            if INDICATOR_WORDS.contains(&normalize(word).as_str()) {
                if let Some(next) = words.get(i + 1) {
                    guesses.push((*next).to_string());
                    if let Some(after) = words.get(i + 2) {
                        guesses.push(format!("{next} {after}"));
                    }
                }
                if i > 0 {
                    guesses.push(words[i - 1].to_string());
                }
            }
        }

        let mut best: Option<(&Candidate, f64, String, String)> = None;
        for guess in guesses {
            let normalized = normalize(&guess);
            if normalized.chars().count() < MIN_VARIATION_CHARS {
                continue;
            }
            for candidate in &self.candidates {
                for variation in &candidate.variations {
                    let similarity = normalized_similarity(&normalized, &variation.normalized);
                    if similarity > CONTEXT_MIN_SIMILARITY
                        && best.as_ref().is_none_or(|b| similarity > b.1 + SCORE_EPSILON)
                    {
                        best = Some((candidate, similarity, guess.clone(), normalized.clone()));
                    }
                }
            }
        }

        best.map(|(candidate, similarity, text, normalized)| {
            let position = title.char_position_of(&normalized);
            Self::result(
                candidate,
                MatchMethod::Contextual,
                similarity * CONTEXT_WEIGHT,
                text,
                position,
            )
        })
    }
}

#[cfg(test)]
#[path = "brand_matcher_test.rs"]
mod tests;
