//! Maps retailer category labels onto the canonical taxonomy.
//!
//! Resolution order, first hit wins:
//!
//! 1. manual override table
//! 2. exact name or slug
//! 3. fuzzy: best of name similarity, keyword overlap and synonym overlap
//! 4. synonym table against the label (0.9), then the full store path (0.85)
//! 5. pending: a new pending master category with provenance, plus ranked
//!    suggestions
//!
//! [`resolve_category`] is pure and never writes. [`map_category`] persists
//! the pending category when step 5 is reached.

use serde::{Deserialize, Serialize};
use supercat_core::text::{
    content_tokens, find_word_bounded, keyword_similarity, levenshtein_similarity, normalize,
    slugify, tokenize,
};
use supercat_core::{
    CatalogStore, CategoryMapperSettings, CategoryTables, MappingMethod, MasterCategory,
};
use uuid::Uuid;

use crate::error::MatchingError;

const SYNONYM_NAME_CONFIDENCE: f64 = 0.9;
const SYNONYM_PATH_CONFIDENCE: f64 = 0.85;

/// A retailer category to map.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRequest<'a> {
    pub store: &'a str,
    /// Ancestors of the category, root first, excluding the category itself.
    pub parent_path: &'a [String],
    pub category_name: &'a str,
    pub context: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySuggestion {
    pub master_category_id: Uuid,
    pub slug: String,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMappingResult {
    /// The mapped master category. For `pending` results this is the pending
    /// category once persisted, `None` before that.
    pub master_category_id: Option<Uuid>,
    pub master_slug: Option<String>,
    pub confidence: f64,
    pub method: MappingMethod,
    pub suggestions: Vec<CategorySuggestion>,
}

impl CategoryMappingResult {
    fn hit(category: &MasterCategory, confidence: f64, method: MappingMethod) -> Self {
        Self {
            master_category_id: Some(category.id),
            master_slug: Some(category.slug.clone()),
            confidence,
            method,
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.method == MappingMethod::Pending
    }
}

/// Combined name / keyword / synonym score of `name` against one category.
fn score_category(name: &str, name_tokens: &[String], category: &MasterCategory) -> f64 {
    let slug_words = category.slug.replace('-', " ");
    let name_score = category
        .name
        .values()
        .chain(std::iter::once(slug_words.as_str()))
        .map(|candidate| levenshtein_similarity(name, candidate))
        .fold(0.0_f64, f64::max);

    let overlap = |terms: &[String]| {
        terms
            .iter()
            .map(|term| keyword_similarity(name_tokens, &tokenize(term)))
            .fold(0.0_f64, f64::max)
    };

    name_score
        .max(overlap(&category.keywords))
        .max(overlap(&category.synonyms))
}

fn suggestions(
    name: &str,
    name_tokens: &[String],
    masters: &[&MasterCategory],
    settings: &CategoryMapperSettings,
) -> Vec<CategorySuggestion> {
    let mut ranked: Vec<CategorySuggestion> = masters
        .iter()
        .map(|c| CategorySuggestion {
            master_category_id: c.id,
            slug: c.slug.clone(),
            name: c.name.primary().to_string(),
            score: score_category(name, name_tokens, c),
        })
        .filter(|s| s.score >= settings.min_suggestion_score)
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.slug.cmp(&b.slug)));
    ranked.truncate(settings.max_suggestions);
    ranked
}

/// Resolves a store category against the loaded masters without writing.
///
/// Pending and non-master categories never take part in matching. Always
/// returns a result; when nothing matches the result is `pending` with no
/// category id.
#[must_use]
pub fn resolve_category(
    masters: &[MasterCategory],
    tables: &CategoryTables,
    settings: &CategoryMapperSettings,
    request: &CategoryRequest<'_>,
) -> CategoryMappingResult {
    let matchable: Vec<&MasterCategory> = masters.iter().filter(|c| c.is_matchable()).collect();
    let name = request.category_name;
    let normalized = normalize(name);
    let by_slug = |slug: &str| matchable.iter().copied().find(|c| c.slug == slug);

    if let Some(slug) = tables.manual_target(name) {
        match by_slug(slug) {
            Some(category) => {
                return CategoryMappingResult::hit(category, 1.0, MappingMethod::Manual)
            }
            None => tracing::warn!(
                category = %name,
                slug,
                "manual mapping targets a master category that is not loaded"
            ),
        }
    }

    if !normalized.is_empty() {
        let slug = slugify(name);
        let exact = matchable.iter().copied().find(|c| {
            c.slug == slug || c.name.values().any(|n| normalize(n) == normalized)
        });
        if let Some(category) = exact {
            return CategoryMappingResult::hit(category, 1.0, MappingMethod::Exact);
        }
    }

    let name_tokens = content_tokens(name);
    let fuzzy = matchable
        .iter()
        .copied()
        .map(|c| (c, score_category(name, &name_tokens, c)))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((category, score)) = fuzzy {
        if score >= settings.fuzzy_threshold {
            return CategoryMappingResult::hit(category, score, MappingMethod::Fuzzy);
        }
    }

    if let Some((category, confidence)) = synonym_hit(&normalized, request, tables, settings, &by_slug) {
        return CategoryMappingResult::hit(category, confidence, MappingMethod::Fuzzy);
    }

    CategoryMappingResult {
        master_category_id: None,
        master_slug: None,
        confidence: 0.0,
        method: MappingMethod::Pending,
        suggestions: suggestions(name, &name_tokens, &matchable, settings),
    }
}

fn synonym_hit<'m>(
    normalized_name: &str,
    request: &CategoryRequest<'_>,
    tables: &CategoryTables,
    settings: &CategoryMapperSettings,
    by_slug: &dyn Fn(&str) -> Option<&'m MasterCategory>,
) -> Option<(&'m MasterCategory, f64)> {
    let term_in = |text: &str| {
        tables.synonyms.iter().find_map(|group| {
            group
                .terms
                .iter()
                .any(|term| find_word_bounded(text, &normalize(term)).is_some())
                .then(|| by_slug(&group.canonical))
                .flatten()
        })
    };

    if let Some(category) = term_in(normalized_name) {
        return Some((category, SYNONYM_NAME_CONFIDENCE));
    }
    if settings.hierarchy_search {
        let path_text = normalize(&request.parent_path.join(" "));
        if let Some(category) = term_in(&path_text) {
            return Some((category, SYNONYM_PATH_CONFIDENCE));
        }
    }
    None
}

/// Maps a store category, creating a pending master category (idempotent by
/// slug) when nothing matches.
///
/// # Errors
///
/// Returns [`MatchingError::InvalidInput`] for an empty category name and
/// [`MatchingError::Store`] if the pending category cannot be written.
pub async fn map_category(
    store: &dyn CatalogStore,
    masters: &[MasterCategory],
    tables: &CategoryTables,
    settings: &CategoryMapperSettings,
    request: &CategoryRequest<'_>,
) -> Result<CategoryMappingResult, MatchingError> {
    if normalize(request.category_name).is_empty() {
        return Err(MatchingError::InvalidInput(format!(
            "category name '{}' is empty after normalization",
            request.category_name
        )));
    }

    let mut result = resolve_category(masters, tables, settings, request);
    if !result.is_pending() {
        tracing::debug!(
            store = request.store,
            category = request.category_name,
            method = %result.method,
            slug = result.master_slug.as_deref().unwrap_or_default(),
            confidence = result.confidence,
            "category mapped"
        );
        return Ok(result);
    }

    let pending = MasterCategory::pending(
        request.category_name,
        request.store,
        request.parent_path,
        request.context,
    );
    let stored = store.upsert_master_category(&pending).await?;
    tracing::info!(
        store = request.store,
        category = request.category_name,
        slug = %stored.slug,
        suggestions = result.suggestions.len(),
        "category queued for review as pending"
    );
    result.master_category_id = Some(stored.id);
    result.master_slug = Some(stored.slug);
    Ok(result)
}

#[cfg(test)]
#[path = "category_mapper_test.rs"]
mod tests;
