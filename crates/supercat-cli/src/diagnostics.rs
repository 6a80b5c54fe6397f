//! `match-brand` and `map-category`: read-only views of the matchers against
//! the stored reference data.

use std::fmt::Write as _;

use supercat_core::{load_category_tables, registry, AppConfig, CatalogStore, MasterCategory};
use supercat_db::PgCatalogStore;
use supercat_matching::{
    resolve_category, BrandMatchResult, BrandMatcher, CategoryMappingResult, CategoryRequest,
};

pub(crate) async fn match_brand(
    config: &AppConfig,
    title: &str,
    store: Option<&str>,
) -> anyhow::Result<()> {
    let pattern = match store {
        Some(key) => Some(
            &registry()
                .lookup(key)
                .ok_or_else(|| anyhow::anyhow!("unknown retailer '{key}'"))?
                .pattern,
        ),
        None => None,
    };

    let pool = crate::db::connect(config).await?;
    let brands = PgCatalogStore::new(pool.clone()).list_brands().await?;
    pool.close().await;

    let matcher = BrandMatcher::new(&brands, config.brand_thresholds);
    let result = matcher.extract_brand_from_title(title, pattern);
    let reliable = result.as_ref().is_some_and(|r| matcher.is_reliable_match(r));
    print!("{}", format_brand_match(result.as_ref(), reliable));
    Ok(())
}

pub(crate) async fn map_category(
    config: &AppConfig,
    store: &str,
    name: &str,
    path: Option<&str>,
) -> anyhow::Result<()> {
    let tables = load_category_tables(&config.category_tables_path)?;
    let pool = crate::db::connect(config).await?;
    let masters: Vec<MasterCategory> = supercat_db::list_master_categories(&pool)
        .await?
        .into_iter()
        .map(MasterCategory::from)
        .collect();
    pool.close().await;

    let parent_path = crate::jobs::split_path(path);
    let request = CategoryRequest {
        store,
        parent_path: &parent_path,
        category_name: name,
        context: None,
    };
    let result = resolve_category(&masters, &tables, &config.category_settings, &request);
    print!("{}", format_mapping(&result));
    Ok(())
}

pub(crate) fn format_brand_match(result: Option<&BrandMatchResult>, reliable: bool) -> String {
    let Some(m) = result else {
        return "no match\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(out, "brand:      {} ({})", m.brand_name, m.brand_id);
    let _ = writeln!(out, "method:     {}", m.method);
    let _ = writeln!(out, "confidence: {:.3}", m.confidence);
    let _ = writeln!(out, "matched:    \"{}\" at {}", m.matched_text, m.position);
    let _ = writeln!(out, "reliable:   {}", if reliable { "yes" } else { "no" });
    out
}

pub(crate) fn format_mapping(result: &CategoryMappingResult) -> String {
    let mut out = String::new();
    let method = serde_json::to_value(result.method)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let _ = writeln!(out, "method:     {method}");
    let _ = writeln!(
        out,
        "category:   {}",
        result.master_slug.as_deref().unwrap_or("(none)")
    );
    let _ = writeln!(out, "confidence: {:.3}", result.confidence);
    if !result.suggestions.is_empty() {
        let _ = writeln!(out, "suggestions:");
        for s in &result.suggestions {
            let _ = writeln!(out, "  {:.3}  {} ({})", s.score, s.slug, s.name);
        }
    }
    out
}
