use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::text::slugify;

/// A canonical brand in the unified catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub aliases: Vec<String>,
    /// Short forms such as `"CCU"`; expanded into match variations alongside aliases.
    pub acronyms: Vec<String>,
    /// Retailer keys that carry this brand.
    pub stores: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Brand {
    /// Builds a fresh, active brand with a slug derived from `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            slug: slugify(name),
            aliases: Vec::new(),
            acronyms: Vec::new(),
            stores: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_acronyms<I, S>(mut self, acronyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acronyms = acronyms.into_iter().map(Into::into).collect();
        self
    }

    /// Applies an upsert in place: merges the store and new aliases without
    /// duplicating existing entries. Returns `true` if anything changed.
    pub fn absorb(&mut self, upsert: &BrandUpsert) -> bool {
        let mut changed = false;
        if let Some(store) = &upsert.store {
            if !self.stores.iter().any(|s| s == store) {
                self.stores.push(store.clone());
                changed = true;
            }
        }
        for alias in &upsert.aliases {
            let known = alias.eq_ignore_ascii_case(&self.name)
                || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias));
            if !known {
                self.aliases.push(alias.clone());
                changed = true;
            }
        }
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

/// Write request for a brand, keyed by name (slug).
///
/// Upserting accumulates `store` into the brand's `stores` list rather than
/// replacing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandUpsert {
    pub name: String,
    pub store: Option<String>,
    pub aliases: Vec<String>,
}

impl BrandUpsert {
    #[must_use]
    pub fn new(name: &str, store: Option<&str>) -> Self {
        Self {
            name: name.trim().to_string(),
            store: store.map(str::to_string),
            aliases: Vec::new(),
        }
    }

    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Materializes the upsert as a brand record for first insertion.
    #[must_use]
    pub fn into_brand(self) -> Brand {
        let mut brand = Brand::new(&self.name);
        brand.absorb(&self);
        brand
    }
}

#[cfg(test)]
#[path = "brands_test.rs"]
mod tests;
