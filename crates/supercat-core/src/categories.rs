use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::text::{normalize, slugify};
use crate::ConfigError;

/// Built-in category tables, used when no tables file is present on disk.
const BUILTIN_TABLES: &str = include_str!("../../../config/category_tables.yaml");

/// Locale code whose name is treated as the primary display name.
pub const PRIMARY_LOCALE: &str = "es";

/// Prefix of the slug given to categories awaiting manual review.
pub const PENDING_SLUG_PREFIX: &str = "pending-";

/// Category display name keyed by locale code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedName(pub BTreeMap<String, String>);

impl LocalizedName {
    #[must_use]
    pub fn single(locale: &str, text: &str) -> Self {
        let mut names = BTreeMap::new();
        names.insert(locale.to_string(), text.to_string());
        Self(names)
    }

    /// The Spanish name, or any name when Spanish is missing.
    #[must_use]
    pub fn primary(&self) -> &str {
        self.0
            .get(PRIMARY_LOCALE)
            .or_else(|| self.0.values().next())
            .map_or("", String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }
}

/// Where a pending category came from, kept so a reviewer can promote or
/// merge it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingProvenance {
    pub original_name: String,
    pub store: String,
    pub full_path: Vec<String>,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A node in the canonical taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterCategory {
    pub id: Uuid,
    pub name: LocalizedName,
    pub slug: String,
    pub level: i32,
    pub parent_id: Option<Uuid>,
    pub keywords: Vec<String>,
    pub synonyms: Vec<String>,
    pub is_master: bool,
    pub is_pending: bool,
    pub provenance: Option<PendingProvenance>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterCategory {
    /// Creates a pending category for a store label that could not be mapped.
    ///
    /// The slug depends only on the label, so repeated attempts for the same
    /// label upsert the same record.
    #[must_use]
    pub fn pending(
        original_name: &str,
        store: &str,
        full_path: &[String],
        context: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        let level = i32::try_from(full_path.len()).unwrap_or(i32::MAX).saturating_add(1);
        Self {
            id: Uuid::new_v4(),
            name: LocalizedName::single(PRIMARY_LOCALE, original_name.trim()),
            slug: pending_slug(original_name),
            level,
            parent_id: None,
            keywords: Vec::new(),
            synonyms: Vec::new(),
            is_master: false,
            is_pending: true,
            provenance: Some(PendingProvenance {
                original_name: original_name.to_string(),
                store: store.to_string(),
                full_path: full_path.to_vec(),
                context: context.map(str::to_string),
                created_at: now,
            }),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this category takes part in matching.
    #[must_use]
    pub fn is_matchable(&self) -> bool {
        self.is_master && !self.is_pending
    }
}

#[must_use]
pub fn pending_slug(original_name: &str) -> String {
    format!("{PENDING_SLUG_PREFIX}{}", slugify(original_name))
}

/// How a store category was resolved to the canonical taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMethod {
    Manual,
    Exact,
    Fuzzy,
    Pending,
}

impl std::fmt::Display for MappingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingMethod::Manual => write!(f, "manual"),
            MappingMethod::Exact => write!(f, "exact"),
            MappingMethod::Fuzzy => write!(f, "fuzzy"),
            MappingMethod::Pending => write!(f, "pending"),
        }
    }
}

impl std::str::FromStr for MappingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(MappingMethod::Manual),
            "exact" => Ok(MappingMethod::Exact),
            "fuzzy" => Ok(MappingMethod::Fuzzy),
            "pending" => Ok(MappingMethod::Pending),
            other => Err(format!("unknown mapping method: {other}")),
        }
    }
}

/// A retailer's own category node, keyed by `{store, name, level}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreCategory {
    pub id: Uuid,
    pub store: String,
    pub name: String,
    pub slug: String,
    pub level: i32,
    pub url: Option<String>,
    pub parent_path: Vec<String>,
    pub master_category_id: Option<Uuid>,
    pub mapping_confidence: f64,
    pub mapping_method: MappingMethod,
    pub last_seen_at: DateTime<Utc>,
}

/// Seed entry for a master category in the tables file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterSeed {
    pub slug: String,
    pub name: LocalizedName,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// Terms that point at one master category when found in a store label or path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub canonical: String,
    pub terms: Vec<String>,
}

/// Reference tables consulted by the category mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTables {
    #[serde(default)]
    pub masters: Vec<MasterSeed>,
    /// Normalized store label to master slug.
    #[serde(default)]
    pub manual: BTreeMap<String, String>,
    #[serde(default)]
    pub synonyms: Vec<SynonymGroup>,
}

impl CategoryTables {
    /// The tables compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the embedded tables fail to parse or validate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_TABLES)
    }

    /// Parses and validates tables from YAML text. Manual keys are normalized.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed YAML or inconsistent references.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut tables: CategoryTables = serde_yaml::from_str(content)?;
        tables.manual = tables
            .manual
            .into_iter()
            .map(|(k, v)| (normalize(&k), v))
            .collect();
        tables.validate()?;
        Ok(tables)
    }

    /// Looks up the manual override for a store label.
    #[must_use]
    pub fn manual_target(&self, category_name: &str) -> Option<&str> {
        self.manual.get(&normalize(category_name)).map(String::as_str)
    }

    /// Builds master category records for every seed, wiring parents and levels.
    ///
    /// Seeds must be ordered parent-first, which [`CategoryTables::validate`]
    /// enforces.
    #[must_use]
    pub fn seed_categories(&self) -> Vec<MasterCategory> {
        let now = Utc::now();
        let mut built: Vec<MasterCategory> = Vec::with_capacity(self.masters.len());
        for seed in &self.masters {
            let parent = seed
                .parent
                .as_ref()
                .and_then(|slug| built.iter().find(|c| &c.slug == slug));
            let (parent_id, level) = match parent {
                Some(p) => (Some(p.id), p.level + 1),
                None => (None, 1),
            };
            built.push(MasterCategory {
                id: Uuid::new_v4(),
                name: seed.name.clone(),
                slug: seed.slug.clone(),
                level,
                parent_id,
                keywords: seed.keywords.clone(),
                synonyms: seed.synonyms.clone(),
                is_master: true,
                is_pending: false,
                provenance: None,
                created_at: now,
                updated_at: now,
            });
        }
        built
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for seed in &self.masters {
            if seed.slug.trim().is_empty() || seed.name.primary().trim().is_empty() {
                return Err(ConfigError::Validation(
                    "master category slug and name must be non-empty".to_string(),
                ));
            }
            if let Some(parent) = &seed.parent {
                if !seen.contains(parent.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "master category '{}' references parent '{parent}' that is not defined before it",
                        seed.slug
                    )));
                }
            }
            if !seen.insert(seed.slug.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate master category slug: '{}'",
                    seed.slug
                )));
            }
        }

        for (name, slug) in &self.manual {
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "manual mapping keys must be non-empty".to_string(),
                ));
            }
            if !seen.contains(slug.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "manual mapping '{name}' targets unknown slug '{slug}'"
                )));
            }
        }

        for group in &self.synonyms {
            if !seen.contains(group.canonical.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "synonym group targets unknown slug '{}'",
                    group.canonical
                )));
            }
            if group.terms.iter().any(|t| normalize(t).is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "synonym group '{}' contains an empty term",
                    group.canonical
                )));
            }
        }

        Ok(())
    }
}

/// Loads category tables from `path`, falling back to the built-in tables
/// when the file does not exist.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read, parsed, or
/// fails validation.
pub fn load_category_tables(path: &Path) -> Result<CategoryTables, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "category tables file not found, using built-in tables");
            return CategoryTables::builtin();
        }
        Err(e) => {
            return Err(ConfigError::CategoryTablesIo {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    CategoryTables::from_yaml(&content)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn builtin_tables_parse_and_validate() {
        let tables = CategoryTables::builtin().expect("built-in tables must be valid");
        assert!(!tables.masters.is_empty());
        assert_eq!(
            tables.manual_target("Lácteos"),
            Some("lacteos-y-productos-frescos")
        );
    }

    #[test]
    fn builtin_tables_have_no_snack_entries() {
        let tables = CategoryTables::builtin().unwrap();
        let mentions_snacks = tables.manual.keys().any(|k| k.contains("snack"))
            || tables
                .synonyms
                .iter()
                .flat_map(|g| g.terms.iter())
                .any(|t| normalize(t).contains("snack"));
        assert!(!mentions_snacks);
    }

    #[test]
    fn seed_categories_wire_parents_and_levels() {
        let tables = CategoryTables::builtin().unwrap();
        let seeds = tables.seed_categories();
        let dairy = seeds
            .iter()
            .find(|c| c.slug == "lacteos-y-productos-frescos")
            .unwrap();
        let milk = seeds.iter().find(|c| c.slug == "leches").unwrap();
        assert_eq!(dairy.level, 1);
        assert_eq!(milk.level, 2);
        assert_eq!(milk.parent_id, Some(dairy.id));
        assert!(seeds.iter().all(MasterCategory::is_matchable));
    }

    #[test]
    fn manual_target_with_unknown_slug_is_rejected() {
        let yaml = "masters:\n  - slug: bebidas\n    name: { es: Bebidas }\nmanual:\n  gaseosas: refrescos\n";
        let err = CategoryTables::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown slug 'refrescos'"));
    }

    #[test]
    fn parent_must_precede_child() {
        let yaml = "masters:\n  - slug: leches\n    name: { es: Leches }\n    parent: lacteos\n  - slug: lacteos\n    name: { es: Lácteos }\n";
        let err = CategoryTables::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("parent 'lacteos'"));
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let yaml = "masters:\n  - slug: a\n    name: { es: A }\n  - slug: a\n    name: { es: B }\n";
        let err = CategoryTables::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate master category slug"));
    }

    #[test]
    fn manual_keys_are_normalized() {
        let yaml = "masters:\n  - slug: bebidas\n    name: { es: Bebidas }\nmanual:\n  'Gaseosas  & Aguas': bebidas\n";
        let tables = CategoryTables::from_yaml(yaml).unwrap();
        assert_eq!(tables.manual_target("gaseosas aguas"), Some("bebidas"));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let tables = load_category_tables(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(tables, CategoryTables::builtin().unwrap());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "masters: [this is: not valid").unwrap();
        let result = load_category_tables(file.path());
        assert!(matches!(result, Err(ConfigError::CategoryTablesParse(_))));
    }

    #[test]
    fn pending_category_carries_provenance() {
        let path = vec!["Almacén".to_string()];
        let pending = MasterCategory::pending("Snacks Saludables", "jumbo", &path, None);
        assert_eq!(pending.slug, "pending-snacks-saludables");
        assert!(pending.is_pending);
        assert!(!pending.is_matchable());
        assert_eq!(pending.level, 2);
        let provenance = pending.provenance.unwrap();
        assert_eq!(provenance.original_name, "Snacks Saludables");
        assert_eq!(provenance.full_path, path);
    }

    #[test]
    fn localized_name_primary_prefers_spanish() {
        let mut names = BTreeMap::new();
        names.insert("en".to_string(), "Dairy".to_string());
        names.insert("es".to_string(), "Lácteos".to_string());
        assert_eq!(LocalizedName(names).primary(), "Lácteos");
        assert_eq!(LocalizedName::single("en", "Dairy").primary(), "Dairy");
    }

    #[test]
    fn mapping_method_roundtrips_through_strings() {
        for method in [
            MappingMethod::Manual,
            MappingMethod::Exact,
            MappingMethod::Fuzzy,
            MappingMethod::Pending,
        ] {
            assert_eq!(method.to_string().parse::<MappingMethod>(), Ok(method));
        }
    }
}
