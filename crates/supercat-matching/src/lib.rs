//! Brand matching, category mapping and product identity resolution against
//! the canonical catalog.

pub mod brand_matcher;
pub mod category_mapper;
pub mod error;
pub mod identity;
pub mod quality;

pub use brand_matcher::{BrandMatchResult, BrandMatcher, MatchMethod};
pub use category_mapper::{
    map_category, resolve_category, CategoryMappingResult, CategoryRequest, CategorySuggestion,
};
pub use error::MatchingError;
pub use identity::{
    merge_scraped, new_product, resolve_product, BrandLink, IdentityMatch, ResolveOutcome,
    ScrapedProduct,
};
pub use quality::{assess_quality, QualityInputs};
