use sqlx::types::Json;
use sqlx::PgPool;
use supercat_core::MasterCategory;

use crate::DbError;

/// Insert the master taxonomy into the database.
///
/// Categories are keyed by slug; existing rows keep their id so store
/// categories already mapped to them stay valid, while names, keywords and
/// synonyms are refreshed from the tables. Parents must precede children in
/// `categories`; a child's `parent_id` is resolved through its parent's
/// stored row.
///
/// Returns the number of categories processed. All upserts run inside a
/// single transaction; if any operation fails the entire batch is rolled
/// back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_master_categories(
    pool: &PgPool,
    categories: &[MasterCategory],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut stored_ids = std::collections::HashMap::new();
    let mut count = 0usize;

    for category in categories {
        let parent_id = category
            .parent_id
            .map(|id| stored_ids.get(&id).copied().unwrap_or(id));

        let stored_id: uuid::Uuid = sqlx::query_scalar(
            "INSERT INTO master_categories \
                 (id, name, slug, level, parent_id, keywords, synonyms, is_master, is_pending) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, true, false) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 level = EXCLUDED.level, \
                 parent_id = EXCLUDED.parent_id, \
                 keywords = EXCLUDED.keywords, \
                 synonyms = EXCLUDED.synonyms, \
                 is_master = true, \
                 is_pending = false, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(category.id)
        .bind(Json(&category.name))
        .bind(&category.slug)
        .bind(category.level)
        .bind(parent_id)
        .bind(&category.keywords)
        .bind(&category.synonyms)
        .fetch_one(&mut *tx)
        .await?;

        stored_ids.insert(category.id, stored_id);
        count += 1;
    }

    tx.commit().await?;
    tracing::info!(count, "master categories seeded");
    Ok(count)
}
