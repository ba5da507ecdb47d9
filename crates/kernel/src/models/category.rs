//! Category reference data.
//!
//! Categories are maintained elsewhere; this crate only reads them and
//! references them by id.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A flat restaurant category (e.g. "Italian", "Street food").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl Category {
    /// Find a category by ID.
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let category = sqlx::query_as::<_, Self>("SELECT id, name FROM category WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch category")?;

        Ok(category)
    }
}
