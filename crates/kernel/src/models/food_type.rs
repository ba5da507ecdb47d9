//! Food types and their many-to-many links to restaurants and suggestions.
//!
//! Link sets are always replaced wholesale (delete all, insert all); they
//! are never diffed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::error::{AppResult, classify_write_error};

/// A food type (e.g. "Pizza", "Vegan").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FoodType {
    pub id: i64,
    pub name: String,
}

/// Which junction table a food type link lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkOwner {
    Restaurant,
    Suggestion,
}

impl LinkOwner {
    /// Junction table name.
    pub const fn table(self) -> &'static str {
        match self {
            LinkOwner::Restaurant => "restaurant_food_type",
            LinkOwner::Suggestion => "suggestion_food_type",
        }
    }

    /// Column in the junction table referencing the owner.
    pub const fn owner_column(self) -> &'static str {
        match self {
            LinkOwner::Restaurant => "restaurant_id",
            LinkOwner::Suggestion => "suggestion_id",
        }
    }
}

impl FoodType {
    /// Food type ids linked to one owner.
    pub async fn linked_ids(
        conn: &mut PgConnection,
        owner: LinkOwner,
        owner_id: i64,
    ) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT food_type_id FROM {} WHERE {} = $1 ORDER BY food_type_id",
            owner.table(),
            owner.owner_column()
        );
        let ids = sqlx::query_scalar::<_, i64>(&sql)
            .bind(owner_id)
            .fetch_all(conn)
            .await
            .context("failed to load linked food type ids")?;

        Ok(ids)
    }

    /// Replace the full link set of one owner.
    pub async fn replace_links(
        conn: &mut PgConnection,
        owner: LinkOwner,
        owner_id: i64,
        food_type_ids: &[i64],
    ) -> AppResult<()> {
        let delete_sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            owner.table(),
            owner.owner_column()
        );
        sqlx::query(&delete_sql)
            .bind(owner_id)
            .execute(&mut *conn)
            .await
            .map_err(classify_write_error)?;

        let ids = dedup_ids(food_type_ids);
        if ids.is_empty() {
            return Ok(());
        }

        let insert_sql = format!(
            "INSERT INTO {} ({}, food_type_id) SELECT $1, UNNEST($2::BIGINT[])",
            owner.table(),
            owner.owner_column()
        );
        sqlx::query(&insert_sql)
            .bind(owner_id)
            .bind(&ids)
            .execute(&mut *conn)
            .await
            .map_err(classify_write_error)?;

        Ok(())
    }

    /// Add a single link. Existing links are left untouched.
    pub async fn link(
        conn: &mut PgConnection,
        owner: LinkOwner,
        owner_id: i64,
        food_type_id: i64,
    ) -> AppResult<()> {
        let sql = format!(
            "INSERT INTO {} ({}, food_type_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            owner.table(),
            owner.owner_column()
        );
        sqlx::query(&sql)
            .bind(owner_id)
            .bind(food_type_id)
            .execute(conn)
            .await
            .map_err(classify_write_error)?;

        Ok(())
    }
}

/// Sorted, duplicate-free copy of `ids`.
pub fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_use_their_own_junction() {
        assert_eq!(LinkOwner::Restaurant.table(), "restaurant_food_type");
        assert_eq!(LinkOwner::Restaurant.owner_column(), "restaurant_id");
        assert_eq!(LinkOwner::Suggestion.table(), "suggestion_food_type");
        assert_eq!(LinkOwner::Suggestion.owner_column(), "suggestion_id");
    }

    #[test]
    fn dedup_sorts_and_removes_repeats() {
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
        assert!(dedup_ids(&[]).is_empty());
    }
}
