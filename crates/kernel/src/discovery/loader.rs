//! Batch loading of food type associations.
//!
//! A page of N rows resolves its food types with one query. Only when that
//! query fails does the loader fall back to one query per row, and a row
//! whose lookup still fails gets an empty list.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::food_type::{FoodType, LinkOwner, dedup_ids};
use crate::request::RequestContext;

/// Storage lookup of food type links.
#[async_trait]
pub trait FoodTypeStore: Send + Sync {
    /// `(owner id, food type)` pairs for every id in `owner_ids`, ordered
    /// by food type name.
    async fn food_types_for(
        &self,
        owner: LinkOwner,
        owner_ids: &[i64],
    ) -> Result<Vec<(i64, FoodType)>>;
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    owner_id: i64,
    id: i64,
    name: String,
}

#[async_trait]
impl FoodTypeStore for PgPool {
    async fn food_types_for(
        &self,
        owner: LinkOwner,
        owner_ids: &[i64],
    ) -> Result<Vec<(i64, FoodType)>> {
        let sql = format!(
            r#"
            SELECT l.{owner_column} AS owner_id, f.id, f.name
            FROM {table} l
            JOIN food_type f ON f.id = l.food_type_id
            WHERE l.{owner_column} = ANY($1)
            ORDER BY f.name, f.id
            "#,
            owner_column = owner.owner_column(),
            table = owner.table(),
        );
        let rows = sqlx::query_as::<_, LinkRow>(&sql)
            .bind(owner_ids)
            .fetch_all(self)
            .await
            .context("failed to load food types")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.owner_id,
                    FoodType {
                        id: row.id,
                        name: row.name,
                    },
                )
            })
            .collect())
    }
}

/// Resolves food types for a set of restaurants or suggestions.
#[derive(Clone)]
pub struct FoodTypeLoader {
    store: Arc<dyn FoodTypeStore>,
}

impl FoodTypeLoader {
    pub fn new(store: Arc<dyn FoodTypeStore>) -> Self {
        Self { store }
    }

    /// Map every id in `owner_ids` to its food types, ordered by name.
    ///
    /// Storage failures degrade to empty lists. Only an expired deadline
    /// or a cancellation is returned as an error.
    pub async fn load(
        &self,
        ctx: &RequestContext,
        owner: LinkOwner,
        owner_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<FoodType>>> {
        let ids = dedup_ids(owner_ids);
        let mut map: HashMap<i64, Vec<FoodType>> =
            ids.iter().map(|id| (*id, Vec::new())).collect();
        if ids.is_empty() {
            return Ok(map);
        }

        match self.fetch(ctx, owner, &ids).await {
            Ok(pairs) => {
                for (owner_id, food_type) in pairs {
                    map.entry(owner_id).or_default().push(food_type);
                }
                return Ok(map);
            }
            Err(e @ (AppError::Cancelled | AppError::DeadlineExceeded)) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    error = %e.detail(),
                    ?owner,
                    count = ids.len(),
                    "batch food type lookup failed, loading per row"
                );
            }
        }

        for id in ids {
            match self.fetch(ctx, owner, &[id]).await {
                Ok(pairs) => {
                    map.insert(id, pairs.into_iter().map(|(_, ft)| ft).collect());
                }
                Err(e @ (AppError::Cancelled | AppError::DeadlineExceeded)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        error = %e.detail(),
                        ?owner,
                        owner_id = id,
                        "food type lookup failed"
                    );
                }
            }
        }
        Ok(map)
    }

    async fn fetch(
        &self,
        ctx: &RequestContext,
        owner: LinkOwner,
        ids: &[i64],
    ) -> AppResult<Vec<(i64, FoodType)>> {
        ctx.run(async {
            self.store
                .food_types_for(owner, ids)
                .await
                .map_err(AppError::from)
        })
        .await
    }
}
