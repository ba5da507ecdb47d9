//! Discovery service: merged listings, global search and catalog pages.

use std::sync::Arc;

use anyhow::Context;
use sea_query::PostgresQueryBuilder;
use sea_query_binder::SqlxBinder;
use sqlx::PgPool;

use super::loader::FoodTypeLoader;
use super::merge::{
    DiscoveryResult, DiscoveryRow, SuggestionInclusion, apply_geo, merge_query,
    normalize_search_limit,
};
use super::pagination::{
    CatalogEntry, CatalogPage, catalog_page_query, decode_cursor, normalize_limit, split_page,
};
use super::predicate::{DiscoveryFilter, TextScope};
use crate::error::{AppError, AppResult};
use crate::models::{LinkOwner, Restaurant};
use crate::request::RequestContext;

/// Read side of the catalog.
#[derive(Clone)]
pub struct DiscoveryService {
    pool: PgPool,
    loader: FoodTypeLoader,
    inclusion: SuggestionInclusion,
}

impl DiscoveryService {
    /// Create a service reading from `pool`, showing suggestions whose
    /// status is in `inclusion`.
    pub fn new(pool: PgPool, inclusion: SuggestionInclusion) -> Self {
        let loader = FoodTypeLoader::new(Arc::new(pool.clone()));
        Self::with_loader(pool, loader, inclusion)
    }

    /// Create a service with a custom food type loader.
    pub fn with_loader(
        pool: PgPool,
        loader: FoodTypeLoader,
        inclusion: SuggestionInclusion,
    ) -> Self {
        Self {
            pool,
            loader,
            inclusion,
        }
    }

    pub fn inclusion(&self) -> &SuggestionInclusion {
        &self.inclusion
    }

    /// Every restaurant matching `filter`, plus matching suggestions when
    /// requested. Unpaginated.
    pub async fn list_discovery(
        &self,
        ctx: &RequestContext,
        filter: &DiscoveryFilter,
    ) -> AppResult<Vec<DiscoveryResult>> {
        let inclusion = filter.include_suggestions.then_some(&self.inclusion);
        let results = self
            .merged(ctx, filter, inclusion, TextScope::NameOrDescription, None)
            .await?;

        tracing::debug!(
            count = results.len(),
            include_suggestions = filter.include_suggestions,
            geo = filter.geo.is_some(),
            "discovery listing"
        );
        Ok(results)
    }

    /// Restaurants and suggestions whose name contains `text`, newest
    /// first, at most 20.
    ///
    /// Empty text matches nothing.
    pub async fn global_search(
        &self,
        ctx: &RequestContext,
        text: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<DiscoveryResult>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let filter = DiscoveryFilter {
            text: Some(text.to_string()),
            ..Default::default()
        };
        let limit = normalize_search_limit(limit);

        self.merged(
            ctx,
            &filter,
            Some(&self.inclusion),
            TextScope::NameOnly,
            Some(limit),
        )
        .await
    }

    /// One keyset page of the catalog. Suggestions are never included.
    pub async fn list_catalog_page(
        &self,
        ctx: &RequestContext,
        filter: &DiscoveryFilter,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> AppResult<CatalogPage> {
        let after = decode_cursor(cursor.unwrap_or_default())?;
        let limit = normalize_limit(limit);

        let (sql, values) =
            catalog_page_query(filter, after, limit).build_sqlx(PostgresQueryBuilder);
        let rows = ctx
            .run(async {
                sqlx::query_as_with::<_, Restaurant, _>(&sql, values)
                    .fetch_all(&self.pool)
                    .await
                    .context("failed to fetch catalog page")
                    .map_err(AppError::from)
            })
            .await?;

        let (rows, next_cursor, has_more) = split_page(rows, limit, |r| r.id);

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut food_types = self.loader.load(ctx, LinkOwner::Restaurant, &ids).await?;

        let items = rows
            .into_iter()
            .map(|restaurant| CatalogEntry {
                food_types: food_types.remove(&restaurant.id).unwrap_or_default(),
                restaurant,
            })
            .collect();

        Ok(CatalogPage {
            items,
            next_cursor,
            has_more,
        })
    }

    async fn merged(
        &self,
        ctx: &RequestContext,
        filter: &DiscoveryFilter,
        inclusion: Option<&SuggestionInclusion>,
        scope: TextScope,
        limit: Option<i64>,
    ) -> AppResult<Vec<DiscoveryResult>> {
        let radius = filter.geo.is_some_and(|g| g.radius_km.is_some());
        // Distance ordering happens after the query, so the cap must too
        let sql_limit = if radius { None } else { limit };

        let (sql, values) =
            merge_query(filter, inclusion, scope, sql_limit).build_sqlx(PostgresQueryBuilder);
        let rows = ctx
            .run(async {
                sqlx::query_as_with::<_, DiscoveryRow, _>(&sql, values)
                    .fetch_all(&self.pool)
                    .await
                    .context("failed to fetch discovery results")
                    .map_err(AppError::from)
            })
            .await?;

        let mut results = rows
            .into_iter()
            .map(DiscoveryResult::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;

        apply_geo(&mut results, filter.geo);
        if let Some(limit) = limit {
            results.truncate(usize::try_from(limit).unwrap_or(0));
        }

        self.hydrate(ctx, &mut results).await?;
        Ok(results)
    }

    /// Attach food types with one lookup per source.
    async fn hydrate(
        &self,
        ctx: &RequestContext,
        results: &mut [DiscoveryResult],
    ) -> AppResult<()> {
        let (suggestions, restaurants): (Vec<_>, Vec<_>) =
            results.iter().partition(|r| r.is_suggestion);
        let restaurant_ids: Vec<i64> = restaurants.iter().map(|r| r.id).collect();
        let suggestion_ids: Vec<i64> = suggestions.iter().map(|r| r.id).collect();

        let mut restaurant_types = self
            .loader
            .load(ctx, LinkOwner::Restaurant, &restaurant_ids)
            .await?;
        let mut suggestion_types = self
            .loader
            .load(ctx, LinkOwner::Suggestion, &suggestion_ids)
            .await?;

        for result in results.iter_mut() {
            let source = if result.is_suggestion {
                &mut suggestion_types
            } else {
                &mut restaurant_types
            };
            result.food_types = source.remove(&result.id).unwrap_or_default();
        }
        Ok(())
    }
}
