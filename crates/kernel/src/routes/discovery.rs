//! Discovery API routes.
//!
//! Read-only listings: the merged discovery view, the paginated catalog and
//! global name search.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{parse_limit, request_context};
use crate::discovery::{CatalogPage, DiscoveryResult, RawDiscoveryFilter};
use crate::error::AppResult;
use crate::state::AppState;

/// Create the discovery router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/discover", get(discover))
        .route("/api/restaurants", get(list_restaurants))
        .route("/api/search", get(search))
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    #[serde(flatten)]
    filter: RawDiscoveryFilter,
    cursor: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<String>,
}

async fn discover(
    State(state): State<AppState>,
    Query(raw): Query<RawDiscoveryFilter>,
) -> AppResult<Json<Vec<DiscoveryResult>>> {
    let ctx = request_context(&state);
    let results = state.discovery().list_discovery(&ctx, &raw.parse()).await?;
    Ok(Json(results))
}

async fn list_restaurants(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<CatalogPage>> {
    let ctx = request_context(&state);
    let mut filter = params.filter.parse();
    // Geo and suggestions do not apply to the paginated catalog
    filter.geo = None;
    filter.include_suggestions = false;

    let page = state
        .discovery()
        .list_catalog_page(
            &ctx,
            &filter,
            params.cursor.as_deref(),
            parse_limit(params.limit.as_deref()),
        )
        .await?;
    Ok(Json(page))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<DiscoveryResult>>> {
    let ctx = request_context(&state);
    let results = state
        .discovery()
        .global_search(
            &ctx,
            params.q.as_deref().unwrap_or_default(),
            parse_limit(params.limit.as_deref()),
        )
        .await?;
    Ok(Json(results))
}
