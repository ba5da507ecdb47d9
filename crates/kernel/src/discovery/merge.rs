//! Merging catalog restaurants and open suggestions into one result list.
//!
//! Both sources are projected onto the same column list and combined with
//! `UNION ALL`; suggestions carry zero rating aggregates. Radius filtering
//! and distance ordering happen afterwards on the combined rows.

use std::fmt;

use anyhow::{Context, Result};
use sea_query::{Alias, Asterisk, Expr, JoinType, Order, Query, SelectStatement, UnionType};
use serde::Serialize;

use super::geo::GeoQuery;
use super::predicate::{DiscoveryFilter, PredicateBuilder, SourceColumns, TextScope};
use crate::models::{AvgRating, FoodType, SuggestionStatus};

/// Default and maximum number of global search results.
pub const GLOBAL_SEARCH_LIMIT: i64 = 20;

/// Suggestion statuses shown next to catalog restaurants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionInclusion {
    statuses: Vec<SuggestionStatus>,
}

impl SuggestionInclusion {
    /// A policy including `statuses`. Rejected suggestions are never shown.
    pub fn new(statuses: impl IntoIterator<Item = SuggestionStatus>) -> Result<Self> {
        let mut seen = Vec::new();
        for status in statuses {
            if status == SuggestionStatus::Rejected {
                anyhow::bail!("rejected suggestions cannot be included in discovery results");
            }
            if !seen.contains(&status) {
                seen.push(status);
            }
        }
        if seen.is_empty() {
            anyhow::bail!("at least one suggestion status must be included");
        }
        Ok(Self { statuses: seen })
    }

    /// Parse a comma separated status list such as `approved,tested`.
    pub fn parse(list: &str) -> Result<Self> {
        let statuses = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<SuggestionStatus>())
            .collect::<Result<Vec<_>>>()
            .context("invalid suggestion status list")?;
        Self::new(statuses)
    }

    pub fn statuses(&self) -> &[SuggestionStatus] {
        &self.statuses
    }

    pub fn includes(&self, status: SuggestionStatus) -> bool {
        self.statuses.contains(&status)
    }

    fn as_strs(&self) -> Vec<&'static str> {
        self.statuses.iter().map(|s| s.as_str()).collect()
    }
}

impl Default for SuggestionInclusion {
    fn default() -> Self {
        Self {
            statuses: vec![SuggestionStatus::Approved, SuggestionStatus::Tested],
        }
    }
}

impl fmt::Display for SuggestionInclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_strs().join(","))
    }
}

/// One discovery hit: a restaurant or a suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResult {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_id: Option<String>,
    pub category_id: Option<i64>,
    pub created: i64,
    pub is_suggestion: bool,
    /// Moderation status; suggestions only.
    pub status: Option<SuggestionStatus>,
    /// Live average; restaurants with at least one rating only.
    pub rating: Option<AvgRating>,
    /// Kilometres from the requested center, when one was given.
    pub distance: Option<f64>,
    pub food_types: Vec<FoodType>,
}

/// Normalized row of the union query.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DiscoveryRow {
    id: i64,
    name: String,
    description: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    place_id: Option<String>,
    category_id: Option<i64>,
    created: i64,
    is_suggestion: bool,
    status: Option<String>,
    rating_count: i64,
    avg_food: f64,
    avg_service: f64,
    avg_ambiance: f64,
}

impl TryFrom<DiscoveryRow> for DiscoveryResult {
    type Error = anyhow::Error;

    fn try_from(row: DiscoveryRow) -> Result<Self> {
        let status = row
            .status
            .as_deref()
            .map(str::parse::<SuggestionStatus>)
            .transpose()
            .with_context(|| format!("discovery row {} has an unreadable status", row.id))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            address: row.address,
            phone: row.phone,
            website: row.website,
            latitude: row.latitude,
            longitude: row.longitude,
            place_id: row.place_id,
            category_id: row.category_id,
            created: row.created,
            is_suggestion: row.is_suggestion,
            status,
            rating: AvgRating::from_aggregates(
                row.rating_count,
                row.avg_food,
                row.avg_service,
                row.avg_ambiance,
            ),
            distance: None,
            food_types: Vec::new(),
        })
    }
}

/// Columns both sources project under the same name.
const LISTING_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "description",
    "address",
    "phone",
    "website",
    "latitude",
    "longitude",
    "place_id",
];

/// The listing columns of `columns`, with its category as `category_id`.
fn listing_select(columns: SourceColumns) -> SelectStatement {
    let mut select = Query::select();
    select
        .columns(LISTING_COLUMNS.iter().map(|name| columns.column_ref(name)))
        .expr_as(columns.column(columns.category), Alias::new("category_id"))
        .column(columns.column_ref("created"))
        .from_as(Alias::new(columns.table), Alias::new(columns.alias));
    select
}

/// Per-restaurant rating count and averages.
fn rating_aggregates() -> SelectStatement {
    Query::select()
        .column(Alias::new("restaurant_id"))
        .expr_as(Expr::cust("COUNT(*)"), Alias::new("rating_count"))
        .expr_as(Expr::cust("AVG(food)::FLOAT8"), Alias::new("avg_food"))
        .expr_as(Expr::cust("AVG(service)::FLOAT8"), Alias::new("avg_service"))
        .expr_as(Expr::cust("AVG(ambiance)::FLOAT8"), Alias::new("avg_ambiance"))
        .from(Alias::new("rating"))
        .group_by_col(Alias::new("restaurant_id"))
        .to_owned()
}

fn restaurant_select(filter: &DiscoveryFilter, scope: TextScope) -> SelectStatement {
    let columns = SourceColumns::RESTAURANT;
    let ratings = Alias::new("a");

    let mut select = listing_select(columns);
    select
        .expr_as(Expr::cust("FALSE"), Alias::new("is_suggestion"))
        .expr_as(Expr::cust("NULL::TEXT"), Alias::new("status"))
        .expr_as(
            Expr::cust("COALESCE(a.rating_count, 0)::BIGINT"),
            Alias::new("rating_count"),
        )
        .expr_as(
            Expr::cust("COALESCE(a.avg_food, 0)::FLOAT8"),
            Alias::new("avg_food"),
        )
        .expr_as(
            Expr::cust("COALESCE(a.avg_service, 0)::FLOAT8"),
            Alias::new("avg_service"),
        )
        .expr_as(
            Expr::cust("COALESCE(a.avg_ambiance, 0)::FLOAT8"),
            Alias::new("avg_ambiance"),
        )
        .join_subquery(
            JoinType::LeftJoin,
            rating_aggregates(),
            ratings.clone(),
            Expr::col((ratings, Alias::new("restaurant_id"))).equals(columns.column_ref("id")),
        )
        .cond_where(PredicateBuilder::for_filter(filter, columns, scope).finish());
    select
}

fn suggestion_select(
    filter: &DiscoveryFilter,
    inclusion: &SuggestionInclusion,
    scope: TextScope,
) -> SelectStatement {
    let columns = SourceColumns::SUGGESTION;
    let condition = PredicateBuilder::for_filter(filter, columns, scope)
        .status_in(&inclusion.as_strs())
        .finish();

    let mut select = listing_select(columns);
    select
        .expr_as(Expr::cust("TRUE"), Alias::new("is_suggestion"))
        .expr_as(columns.column("status"), Alias::new("status"))
        .expr_as(Expr::cust("0::BIGINT"), Alias::new("rating_count"))
        .expr_as(Expr::cust("0::FLOAT8"), Alias::new("avg_food"))
        .expr_as(Expr::cust("0::FLOAT8"), Alias::new("avg_service"))
        .expr_as(Expr::cust("0::FLOAT8"), Alias::new("avg_ambiance"))
        .cond_where(condition);
    select
}

/// Build the union query.
///
/// Restaurant values are bound first, suggestion values second. Rows are
/// ordered newest first; `sql_limit` caps the row count in storage and
/// must only be set when no distance reordering follows.
pub fn merge_query(
    filter: &DiscoveryFilter,
    inclusion: Option<&SuggestionInclusion>,
    scope: TextScope,
    sql_limit: Option<i64>,
) -> SelectStatement {
    let mut merged = restaurant_select(filter, scope);
    if let Some(inclusion) = inclusion {
        merged.union(UnionType::All, suggestion_select(filter, inclusion, scope));
    }

    let listing = Alias::new("listing");
    let mut query = Query::select();
    query
        .column((listing.clone(), Asterisk))
        .from_subquery(merged, listing.clone())
        .order_by((listing.clone(), Alias::new("created")), Order::Desc)
        .order_by((listing, Alias::new("id")), Order::Desc);
    if let Some(limit) = sql_limit {
        query.limit(u64::try_from(limit).unwrap_or(0));
    }
    query
}

/// Attach distances, drop rows outside the radius and order by distance.
///
/// Input must already be newest first; that order breaks distance ties.
/// Without a radius, distances are attached but the order is kept.
pub fn apply_geo(results: &mut Vec<DiscoveryResult>, geo: Option<GeoQuery>) {
    let Some(geo) = geo else {
        return;
    };
    for result in results.iter_mut() {
        result.distance = geo.distance_to(result.latitude, result.longitude);
    }
    if geo.radius_km.is_none() {
        return;
    }
    results.retain(|r| geo.admits(r.distance));
    results.sort_by(|a, b| {
        let (da, db) = (a.distance.unwrap_or(f64::MAX), b.distance.unwrap_or(f64::MAX));
        da.total_cmp(&db)
    });
}

/// Effective global search size for a requested one.
pub fn normalize_search_limit(requested: Option<i64>) -> i64 {
    match requested {
        Some(n) if n > 0 => n.min(GLOBAL_SEARCH_LIMIT),
        _ => GLOBAL_SEARCH_LIMIT,
    }
}
