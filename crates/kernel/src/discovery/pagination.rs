//! Keyset pagination over the restaurant catalog.
//!
//! Pages are addressed by the last identity seen, never by offset. The
//! cursor handed to callers is the URL-safe base64 of that identity in
//! decimal.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sea_query::{Alias, Asterisk, Order, Query, SelectStatement};
use serde::Serialize;

use super::predicate::{DiscoveryFilter, PredicateBuilder, SourceColumns, TextScope};
use crate::error::{AppError, AppResult};
use crate::models::{FoodType, Restaurant};

/// Page size used when none (or a non-positive one) is requested.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size served; larger requests are clamped.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Effective page size for a requested one.
pub fn normalize_limit(requested: Option<i64>) -> i64 {
    match requested {
        Some(n) if n > 0 => n.min(MAX_PAGE_SIZE),
        _ => DEFAULT_PAGE_SIZE,
    }
}

/// Opaque cursor for the position after `id`.
pub fn encode_cursor(id: i64) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

/// Identity encoded in `cursor`; `None` for an empty cursor (first page).
pub fn decode_cursor(cursor: &str) -> AppResult<Option<i64>> {
    let cursor = cursor.trim();
    if cursor.is_empty() {
        return Ok(None);
    }
    let invalid = || AppError::validation("invalid pagination cursor");

    let bytes = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    let id = text.parse::<i64>().map_err(|_| invalid())?;
    Ok(Some(id))
}

/// A restaurant with its food types.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub food_types: Vec<FoodType>,
}

/// One page of the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub items: Vec<CatalogEntry>,
    /// Cursor of the next page, present exactly when `has_more` is.
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Query for up to `limit + 1` restaurants after `after`, ascending by id.
///
/// The extra row only signals that another page exists.
pub fn catalog_page_query(
    filter: &DiscoveryFilter,
    after: Option<i64>,
    limit: i64,
) -> SelectStatement {
    let columns = SourceColumns::RESTAURANT;
    let condition = PredicateBuilder::new(columns)
        .category(filter.category_id)
        .food_types(&filter.food_type_ids)
        .text(filter.text.as_deref(), TextScope::NameOrDescription)
        .after_id(after)
        .finish();

    Query::select()
        .column((Alias::new(columns.alias), Asterisk))
        .from_as(Alias::new(columns.table), Alias::new(columns.alias))
        .cond_where(condition)
        .order_by(columns.column_ref("id"), Order::Asc)
        .limit(u64::try_from(limit).unwrap_or(0) + 1)
        .to_owned()
}

/// Drop the look-ahead row from `rows` and derive the continuation.
///
/// Returns the page, the cursor of its last row when more rows follow,
/// and whether more rows follow.
pub fn split_page<T>(
    mut rows: Vec<T>,
    limit: i64,
    id_of: impl Fn(&T) -> i64,
) -> (Vec<T>, Option<String>, bool) {
    let limit = usize::try_from(limit).unwrap_or(0);
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    let next_cursor = if has_more {
        rows.last().map(|row| encode_cursor(id_of(row)))
    } else {
        None
    };
    (rows, next_cursor, has_more)
}
