//! Restaurant discovery.
//!
//! This module provides:
//! - Per-source filter conditions built with SeaQuery
//! - Haversine distances and radius prefilters
//! - The catalog/suggestion merge and global search
//! - Keyset pagination over the catalog
//! - Batched food type hydration

pub mod geo;
pub mod loader;
pub mod merge;
pub mod pagination;
pub mod predicate;
mod service;

pub use geo::{BoundingBox, EARTH_RADIUS_KM, GeoPoint, GeoQuery, haversine_km};
pub use loader::{FoodTypeLoader, FoodTypeStore};
pub use merge::{DiscoveryResult, GLOBAL_SEARCH_LIMIT, SuggestionInclusion};
pub use pagination::{CatalogEntry, CatalogPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use predicate::{DiscoveryFilter, RawDiscoveryFilter};
pub use service::DiscoveryService;
