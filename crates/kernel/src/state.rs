//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::config::Config;
use crate::db;
use crate::discovery::{DiscoveryService, FoodTypeLoader};
use crate::services::catalog::CatalogService;
use crate::services::suggestion::SuggestionService;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Loaded configuration.
    config: Config,

    /// PostgreSQL connection pool.
    db: PgPool,

    /// Discovery listings, global search and catalog pages.
    discovery: DiscoveryService,

    /// Restaurant CRUD and ratings.
    catalog: CatalogService,

    /// Suggestion moderation and conversion.
    suggestions: SuggestionService,
}

impl AppState {
    /// Create new application state, connecting to the database and
    /// applying migrations.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        Ok(Self::from_pool(config.clone(), db))
    }

    /// Build state around an existing pool.
    pub fn from_pool(config: Config, db: PgPool) -> Self {
        let loader = FoodTypeLoader::new(Arc::new(db.clone()));

        let discovery = DiscoveryService::with_loader(
            db.clone(),
            loader.clone(),
            config.suggestion_inclusion.clone(),
        );
        let catalog = CatalogService::new(db.clone(), loader.clone());
        let suggestions = SuggestionService::new(db.clone(), loader);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                discovery,
                catalog,
                suggestions,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub fn discovery(&self) -> &DiscoveryService {
        &self.inner.discovery
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    pub fn suggestions(&self) -> &SuggestionService {
        &self.inner.suggestions
    }

    /// Check if PostgreSQL is healthy.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }
}
