//! Ratings of catalog restaurants and their aggregated averages.
//!
//! Ratings always reference a restaurant, never a suggestion. Averages are
//! never stored; [`AvgRating`] is derived on read.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult, classify_write_error};

/// Lowest accepted sub-rating.
pub const MIN_RATING: i32 = 1;

/// Highest accepted sub-rating.
pub const MAX_RATING: i32 = 5;

/// A stored rating.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub restaurant_id: i64,
    pub food: i16,
    pub service: i16,
    pub ambiance: i16,
    pub comment: Option<String>,
    /// Unix timestamp when created.
    pub created: i64,
}

/// The three sub-ratings as submitted by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingValues {
    pub food: i32,
    pub service: i32,
    pub ambiance: i32,
}

impl RatingValues {
    /// Check every sub-rating is within 1–5.
    pub fn validate(&self) -> AppResult<()> {
        for (label, value) in [
            ("food", self.food),
            ("service", self.service),
            ("ambiance", self.ambiance),
        ] {
            if !(MIN_RATING..=MAX_RATING).contains(&value) {
                return Err(AppError::Validation(format!(
                    "{label} rating must be between {MIN_RATING} and {MAX_RATING}, got {value}"
                )));
            }
        }
        Ok(())
    }

    fn as_smallints(&self) -> AppResult<(i16, i16, i16)> {
        self.validate()?;
        let narrow = |value: i32| {
            i16::try_from(value)
                .map_err(|_| AppError::validation(format!("rating {value} does not fit a SMALLINT")))
        };
        Ok((
            narrow(self.food)?,
            narrow(self.service)?,
            narrow(self.ambiance)?,
        ))
    }
}

/// Input for rating a restaurant.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRating {
    #[serde(flatten)]
    pub values: RatingValues,
    pub comment: Option<String>,
}

/// Per-dimension means, the mean of those means, and the rating count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AvgRating {
    pub food: f64,
    pub service: f64,
    pub ambiance: f64,
    pub overall: f64,
    pub count: i64,
}

impl AvgRating {
    /// Build from SQL aggregates. `None` when there are no ratings.
    pub fn from_aggregates(count: i64, food: f64, service: f64, ambiance: f64) -> Option<Self> {
        if count <= 0 {
            return None;
        }
        Some(Self {
            food,
            service,
            ambiance,
            overall: (food + service + ambiance) / 3.0,
            count,
        })
    }

    /// Fold loaded ratings into an average. `None` for an empty slice.
    pub fn from_ratings(ratings: &[Rating]) -> Option<Self> {
        let (food, service, ambiance) = ratings.iter().fold((0.0, 0.0, 0.0), |acc, r| {
            (
                acc.0 + f64::from(r.food),
                acc.1 + f64::from(r.service),
                acc.2 + f64::from(r.ambiance),
            )
        });
        let count = ratings.len() as f64;
        Self::from_aggregates(
            ratings.len() as i64,
            food / count,
            service / count,
            ambiance / count,
        )
    }
}

impl Rating {
    /// Insert a rating for a restaurant.
    pub async fn insert(
        conn: &mut PgConnection,
        restaurant_id: i64,
        values: &RatingValues,
        comment: Option<&str>,
    ) -> AppResult<Self> {
        let (food, service, ambiance) = values.as_smallints()?;
        let now = chrono::Utc::now().timestamp();

        let rating = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO rating (restaurant_id, food, service, ambiance, comment, created)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, restaurant_id, food, service, ambiance, comment, created
            "#,
        )
        .bind(restaurant_id)
        .bind(food)
        .bind(service)
        .bind(ambiance)
        .bind(comment)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(|e| match classify_write_error(e) {
            // The only foreign key on rating is the restaurant
            AppError::Validation(_) => AppError::NotFound,
            other => other,
        })?;

        Ok(rating)
    }

    /// List ratings of a restaurant, newest first.
    pub async fn list_for_restaurant(pool: &PgPool, restaurant_id: i64) -> Result<Vec<Self>> {
        let ratings = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, restaurant_id, food, service, ambiance, comment, created
            FROM rating WHERE restaurant_id = $1
            ORDER BY created DESC, id DESC
            "#,
        )
        .bind(restaurant_id)
        .fetch_all(pool)
        .await
        .context("failed to list ratings")?;

        Ok(ratings)
    }

    /// Live-aggregated average of one restaurant.
    pub async fn average_for_restaurant(
        pool: &PgPool,
        restaurant_id: i64,
    ) -> Result<Option<AvgRating>> {
        let (count, food, service, ambiance): (i64, Option<f64>, Option<f64>, Option<f64>) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*), AVG(food)::FLOAT8, AVG(service)::FLOAT8, AVG(ambiance)::FLOAT8
                FROM rating WHERE restaurant_id = $1
                "#,
            )
            .bind(restaurant_id)
            .fetch_one(pool)
            .await
            .context("failed to aggregate ratings")?;

        Ok(AvgRating::from_aggregates(
            count,
            food.unwrap_or_default(),
            service.unwrap_or_default(),
            ambiance.unwrap_or_default(),
        ))
    }
}
