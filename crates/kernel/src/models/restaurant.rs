//! Restaurant model and catalog CRUD operations.
//!
//! Restaurants are the permanent catalog entries. They are created either
//! directly or by converting a suggestion, updated by partial-field
//! replacement and deleted by id (links and ratings cascade).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use super::food_type::{FoodType, LinkOwner};
use super::listing::{ListingFields, ListingPatch};
use crate::error::{AppResult, ConflictRule, classify_write_error};

/// Columns selected for a [`Restaurant`].
const RESTAURANT_COLUMNS: &str = "id, name, description, address, phone, website, latitude, \
     longitude, place_id, category_id, created, changed";

/// Restaurant record (catalog entry).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Restaurant {
    /// Identity, drawn from the sequence shared with suggestions.
    pub id: i64,

    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,

    /// Latitude in degrees; present exactly when `longitude` is.
    pub latitude: Option<f64>,
    /// Longitude in degrees; present exactly when `latitude` is.
    pub longitude: Option<f64>,

    /// External place reference, unique when present.
    pub place_id: Option<String>,

    pub category_id: Option<i64>,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Input for creating a restaurant.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRestaurant {
    #[serde(flatten)]
    pub fields: ListingFields,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub food_type_ids: Vec<i64>,
}

/// Input for updating a restaurant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRestaurant {
    #[serde(flatten)]
    pub fields: ListingPatch,
    pub category_id: Option<i64>,
    /// When present, replaces the whole food type set.
    pub food_type_ids: Option<Vec<i64>>,
}

impl Restaurant {
    fn fields(&self) -> ListingFields {
        ListingFields {
            name: self.name.clone(),
            description: self.description.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            website: self.website.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            place_id: self.place_id.clone(),
        }
    }

    /// Find a restaurant by ID.
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let sql = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurant WHERE id = $1");
        let restaurant = sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch restaurant")?;

        Ok(restaurant)
    }

    /// Which uniqueness rule an entry with these fields would violate.
    ///
    /// The external place reference is checked first; name and address
    /// only when the reference does not match.
    pub async fn find_conflict(
        conn: &mut PgConnection,
        fields: &ListingFields,
    ) -> Result<Option<ConflictRule>> {
        if let Some(ref place_id) = fields.place_id {
            let taken: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM restaurant WHERE place_id = $1)")
                    .bind(place_id)
                    .fetch_one(&mut *conn)
                    .await
                    .context("failed to check place reference")?;
            if taken {
                return Ok(Some(ConflictRule::ExternalPlace));
            }
        }

        if let Some(ref address) = fields.address {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM restaurant WHERE name = $1 AND address = $2)",
            )
            .bind(&fields.name)
            .bind(address)
            .fetch_one(&mut *conn)
            .await
            .context("failed to check name and address")?;
            if taken {
                return Ok(Some(ConflictRule::NameAddress));
            }
        }

        Ok(None)
    }

    /// Insert a restaurant row. Fields must already be normalized.
    ///
    /// Uniqueness is enforced by the storage constraints and surfaces as
    /// [`crate::error::AppError::Conflict`].
    pub async fn insert(
        conn: &mut PgConnection,
        fields: &ListingFields,
        category_id: Option<i64>,
    ) -> AppResult<Self> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            r#"
            INSERT INTO restaurant (name, description, address, phone, website, latitude,
                longitude, place_id, category_id, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );
        let restaurant = sqlx::query_as::<_, Self>(&sql)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.address)
            .bind(&fields.phone)
            .bind(&fields.website)
            .bind(fields.latitude)
            .bind(fields.longitude)
            .bind(&fields.place_id)
            .bind(category_id)
            .bind(now)
            .fetch_one(conn)
            .await
            .map_err(classify_write_error)?;

        Ok(restaurant)
    }

    /// Create a restaurant together with its food type links.
    pub async fn create(pool: &PgPool, input: CreateRestaurant) -> AppResult<Self> {
        let fields = input.fields.normalized()?;

        let mut tx = pool.begin().await.context("failed to start transaction")?;

        let restaurant = Self::insert(&mut tx, &fields, input.category_id).await?;
        FoodType::replace_links(
            &mut tx,
            LinkOwner::Restaurant,
            restaurant.id,
            &input.food_type_ids,
        )
        .await?;

        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(
            restaurant_id = restaurant.id,
            name = %restaurant.name,
            "restaurant created"
        );
        Ok(restaurant)
    }

    /// Update a restaurant. Returns `None` if it does not exist.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        input: UpdateRestaurant,
    ) -> AppResult<Option<Self>> {
        let mut tx = pool.begin().await.context("failed to start transaction")?;

        let sql = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurant WHERE id = $1 FOR UPDATE");
        let Some(current) = sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("failed to lock restaurant")?
        else {
            return Ok(None);
        };

        let fields = current.fields().patched(input.fields).normalized()?;
        let category_id = input.category_id.or(current.category_id);
        let now = chrono::Utc::now().timestamp();

        let sql = format!(
            r#"
            UPDATE restaurant SET
                name = $1, description = $2, address = $3, phone = $4, website = $5,
                latitude = $6, longitude = $7, place_id = $8, category_id = $9, changed = $10
            WHERE id = $11
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Self>(&sql)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.address)
            .bind(&fields.phone)
            .bind(&fields.website)
            .bind(fields.latitude)
            .bind(fields.longitude)
            .bind(&fields.place_id)
            .bind(category_id)
            .bind(now)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify_write_error)?;

        if let Some(ref food_type_ids) = input.food_type_ids {
            FoodType::replace_links(&mut tx, LinkOwner::Restaurant, id, food_type_ids).await?;
        }

        tx.commit().await.context("failed to commit transaction")?;

        Ok(Some(updated))
    }

    /// Delete a restaurant. Links and ratings are removed via CASCADE.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM restaurant WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete restaurant")?;

        Ok(result.rows_affected() > 0)
    }
}
