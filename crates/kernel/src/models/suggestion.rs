//! Restaurant suggestion model and moderation operations.
//!
//! Suggestions share the descriptive shape of a [`Restaurant`] and add a
//! moderation status and notes. Duplicate detection runs against the
//! restaurant table only.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use super::food_type::{FoodType, LinkOwner};
use super::listing::{ListingFields, ListingPatch};
use super::restaurant::Restaurant;
use crate::error::{AppError, AppResult, classify_write_error};

/// Columns selected for a [`SuggestionRow`].
const SUGGESTION_COLUMNS: &str = "id, name, description, address, phone, website, latitude, \
     longitude, place_id, suggested_category_id, status, notes, created, changed";

/// Moderation status of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    /// Newly proposed, awaiting moderation.
    Pending,
    Approved,
    /// Visited and checked by a moderator.
    Tested,
    /// Terminal; never converted.
    Rejected,
}

impl SuggestionStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [SuggestionStatus; 4] = [
        Self::Pending,
        Self::Approved,
        Self::Tested,
        Self::Rejected,
    ];

    /// Return the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Tested => "tested",
            Self::Rejected => "rejected",
        }
    }

    /// Whether moderation may move a suggestion from `self` to `target`.
    ///
    /// `rejected` is terminal: it may only be set to itself again.
    pub fn can_transition_to(self, target: SuggestionStatus) -> bool {
        self != Self::Rejected || target == Self::Rejected
    }

    /// Whether a suggestion in this status may be converted into a restaurant.
    pub fn is_convertible(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "tested" => Ok(Self::Tested),
            "rejected" => Ok(Self::Rejected),
            _ => Err(anyhow::anyhow!(
                "invalid suggestion status: {s:?} (expected pending, approved, tested, or rejected)"
            )),
        }
    }
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a caller-supplied status, rejecting unknown values as a
/// validation failure.
pub fn parse_status(value: &str) -> AppResult<SuggestionStatus> {
    value
        .parse()
        .map_err(|e: anyhow::Error| AppError::Validation(e.to_string()))
}

/// Suggestion record.
#[derive(Debug, Clone, Serialize)]
pub struct RestaurantSuggestion {
    /// Identity, drawn from the sequence shared with restaurants.
    pub id: i64,

    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_id: Option<String>,

    /// Category proposed by the submitter; conversion may override it.
    pub suggested_category_id: Option<i64>,

    pub status: SuggestionStatus,

    /// Free-text moderation notes.
    pub notes: Option<String>,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Row type for reading a suggestion (status stored as TEXT).
#[derive(sqlx::FromRow)]
struct SuggestionRow {
    id: i64,
    name: String,
    description: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    place_id: Option<String>,
    suggested_category_id: Option<i64>,
    status: String,
    notes: Option<String>,
    created: i64,
    changed: i64,
}

impl TryFrom<SuggestionRow> for RestaurantSuggestion {
    type Error = anyhow::Error;

    fn try_from(row: SuggestionRow) -> Result<Self> {
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
            suggested_category_id: row.suggested_category_id,
            status: row
                .status
                .parse()
                .with_context(|| format!("suggestion {} has an unreadable status", row.id))?,
            notes: row.notes,
            created: row.created,
            changed: row.changed,
        })
    }
}

/// Input for proposing a suggestion.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSuggestion {
    #[serde(flatten)]
    pub fields: ListingFields,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub food_type_ids: Vec<i64>,
    pub notes: Option<String>,
}

/// Input for editing a suggestion. Status is not editable here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSuggestion {
    #[serde(flatten)]
    pub fields: ListingPatch,
    pub category_id: Option<i64>,
    pub notes: Option<String>,
    /// When present, replaces the whole food type set.
    pub food_type_ids: Option<Vec<i64>>,
}

impl RestaurantSuggestion {
    /// The descriptive fields, as they would be copied onto a restaurant.
    pub fn fields(&self) -> ListingFields {
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

    /// Find a suggestion by ID.
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let sql = format!("SELECT {SUGGESTION_COLUMNS} FROM restaurant_suggestion WHERE id = $1");
        let row = sqlx::query_as::<_, SuggestionRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch suggestion")?;

        row.map(Self::try_from).transpose()
    }

    /// Load a suggestion and lock its row until the surrounding
    /// transaction ends.
    pub async fn lock(conn: &mut PgConnection, id: i64) -> Result<Option<Self>> {
        let sql = format!(
            "SELECT {SUGGESTION_COLUMNS} FROM restaurant_suggestion WHERE id = $1 FOR UPDATE"
        );
        let row = sqlx::query_as::<_, SuggestionRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
            .context("failed to lock suggestion")?;

        row.map(Self::try_from).transpose()
    }

    /// Propose a suggestion together with its food type links.
    ///
    /// Fails with [`AppError::Conflict`] when a restaurant already carries
    /// the same place reference or name and address. No row is written in
    /// that case.
    pub async fn create(pool: &PgPool, input: CreateSuggestion) -> AppResult<Self> {
        let fields = input.fields.normalized()?;
        let notes = input.notes.filter(|n| !n.trim().is_empty());

        let mut tx = pool.begin().await.context("failed to start transaction")?;

        if let Some(rule) = Restaurant::find_conflict(&mut tx, &fields).await? {
            tracing::info!(name = %fields.name, %rule, "suggestion duplicates a restaurant");
            return Err(AppError::Conflict(rule));
        }

        let now = chrono::Utc::now().timestamp();
        let sql = format!(
            r#"
            INSERT INTO restaurant_suggestion (name, description, address, phone, website,
                latitude, longitude, place_id, suggested_category_id, status, notes,
                created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING {SUGGESTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SuggestionRow>(&sql)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.address)
            .bind(&fields.phone)
            .bind(&fields.website)
            .bind(fields.latitude)
            .bind(fields.longitude)
            .bind(&fields.place_id)
            .bind(input.category_id)
            .bind(SuggestionStatus::Pending.as_str())
            .bind(&notes)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify_write_error)?;
        let suggestion = Self::try_from(row)?;

        FoodType::replace_links(
            &mut tx,
            LinkOwner::Suggestion,
            suggestion.id,
            &input.food_type_ids,
        )
        .await?;

        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(
            suggestion_id = suggestion.id,
            name = %suggestion.name,
            "suggestion created"
        );
        Ok(suggestion)
    }

    /// Edit descriptive fields and notes. Returns `None` if it does not exist.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        input: UpdateSuggestion,
    ) -> AppResult<Option<Self>> {
        let mut tx = pool.begin().await.context("failed to start transaction")?;

        let Some(current) = Self::lock(&mut tx, id).await? else {
            return Ok(None);
        };

        let fields = current.fields().patched(input.fields).normalized()?;
        let category_id = input.category_id.or(current.suggested_category_id);
        let notes = input.notes.or(current.notes);
        let now = chrono::Utc::now().timestamp();

        let sql = format!(
            r#"
            UPDATE restaurant_suggestion SET
                name = $1, description = $2, address = $3, phone = $4, website = $5,
                latitude = $6, longitude = $7, place_id = $8, suggested_category_id = $9,
                notes = $10, changed = $11
            WHERE id = $12
            RETURNING {SUGGESTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SuggestionRow>(&sql)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.address)
            .bind(&fields.phone)
            .bind(&fields.website)
            .bind(fields.latitude)
            .bind(fields.longitude)
            .bind(&fields.place_id)
            .bind(category_id)
            .bind(&notes)
            .bind(now)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify_write_error)?;

        if let Some(ref food_type_ids) = input.food_type_ids {
            FoodType::replace_links(&mut tx, LinkOwner::Suggestion, id, food_type_ids).await?;
        }

        tx.commit().await.context("failed to commit transaction")?;

        Ok(Some(Self::try_from(row)?))
    }

    /// Move a suggestion to `status`. Returns `None` if it does not exist.
    ///
    /// A disallowed transition is a validation error and leaves the stored
    /// status unchanged.
    pub async fn set_status(
        pool: &PgPool,
        id: i64,
        status: SuggestionStatus,
    ) -> AppResult<Option<Self>> {
        let mut tx = pool.begin().await.context("failed to start transaction")?;

        let Some(current) = Self::lock(&mut tx, id).await? else {
            return Ok(None);
        };

        if !current.status.can_transition_to(status) {
            return Err(AppError::Validation(format!(
                "suggestion {id} is {} and cannot become {status}",
                current.status
            )));
        }

        let sql = format!(
            r#"
            UPDATE restaurant_suggestion SET status = $1, changed = $2
            WHERE id = $3
            RETURNING {SUGGESTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SuggestionRow>(&sql)
            .bind(status.as_str())
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify_write_error)?;

        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(
            suggestion_id = id,
            from = %current.status,
            to = %status,
            "suggestion status changed"
        );
        Ok(Some(Self::try_from(row)?))
    }

    /// Delete a suggestion. Links are removed via CASCADE.
    pub async fn delete(conn: &mut PgConnection, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM restaurant_suggestion WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context("failed to delete suggestion")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            " Approved ".parse::<SuggestionStatus>().unwrap(),
            SuggestionStatus::Approved
        );
        for status in SuggestionStatus::ALL {
            assert_eq!(status.as_str().parse::<SuggestionStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert!(matches!(parse_status("bogus"), Err(AppError::Validation(_))));
        assert!(matches!(parse_status(""), Err(AppError::Validation(_))));
        assert!(matches!(
            parse_status("converted"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejected_is_terminal() {
        use SuggestionStatus::*;
        assert!(Rejected.can_transition_to(Rejected));
        for target in [Pending, Approved, Tested] {
            assert!(!Rejected.can_transition_to(target));
        }
        for from in [Pending, Approved, Tested] {
            for target in SuggestionStatus::ALL {
                assert!(from.can_transition_to(target));
            }
        }
    }

    #[test]
    fn only_rejected_blocks_conversion() {
        assert!(SuggestionStatus::Pending.is_convertible());
        assert!(SuggestionStatus::Approved.is_convertible());
        assert!(SuggestionStatus::Tested.is_convertible());
        assert!(!SuggestionStatus::Rejected.is_convertible());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&SuggestionStatus::Tested).unwrap();
        assert_eq!(json, "\"tested\"");
    }
}
