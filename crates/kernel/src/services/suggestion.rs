//! Suggestion lifecycle service.
//!
//! Moderation (create, edit, status changes, delete) and the conversion of
//! a suggestion into a catalog restaurant.
//!
//! Conversion runs in one transaction. Loading and locking the suggestion
//! and inserting the restaurant are all-or-nothing; the follow-up steps
//! (food type copy, initial rating, suggestion removal) each run in their
//! own savepoint, so a failing step is undone on its own and reported as a
//! [`NonFatal`] warning instead of failing the conversion.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, PgPool};

use crate::discovery::FoodTypeLoader;
use crate::error::{AppError, AppResult};
use crate::models::food_type::{FoodType, LinkOwner};
use crate::models::suggestion::parse_status;
use crate::models::{
    CreateSuggestion, Rating, RatingValues, Restaurant, RestaurantSuggestion, UpdateSuggestion,
};
use crate::request::RequestContext;

/// Input for converting a suggestion.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertSuggestion {
    /// Category of the new restaurant; defaults to the suggested one.
    pub category_id: Option<i64>,
    /// Initial rating recorded against the new restaurant.
    pub ratings: RatingValues,
    pub comment: Option<String>,
}

/// A conversion step that failed without failing the conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum NonFatal {
    /// The suggestion's food types could not be read.
    FoodTypeLookup { error: String },
    /// One food type link could not be copied.
    FoodTypeCopy { food_type_id: i64, error: String },
    /// The initial rating could not be stored.
    InitialRating { error: String },
    /// The suggestion row could not be removed.
    SuggestionDelete { error: String },
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutcome {
    pub restaurant_id: i64,
    pub warnings: Vec<NonFatal>,
}

/// A suggestion with its food types.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionDetail {
    #[serde(flatten)]
    pub suggestion: RestaurantSuggestion,
    pub food_types: Vec<FoodType>,
}

/// Suggestion lifecycle service.
#[derive(Clone)]
pub struct SuggestionService {
    pool: PgPool,
    loader: FoodTypeLoader,
}

impl SuggestionService {
    pub fn new(pool: PgPool, loader: FoodTypeLoader) -> Self {
        Self { pool, loader }
    }

    /// Propose a suggestion. Fails with a conflict when it duplicates a
    /// catalog restaurant.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: CreateSuggestion,
    ) -> AppResult<RestaurantSuggestion> {
        let input = CreateSuggestion {
            fields: input.fields.normalized()?,
            ..input
        };
        ctx.run(RestaurantSuggestion::create(&self.pool, input))
            .await
    }

    pub async fn get(&self, ctx: &RequestContext, id: i64) -> AppResult<SuggestionDetail> {
        let suggestion = ctx
            .run(async {
                RestaurantSuggestion::find_by_id(&self.pool, id)
                    .await
                    .map_err(AppError::from)
            })
            .await?
            .ok_or(AppError::NotFound)?;

        let mut food_types = self
            .loader
            .load(ctx, LinkOwner::Suggestion, &[suggestion.id])
            .await?;
        Ok(SuggestionDetail {
            food_types: food_types.remove(&suggestion.id).unwrap_or_default(),
            suggestion,
        })
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        input: UpdateSuggestion,
    ) -> AppResult<RestaurantSuggestion> {
        ctx.run(RestaurantSuggestion::update(&self.pool, id, input))
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Move a suggestion to the status named by `status`.
    ///
    /// Unknown status names are rejected before storage is touched.
    pub async fn set_status(
        &self,
        ctx: &RequestContext,
        id: i64,
        status: &str,
    ) -> AppResult<RestaurantSuggestion> {
        let status = parse_status(status)?;
        ctx.run(RestaurantSuggestion::set_status(&self.pool, id, status))
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: i64) -> AppResult<()> {
        let deleted = ctx
            .run(async {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .context("failed to acquire connection")?;
                RestaurantSuggestion::delete(&mut conn, id)
                    .await
                    .map_err(AppError::from)
            })
            .await?;

        if !deleted {
            return Err(AppError::NotFound);
        }
        tracing::info!(suggestion_id = id, "suggestion deleted");
        Ok(())
    }

    /// Promote a suggestion into a catalog restaurant.
    ///
    /// Concurrent conversions of the same suggestion serialise on its row
    /// lock; every one after the first finds the row gone and fails with
    /// [`AppError::NotFound`].
    pub async fn convert(
        &self,
        ctx: &RequestContext,
        id: i64,
        input: ConvertSuggestion,
    ) -> AppResult<ConversionOutcome> {
        input.ratings.validate()?;

        let mut tx = ctx
            .run(async {
                self.pool
                    .begin()
                    .await
                    .context("failed to start transaction")
                    .map_err(AppError::from)
            })
            .await?;

        let suggestion = ctx
            .run(async {
                RestaurantSuggestion::lock(&mut tx, id)
                    .await
                    .map_err(AppError::from)
            })
            .await?
            .ok_or(AppError::NotFound)?;

        if !suggestion.status.is_convertible() {
            return Err(AppError::Validation(format!(
                "suggestion {id} is {} and cannot be converted",
                suggestion.status
            )));
        }

        let category_id = input.category_id.or(suggestion.suggested_category_id);
        let fields = suggestion.fields().normalized()?;

        ctx.check()?;
        let restaurant = ctx
            .run(Restaurant::insert(&mut tx, &fields, category_id))
            .await?;

        let mut warnings = Vec::new();

        ctx.check()?;
        let lookup = ctx
            .run(async {
                let mut sp = tx.begin().await?;
                let ids = FoodType::linked_ids(&mut sp, LinkOwner::Suggestion, id).await?;
                sp.commit().await?;
                Ok::<_, AppError>(ids)
            })
            .await;
        let food_type_ids = match lookup {
            Ok(ids) => ids,
            Err(e @ (AppError::Cancelled | AppError::DeadlineExceeded)) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    error = %e.detail(),
                    suggestion_id = id,
                    "failed to read suggestion food types"
                );
                warnings.push(NonFatal::FoodTypeLookup {
                    error: e.detail(),
                });
                Vec::new()
            }
        };

        for food_type_id in food_type_ids {
            ctx.check()?;
            let copied = ctx
                .run(async {
                    let mut sp = tx.begin().await?;
                    FoodType::link(&mut sp, LinkOwner::Restaurant, restaurant.id, food_type_id)
                        .await?;
                    sp.commit().await?;
                    Ok::<_, AppError>(())
                })
                .await;
            match copied {
                Ok(()) => {}
                Err(e @ (AppError::Cancelled | AppError::DeadlineExceeded)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        error = %e.detail(),
                        suggestion_id = id,
                        restaurant_id = restaurant.id,
                        food_type_id,
                        "skipping food type during conversion"
                    );
                    warnings.push(NonFatal::FoodTypeCopy {
                        food_type_id,
                        error: e.detail(),
                    });
                }
            }
        }

        ctx.check()?;
        let rated = ctx
            .run(async {
                let mut sp = tx.begin().await?;
                Rating::insert(
                    &mut sp,
                    restaurant.id,
                    &input.ratings,
                    input.comment.as_deref(),
                )
                .await?;
                sp.commit().await?;
                Ok::<_, AppError>(())
            })
            .await;
        match rated {
            Ok(()) => {}
            Err(e @ (AppError::Cancelled | AppError::DeadlineExceeded)) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    error = %e.detail(),
                    restaurant_id = restaurant.id,
                    "failed to store initial rating"
                );
                warnings.push(NonFatal::InitialRating {
                    error: e.detail(),
                });
            }
        }

        ctx.check()?;
        let removed = ctx
            .run(async {
                let mut sp = tx.begin().await?;
                let deleted = RestaurantSuggestion::delete(&mut sp, id).await?;
                sp.commit().await?;
                Ok::<_, AppError>(deleted)
            })
            .await;
        match removed {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(suggestion_id = id, "converted suggestion was already gone");
            }
            Err(e @ (AppError::Cancelled | AppError::DeadlineExceeded)) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    error = %e.detail(),
                    suggestion_id = id,
                    restaurant_id = restaurant.id,
                    "failed to delete converted suggestion"
                );
                warnings.push(NonFatal::SuggestionDelete {
                    error: e.detail(),
                });
            }
        }

        ctx.run(async {
            tx.commit()
                .await
                .context("failed to commit conversion")
                .map_err(AppError::from)
        })
        .await?;

        tracing::info!(
            suggestion_id = id,
            restaurant_id = restaurant.id,
            warnings = warnings.len(),
            "suggestion converted"
        );
        Ok(ConversionOutcome {
            restaurant_id: restaurant.id,
            warnings,
        })
    }
}
