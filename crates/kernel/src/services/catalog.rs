//! Catalog maintenance: direct restaurant CRUD and ratings.

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;

use crate::discovery::FoodTypeLoader;
use crate::error::{AppError, AppResult};
use crate::models::{
    AvgRating, Category, CreateRating, CreateRestaurant, FoodType, LinkOwner, Rating, Restaurant,
    UpdateRestaurant,
};
use crate::request::RequestContext;

/// A restaurant with everything needed for its detail view.
#[derive(Debug, Clone, Serialize)]
pub struct RestaurantDetail {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub category: Option<Category>,
    pub food_types: Vec<FoodType>,
    pub ratings: Vec<Rating>,
    pub average: Option<AvgRating>,
}

/// A freshly stored rating and the resulting average.
#[derive(Debug, Clone, Serialize)]
pub struct RatingAdded {
    pub rating: Rating,
    pub average: Option<AvgRating>,
}

/// Catalog maintenance service.
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
    loader: FoodTypeLoader,
}

impl CatalogService {
    pub fn new(pool: PgPool, loader: FoodTypeLoader) -> Self {
        Self { pool, loader }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: CreateRestaurant,
    ) -> AppResult<Restaurant> {
        let input = CreateRestaurant {
            fields: input.fields.normalized()?,
            ..input
        };
        ctx.run(Restaurant::create(&self.pool, input)).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: i64) -> AppResult<RestaurantDetail> {
        let restaurant = ctx
            .run(async {
                Restaurant::find_by_id(&self.pool, id)
                    .await
                    .map_err(AppError::from)
            })
            .await?
            .ok_or(AppError::NotFound)?;

        let category = match restaurant.category_id {
            Some(category_id) => {
                ctx.run(async {
                    Category::find_by_id(&self.pool, category_id)
                        .await
                        .map_err(AppError::from)
                })
                .await?
            }
            None => None,
        };

        let ratings = ctx
            .run(async {
                Rating::list_for_restaurant(&self.pool, id)
                    .await
                    .map_err(AppError::from)
            })
            .await?;
        let average = AvgRating::from_ratings(&ratings);

        let mut food_types = self.loader.load(ctx, LinkOwner::Restaurant, &[id]).await?;

        Ok(RestaurantDetail {
            restaurant,
            category,
            food_types: food_types.remove(&id).unwrap_or_default(),
            ratings,
            average,
        })
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        input: UpdateRestaurant,
    ) -> AppResult<Restaurant> {
        ctx.run(Restaurant::update(&self.pool, id, input))
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: i64) -> AppResult<()> {
        let deleted = ctx
            .run(async {
                Restaurant::delete(&self.pool, id)
                    .await
                    .map_err(AppError::from)
            })
            .await?;
        if !deleted {
            return Err(AppError::NotFound);
        }
        tracing::info!(restaurant_id = id, "restaurant deleted");
        Ok(())
    }

    /// Rate a restaurant and return the updated average.
    pub async fn add_rating(
        &self,
        ctx: &RequestContext,
        restaurant_id: i64,
        input: CreateRating,
    ) -> AppResult<RatingAdded> {
        input.values.validate()?;

        let rating = ctx
            .run(async {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .context("failed to acquire connection")?;
                Rating::insert(
                    &mut conn,
                    restaurant_id,
                    &input.values,
                    input.comment.as_deref(),
                )
                .await
            })
            .await?;

        let average = ctx
            .run(async {
                Rating::average_for_restaurant(&self.pool, restaurant_id)
                    .await
                    .map_err(AppError::from)
            })
            .await?;

        tracing::info!(restaurant_id, rating_id = rating.id, "rating added");
        Ok(RatingAdded { rating, average })
    }
}
