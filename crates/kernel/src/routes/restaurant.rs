//! Restaurant API routes.
//!
//! Direct catalog maintenance and ratings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::request_context;
use crate::error::AppResult;
use crate::models::{CreateRating, CreateRestaurant, Restaurant, UpdateRestaurant};
use crate::services::catalog::{RatingAdded, RestaurantDetail};
use crate::state::AppState;

/// Create the restaurant router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/restaurants", post(create_restaurant))
        .route(
            "/api/restaurants/{id}",
            get(get_restaurant)
                .put(update_restaurant)
                .delete(delete_restaurant),
        )
        .route("/api/restaurants/{id}/ratings", post(add_rating))
}

async fn create_restaurant(
    State(state): State<AppState>,
    Json(input): Json<CreateRestaurant>,
) -> AppResult<(StatusCode, Json<Restaurant>)> {
    let ctx = request_context(&state);
    let restaurant = state.catalog().create(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(restaurant)))
}

async fn get_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<RestaurantDetail>> {
    let ctx = request_context(&state);
    Ok(Json(state.catalog().get(&ctx, id).await?))
}

async fn update_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateRestaurant>,
) -> AppResult<Json<Restaurant>> {
    let ctx = request_context(&state);
    Ok(Json(state.catalog().update(&ctx, id, input).await?))
}

async fn delete_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let ctx = request_context(&state);
    state.catalog().delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_rating(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CreateRating>,
) -> AppResult<(StatusCode, Json<RatingAdded>)> {
    let ctx = request_context(&state);
    let added = state.catalog().add_rating(&ctx, id, input).await?;
    Ok((StatusCode::CREATED, Json(added)))
}
