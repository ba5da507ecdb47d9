//! Suggestion API routes.
//!
//! Moderation endpoints and conversion into the catalog.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use super::request_context;
use crate::error::AppResult;
use crate::models::{CreateSuggestion, RestaurantSuggestion, UpdateSuggestion};
use crate::services::suggestion::{ConversionOutcome, ConvertSuggestion, SuggestionDetail};
use crate::state::AppState;

/// Create the suggestion router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/suggestions", post(create_suggestion))
        .route(
            "/api/suggestions/{id}",
            get(get_suggestion)
                .put(update_suggestion)
                .delete(delete_suggestion),
        )
        .route("/api/suggestions/{id}/status", put(set_status))
        .route("/api/suggestions/{id}/convert", post(convert_suggestion))
}

/// Body of a status change; the service parses the value.
#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: String,
}

async fn create_suggestion(
    State(state): State<AppState>,
    Json(input): Json<CreateSuggestion>,
) -> AppResult<(StatusCode, Json<RestaurantSuggestion>)> {
    let ctx = request_context(&state);
    let suggestion = state.suggestions().create(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(suggestion)))
}

async fn get_suggestion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuggestionDetail>> {
    let ctx = request_context(&state);
    Ok(Json(state.suggestions().get(&ctx, id).await?))
}

async fn update_suggestion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateSuggestion>,
) -> AppResult<Json<RestaurantSuggestion>> {
    let ctx = request_context(&state);
    Ok(Json(state.suggestions().update(&ctx, id, input).await?))
}

async fn delete_suggestion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let ctx = request_context(&state);
    state.suggestions().delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> AppResult<Json<RestaurantSuggestion>> {
    let ctx = request_context(&state);
    Ok(Json(
        state.suggestions().set_status(&ctx, id, &body.status).await?,
    ))
}

async fn convert_suggestion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ConvertSuggestion>,
) -> AppResult<(StatusCode, Json<ConversionOutcome>)> {
    let ctx = request_context(&state);
    let outcome = state.suggestions().convert(&ctx, id, input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
