use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::player::{PlayerAchievementsResponse, RatingSummaryResponse},
    error::AppError,
    services::player_service,
    state::SharedState,
};

/// Read-only player projections fed by settlements.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players/{id}/achievements", get(player_achievements))
        .route("/players/{id}/ratings", get(player_ratings))
}

/// Achievement progress of a player.
#[utoipa::path(
    get,
    path = "/players/{id}/achievements",
    tag = "player",
    params(("id" = Uuid, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Achievement progress", body = PlayerAchievementsResponse),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn player_achievements(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerAchievementsResponse>, AppError> {
    Ok(Json(player_service::achievements(&state, id).await?))
}

/// Reliability-weighted averages of the ratings a player received.
#[utoipa::path(
    get,
    path = "/players/{id}/ratings",
    tag = "player",
    params(("id" = Uuid, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Rating summary", body = RatingSummaryResponse),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn player_ratings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RatingSummaryResponse>, AppError> {
    Ok(Json(player_service::rating_summary(&state, id).await?))
}
