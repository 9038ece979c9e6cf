use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::settlement::{
        AttendanceRequest, CommitResponse, PeerRatingRequest, ScoreRequest, SelfReportRequest,
        SettlementView, StartSettlementRequest,
    },
    error::AppError,
    services::settlement_service,
    state::SharedState,
};

/// Routes driving a settlement session from attendance to commit.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/settlements", post(start_settlement))
        .route(
            "/settlements/{id}",
            get(get_settlement).delete(discard_settlement),
        )
        .route("/settlements/{id}/attendance", post(confirm_attendance))
        .route("/settlements/{id}/score", put(set_score))
        .route("/settlements/{id}/ratings/skip", post(skip_ratings))
        .route(
            "/settlements/{id}/ratings/{player_id}/toggle",
            post(toggle_participant),
        )
        .route("/settlements/{id}/ratings/{player_id}", put(rate_participant))
        .route("/settlements/{id}/self-report", put(set_self_report))
        .route("/settlements/{id}/next", post(next_stage))
        .route("/settlements/{id}/back", post(previous_stage))
        .route("/settlements/{id}/commit", post(commit_settlement))
}

/// Open a settlement for a player and an event.
#[utoipa::path(
    post,
    path = "/settlements",
    tag = "settlement",
    request_body = StartSettlementRequest,
    responses(
        (status = 200, description = "Session opened or resumed", body = SettlementView),
        (status = 404, description = "Unknown event or player"),
        (status = 409, description = "Event cancelled or already settled by this player")
    )
)]
pub async fn start_settlement(
    State(state): State<SharedState>,
    Json(payload): Json<StartSettlementRequest>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(settlement_service::start(&state, payload).await?))
}

/// Current stage and draft of a session.
#[utoipa::path(
    get,
    path = "/settlements/{id}",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    responses(
        (status = 200, description = "Session state", body = SettlementView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_settlement(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(settlement_service::get(&state, id).await?))
}

/// Discard a session without writing anything.
#[utoipa::path(
    delete,
    path = "/settlements/{id}",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    responses(
        (status = 204, description = "Session discarded"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn discard_settlement(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    settlement_service::discard(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Answer whether the player attended; "no" closes the session.
#[utoipa::path(
    post,
    path = "/settlements/{id}/attendance",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    request_body = AttendanceRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = SettlementView),
        (status = 409, description = "Not a participant or wrong stage")
    )
)]
pub async fn confirm_attendance(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AttendanceRequest>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(
        settlement_service::confirm_attendance(&state, id, payload.attended).await?,
    ))
}

/// Enter the final score.
#[utoipa::path(
    put,
    path = "/settlements/{id}/score",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    request_body = ScoreRequest,
    responses(
        (status = 200, description = "Score updated", body = SettlementView),
        (status = 409, description = "Session is not on the score stage")
    )
)]
pub async fn set_score(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScoreRequest>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(settlement_service::set_score(&state, id, payload).await?))
}

/// Select or deselect a co-participant.
#[utoipa::path(
    post,
    path = "/settlements/{id}/ratings/{player_id}/toggle",
    tag = "settlement",
    params(
        ("id" = Uuid, Path, description = "Settlement session identifier"),
        ("player_id" = Uuid, Path, description = "Co-participant to toggle")
    ),
    responses(
        (status = 200, description = "Selection updated", body = SettlementView),
        (status = 404, description = "Not a co-participant"),
        (status = 409, description = "Session is not on the rating stage")
    )
)]
pub async fn toggle_participant(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(
        settlement_service::toggle_participant(&state, id, player_id).await?,
    ))
}

/// Adjust the scores given to a selected co-participant.
#[utoipa::path(
    put,
    path = "/settlements/{id}/ratings/{player_id}",
    tag = "settlement",
    params(
        ("id" = Uuid, Path, description = "Settlement session identifier"),
        ("player_id" = Uuid, Path, description = "Co-participant being rated")
    ),
    request_body = PeerRatingRequest,
    responses(
        (status = 200, description = "Scores updated", body = SettlementView),
        (status = 400, description = "Score outside the 1-5 scale"),
        (status = 409, description = "Participant not selected or wrong stage")
    )
)]
pub async fn rate_participant(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<PeerRatingRequest>,
) -> Result<Json<SettlementView>, AppError> {
    payload.validate()?;
    Ok(Json(
        settlement_service::rate_participant(&state, id, player_id, payload).await?,
    ))
}

/// Leave the rating stage without rating anyone.
#[utoipa::path(
    post,
    path = "/settlements/{id}/ratings/skip",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    responses(
        (status = 200, description = "Ratings skipped", body = SettlementView),
        (status = 409, description = "Session is not on the rating stage")
    )
)]
pub async fn skip_ratings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(settlement_service::skip_ratings(&state, id).await?))
}

/// Update the self-report.
#[utoipa::path(
    put,
    path = "/settlements/{id}/self-report",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    request_body = SelfReportRequest,
    responses(
        (status = 200, description = "Self-report updated", body = SettlementView),
        (status = 409, description = "Session is not on the self-report stage")
    )
)]
pub async fn set_self_report(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelfReportRequest>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(
        settlement_service::set_self_report(&state, id, payload).await?,
    ))
}

/// Move to the following stage.
#[utoipa::path(
    post,
    path = "/settlements/{id}/next",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    responses(
        (status = 200, description = "Stage advanced", body = SettlementView),
        (status = 409, description = "No forward transition from this stage")
    )
)]
pub async fn next_stage(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(settlement_service::next(&state, id).await?))
}

/// Return to the previous stage.
#[utoipa::path(
    post,
    path = "/settlements/{id}/back",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    responses(
        (status = 200, description = "Stage moved back", body = SettlementView),
        (status = 409, description = "No backward transition from this stage")
    )
)]
pub async fn previous_stage(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SettlementView>, AppError> {
    Ok(Json(settlement_service::back(&state, id).await?))
}

/// Persist ratings, self-report, event result, feed post and rewards.
#[utoipa::path(
    post,
    path = "/settlements/{id}/commit",
    tag = "settlement",
    params(("id" = Uuid, Path, description = "Settlement session identifier")),
    responses(
        (status = 200, description = "Settlement committed", body = CommitResponse),
        (status = 409, description = "Session is not on the summary stage"),
        (status = 503, description = "A write failed or timed out; the commit can be retried")
    )
)]
pub async fn commit_settlement(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommitResponse>, AppError> {
    Ok(Json(settlement_service::commit(&state, id).await?))
}
