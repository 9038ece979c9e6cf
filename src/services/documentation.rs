use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the PLYR settlement backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::settlement::start_settlement,
        crate::routes::settlement::get_settlement,
        crate::routes::settlement::discard_settlement,
        crate::routes::settlement::confirm_attendance,
        crate::routes::settlement::set_score,
        crate::routes::settlement::toggle_participant,
        crate::routes::settlement::rate_participant,
        crate::routes::settlement::skip_ratings,
        crate::routes::settlement::set_self_report,
        crate::routes::settlement::next_stage,
        crate::routes::settlement::previous_stage,
        crate::routes::settlement::commit_settlement,
        crate::routes::players::player_achievements,
        crate::routes::players::player_ratings,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::settlement::StartSettlementRequest,
            crate::dto::settlement::AttendanceRequest,
            crate::dto::settlement::ScoreRequest,
            crate::dto::settlement::PeerRatingRequest,
            crate::dto::settlement::SelfReportRequest,
            crate::dto::settlement::SettlementView,
            crate::dto::settlement::DraftView,
            crate::dto::settlement::RosterEntryView,
            crate::dto::settlement::PeerScoresView,
            crate::dto::settlement::SelfReportView,
            crate::dto::settlement::CommitResponse,
            crate::dto::stage::VisibleStage,
            crate::dto::player::AchievementView,
            crate::dto::player::PlayerAchievementsResponse,
            crate::dto::player::RatingSummaryResponse,
            crate::dao::models::PerceivedEffort,
            crate::dao::models::Feeling,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "settlement", description = "Post-game settlement workflow"),
        (name = "player", description = "Player achievements and rating aggregates"),
    )
)]
pub struct ApiDoc;
