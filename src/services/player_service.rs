use uuid::Uuid;

use crate::{
    dto::player::{AchievementView, PlayerAchievementsResponse, RatingSummaryResponse},
    error::ServiceError,
    services::{achievements, rating_summary},
    state::SharedState,
};

/// Achievement progress computed from the stored player counters.
pub async fn achievements(
    state: &SharedState,
    player_id: Uuid,
) -> Result<PlayerAchievementsResponse, ServiceError> {
    let store = state.require_entity_store().await?;
    let player = store
        .find_player(player_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}`")))?;

    Ok(PlayerAchievementsResponse {
        player_id,
        games_played: player.games_played,
        total_points: player.total_points,
        achievement_points: achievements::earned_points(&player),
        achievements: achievements::evaluate(&player)
            .into_iter()
            .map(AchievementView::from)
            .collect(),
    })
}

pub async fn rating_summary(
    state: &SharedState,
    player_id: Uuid,
) -> Result<RatingSummaryResponse, ServiceError> {
    let summary = rating_summary::summary_for(state, player_id).await?;
    Ok(RatingSummaryResponse::new(player_id, summary))
}
