use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::{
    achievements::{Achievement, AchievementCategory, AchievementProgress},
    rating_summary::RatingSummary,
};

/// Achievement together with the player's progress towards it.
#[derive(Debug, Serialize, ToSchema)]
pub struct AchievementView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points: u32,
    /// `participation`, `social`, `performance` or `special`.
    pub category: String,
    pub seasonal: bool,
    pub requirement_value: f64,
    pub current: f64,
    /// Percentage in `0..=100`.
    pub progress: f64,
    pub unlocked: bool,
}

fn category_name(category: AchievementCategory) -> &'static str {
    match category {
        AchievementCategory::Participation => "participation",
        AchievementCategory::Social => "social",
        AchievementCategory::Performance => "performance",
        AchievementCategory::Special => "special",
    }
}

impl From<AchievementProgress> for AchievementView {
    fn from(value: AchievementProgress) -> Self {
        let achievement = value.achievement;
        Self {
            id: achievement.id.into(),
            name: achievement.name.into(),
            description: achievement.description.into(),
            points: achievement.points,
            category: category_name(achievement.category).into(),
            seasonal: achievement.seasonal,
            requirement_value: achievement.requirement_value,
            current: value.current,
            progress: value.percent,
            unlocked: value.unlocked,
        }
    }
}

impl AchievementView {
    /// View of an achievement that was just unlocked.
    pub fn unlocked(achievement: &'static Achievement) -> Self {
        Self {
            id: achievement.id.into(),
            name: achievement.name.into(),
            description: achievement.description.into(),
            points: achievement.points,
            category: category_name(achievement.category).into(),
            seasonal: achievement.seasonal,
            requirement_value: achievement.requirement_value,
            current: achievement.requirement_value,
            progress: 100.0,
            unlocked: true,
        }
    }
}

/// Achievement progress of one player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerAchievementsResponse {
    pub player_id: Uuid,
    pub games_played: u32,
    pub total_points: u32,
    /// Sum of the points of unlocked achievements.
    pub achievement_points: u32,
    pub achievements: Vec<AchievementView>,
}

/// Weighted averages of the peer ratings a player received.
#[derive(Debug, Serialize, ToSchema)]
pub struct RatingSummaryResponse {
    pub player_id: Uuid,
    pub count: usize,
    pub total_weight: f64,
    pub effort: f64,
    pub teamwork: f64,
    pub sportsmanship: f64,
    pub overall: f64,
}

impl RatingSummaryResponse {
    pub fn new(player_id: Uuid, summary: RatingSummary) -> Self {
        Self {
            player_id,
            count: summary.count,
            total_weight: summary.total_weight,
            effort: summary.effort,
            teamwork: summary.teamwork,
            sportsmanship: summary.sportsmanship,
            overall: summary.overall,
        }
    }
}
