//! Achievement catalog and progress evaluation against player counters.

use crate::dao::models::PlayerEntity;

/// Grouping shown on the achievements page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementCategory {
    Participation,
    Social,
    Performance,
    Special,
}

/// Counter an achievement is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    GamesPlayed,
    FriendsCount,
    GamesOrganized,
    OverallRating,
    SportsmanshipRating,
    /// Awarded at the end of a season; no counter is tracked for it.
    SeasonalRank,
    /// Awarded at the end of a season; no counter is tracked for it.
    SeasonalGames,
}

impl Requirement {
    fn current(self, player: &PlayerEntity) -> f64 {
        match self {
            Requirement::GamesPlayed => f64::from(player.games_played),
            Requirement::FriendsCount => player.friends.len() as f64,
            Requirement::GamesOrganized => f64::from(player.games_organized),
            Requirement::OverallRating => player.avg_overall_rating,
            Requirement::SportsmanshipRating => player.avg_sportsmanship_rating,
            Requirement::SeasonalRank | Requirement::SeasonalGames => 0.0,
        }
    }
}

/// Static definition of an achievement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: u32,
    pub category: AchievementCategory,
    pub requirement: Requirement,
    pub requirement_value: f64,
    pub seasonal: bool,
}

const fn achievement(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    points: u32,
    category: AchievementCategory,
    requirement: Requirement,
    requirement_value: f64,
) -> Achievement {
    Achievement {
        id,
        name,
        description,
        points,
        category,
        requirement,
        requirement_value,
        seasonal: matches!(
            requirement,
            Requirement::SeasonalRank | Requirement::SeasonalGames
        ),
    }
}

use AchievementCategory::*;

/// Every achievement a player can earn.
#[rustfmt::skip]
pub const CATALOG: &[Achievement] = &[
    achievement("first_game", "First Game", "Play your first game", 10, Participation, Requirement::GamesPlayed, 1.0),
    achievement("team_player", "Team Player", "Play 10 games", 50, Participation, Requirement::GamesPlayed, 10.0),
    achievement("veteran", "Veteran", "Play 50 games", 200, Participation, Requirement::GamesPlayed, 50.0),
    achievement("social_butterfly", "Social Butterfly", "Make 5 friends", 30, Social, Requirement::FriendsCount, 5.0),
    achievement("popular", "Popular", "Make 20 friends", 100, Social, Requirement::FriendsCount, 20.0),
    achievement("organizer", "Event Organizer", "Organize your first event", 25, Participation, Requirement::GamesOrganized, 1.0),
    achievement("super_organizer", "Super Organizer", "Organize 10 events", 150, Participation, Requirement::GamesOrganized, 10.0),
    achievement("all_star", "All Star", "Maintain 4.5+ overall rating", 100, Performance, Requirement::OverallRating, 4.5),
    achievement("fair_play", "Fair Play Player", "Maintain excellent sportsmanship", 150, Performance, Requirement::SportsmanshipRating, 4.7),
    achievement("best_player", "Best Player", "Top performer of the season", 300, Special, Requirement::SeasonalRank, 1.0),
    achievement("most_active", "Most Active Player", "Most games played this season", 200, Special, Requirement::SeasonalGames, 1.0),
];

/// Progress of one player towards one achievement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AchievementProgress {
    pub achievement: &'static Achievement,
    pub current: f64,
    /// Percentage in `0..=100`.
    pub percent: f64,
    pub unlocked: bool,
}

/// Progress towards a single achievement, capped at 100%.
pub fn progress(achievement: &'static Achievement, player: &PlayerEntity) -> AchievementProgress {
    let current = achievement.requirement.current(player);
    let percent = if achievement.requirement_value > 0.0 {
        (current / achievement.requirement_value * 100.0).clamp(0.0, 100.0)
    } else {
        100.0
    };
    AchievementProgress {
        achievement,
        current,
        percent,
        unlocked: percent >= 100.0,
    }
}

/// Progress over the whole catalog, in catalog order.
pub fn evaluate(player: &PlayerEntity) -> Vec<AchievementProgress> {
    CATALOG.iter().map(|a| progress(a, player)).collect()
}

/// Achievements locked for `before` and unlocked for `after`.
pub fn newly_unlocked(before: &PlayerEntity, after: &PlayerEntity) -> Vec<&'static Achievement> {
    CATALOG
        .iter()
        .filter(|a| !progress(*a, before).unlocked && progress(*a, after).unlocked)
        .collect()
}

/// Sum of the points of every unlocked achievement.
pub fn earned_points(player: &PlayerEntity) -> u32 {
    evaluate(player)
        .iter()
        .filter(|p| p.unlocked)
        .map(|p| p.achievement.points)
        .sum()
}
