use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a scheduled activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Scheduled, not started yet.
    #[default]
    Upcoming,
    /// Currently being played.
    Active,
    /// Over; participants may settle it.
    Completed,
    /// Called off by the organizer.
    Cancelled,
}

/// Final score of an event as entered by a settling participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ScorePair {
    /// Points of the first side.
    pub team_a: u32,
    /// Points of the second side.
    pub team_b: u32,
}

impl ScorePair {
    /// Create a score pair.
    pub fn new(team_a: u32, team_b: u32) -> Self {
        Self { team_a, team_b }
    }

    /// Render the score the way the feed displays it (`"3 - 1"`).
    pub fn display(&self) -> String {
        format!("{} - {}", self.team_a, self.team_b)
    }
}

/// Scheduled sporting activity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEntity {
    /// Primary key of the event.
    pub id: Uuid,
    /// Display title chosen by the organizer.
    pub title: String,
    /// Sport identifier (e.g. "football", "basketball").
    pub sport_type: String,
    /// Human readable place where the event happens.
    pub location_name: String,
    /// Current lifecycle status.
    pub status: EventStatus,
    /// Players registered for the event.
    pub participants: Vec<Uuid>,
    /// Players who completed a settlement and confirmed they attended.
    #[serde(default)]
    pub confirmed_attendance: Vec<Uuid>,
    /// Score of the first side, absent until settled.
    #[serde(default)]
    pub score_team_a: Option<u32>,
    /// Score of the second side, absent until settled.
    #[serde(default)]
    pub score_team_b: Option<u32>,
    /// Players whose settlement went through every write.
    #[serde(default)]
    pub settled_by: Vec<Uuid>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the event was updated.
    pub updated_at: SystemTime,
}

impl EventEntity {
    /// Whether the player is registered for this event.
    pub fn has_participant(&self, player_id: Uuid) -> bool {
        self.participants.contains(&player_id)
    }

    /// Whether the player already completed a settlement for this event.
    pub fn is_settled_by(&self, player_id: Uuid) -> bool {
        self.settled_by.contains(&player_id)
    }

    /// Apply a settled result in place: union the attendance and overwrite the score.
    pub fn apply_result(&mut self, player_id: Uuid, score: ScorePair) {
        if !self.confirmed_attendance.contains(&player_id) {
            self.confirmed_attendance.push(player_id);
        }
        self.score_team_a = Some(score.team_a);
        self.score_team_b = Some(score.team_b);
        self.updated_at = SystemTime::now();
    }

    /// Record the settlement-completed marker for a player.
    pub fn apply_settled_marker(&mut self, player_id: Uuid) {
        if !self.settled_by.contains(&player_id) {
            self.settled_by.push(player_id);
        }
        self.updated_at = SystemTime::now();
    }
}

/// Player profile, restricted to the fields the settlement reads or writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Primary key of the player.
    pub id: Uuid,
    /// Public handle.
    pub username: String,
    /// Optional avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Number of settled games.
    #[serde(default)]
    pub games_played: u32,
    /// Accumulated gamification points.
    #[serde(default)]
    pub total_points: u32,
    /// Number of events this player organized.
    #[serde(default)]
    pub games_organized: u32,
    /// Accepted friends.
    #[serde(default)]
    pub friends: Vec<Uuid>,
    /// Average overall peer rating.
    #[serde(default)]
    pub avg_overall_rating: f64,
    /// Average sportsmanship peer rating.
    #[serde(default)]
    pub avg_sportsmanship_rating: f64,
    /// Events whose settlement reward has already been credited.
    #[serde(default)]
    pub credited_events: Vec<Uuid>,
}

impl PlayerEntity {
    /// Apply the settlement reward in place unless the event was already credited.
    ///
    /// Returns `true` when the counters changed.
    pub fn apply_credit(&mut self, event_id: Uuid, points: u32) -> bool {
        if self.credited_events.contains(&event_id) {
            return false;
        }
        self.games_played = self.games_played.saturating_add(1);
        self.total_points = self.total_points.saturating_add(points);
        self.credited_events.push(event_id);
        true
    }

    /// Replace the profile rating averages.
    pub fn apply_rating_averages(&mut self, overall: f64, sportsmanship: f64) {
        self.avg_overall_rating = overall;
        self.avg_sportsmanship_rating = sportsmanship;
    }
}

/// Peer rating given by one participant to another for one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingEntity {
    /// Deterministic key derived from `(event_id, rater_id, rated_player_id)`.
    pub id: Uuid,
    /// Event being rated.
    pub event_id: Uuid,
    /// Player who gave the rating.
    pub rater_id: Uuid,
    /// Player who received the rating.
    pub rated_player_id: Uuid,
    /// Effort score (1-5).
    pub effort: u8,
    /// Teamwork score (1-5).
    pub teamwork: u8,
    /// Sportsmanship score (1-5).
    pub sportsmanship: u8,
    /// Overall score (1-5).
    pub overall: u8,
    /// Trust multiplier applied by aggregates.
    pub rater_reliability_weight: f64,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Subjective exertion reported by the player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PerceivedEffort {
    /// Easy session.
    Low,
    /// Regular session.
    #[default]
    Medium,
    /// Hard session.
    High,
}

/// How the player felt after the game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Feeling {
    /// On fire.
    Great,
    /// Fine.
    #[default]
    Good,
    /// Meh.
    Okay,
    /// Low on energy.
    Tired,
    /// Completely drained.
    Exhausted,
}

/// Self-reported account of one game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelfReportEntity {
    /// Deterministic key derived from `(event_id, player_id)`.
    pub id: Uuid,
    /// Event the report refers to.
    pub event_id: Uuid,
    /// Reporting player.
    pub player_id: Uuid,
    /// Perceived exertion.
    pub perceived_effort: PerceivedEffort,
    /// Length of the session in minutes.
    pub duration_minutes: u32,
    /// Mood after the game.
    pub feeling: Feeling,
    /// Always `true`; distinguishes player reports from staff-entered ones.
    pub is_self_reported: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Kind of announcement stored in the social feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedPostKind {
    /// A player settled a finished game.
    GameCompleted,
}

/// Audience of a feed post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Everyone can see the post.
    Public,
}

/// Denormalized feed announcement of a completed game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedPostEntity {
    /// Deterministic key derived from `(event_id, player_id)`.
    pub id: Uuid,
    /// Announcement kind.
    #[serde(rename = "type")]
    pub kind: FeedPostKind,
    /// Event being announced.
    pub event_id: Uuid,
    /// Author of the post.
    pub player_id: Uuid,
    /// Author handle at posting time.
    pub player_name: String,
    /// Author avatar at posting time.
    pub player_avatar: Option<String>,
    /// Text body.
    pub content: String,
    /// Sport played.
    pub sport_type: String,
    /// Everyone registered for the event.
    pub participants: Vec<Uuid>,
    /// Score rendered as `"{team_a} - {team_b}"`.
    pub score: String,
    /// Audience.
    pub visibility: Visibility,
    /// Players who liked the post.
    pub likes: Vec<Uuid>,
    /// Number of comments.
    pub comments_count: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Result of crediting the settlement reward to a player.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditOutcome {
    /// Player state after the operation.
    pub player: PlayerEntity,
    /// `false` when the event had already been credited and nothing changed.
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            username: "dana".into(),
            avatar_url: None,
            games_played: 4,
            total_points: 40,
            games_organized: 0,
            friends: Vec::new(),
            avg_overall_rating: 0.0,
            avg_sportsmanship_rating: 0.0,
            credited_events: Vec::new(),
        }
    }

    #[test]
    fn credit_is_applied_once_per_event() {
        let mut player = player();
        let event_id = Uuid::new_v4();

        assert!(player.apply_credit(event_id, 10));
        assert!(!player.apply_credit(event_id, 10));
        assert_eq!(player.games_played, 5);
        assert_eq!(player.total_points, 50);
    }

    #[test]
    fn score_display_uses_spaced_dash() {
        assert_eq!(ScorePair::new(3, 1).display(), "3 - 1");
        assert_eq!(ScorePair::default().display(), "0 - 0");
    }
}
