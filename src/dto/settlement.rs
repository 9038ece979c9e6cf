//! DTO definitions used by the settlement REST API and documentation layer.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{Feeling, PerceivedEffort},
    dto::{
        format_system_time, player::AchievementView, stage::VisibleStage,
        validation::coerce_count,
    },
    state::{
        SettlementContext,
        draft::{PeerScores, PeerScoresUpdate, SelfReportUpdate, SettlementDraft},
        state_machine::Snapshot,
    },
};

/// Payload opening a settlement for one player and one event.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSettlementRequest {
    pub event_id: Uuid,
    pub player_id: Uuid,
}

/// Answer to "did you attend?".
#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendanceRequest {
    pub attended: bool,
}

/// Final score; each side may be a number or a string and is coerced to a non-negative integer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScoreRequest {
    #[serde(default)]
    #[schema(value_type = u32)]
    pub team_a: Value,
    #[serde(default)]
    #[schema(value_type = u32)]
    pub team_b: Value,
}

impl ScoreRequest {
    pub fn team_a(&self) -> u32 {
        coerce_count(&self.team_a)
    }

    pub fn team_b(&self) -> u32 {
        coerce_count(&self.team_b)
    }
}

/// Partial update of the scores given to one co-participant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PeerRatingRequest {
    #[validate(range(min = 1, max = 5))]
    pub effort: Option<u8>,
    #[validate(range(min = 1, max = 5))]
    pub teamwork: Option<u8>,
    #[validate(range(min = 1, max = 5))]
    pub sportsmanship: Option<u8>,
    #[validate(range(min = 1, max = 5))]
    pub overall: Option<u8>,
}

impl From<PeerRatingRequest> for PeerScoresUpdate {
    fn from(value: PeerRatingRequest) -> Self {
        Self {
            effort: value.effort,
            teamwork: value.teamwork,
            sportsmanship: value.sportsmanship,
            overall: value.overall,
        }
    }
}

/// Partial update of the self-report.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelfReportRequest {
    #[serde(default)]
    pub perceived_effort: Option<PerceivedEffort>,
    /// Number or string, coerced like the score.
    #[serde(default)]
    #[schema(value_type = Option<u32>)]
    pub duration_minutes: Option<Value>,
    #[serde(default)]
    pub feeling: Option<Feeling>,
}

impl From<SelfReportRequest> for SelfReportUpdate {
    fn from(value: SelfReportRequest) -> Self {
        Self {
            perceived_effort: value.perceived_effort,
            duration_minutes: value.duration_minutes.as_ref().map(coerce_count),
            feeling: value.feeling,
        }
    }
}

/// Four scores on the 1-5 scale.
#[derive(Debug, Serialize, ToSchema)]
pub struct PeerScoresView {
    pub effort: u8,
    pub teamwork: u8,
    pub sportsmanship: u8,
    pub overall: u8,
}

impl From<PeerScores> for PeerScoresView {
    fn from(value: PeerScores) -> Self {
        Self {
            effort: value.effort,
            teamwork: value.teamwork,
            sportsmanship: value.sportsmanship,
            overall: value.overall,
        }
    }
}

/// Co-participant shown on the rating stage.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterEntryView {
    pub player_id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub selected: bool,
    /// Present while the participant is selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<PeerScoresView>,
}

/// Self-report as currently drafted.
#[derive(Debug, Serialize, ToSchema)]
pub struct SelfReportView {
    pub perceived_effort: PerceivedEffort,
    pub duration_minutes: u32,
    pub feeling: Feeling,
}

/// Everything entered so far.
#[derive(Debug, Serialize, ToSchema)]
pub struct DraftView {
    pub team_a: u32,
    pub team_b: u32,
    /// Score as it will appear in the feed (`"3 - 1"`).
    pub score: String,
    pub ratings_skipped: bool,
    pub roster: Vec<RosterEntryView>,
    pub self_report: SelfReportView,
}

/// Full state of a settlement session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub player_id: Uuid,
    pub event_title: String,
    pub sport_type: String,
    pub location_name: String,
    pub stage: VisibleStage,
    /// Target stage of an in-flight commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_stage: Option<VisibleStage>,
    pub version: usize,
    /// RFC 3339 timestamp of when the session was opened.
    pub opened_at: String,
    pub draft: DraftView,
}

impl SettlementView {
    /// Assemble the view from a session's context, state machine snapshot and draft.
    pub fn build(
        id: Uuid,
        opened_at: SystemTime,
        context: &SettlementContext,
        snapshot: &Snapshot,
        draft: &SettlementDraft,
    ) -> Self {
        let roster = context
            .roster
            .iter()
            .map(|player| {
                let scores = draft.peer_scores(player.id);
                RosterEntryView {
                    player_id: player.id,
                    username: player.username.clone(),
                    avatar_url: player.avatar_url.clone(),
                    selected: scores.is_some(),
                    scores: scores.map(Into::into),
                }
            })
            .collect();
        let score = draft.score();
        let report = draft.self_report();

        Self {
            id,
            event_id: context.event.id,
            player_id: context.player.id,
            event_title: context.event.title.clone(),
            sport_type: context.event.sport_type.clone(),
            location_name: context.event.location_name.clone(),
            stage: snapshot.stage.into(),
            pending_stage: snapshot.pending.map(Into::into),
            version: snapshot.version,
            opened_at: format_system_time(opened_at),
            draft: DraftView {
                team_a: score.team_a,
                team_b: score.team_b,
                score: score.display(),
                ratings_skipped: draft.ratings_skipped(),
                roster,
                self_report: SelfReportView {
                    perceived_effort: report.perceived_effort,
                    duration_minutes: report.duration_minutes,
                    feeling: report.feeling,
                },
            },
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommitResponse {
    pub session: SettlementView,
    /// The settlement had already been recorded and nothing was written.
    pub already_settled: bool,
    pub ratings_written: usize,
    pub points_awarded: u32,
    pub games_played: u32,
    pub total_points: u32,
    pub feed_post_id: Uuid,
    pub newly_unlocked: Vec<AchievementView>,
}
