//! Immutable accumulation of everything the player entered during a settlement.
//!
//! Every edit consumes the draft and returns the next one, so stage handlers
//! never share mutable workflow state.

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{Feeling, PerceivedEffort, ScorePair};

/// Lowest value of the peer rating scale.
pub const RATING_MIN: u8 = 1;
/// Highest value of the peer rating scale.
pub const RATING_MAX: u8 = 5;
/// Value every axis starts at when a participant is selected.
pub const RATING_MIDPOINT: u8 = 3;

/// Scores given to one co-participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerScores {
    pub effort: u8,
    pub teamwork: u8,
    pub sportsmanship: u8,
    pub overall: u8,
}

impl Default for PeerScores {
    fn default() -> Self {
        Self {
            effort: RATING_MIDPOINT,
            teamwork: RATING_MIDPOINT,
            sportsmanship: RATING_MIDPOINT,
            overall: RATING_MIDPOINT,
        }
    }
}

/// Partial change to [`PeerScores`]; absent axes keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerScoresUpdate {
    pub effort: Option<u8>,
    pub teamwork: Option<u8>,
    pub sportsmanship: Option<u8>,
    pub overall: Option<u8>,
}

impl PeerScores {
    fn updated(self, update: PeerScoresUpdate) -> Result<Self, DraftError> {
        Ok(Self {
            effort: pick("effort", self.effort, update.effort)?,
            teamwork: pick("teamwork", self.teamwork, update.teamwork)?,
            sportsmanship: pick("sportsmanship", self.sportsmanship, update.sportsmanship)?,
            overall: pick("overall", self.overall, update.overall)?,
        })
    }
}

fn pick(axis: &'static str, current: u8, update: Option<u8>) -> Result<u8, DraftError> {
    match update {
        None => Ok(current),
        Some(value) if (RATING_MIN..=RATING_MAX).contains(&value) => Ok(value),
        Some(value) => Err(DraftError::OutOfScale { axis, value }),
    }
}

/// The player's own account of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfReportDraft {
    pub perceived_effort: PerceivedEffort,
    pub duration_minutes: u32,
    pub feeling: Feeling,
}

/// Partial change to [`SelfReportDraft`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfReportUpdate {
    pub perceived_effort: Option<PerceivedEffort>,
    pub duration_minutes: Option<u32>,
    pub feeling: Option<Feeling>,
}

/// Invalid draft edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("player `{0}` is not a co-participant of this event")]
    UnknownParticipant(Uuid),
    #[error("player `{0}` is not selected for rating")]
    NotSelected(Uuid),
    #[error("{axis} rating {value} is outside the 1-5 scale")]
    OutOfScale { axis: &'static str, value: u8 },
}

/// Score, peer ratings and self-report collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementDraft {
    score: ScorePair,
    roster: Vec<Uuid>,
    ratings: IndexMap<Uuid, PeerScores>,
    ratings_skipped: bool,
    self_report: SelfReportDraft,
}

impl SettlementDraft {
    /// Start a draft for the given co-participants, all of them selected at the midpoint.
    pub fn new(roster: Vec<Uuid>, default_duration_minutes: u32) -> Self {
        let ratings = roster
            .iter()
            .map(|id| (*id, PeerScores::default()))
            .collect();
        Self {
            score: ScorePair::default(),
            roster,
            ratings,
            ratings_skipped: false,
            self_report: SelfReportDraft {
                perceived_effort: PerceivedEffort::default(),
                duration_minutes: default_duration_minutes,
                feeling: Feeling::default(),
            },
        }
    }

    pub fn score(&self) -> ScorePair {
        self.score
    }

    /// Co-participants in display order.
    pub fn roster(&self) -> &[Uuid] {
        &self.roster
    }

    pub fn is_selected(&self, player_id: Uuid) -> bool {
        self.ratings.contains_key(&player_id)
    }

    /// Scores currently entered for a selected participant.
    pub fn peer_scores(&self, player_id: Uuid) -> Option<PeerScores> {
        self.ratings.get(&player_id).copied()
    }

    pub fn ratings_skipped(&self) -> bool {
        self.ratings_skipped
    }

    /// Ratings that a commit writes: the selected participants, or nothing after a skip.
    pub fn committed_ratings(&self) -> Vec<(Uuid, PeerScores)> {
        if self.ratings_skipped {
            return Vec::new();
        }
        self.ratings
            .iter()
            .map(|(id, scores)| (*id, *scores))
            .collect()
    }

    pub fn self_report(&self) -> SelfReportDraft {
        self.self_report
    }

    #[must_use]
    pub fn with_score(self, score: ScorePair) -> Self {
        Self { score, ..self }
    }

    /// Select or deselect a co-participant.
    ///
    /// Deselecting drops the entered scores; selecting again starts from the midpoint.
    pub fn toggle_participant(mut self, player_id: Uuid) -> Result<Self, DraftError> {
        if !self.roster.contains(&player_id) {
            return Err(DraftError::UnknownParticipant(player_id));
        }
        if self.ratings.shift_remove(&player_id).is_none() {
            self.ratings.insert(player_id, PeerScores::default());
            // Keep the selection in roster order.
            let roster = &self.roster;
            self.ratings.sort_by(|a, _, b, _| {
                let pos = |id: &Uuid| roster.iter().position(|r| r == id);
                pos(a).cmp(&pos(b))
            });
        }
        Ok(self)
    }

    pub fn with_peer_scores(
        mut self,
        player_id: Uuid,
        update: PeerScoresUpdate,
    ) -> Result<Self, DraftError> {
        if !self.roster.contains(&player_id) {
            return Err(DraftError::UnknownParticipant(player_id));
        }
        let Some(current) = self.ratings.get_mut(&player_id) else {
            return Err(DraftError::NotSelected(player_id));
        };
        *current = current.updated(update)?;
        Ok(self)
    }

    #[must_use]
    pub fn skip_ratings(self) -> Self {
        Self {
            ratings_skipped: true,
            ..self
        }
    }

    #[must_use]
    pub fn resume_ratings(self) -> Self {
        Self {
            ratings_skipped: false,
            ..self
        }
    }

    #[must_use]
    pub fn with_self_report(self, update: SelfReportUpdate) -> Self {
        let current = self.self_report;
        Self {
            self_report: SelfReportDraft {
                perceived_effort: update.perceived_effort.unwrap_or(current.perceived_effort),
                duration_minutes: update.duration_minutes.unwrap_or(current.duration_minutes),
                feeling: update.feeling.unwrap_or(current.feeling),
            },
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_with(roster: &[Uuid]) -> SettlementDraft {
        SettlementDraft::new(roster.to_vec(), 60)
    }

    #[test]
    fn everyone_starts_selected_at_midpoint() {
        let (p2, p3) = (Uuid::new_v4(), Uuid::new_v4());
        let draft = draft_with(&[p2, p3]);

        let committed = draft.committed_ratings();
        assert_eq!(committed.len(), 2);
        assert!(committed.iter().all(|(_, s)| *s == PeerScores::default()));
        assert_eq!(draft.self_report().duration_minutes, 60);
        assert_eq!(draft.self_report().feeling, Feeling::Good);
        assert_eq!(draft.self_report().perceived_effort, PerceivedEffort::Medium);
    }

    #[test]
    fn reselecting_resets_to_midpoint() {
        let p2 = Uuid::new_v4();
        let draft = draft_with(&[p2])
            .with_peer_scores(
                p2,
                PeerScoresUpdate {
                    overall: Some(5),
                    effort: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(draft.peer_scores(p2).unwrap().overall, 5);

        let draft = draft.toggle_participant(p2).unwrap();
        assert!(draft.committed_ratings().is_empty());

        let draft = draft.toggle_participant(p2).unwrap();
        assert_eq!(draft.peer_scores(p2), Some(PeerScores::default()));
    }

    #[test]
    fn selection_keeps_roster_order() {
        let (p2, p3, p4) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let draft = draft_with(&[p2, p3, p4])
            .toggle_participant(p2)
            .unwrap()
            .toggle_participant(p2)
            .unwrap();

        let order: Vec<Uuid> = draft.committed_ratings().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![p2, p3, p4]);
    }

    #[test]
    fn scores_outside_scale_are_rejected() {
        let p2 = Uuid::new_v4();
        let err = draft_with(&[p2])
            .with_peer_scores(
                p2,
                PeerScoresUpdate {
                    teamwork: Some(6),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            DraftError::OutOfScale {
                axis: "teamwork",
                value: 6
            }
        );
    }

    #[test]
    fn rating_unselected_or_unknown_players_fails() {
        let p2 = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let draft = draft_with(&[p2]).toggle_participant(p2).unwrap();

        assert_eq!(
            draft
                .clone()
                .with_peer_scores(p2, PeerScoresUpdate::default())
                .unwrap_err(),
            DraftError::NotSelected(p2)
        );
        assert_eq!(
            draft.toggle_participant(stranger).unwrap_err(),
            DraftError::UnknownParticipant(stranger)
        );
    }

    #[test]
    fn skipping_empties_committed_ratings_until_resumed() {
        let p2 = Uuid::new_v4();
        let draft = draft_with(&[p2]).skip_ratings();
        assert!(draft.committed_ratings().is_empty());
        assert!(draft.is_selected(p2));

        let draft = draft.resume_ratings();
        assert_eq!(draft.committed_ratings().len(), 1);
    }

    #[test]
    fn score_is_kept_verbatim() {
        for (a, b) in [(0, 0), (3, 1), (0, 17), (u32::MAX, 42)] {
            let draft = draft_with(&[]).with_score(ScorePair::new(a, b));
            assert_eq!(draft.score(), ScorePair::new(a, b));
        }
    }
}
