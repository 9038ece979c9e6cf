use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::SettlementStage;

/// Settlement stage exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleStage {
    /// Waiting for the attendance answer.
    Confirming,
    /// The player did not attend; the session is closed.
    Aborted,
    /// Entering the score.
    ScoringInput,
    /// Rating co-participants.
    RatingInput,
    /// Filling the self-report.
    SelfReportInput,
    /// Reviewing before committing.
    Summary,
    /// Committed.
    Complete,
}

impl From<SettlementStage> for VisibleStage {
    fn from(value: SettlementStage) -> Self {
        match value {
            SettlementStage::Confirming => VisibleStage::Confirming,
            SettlementStage::Aborted => VisibleStage::Aborted,
            SettlementStage::ScoringInput => VisibleStage::ScoringInput,
            SettlementStage::RatingInput => VisibleStage::RatingInput,
            SettlementStage::SelfReportInput => VisibleStage::SelfReportInput,
            SettlementStage::Summary => VisibleStage::Summary,
            SettlementStage::Complete => VisibleStage::Complete,
        }
    }
}
