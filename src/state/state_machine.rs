use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// Stages of the post-game settlement workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStage {
    /// Asking whether the player attended the event.
    Confirming,
    /// The player did not attend; nothing was written.
    Aborted,
    /// Entering the final score.
    ScoringInput,
    /// Rating co-participants.
    RatingInput,
    /// Reporting exertion, duration and mood.
    SelfReportInput,
    /// Reviewing the draft before committing.
    Summary,
    /// Every write went through.
    Complete,
}

impl SettlementStage {
    /// Whether no further transition can leave this stage.
    pub fn is_terminal(self) -> bool {
        matches!(self, SettlementStage::Aborted | SettlementStage::Complete)
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementEvent {
    /// The player confirms they attended.
    Attended,
    /// The player did not attend.
    DidNotAttend,
    /// Move to the following stage.
    Next,
    /// Leave the rating stage without rating anyone.
    SkipRatings,
    /// Return to the immediately preceding stage.
    Back,
    /// Persist the draft.
    Commit,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The stage the state machine was in when the invalid event was received.
    pub from: SettlementStage,
    /// The event that cannot be applied from this stage.
    pub event: SettlementEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current stage.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine stage changed since the plan was created.
    StageMismatch {
        /// Stage when plan was created.
        expected: SettlementStage,
        /// Current stage.
        actual: SettlementStage,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Stage the state machine is currently in.
    pub from: SettlementStage,
    /// Stage the state machine will transition to.
    pub to: SettlementStage,
    /// Event that triggered this transition.
    pub event: SettlementEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current stage of the state machine.
    pub stage: SettlementStage,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending target stage, if a transition is planned but not yet applied.
    pub pending: Option<SettlementStage>,
}

/// Linear settlement workflow with single-step back navigation.
///
/// Transitions are planned first and applied once the work attached to them
/// (typically the commit writes) has succeeded; a failed plan is aborted and
/// leaves the stage untouched.
#[derive(Debug, Clone)]
pub struct SettlementStateMachine {
    stage: SettlementStage,
    version: usize,
    pending: Option<Plan>,
}

impl Default for SettlementStateMachine {
    fn default() -> Self {
        Self {
            stage: SettlementStage::Confirming,
            version: 0,
            pending: None,
        }
    }
}

impl SettlementStateMachine {
    /// Create a new state machine waiting for the attendance answer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current stage.
    pub fn stage(&self) -> SettlementStage {
        self.stage
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            stage: self.stage,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current stage.
    pub fn plan(&mut self, event: SettlementEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.stage,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition and return the new stage.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SettlementStage, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.stage != plan.from {
            return Err(ApplyError::StageMismatch {
                expected: plan.from,
                actual: self.stage,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.stage = plan.to;
        self.version = plan.version_next;

        Ok(self.stage)
    }

    /// Abort a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Plan and apply in one step, for transitions with no attached work.
    pub fn transition(&mut self, event: SettlementEvent) -> Result<SettlementStage, PlanError> {
        let plan = self.plan(event)?;
        // The plan was created against the current stage and version a moment ago.
        self.stage = plan.to;
        self.version = plan.version_next;
        self.pending = None;
        Ok(self.stage)
    }

    fn compute_transition(
        &self,
        event: SettlementEvent,
    ) -> Result<SettlementStage, InvalidTransition> {
        use SettlementEvent as E;
        use SettlementStage as S;

        let next = match (self.stage, event) {
            (S::Confirming, E::Attended) => S::ScoringInput,
            (S::Confirming, E::DidNotAttend) => S::Aborted,
            (S::ScoringInput, E::Next) => S::RatingInput,
            (S::RatingInput, E::Next | E::SkipRatings) => S::SelfReportInput,
            (S::SelfReportInput, E::Next) => S::Summary,
            (S::Summary, E::Commit) => S::Complete,
            (S::ScoringInput, E::Back) => S::Confirming,
            (S::RatingInput, E::Back) => S::ScoringInput,
            (S::SelfReportInput, E::Back) => S::RatingInput,
            (S::Summary, E::Back) => S::SelfReportInput,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SettlementStateMachine, event: SettlementEvent) -> SettlementStage {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_stage_is_confirming() {
        let sm = SettlementStateMachine::new();
        assert_eq!(sm.stage(), SettlementStage::Confirming);
    }

    #[test]
    fn full_happy_path_through_settlement() {
        let mut sm = SettlementStateMachine::new();

        assert_eq!(
            apply(&mut sm, SettlementEvent::Attended),
            SettlementStage::ScoringInput
        );
        assert_eq!(
            apply(&mut sm, SettlementEvent::Next),
            SettlementStage::RatingInput
        );
        assert_eq!(
            apply(&mut sm, SettlementEvent::Next),
            SettlementStage::SelfReportInput
        );
        assert_eq!(
            apply(&mut sm, SettlementEvent::Next),
            SettlementStage::Summary
        );
        assert_eq!(
            apply(&mut sm, SettlementEvent::Commit),
            SettlementStage::Complete
        );
        assert!(sm.stage().is_terminal());
    }

    #[test]
    fn declining_attendance_aborts() {
        let mut sm = SettlementStateMachine::new();
        assert_eq!(
            apply(&mut sm, SettlementEvent::DidNotAttend),
            SettlementStage::Aborted
        );
        assert!(sm.plan(SettlementEvent::Back).is_err());
    }

    #[test]
    fn back_moves_exactly_one_stage() {
        let mut sm = SettlementStateMachine::new();
        apply(&mut sm, SettlementEvent::Attended);
        apply(&mut sm, SettlementEvent::Next);
        apply(&mut sm, SettlementEvent::SkipRatings);
        apply(&mut sm, SettlementEvent::Next);

        assert_eq!(
            apply(&mut sm, SettlementEvent::Back),
            SettlementStage::SelfReportInput
        );
        assert_eq!(
            apply(&mut sm, SettlementEvent::Back),
            SettlementStage::RatingInput
        );
        assert_eq!(
            apply(&mut sm, SettlementEvent::Back),
            SettlementStage::ScoringInput
        );
        assert_eq!(
            apply(&mut sm, SettlementEvent::Back),
            SettlementStage::Confirming
        );
        assert!(sm.plan(SettlementEvent::Back).is_err());
    }

    #[test]
    fn skip_is_only_valid_while_rating() {
        let mut sm = SettlementStateMachine::new();
        apply(&mut sm, SettlementEvent::Attended);

        let err = sm.plan(SettlementEvent::SkipRatings).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, SettlementStage::ScoringInput);
                assert_eq!(invalid.event, SettlementEvent::SkipRatings);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn aborted_commit_stays_on_summary_and_can_retry() {
        let mut sm = SettlementStateMachine::new();
        apply(&mut sm, SettlementEvent::Attended);
        apply(&mut sm, SettlementEvent::Next);
        apply(&mut sm, SettlementEvent::Next);
        apply(&mut sm, SettlementEvent::Next);

        let plan = sm.plan(SettlementEvent::Commit).unwrap();
        assert_eq!(sm.snapshot().pending, Some(SettlementStage::Complete));
        sm.abort(plan.id).unwrap();

        assert_eq!(sm.stage(), SettlementStage::Summary);
        assert_eq!(sm.snapshot().pending, None);
        assert_eq!(
            apply(&mut sm, SettlementEvent::Commit),
            SettlementStage::Complete
        );
    }

    #[test]
    fn pending_plan_blocks_other_transitions() {
        let mut sm = SettlementStateMachine::new();
        let plan = sm.plan(SettlementEvent::Attended).unwrap();

        assert_eq!(
            sm.transition(SettlementEvent::DidNotAttend).unwrap_err(),
            PlanError::AlreadyPending
        );
        assert!(matches!(
            sm.apply(Uuid::new_v4()),
            Err(ApplyError::IdMismatch { .. })
        ));
        assert_eq!(sm.apply(plan.id).unwrap(), SettlementStage::ScoringInput);
    }
}
