use std::{
    future::Future,
    time::{Duration, SystemTime},
};

use tokio::{
    sync::{Mutex, RwLock},
    time::timeout,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{EventEntity, PlayerEntity},
    error::ServiceError,
    state::{
        draft::SettlementDraft,
        state_machine::{
            AbortError, ApplyError, Plan, PlanError, PlanId, SettlementEvent, SettlementStage,
            SettlementStateMachine, Snapshot,
        },
    },
};

/// Data loaded once when a settlement starts and read by every stage.
#[derive(Debug, Clone)]
pub struct SettlementContext {
    /// Event being settled.
    pub event: EventEntity,
    /// Player driving the workflow.
    pub player: PlayerEntity,
    /// Profiles of the co-participants, in roster order.
    pub roster: Vec<PlayerEntity>,
}

/// One player's settlement of one event, owned by the session registry.
pub struct SettlementSession {
    id: Uuid,
    opened_at: SystemTime,
    context: SettlementContext,
    machine: RwLock<SettlementStateMachine>,
    draft: RwLock<SettlementDraft>,
    transition_gate: Mutex<()>,
}

impl SettlementSession {
    /// Build a session in the `Confirming` stage.
    pub fn new(context: SettlementContext, default_duration_minutes: u32) -> Self {
        let roster = context.roster.iter().map(|player| player.id).collect();
        Self {
            id: Uuid::new_v4(),
            opened_at: SystemTime::now(),
            context,
            machine: RwLock::new(SettlementStateMachine::new()),
            draft: RwLock::new(SettlementDraft::new(roster, default_duration_minutes)),
            transition_gate: Mutex::new(()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn opened_at(&self) -> SystemTime {
        self.opened_at
    }

    pub fn context(&self) -> &SettlementContext {
        &self.context
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.machine.read().await.snapshot()
    }

    pub async fn stage(&self) -> SettlementStage {
        self.machine.read().await.stage()
    }

    pub async fn draft(&self) -> SettlementDraft {
        self.draft.read().await.clone()
    }

    /// Replace the draft with the result of `edit`, provided the session sits in `stage`.
    pub async fn edit_draft<F>(&self, stage: SettlementStage, edit: F) -> Result<(), ServiceError>
    where
        F: FnOnce(SettlementDraft) -> Result<SettlementDraft, ServiceError>,
    {
        let machine = self.machine.read().await;
        let snapshot = machine.snapshot();
        if snapshot.pending.is_some() {
            return Err(PlanError::AlreadyPending.into());
        }
        if snapshot.stage != stage {
            return Err(ServiceError::InvalidState(format!(
                "this edit requires the {stage:?} stage, current stage {:?}",
                snapshot.stage
            )));
        }

        let mut draft = self.draft.write().await;
        *draft = edit(draft.clone())?;
        Ok(())
    }

    /// Apply a transition with no attached work, letting `reshape` adjust the draft atomically.
    ///
    /// Refused while a commit is pending.
    pub async fn advance<F>(
        &self,
        event: SettlementEvent,
        reshape: F,
    ) -> Result<SettlementStage, ServiceError>
    where
        F: FnOnce(SettlementStage, SettlementDraft) -> SettlementDraft,
    {
        let mut machine = self.machine.write().await;
        let next = machine.transition(event)?;
        let mut draft = self.draft.write().await;
        *draft = reshape(next, draft.clone());
        Ok(next)
    }

    async fn plan_transition(&self, event: SettlementEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    async fn apply_planned_transition(
        &self,
        plan_id: PlanId,
    ) -> Result<SettlementStage, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Plan `event`, run `work`, then apply the plan on success or abort it on failure.
    ///
    /// While the work runs the snapshot reports the target stage as pending and
    /// every other transition is refused.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: SettlementEvent,
        limit: Option<Duration>,
        work: F,
    ) -> Result<(T, SettlementStage), ServiceError>
    where
        F: FnOnce(SettlementDraft) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        let work_future = work(self.draft().await);
        let outcome = if let Some(limit) = limit {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            session_id = %self.id,
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        session_id = %self.id,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}
