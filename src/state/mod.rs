pub mod draft;
pub mod session;
pub mod state_machine;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{config::AppConfig, dao::entity_store::EntityStore, error::ServiceError};

pub use self::session::{SettlementContext, SettlementSession};
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

pub type SharedState = Arc<AppState>;

/// Central application state storing open settlement sessions and the storage handle.
pub struct AppState {
    entity_store: RwLock<Option<Arc<dyn EntityStore>>>,
    sessions: DashMap<Uuid, Arc<SettlementSession>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            entity_store: RwLock::new(None),
            sessions: DashMap::new(),
            degraded: degraded_tx,
            config,
        })
    }

    /// Build a state that already has a store installed, as used by tests and the memory backend.
    pub async fn with_store(config: AppConfig, store: Arc<dyn EntityStore>) -> SharedState {
        let state = Self::new(config);
        state.set_entity_store(store).await;
        state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Upper bound on the duration of a settlement commit.
    pub fn commit_timeout(&self) -> Option<Duration> {
        self.config.commit_timeout()
    }

    /// Obtain a handle to the current entity store, if one is installed.
    pub async fn entity_store(&self) -> Option<Arc<dyn EntityStore>> {
        let guard = self.entity_store.read().await;
        guard.as_ref().cloned()
    }

    /// Entity store handle, or [`ServiceError::Degraded`] while none is installed.
    pub async fn require_entity_store(&self) -> Result<Arc<dyn EntityStore>, ServiceError> {
        self.entity_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new entity store implementation and leave degraded mode.
    pub async fn set_entity_store(&self, store: Arc<dyn EntityStore>) {
        {
            let mut guard = self.entity_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current entity store and enter degraded mode.
    pub async fn clear_entity_store(&self) {
        {
            let mut guard = self.entity_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Register an open settlement session.
    pub fn insert_session(&self, session: Arc<SettlementSession>) {
        self.sessions.insert(session.id(), session);
    }

    /// Look up an open session by id.
    pub fn session(&self, id: Uuid) -> Result<Arc<SettlementSession>, ServiceError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("settlement session `{id}`")))
    }

    /// Drop a session; returns whether it existed.
    pub fn remove_session(&self, id: Uuid) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Open session for the given player and event, if any.
    pub fn find_open_session(&self, event_id: Uuid, player_id: Uuid) -> Option<Arc<SettlementSession>> {
        self.sessions.iter().find_map(|entry| {
            let context = entry.value().context();
            (context.event.id == event_id && context.player.id == player_id)
                .then(|| entry.value().clone())
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::entity_store::memory::MemoryEntityStore;

    #[tokio::test]
    async fn degraded_flag_follows_store_installation() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_entity_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_entity_store(Arc::new(MemoryEntityStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_entity_store().await;
        assert!(state.is_degraded().await);
    }
}
