//! Test wrapper around [`MemoryEntityStore`] that fails or stalls selected operations.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    entity_store::{EntityStore, memory::MemoryEntityStore},
    models::{
        CreditOutcome, EventEntity, FeedPostEntity, PlayerEntity, RatingEntity, ScorePair,
        SelfReportEntity,
    },
    storage::{StorageError, StorageResult},
};

#[derive(Debug, thiserror::Error)]
#[error("injected failure in `{0}`")]
struct InjectedFailure(&'static str);

#[derive(Clone, Default)]
pub struct FaultyEntityStore {
    inner: MemoryEntityStore,
    failures: Arc<DashMap<&'static str, u32>>,
    stalls: Arc<DashMap<&'static str, Duration>>,
    calls: Arc<DashMap<&'static str, u32>>,
}

impl FaultyEntityStore {
    pub fn new(inner: MemoryEntityStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryEntityStore {
        &self.inner
    }

    /// Make the next `times` calls of `operation` fail.
    pub fn fail_next(&self, operation: &'static str, times: u32) {
        self.failures.insert(operation, times);
    }

    /// Delay every call of `operation` before it reaches the inner store.
    pub fn stall(&self, operation: &'static str, delay: Duration) {
        self.stalls.insert(operation, delay);
    }

    /// Number of times `operation` was invoked, failed calls included.
    pub fn calls(&self, operation: &'static str) -> u32 {
        self.calls.get(operation).map_or(0, |count| *count)
    }

    fn run<T, F>(&self, operation: &'static str, call: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(MemoryEntityStore) -> BoxFuture<'static, StorageResult<T>> + Send + 'static,
    {
        *self.calls.entry(operation).or_insert(0) += 1;

        let fail = match self.failures.get_mut(operation) {
            Some(mut remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if fail {
            return Box::pin(async move {
                Err(StorageError::unavailable(
                    format!("{operation} failed"),
                    InjectedFailure(operation),
                ))
            });
        }

        let stall = self.stalls.get(operation).map(|delay| *delay);
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(delay) = stall {
                tokio::time::sleep(delay).await;
            }
            call(inner).await
        })
    }
}

impl EntityStore for FaultyEntityStore {
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        self.run("find_event", move |s| s.find_event(id))
    }

    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run("save_event", move |s| s.save_event(event))
    }

    fn record_event_result(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        score: ScorePair,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run("record_event_result", move |s| {
            s.record_event_result(event_id, player_id, score)
        })
    }

    fn mark_settled(
        &self,
        event_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run("mark_settled", move |s| s.mark_settled(event_id, player_id))
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.run("find_player", move |s| s.find_player(id))
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        self.run("list_players", |s| s.list_players())
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run("save_player", move |s| s.save_player(player))
    }

    fn credit_player(
        &self,
        player_id: Uuid,
        event_id: Uuid,
        points: u32,
    ) -> BoxFuture<'static, StorageResult<CreditOutcome>> {
        self.run("credit_player", move |s| {
            s.credit_player(player_id, event_id, points)
        })
    }

    fn set_rating_averages(
        &self,
        player_id: Uuid,
        overall: f64,
        sportsmanship: f64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run("set_rating_averages", move |s| {
            s.set_rating_averages(player_id, overall, sportsmanship)
        })
    }

    fn save_rating(&self, rating: RatingEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run("save_rating", move |s| s.save_rating(rating))
    }

    fn list_ratings_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RatingEntity>>> {
        self.run("list_ratings_for_player", move |s| {
            s.list_ratings_for_player(player_id)
        })
    }

    fn save_self_report(
        &self,
        report: SelfReportEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run("save_self_report", move |s| s.save_self_report(report))
    }

    fn save_feed_post(&self, post: FeedPostEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run("save_feed_post", move |s| s.save_feed_post(post))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.run("health_check", |s| s.health_check())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.run("try_reconnect", |s| s.try_reconnect())
    }
}
