//! Process-local entity store backed by concurrent maps.
//!
//! Used for development without a database and as the store behind the test suites.

use std::{fs, path::Path, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Deserialize;
use uuid::Uuid;

use crate::dao::{
    entity_store::EntityStore,
    models::{
        CreditOutcome, EventEntity, FeedPostEntity, PlayerEntity, RatingEntity, ScorePair,
        SelfReportEntity,
    },
    storage::{StorageError, StorageResult},
};

/// Seed data accepted by [`MemoryEntityStore::from_fixtures_file`].
#[derive(Debug, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub events: Vec<EventEntity>,
    #[serde(default)]
    pub players: Vec<PlayerEntity>,
}

#[derive(Clone, Default)]
pub struct MemoryEntityStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    events: DashMap<Uuid, EventEntity>,
    players: DashMap<Uuid, PlayerEntity>,
    ratings: DashMap<Uuid, RatingEntity>,
    self_reports: DashMap<Uuid, SelfReportEntity>,
    feed_posts: DashMap<Uuid, FeedPostEntity>,
}

impl MemoryEntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with events and players.
    pub fn with_fixtures(fixtures: Fixtures) -> Self {
        let store = Self::new();
        for event in fixtures.events {
            store.inner.events.insert(event.id, event);
        }
        for player in fixtures.players {
            store.inner.players.insert(player.id, player);
        }
        store
    }

    /// Read a JSON fixtures file and build a store from it.
    pub fn from_fixtures_file(path: &Path) -> StorageResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| {
            StorageError::unavailable(format!("reading fixtures `{}`", path.display()), source)
        })?;
        let fixtures: Fixtures = serde_json::from_str(&contents).map_err(|source| {
            StorageError::unavailable(format!("parsing fixtures `{}`", path.display()), source)
        })?;
        Ok(Self::with_fixtures(fixtures))
    }

    /// All ratings currently stored.
    pub fn ratings(&self) -> Vec<RatingEntity> {
        self.inner.ratings.iter().map(|r| r.value().clone()).collect()
    }

    /// All self-reports currently stored.
    pub fn self_reports(&self) -> Vec<SelfReportEntity> {
        self.inner
            .self_reports
            .iter()
            .map(|r| r.value().clone())
            .collect()
    }

    /// All feed posts currently stored.
    pub fn feed_posts(&self) -> Vec<FeedPostEntity> {
        self.inner
            .feed_posts
            .iter()
            .map(|p| p.value().clone())
            .collect()
    }

    /// Synchronous event lookup.
    pub fn event(&self, id: Uuid) -> Option<EventEntity> {
        self.inner.events.get(&id).map(|e| e.value().clone())
    }

    /// Synchronous player lookup.
    pub fn player(&self, id: Uuid) -> Option<PlayerEntity> {
        self.inner.players.get(&id).map(|p| p.value().clone())
    }
}

impl EntityStore for MemoryEntityStore {
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let found = self.event(id);
        Box::pin(async move { Ok(found) })
    }

    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.events.insert(event.id, event);
        Box::pin(async { Ok(()) })
    }

    fn record_event_result(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        score: ScorePair,
    ) -> BoxFuture<'static, StorageResult<()>> {
        // The entry guard holds the shard lock, making the read-modify-write atomic.
        let result = match self.inner.events.get_mut(&event_id) {
            Some(mut event) => {
                event.apply_result(player_id, score);
                Ok(())
            }
            None => Err(StorageError::missing("event", event_id)),
        };
        Box::pin(async move { result })
    }

    fn mark_settled(
        &self,
        event_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = match self.inner.events.get_mut(&event_id) {
            Some(mut event) => {
                event.apply_settled_marker(player_id);
                Ok(())
            }
            None => Err(StorageError::missing("event", event_id)),
        };
        Box::pin(async move { result })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let found = self.player(id);
        Box::pin(async move { Ok(found) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let mut players: Vec<PlayerEntity> = self
            .inner
            .players
            .iter()
            .map(|p| p.value().clone())
            .collect();
        players.sort_by(|a, b| a.username.cmp(&b.username));
        Box::pin(async move { Ok(players) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.players.insert(player.id, player);
        Box::pin(async { Ok(()) })
    }

    fn credit_player(
        &self,
        player_id: Uuid,
        event_id: Uuid,
        points: u32,
    ) -> BoxFuture<'static, StorageResult<CreditOutcome>> {
        let result = match self.inner.players.get_mut(&player_id) {
            Some(mut player) => {
                let applied = player.apply_credit(event_id, points);
                Ok(CreditOutcome {
                    player: player.clone(),
                    applied,
                })
            }
            None => Err(StorageError::missing("player", player_id)),
        };
        Box::pin(async move { result })
    }

    fn set_rating_averages(
        &self,
        player_id: Uuid,
        overall: f64,
        sportsmanship: f64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = match self.inner.players.get_mut(&player_id) {
            Some(mut player) => {
                player.apply_rating_averages(overall, sportsmanship);
                Ok(())
            }
            None => Err(StorageError::missing("player", player_id)),
        };
        Box::pin(async move { result })
    }

    fn save_rating(&self, rating: RatingEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.ratings.insert(rating.id, rating);
        Box::pin(async { Ok(()) })
    }

    fn list_ratings_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RatingEntity>>> {
        let mut ratings: Vec<RatingEntity> = self
            .inner
            .ratings
            .iter()
            .filter(|r| r.rated_player_id == player_id)
            .map(|r| r.value().clone())
            .collect();
        ratings.sort_by_key(|r| r.created_at);
        Box::pin(async move { Ok(ratings) })
    }

    fn save_self_report(
        &self,
        report: SelfReportEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.self_reports.insert(report.id, report);
        Box::pin(async { Ok(()) })
    }

    fn save_feed_post(&self, post: FeedPostEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.feed_posts.insert(post.id, post);
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::EventStatus;

    fn event(participants: Vec<Uuid>) -> EventEntity {
        EventEntity {
            id: Uuid::new_v4(),
            title: "Sunday pickup".into(),
            sport_type: "football".into(),
            location_name: "Park".into(),
            status: EventStatus::Completed,
            participants,
            confirmed_attendance: Vec::new(),
            score_team_a: None,
            score_team_b: None,
            settled_by: Vec::new(),
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn concurrent_results_union_attendance() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let event = event(vec![p1, p2]);
        let event_id = event.id;
        let store = MemoryEntityStore::with_fixtures(Fixtures {
            events: vec![event],
            players: Vec::new(),
        });

        let (a, b) = tokio::join!(
            store.record_event_result(event_id, p1, ScorePair::new(2, 2)),
            store.record_event_result(event_id, p2, ScorePair::new(2, 2)),
        );
        a.unwrap();
        b.unwrap();
        store
            .record_event_result(event_id, p1, ScorePair::new(2, 2))
            .await
            .unwrap();

        let stored = store.event(event_id).unwrap();
        assert_eq!(stored.confirmed_attendance.len(), 2);
        assert!(stored.confirmed_attendance.contains(&p1));
        assert!(stored.confirmed_attendance.contains(&p2));
    }

    #[tokio::test]
    async fn updates_on_unknown_documents_report_missing() {
        let store = MemoryEntityStore::new();
        let err = store
            .credit_player(Uuid::new_v4(), Uuid::new_v4(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Missing { collection: "player", .. }));
    }
}
