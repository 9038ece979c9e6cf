#[cfg(feature = "couch-store")]
pub mod couchdb;
#[cfg(test)]
pub mod faulty;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{
        CreditOutcome, EventEntity, FeedPostEntity, PlayerEntity, RatingEntity, ScorePair,
        SelfReportEntity,
    },
    storage::StorageResult,
};

/// Namespace for the deterministic document keys derived by [`natural_key`].
const NATURAL_KEY_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3c2e_94a7_4d0b_b8e5_71c2_0f9a_d413);

/// Derive a stable identifier from the parts that make a document unique.
///
/// Re-running a settlement produces the same keys, so writes become upserts.
pub fn natural_key(kind: &str, parts: &[Uuid]) -> Uuid {
    let mut name = String::from(kind);
    for part in parts {
        name.push(':');
        name.push_str(&part.to_string());
    }
    Uuid::new_v5(&NATURAL_KEY_NAMESPACE, name.as_bytes())
}

/// Abstraction over the persistence layer holding events, players and settlement records.
pub trait EntityStore: Send + Sync {
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>>;
    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Union the player into `confirmed_attendance` and overwrite the score atomically.
    fn record_event_result(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        score: ScorePair,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Add the settlement-completed marker for the player.
    fn mark_settled(&self, event_id: Uuid, player_id: Uuid)
    -> BoxFuture<'static, StorageResult<()>>;

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Increment the player counters unless the event was already credited.
    fn credit_player(
        &self,
        player_id: Uuid,
        event_id: Uuid,
        points: u32,
    ) -> BoxFuture<'static, StorageResult<CreditOutcome>>;

    /// Overwrite the stored rating averages shown on the player profile.
    fn set_rating_averages(
        &self,
        player_id: Uuid,
        overall: f64,
        sportsmanship: f64,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn save_rating(&self, rating: RatingEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_ratings_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RatingEntity>>>;
    fn save_self_report(&self, report: SelfReportEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    fn save_feed_post(&self, post: FeedPostEntity) -> BoxFuture<'static, StorageResult<()>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_is_stable_and_order_sensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(natural_key("rating", &[a, b]), natural_key("rating", &[a, b]));
        assert_ne!(natural_key("rating", &[a, b]), natural_key("rating", &[b, a]));
        assert_ne!(natural_key("rating", &[a]), natural_key("self_report", &[a]));
    }
}
