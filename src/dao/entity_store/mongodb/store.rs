use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoEventDocument, MongoFeedPostDocument, MongoPlayerDocument, MongoRatingDocument,
        MongoSelfReportDocument, doc_id, id_value,
    },
};
use crate::dao::{
    entity_store::EntityStore,
    models::{
        CreditOutcome, EventEntity, FeedPostEntity, PlayerEntity, RatingEntity, ScorePair,
        SelfReportEntity,
    },
    storage::StorageResult,
};

const EVENT_COLLECTION_NAME: &str = "events";
const PLAYER_COLLECTION_NAME: &str = "players";
const RATING_COLLECTION_NAME: &str = "ratings";
const SELF_REPORT_COLLECTION_NAME: &str = "self_reports";
const FEED_POST_COLLECTION_NAME: &str = "feed_posts";

#[derive(Clone)]
pub struct MongoEntityStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoEntityStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let ratings = database.collection::<mongodb::bson::Document>(RATING_COLLECTION_NAME);
        let rated_index = mongodb::IndexModel::builder()
            .keys(doc! {"rated_player_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("rating_rated_player_idx".to_owned()))
                    .build(),
            )
            .build();
        ratings
            .create_index(rated_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RATING_COLLECTION_NAME,
                index: "rated_player_id",
                source,
            })?;

        let reports = database.collection::<mongodb::bson::Document>(SELF_REPORT_COLLECTION_NAME);
        let report_index = mongodb::IndexModel::builder()
            .keys(doc! {"event_id": 1, "player_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("self_report_event_player_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        reports
            .create_index(report_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SELF_REPORT_COLLECTION_NAME,
                index: "event_id,player_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_event(&self, id: Uuid) -> MongoResult<Option<EventEntity>> {
        let collection = self
            .collection::<MongoEventDocument>(EVENT_COLLECTION_NAME)
            .await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: "event",
                id,
                source,
            })?;
        document.map(EventEntity::try_from).transpose()
    }

    async fn save_event(&self, event: EventEntity) -> MongoResult<()> {
        let id = event.id;
        let document: MongoEventDocument = event.into();
        self.collection::<MongoEventDocument>(EVENT_COLLECTION_NAME)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: "event",
                id,
                source,
            })?;
        Ok(())
    }

    async fn record_event_result(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        score: ScorePair,
    ) -> MongoResult<()> {
        let collection = self
            .collection::<MongoEventDocument>(EVENT_COLLECTION_NAME)
            .await;
        let result = collection
            .update_one(
                doc_id(event_id),
                doc! {
                    "$addToSet": { "confirmed_attendance": id_value(player_id) },
                    "$set": {
                        "score_team_a": i64::from(score.team_a),
                        "score_team_b": i64::from(score.team_b),
                        "updated_at": DateTime::now(),
                    },
                },
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: "event",
                id: event_id,
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::Missing {
                collection: "event",
                id: event_id,
            });
        }
        Ok(())
    }

    async fn mark_settled(&self, event_id: Uuid, player_id: Uuid) -> MongoResult<()> {
        let collection = self
            .collection::<MongoEventDocument>(EVENT_COLLECTION_NAME)
            .await;
        let result = collection
            .update_one(
                doc_id(event_id),
                doc! {
                    "$addToSet": { "settled_by": id_value(player_id) },
                    "$set": { "updated_at": DateTime::now() },
                },
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: "event",
                id: event_id,
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::Missing {
                collection: "event",
                id: event_id,
            });
        }
        Ok(())
    }

    async fn find_player(&self, id: Uuid) -> MongoResult<Option<PlayerEntity>> {
        let collection = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: "player",
                id,
                source,
            })?;
        document.map(PlayerEntity::try_from).transpose()
    }

    async fn list_players(&self) -> MongoResult<Vec<PlayerEntity>> {
        let collection = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await;
        let documents: Vec<MongoPlayerDocument> = collection
            .find(doc! {})
            .sort(doc! {"username": 1})
            .await
            .map_err(|source| MongoDaoError::List {
                collection: "players",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                collection: "players",
                source,
            })?;

        documents.into_iter().map(PlayerEntity::try_from).collect()
    }

    async fn save_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let id = player.id;
        let document: MongoPlayerDocument = player.into();
        self.collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: "player",
                id,
                source,
            })?;
        Ok(())
    }

    async fn credit_player(
        &self,
        player_id: Uuid,
        event_id: Uuid,
        points: u32,
    ) -> MongoResult<CreditOutcome> {
        let collection = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await;
        let updated = collection
            .find_one_and_update(
                doc! {
                    "_id": id_value(player_id),
                    "credited_events": { "$ne": id_value(event_id) },
                },
                doc! {
                    "$inc": { "games_played": 1_i64, "total_points": i64::from(points) },
                    "$addToSet": { "credited_events": id_value(event_id) },
                },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: "player",
                id: player_id,
                source,
            })?;

        if let Some(document) = updated {
            return Ok(CreditOutcome {
                player: document.try_into()?,
                applied: true,
            });
        }

        // Either the player does not exist or the event was credited before.
        match self.find_player(player_id).await? {
            Some(player) => Ok(CreditOutcome {
                player,
                applied: false,
            }),
            None => Err(MongoDaoError::Missing {
                collection: "player",
                id: player_id,
            }),
        }
    }

    async fn set_rating_averages(
        &self,
        player_id: Uuid,
        overall: f64,
        sportsmanship: f64,
    ) -> MongoResult<()> {
        let collection = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await;
        let result = collection
            .update_one(
                doc_id(player_id),
                doc! {
                    "$set": {
                        "avg_overall_rating": overall,
                        "avg_sportsmanship_rating": sportsmanship,
                    },
                },
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: "player",
                id: player_id,
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::Missing {
                collection: "player",
                id: player_id,
            });
        }
        Ok(())
    }

    async fn save_rating(&self, rating: RatingEntity) -> MongoResult<()> {
        let id = rating.id;
        let document: MongoRatingDocument = rating.into();
        self.collection::<MongoRatingDocument>(RATING_COLLECTION_NAME)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: "rating",
                id,
                source,
            })?;
        Ok(())
    }

    async fn list_ratings_for_player(&self, player_id: Uuid) -> MongoResult<Vec<RatingEntity>> {
        let collection = self
            .collection::<MongoRatingDocument>(RATING_COLLECTION_NAME)
            .await;
        let documents: Vec<MongoRatingDocument> = collection
            .find(doc! {"rated_player_id": id_value(player_id)})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::List {
                collection: "ratings",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                collection: "ratings",
                source,
            })?;

        documents.into_iter().map(RatingEntity::try_from).collect()
    }

    async fn save_self_report(&self, report: SelfReportEntity) -> MongoResult<()> {
        let id = report.id;
        let document: MongoSelfReportDocument = report.into();
        self.collection::<MongoSelfReportDocument>(SELF_REPORT_COLLECTION_NAME)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: "self_report",
                id,
                source,
            })?;
        Ok(())
    }

    async fn save_feed_post(&self, post: FeedPostEntity) -> MongoResult<()> {
        let id = post.id;
        let document: MongoFeedPostDocument = post.into();
        self.collection::<MongoFeedPostDocument>(FEED_POST_COLLECTION_NAME)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: "feed_post",
                id,
                source,
            })?;
        Ok(())
    }
}

impl EntityStore for MongoEntityStore {
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_event(id).await.map_err(Into::into) })
    }

    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_event(event).await.map_err(Into::into) })
    }

    fn record_event_result(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        score: ScorePair,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_event_result(event_id, player_id, score)
                .await
                .map_err(Into::into)
        })
    }

    fn mark_settled(
        &self,
        event_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mark_settled(event_id, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(id).await.map_err(Into::into) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players().await.map_err(Into::into) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_player(player).await.map_err(Into::into) })
    }

    fn credit_player(
        &self,
        player_id: Uuid,
        event_id: Uuid,
        points: u32,
    ) -> BoxFuture<'static, StorageResult<CreditOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .credit_player(player_id, event_id, points)
                .await
                .map_err(Into::into)
        })
    }

    fn set_rating_averages(
        &self,
        player_id: Uuid,
        overall: f64,
        sportsmanship: f64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_rating_averages(player_id, overall, sportsmanship)
                .await
                .map_err(Into::into)
        })
    }

    fn save_rating(&self, rating: RatingEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_rating(rating).await.map_err(Into::into) })
    }

    fn list_ratings_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RatingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_ratings_for_player(player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_self_report(
        &self,
        report: SelfReportEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_self_report(report).await.map_err(Into::into) })
    }

    fn save_feed_post(&self, post: FeedPostEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_feed_post(post).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
