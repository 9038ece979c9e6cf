use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use uuid::Uuid;

use crate::dao::{
    entity_store::EntityStore,
    models::{
        CreditOutcome, EventEntity, FeedPostEntity, PlayerEntity, RatingEntity, ScorePair,
        SelfReportEntity,
    },
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchDocument, END_SUFFIX, EVENT_PREFIX, FEED_POST_PREFIX,
        PLAYER_PREFIX, RATING_PREFIX, SELF_REPORT_PREFIX, doc_id,
    },
};

const MAX_CONFLICT_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct CouchEntityStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchEntityStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url);
        let database = Arc::<str>::from(config.database);
        let auth = config
            .credentials
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn database_request(&self, method: Method) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, self.database);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let response = self
            .database_request(Method::GET)
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .database_request(Method::PUT)
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchDocument<T>>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, document: &CouchDocument<T>) -> CouchResult<()>
    where
        T: Serialize,
    {
        let response = self
            .request(Method::PUT, &document.id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: document.id.clone(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: document.id.clone(),
            }),
            other => Err(CouchDaoError::RequestStatus {
                path: document.id.clone(),
                status: other,
            }),
        }
    }

    /// Replace a document wholesale, carrying over the current revision.
    async fn upsert_document<T>(&self, id: String, body: T) -> CouchResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut attempts = 0;
        let mut document = CouchDocument::new(id, body);
        loop {
            attempts += 1;
            document.rev = self
                .get_document::<serde_json::Value>(&document.id)
                .await?
                .and_then(|existing| existing.rev);
            match self.put_document(&document).await {
                Err(CouchDaoError::Conflict { path }) if attempts >= MAX_CONFLICT_RETRIES => {
                    return Err(CouchDaoError::ConflictRetriesExhausted { path, attempts });
                }
                Err(CouchDaoError::Conflict { .. }) => continue,
                other => return other,
            }
        }
    }

    /// Read-modify-write a document, retrying when another writer bumped the revision.
    async fn update_document<T, F>(
        &self,
        collection: &'static str,
        id: String,
        mut mutate: F,
    ) -> CouchResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T),
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let Some(mut document) = self.get_document::<T>(&id).await? else {
                return Err(CouchDaoError::Missing { collection, id });
            };
            mutate(&mut document.body);
            match self.put_document(&document).await {
                Ok(()) => return Ok(document.body),
                Err(CouchDaoError::Conflict { path }) if attempts >= MAX_CONFLICT_RETRIES => {
                    return Err(CouchDaoError::ConflictRetriesExhausted { path, attempts });
                }
                Err(CouchDaoError::Conflict { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed: CouchDocument<T> =
                    from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                        path: ALL_DOCS.to_string(),
                        source,
                    })?;
                documents.push(parsed.body);
            }
        }

        Ok(documents)
    }

    async fn credit_player(
        &self,
        player_id: Uuid,
        event_id: Uuid,
        points: u32,
    ) -> CouchResult<CreditOutcome> {
        let mut applied = false;
        let player = self
            .update_document::<PlayerEntity, _>(
                "player",
                doc_id(PLAYER_PREFIX, player_id),
                |player| applied = player.apply_credit(event_id, points),
            )
            .await?;
        Ok(CreditOutcome { player, applied })
    }
}

impl EntityStore for CouchEntityStore {
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .get_document::<EventEntity>(&doc_id(EVENT_PREFIX, id))
                .await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(doc_id(EVENT_PREFIX, event.id), event)
                .await
                .map_err(Into::into)
        })
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
                .update_document::<EventEntity, _>(
                    "event",
                    doc_id(EVENT_PREFIX, event_id),
                    |event| event.apply_result(player_id, score),
                )
                .await?;
            Ok(())
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
                .update_document::<EventEntity, _>(
                    "event",
                    doc_id(EVENT_PREFIX, event_id),
                    |event| event.apply_settled_marker(player_id),
                )
                .await?;
            Ok(())
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .get_document::<PlayerEntity>(&doc_id(PLAYER_PREFIX, id))
                .await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut players = store.list_documents::<PlayerEntity>(PLAYER_PREFIX).await?;
            players.sort_by(|a, b| a.username.cmp(&b.username));
            Ok(players)
        })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(doc_id(PLAYER_PREFIX, player.id), player)
                .await
                .map_err(Into::into)
        })
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
                .update_document::<PlayerEntity, _>(
                    "player",
                    doc_id(PLAYER_PREFIX, player_id),
                    |player| player.apply_rating_averages(overall, sportsmanship),
                )
                .await?;
            Ok(())
        })
    }

    fn save_rating(&self, rating: RatingEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(doc_id(RATING_PREFIX, rating.id), rating)
                .await
                .map_err(Into::into)
        })
    }

    fn list_ratings_for_player(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RatingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut ratings: Vec<RatingEntity> = store
                .list_documents::<RatingEntity>(RATING_PREFIX)
                .await?
                .into_iter()
                .filter(|rating| rating.rated_player_id == player_id)
                .collect();
            ratings.sort_by_key(|rating| rating.created_at);
            Ok(ratings)
        })
    }

    fn save_self_report(
        &self,
        report: SelfReportEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(doc_id(SELF_REPORT_PREFIX, report.id), report)
                .await
                .map_err(Into::into)
        })
    }

    fn save_feed_post(&self, post: FeedPostEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(doc_id(FEED_POST_PREFIX, post.id), post)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let response = store
                .database_request(Method::GET)
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
