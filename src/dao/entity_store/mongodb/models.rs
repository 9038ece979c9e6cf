use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    EventEntity, EventStatus, FeedPostEntity, FeedPostKind, Feeling, PerceivedEffort,
    PlayerEntity, RatingEntity, SelfReportEntity, Visibility,
};

// Identifiers are stored as canonical strings so filters and `$addToSet`
// operate on plain values.

pub fn id_value(id: Uuid) -> String {
    id.to_string()
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id_value(id)}
}

fn ids_to_values(ids: Vec<Uuid>) -> Vec<String> {
    ids.into_iter().map(id_value).collect()
}

fn parse_id(collection: &'static str, doc_id: &str, value: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(value).map_err(|err| MongoDaoError::Malformed {
        collection,
        id: doc_id.to_owned(),
        reason: format!("invalid uuid `{value}`: {err}"),
    })
}

fn parse_ids(
    collection: &'static str,
    doc_id: &str,
    values: Vec<String>,
) -> Result<Vec<Uuid>, MongoDaoError> {
    values
        .iter()
        .map(|value| parse_id(collection, doc_id, value))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    sport_type: String,
    location_name: String,
    status: EventStatus,
    participants: Vec<String>,
    #[serde(default)]
    confirmed_attendance: Vec<String>,
    #[serde(default)]
    score_team_a: Option<u32>,
    #[serde(default)]
    score_team_b: Option<u32>,
    #[serde(default)]
    settled_by: Vec<String>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<EventEntity> for MongoEventDocument {
    fn from(value: EventEntity) -> Self {
        Self {
            id: id_value(value.id),
            title: value.title,
            sport_type: value.sport_type,
            location_name: value.location_name,
            status: value.status,
            participants: ids_to_values(value.participants),
            confirmed_attendance: ids_to_values(value.confirmed_attendance),
            score_team_a: value.score_team_a,
            score_team_b: value.score_team_b,
            settled_by: ids_to_values(value.settled_by),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoEventDocument> for EventEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoEventDocument) -> Result<Self, Self::Error> {
        const COLLECTION: &str = "event";
        let doc_id = value.id;
        Ok(Self {
            id: parse_id(COLLECTION, &doc_id, &doc_id)?,
            title: value.title,
            sport_type: value.sport_type,
            location_name: value.location_name,
            status: value.status,
            participants: parse_ids(COLLECTION, &doc_id, value.participants)?,
            confirmed_attendance: parse_ids(COLLECTION, &doc_id, value.confirmed_attendance)?,
            score_team_a: value.score_team_a,
            score_team_b: value.score_team_b,
            settled_by: parse_ids(COLLECTION, &doc_id, value.settled_by)?,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    username: String,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    games_played: u32,
    #[serde(default)]
    total_points: u32,
    #[serde(default)]
    games_organized: u32,
    #[serde(default)]
    friends: Vec<String>,
    #[serde(default)]
    avg_overall_rating: f64,
    #[serde(default)]
    avg_sportsmanship_rating: f64,
    #[serde(default)]
    credited_events: Vec<String>,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: id_value(value.id),
            username: value.username,
            avatar_url: value.avatar_url,
            games_played: value.games_played,
            total_points: value.total_points,
            games_organized: value.games_organized,
            friends: ids_to_values(value.friends),
            avg_overall_rating: value.avg_overall_rating,
            avg_sportsmanship_rating: value.avg_sportsmanship_rating,
            credited_events: ids_to_values(value.credited_events),
        }
    }
}

impl TryFrom<MongoPlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerDocument) -> Result<Self, Self::Error> {
        const COLLECTION: &str = "player";
        let doc_id = value.id;
        Ok(Self {
            id: parse_id(COLLECTION, &doc_id, &doc_id)?,
            username: value.username,
            avatar_url: value.avatar_url,
            games_played: value.games_played,
            total_points: value.total_points,
            games_organized: value.games_organized,
            friends: parse_ids(COLLECTION, &doc_id, value.friends)?,
            avg_overall_rating: value.avg_overall_rating,
            avg_sportsmanship_rating: value.avg_sportsmanship_rating,
            credited_events: parse_ids(COLLECTION, &doc_id, value.credited_events)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRatingDocument {
    #[serde(rename = "_id")]
    id: String,
    event_id: String,
    rater_id: String,
    rated_player_id: String,
    effort: u8,
    teamwork: u8,
    sportsmanship: u8,
    overall: u8,
    rater_reliability_weight: f64,
    created_at: DateTime,
}

impl From<RatingEntity> for MongoRatingDocument {
    fn from(value: RatingEntity) -> Self {
        Self {
            id: id_value(value.id),
            event_id: id_value(value.event_id),
            rater_id: id_value(value.rater_id),
            rated_player_id: id_value(value.rated_player_id),
            effort: value.effort,
            teamwork: value.teamwork,
            sportsmanship: value.sportsmanship,
            overall: value.overall,
            rater_reliability_weight: value.rater_reliability_weight,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoRatingDocument> for RatingEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoRatingDocument) -> Result<Self, Self::Error> {
        const COLLECTION: &str = "rating";
        let doc_id = value.id;
        Ok(Self {
            id: parse_id(COLLECTION, &doc_id, &doc_id)?,
            event_id: parse_id(COLLECTION, &doc_id, &value.event_id)?,
            rater_id: parse_id(COLLECTION, &doc_id, &value.rater_id)?,
            rated_player_id: parse_id(COLLECTION, &doc_id, &value.rated_player_id)?,
            effort: value.effort,
            teamwork: value.teamwork,
            sportsmanship: value.sportsmanship,
            overall: value.overall,
            rater_reliability_weight: value.rater_reliability_weight,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSelfReportDocument {
    #[serde(rename = "_id")]
    id: String,
    event_id: String,
    player_id: String,
    perceived_effort: PerceivedEffort,
    duration_minutes: u32,
    feeling: Feeling,
    is_self_reported: bool,
    created_at: DateTime,
}

impl From<SelfReportEntity> for MongoSelfReportDocument {
    fn from(value: SelfReportEntity) -> Self {
        Self {
            id: id_value(value.id),
            event_id: id_value(value.event_id),
            player_id: id_value(value.player_id),
            perceived_effort: value.perceived_effort,
            duration_minutes: value.duration_minutes,
            feeling: value.feeling,
            is_self_reported: value.is_self_reported,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFeedPostDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "type")]
    kind: FeedPostKind,
    event_id: String,
    player_id: String,
    player_name: String,
    player_avatar: Option<String>,
    content: String,
    sport_type: String,
    participants: Vec<String>,
    score: String,
    visibility: Visibility,
    likes: Vec<String>,
    comments_count: u32,
    created_at: DateTime,
}

impl From<FeedPostEntity> for MongoFeedPostDocument {
    fn from(value: FeedPostEntity) -> Self {
        Self {
            id: id_value(value.id),
            kind: value.kind,
            event_id: id_value(value.event_id),
            player_id: id_value(value.player_id),
            player_name: value.player_name,
            player_avatar: value.player_avatar,
            content: value.content,
            sport_type: value.sport_type,
            participants: ids_to_values(value.participants),
            score: value.score,
            visibility: value.visibility,
            likes: ids_to_values(value.likes),
            comments_count: value.comments_count,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}
