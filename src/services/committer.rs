//! Fan-out of the settlement writes once the player confirms the summary.
//!
//! Every write is keyed so that re-running the commit after a partial failure
//! converges on the same documents. The `settled_by` marker goes last: once it
//! is present the commit is known to have gone through.

use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        entity_store::{EntityStore, natural_key},
        models::{
            EventEntity, FeedPostEntity, FeedPostKind, PlayerEntity, RatingEntity,
            SelfReportEntity, Visibility,
        },
    },
    error::ServiceError,
    services::{
        achievements::{self, Achievement},
        rating_summary::RatingSummary,
    },
    state::{SettlementContext, draft::SettlementDraft},
};

/// Trust multiplier recorded on every new peer rating.
pub const DEFAULT_RELIABILITY_WEIGHT: f64 = 1.0;

/// What a commit wrote and what it changed for the player.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// The settlement had already completed; nothing was written.
    pub already_settled: bool,
    /// Number of peer ratings upserted.
    pub ratings_written: usize,
    /// Points credited by this commit (0 when a previous attempt already credited them).
    pub points_awarded: u32,
    /// Player after crediting.
    pub player: PlayerEntity,
    /// Achievements unlocked by this event's credit.
    pub newly_unlocked: Vec<&'static Achievement>,
    /// Identifier of the feed post announcing the game.
    pub feed_post_id: Uuid,
}

pub fn rating_id(event_id: Uuid, rater_id: Uuid, rated_player_id: Uuid) -> Uuid {
    natural_key("rating", &[event_id, rater_id, rated_player_id])
}

pub fn self_report_id(event_id: Uuid, player_id: Uuid) -> Uuid {
    natural_key("self_report", &[event_id, player_id])
}

pub fn feed_post_id(event_id: Uuid, player_id: Uuid) -> Uuid {
    natural_key("feed_post", &[event_id, player_id])
}

/// Write ratings (refreshing the rated players' averages), self-report, event result,
/// feed post, credit and marker in that order.
pub async fn commit(
    store: Arc<dyn EntityStore>,
    context: SettlementContext,
    draft: SettlementDraft,
    reward_points: u32,
) -> Result<CommitOutcome, ServiceError> {
    let event_id = context.event.id;
    let player_id = context.player.id;
    let feed_post_id = feed_post_id(event_id, player_id);

    let event = load_event(store.as_ref(), event_id).await?;
    let player = load_player(store.as_ref(), player_id).await?;
    if event.is_settled_by(player_id) {
        info!(%event_id, %player_id, "settlement already recorded; skipping writes");
        return Ok(CommitOutcome {
            already_settled: true,
            ratings_written: 0,
            points_awarded: 0,
            player,
            newly_unlocked: Vec::new(),
            feed_post_id,
        });
    }

    let now = SystemTime::now();
    let ratings = draft.committed_ratings();
    for (rated_player_id, scores) in &ratings {
        store
            .save_rating(RatingEntity {
                id: rating_id(event_id, player_id, *rated_player_id),
                event_id,
                rater_id: player_id,
                rated_player_id: *rated_player_id,
                effort: scores.effort,
                teamwork: scores.teamwork,
                sportsmanship: scores.sportsmanship,
                overall: scores.overall,
                rater_reliability_weight: DEFAULT_RELIABILITY_WEIGHT,
                created_at: now,
            })
            .await?;
    }
    debug!(%event_id, %player_id, count = ratings.len(), "ratings written");

    for &(rated_player_id, _) in &ratings {
        let received = store.list_ratings_for_player(rated_player_id).await?;
        let summary = RatingSummary::from_ratings(&received);
        store
            .set_rating_averages(rated_player_id, summary.overall, summary.sportsmanship)
            .await?;
    }

    let report = draft.self_report();
    store
        .save_self_report(SelfReportEntity {
            id: self_report_id(event_id, player_id),
            event_id,
            player_id,
            perceived_effort: report.perceived_effort,
            duration_minutes: report.duration_minutes,
            feeling: report.feeling,
            is_self_reported: true,
            created_at: now,
        })
        .await?;
    debug!(%event_id, %player_id, "self-report written");

    let score = draft.score();
    store
        .record_event_result(event_id, player_id, score)
        .await?;
    debug!(%event_id, %player_id, score = %score.display(), "event result recorded");

    store
        .save_feed_post(FeedPostEntity {
            id: feed_post_id,
            kind: FeedPostKind::GameCompleted,
            event_id,
            player_id,
            player_name: player.username.clone(),
            player_avatar: player.avatar_url.clone(),
            content: format!("Played {} at {}", event.sport_type, event.location_name),
            sport_type: event.sport_type.clone(),
            participants: event.participants.clone(),
            score: score.display(),
            visibility: Visibility::Public,
            likes: Vec::new(),
            comments_count: 0,
            created_at: now,
        })
        .await?;
    debug!(%event_id, %player_id, %feed_post_id, "feed post written");

    let credit = store
        .credit_player(player_id, event_id, reward_points)
        .await?;
    debug!(%event_id, %player_id, applied = credit.applied, "player credited");

    store.mark_settled(event_id, player_id).await?;

    let baseline = without_credit(&credit.player, event_id, reward_points);
    let newly_unlocked = achievements::newly_unlocked(&baseline, &credit.player);
    let points_awarded = if credit.applied { reward_points } else { 0 };

    info!(
        %event_id,
        %player_id,
        ratings = ratings.len(),
        points_awarded,
        unlocked = newly_unlocked.len(),
        "settlement committed"
    );

    Ok(CommitOutcome {
        already_settled: false,
        ratings_written: ratings.len(),
        points_awarded,
        player: credit.player,
        newly_unlocked,
        feed_post_id,
    })
}

async fn load_event(store: &dyn EntityStore, event_id: Uuid) -> Result<EventEntity, ServiceError> {
    store
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event `{event_id}`")))
}

async fn load_player(
    store: &dyn EntityStore,
    player_id: Uuid,
) -> Result<PlayerEntity, ServiceError> {
    store
        .find_player(player_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}`")))
}

/// The player as it was right before this event's reward was credited.
fn without_credit(player: &PlayerEntity, event_id: Uuid, reward_points: u32) -> PlayerEntity {
    let mut baseline = player.clone();
    if let Some(pos) = baseline.credited_events.iter().position(|id| *id == event_id) {
        baseline.credited_events.remove(pos);
        baseline.games_played = baseline.games_played.saturating_sub(1);
        baseline.total_points = baseline.total_points.saturating_sub(reward_points);
    }
    baseline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{
            entity_store::{
                faulty::FaultyEntityStore,
                memory::{Fixtures, MemoryEntityStore},
            },
            models::{EventStatus, Feeling, PerceivedEffort, ScorePair},
        },
        state::draft::{PeerScoresUpdate, SelfReportUpdate},
    };

    struct Scenario {
        store: FaultyEntityStore,
        context: SettlementContext,
        p2: Uuid,
        p3: Uuid,
    }

    fn player(username: &str) -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            username: username.into(),
            avatar_url: None,
            games_played: 4,
            total_points: 40,
            games_organized: 0,
            friends: Vec::new(),
            avg_overall_rating: 0.0,
            avg_sportsmanship_rating: 0.0,
            credited_events: Vec::new(),
        }
    }

    fn scenario() -> Scenario {
        let (p1, p2, p3) = (player("p1"), player("p2"), player("p3"));
        let event = EventEntity {
            id: Uuid::new_v4(),
            title: "Tuesday five-a-side".into(),
            sport_type: "football".into(),
            location_name: "Park".into(),
            status: EventStatus::Completed,
            participants: vec![p1.id, p2.id, p3.id],
            confirmed_attendance: Vec::new(),
            score_team_a: None,
            score_team_b: None,
            settled_by: Vec::new(),
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        };
        let context = SettlementContext {
            event: event.clone(),
            player: p1.clone(),
            roster: vec![p2.clone(), p3.clone()],
        };
        let store = FaultyEntityStore::new(MemoryEntityStore::with_fixtures(Fixtures {
            events: vec![event],
            players: vec![p1, p2.clone(), p3.clone()],
        }));
        Scenario {
            store,
            context,
            p2: p2.id,
            p3: p3.id,
        }
    }

    fn reference_draft(s: &Scenario) -> SettlementDraft {
        SettlementDraft::new(vec![s.p2, s.p3], 60)
            .with_score(ScorePair::new(3, 1))
            .toggle_participant(s.p3)
            .unwrap()
            .with_peer_scores(
                s.p2,
                PeerScoresUpdate {
                    overall: Some(5),
                    ..Default::default()
                },
            )
            .unwrap()
            .with_self_report(SelfReportUpdate {
                perceived_effort: Some(PerceivedEffort::High),
                duration_minutes: Some(75),
                feeling: Some(Feeling::Great),
            })
    }

    async fn run(s: &Scenario, draft: SettlementDraft) -> Result<CommitOutcome, ServiceError> {
        commit(Arc::new(s.store.clone()), s.context.clone(), draft, 10).await
    }

    #[tokio::test]
    async fn reference_scenario_writes_exactly_the_expected_documents() {
        let s = scenario();
        let outcome = run(&s, reference_draft(&s)).await.unwrap();
        let memory = s.store.inner();
        let p1 = s.context.player.id;

        let ratings = memory.ratings();
        assert_eq!(ratings.len(), 1);
        let rating = &ratings[0];
        assert_eq!(rating.rater_id, p1);
        assert_eq!(rating.rated_player_id, s.p2);
        assert_eq!(
            (rating.effort, rating.teamwork, rating.sportsmanship, rating.overall),
            (3, 3, 3, 5)
        );
        assert_eq!(rating.rater_reliability_weight, 1.0);

        let reports = memory.self_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].perceived_effort, PerceivedEffort::High);
        assert_eq!(reports[0].duration_minutes, 75);
        assert_eq!(reports[0].feeling, Feeling::Great);
        assert!(reports[0].is_self_reported);

        let event = memory.event(s.context.event.id).unwrap();
        assert_eq!(event.confirmed_attendance, vec![p1]);
        assert_eq!((event.score_team_a, event.score_team_b), (Some(3), Some(1)));
        assert_eq!(event.settled_by, vec![p1]);

        let posts = memory.feed_posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].score, "3 - 1");
        assert_eq!(posts[0].content, "Played football at Park");
        assert_eq!(posts[0].kind, FeedPostKind::GameCompleted);
        assert_eq!(posts[0].visibility, Visibility::Public);
        assert!(posts[0].likes.is_empty());
        assert_eq!(posts[0].comments_count, 0);
        assert_eq!(posts[0].participants.len(), 3);

        let player = memory.player(p1).unwrap();
        assert_eq!(player.games_played, 5);
        assert_eq!(player.total_points, 50);
        assert_eq!(outcome.points_awarded, 10);
        assert_eq!(outcome.ratings_written, 1);
        assert!(!outcome.already_settled);
    }

    #[tokio::test]
    async fn skipped_ratings_write_only_report_event_and_post() {
        let s = scenario();
        let draft = reference_draft(&s).skip_ratings();
        run(&s, draft).await.unwrap();
        let memory = s.store.inner();

        assert!(memory.ratings().is_empty());
        assert_eq!(memory.self_reports().len(), 1);
        assert_eq!(memory.feed_posts().len(), 1);
        assert_eq!(s.store.calls("record_event_result"), 1);
        assert_eq!(s.store.calls("save_rating"), 0);
    }

    #[tokio::test]
    async fn retry_after_partial_failure_credits_once() {
        let s = scenario();
        s.store.fail_next("mark_settled", 1);

        let err = run(&s, reference_draft(&s)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        let p1 = s.context.player.id;
        assert_eq!(s.store.inner().player(p1).unwrap().games_played, 5);

        let outcome = run(&s, reference_draft(&s)).await.unwrap();
        assert_eq!(outcome.points_awarded, 0);

        let memory = s.store.inner();
        let player = memory.player(p1).unwrap();
        assert_eq!(player.games_played, 5);
        assert_eq!(player.total_points, 50);
        assert_eq!(memory.ratings().len(), 1);
        assert_eq!(memory.self_reports().len(), 1);
        assert_eq!(memory.feed_posts().len(), 1);
        assert_eq!(memory.event(s.context.event.id).unwrap().confirmed_attendance, vec![p1]);
    }

    #[tokio::test]
    async fn settled_marker_short_circuits_the_commit() {
        let s = scenario();
        run(&s, reference_draft(&s)).await.unwrap();
        let writes_before = s.store.calls("save_feed_post");

        let outcome = run(&s, reference_draft(&s)).await.unwrap();
        assert!(outcome.already_settled);
        assert_eq!(s.store.calls("save_feed_post"), writes_before);
        assert_eq!(s.store.calls("credit_player"), 1);
    }

    #[tokio::test]
    async fn rated_players_get_refreshed_profile_averages() {
        let s = scenario();
        let earlier = RatingEntity {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            rater_id: Uuid::new_v4(),
            rated_player_id: s.p2,
            effort: 4,
            teamwork: 4,
            sportsmanship: 5,
            overall: 4,
            rater_reliability_weight: 1.0,
            created_at: SystemTime::UNIX_EPOCH,
        };
        s.store.inner().save_rating(earlier).await.unwrap();

        run(&s, reference_draft(&s)).await.unwrap();
        let memory = s.store.inner();

        let rated = memory.player(s.p2).unwrap();
        assert_eq!(rated.avg_overall_rating, 4.5);
        assert_eq!(rated.avg_sportsmanship_rating, 4.0);
        let all_star = achievements::CATALOG
            .iter()
            .find(|a| a.id == "all_star")
            .unwrap();
        assert!(achievements::progress(all_star, &rated).unlocked);

        let deselected = memory.player(s.p3).unwrap();
        assert_eq!(deselected.avg_overall_rating, 0.0);
        assert_eq!(s.store.calls("set_rating_averages"), 1);
    }

    #[tokio::test]
    async fn first_game_is_reported_as_unlocked() {
        let s = scenario();
        let mut rookie = s.context.player.clone();
        rookie.games_played = 0;
        rookie.total_points = 0;
        s.store.inner().save_player(rookie).await.unwrap();

        let outcome = run(&s, reference_draft(&s)).await.unwrap();
        let ids: Vec<&str> = outcome.newly_unlocked.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["first_game"]);
    }
}
