use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        entity_store::EntityStore,
        models::{EventEntity, EventStatus, PlayerEntity, ScorePair},
    },
    dto::{
        player::AchievementView,
        settlement::{
            CommitResponse, PeerRatingRequest, ScoreRequest, SelfReportRequest,
            StartSettlementRequest, SettlementView,
        },
    },
    error::ServiceError,
    services::committer,
    state::{
        SettlementContext, SettlementSession, SharedState,
        draft::{PeerScoresUpdate, SelfReportUpdate, SettlementDraft},
        state_machine::{SettlementEvent, SettlementStage},
    },
};

async fn view(session: &SettlementSession) -> SettlementView {
    let snapshot = session.snapshot().await;
    let draft = session.draft().await;
    SettlementView::build(
        session.id(),
        session.opened_at(),
        session.context(),
        &snapshot,
        &draft,
    )
}

/// Open a settlement, or return the one already open for this player and event.
pub async fn start(
    state: &SharedState,
    request: StartSettlementRequest,
) -> Result<SettlementView, ServiceError> {
    let StartSettlementRequest {
        event_id,
        player_id,
    } = request;

    if let Some(existing) = state.find_open_session(event_id, player_id) {
        if !existing.stage().await.is_terminal() {
            return Ok(view(&existing).await);
        }
    }

    let store = state.require_entity_store().await?;
    let event = store
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event `{event_id}`")))?;
    let player = store
        .find_player(player_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}`")))?;

    if event.status == EventStatus::Cancelled {
        return Err(ServiceError::InvalidState(format!(
            "event `{event_id}` was cancelled"
        )));
    }
    if event.is_settled_by(player_id) {
        return Err(ServiceError::InvalidState(format!(
            "player `{player_id}` already settled event `{event_id}`"
        )));
    }

    let roster = load_roster(store.as_ref(), &event, player_id).await;
    let session = Arc::new(SettlementSession::new(
        SettlementContext {
            event,
            player,
            roster,
        },
        state.config().default_duration_minutes(),
    ));
    state.insert_session(session.clone());
    info!(
        session_id = %session.id(),
        %event_id,
        %player_id,
        roster = session.context().roster.len(),
        "settlement session opened"
    );

    Ok(view(&session).await)
}

/// Co-participants in event order; a failing lookup yields an empty roster.
async fn load_roster(
    store: &dyn EntityStore,
    event: &EventEntity,
    player_id: Uuid,
) -> Vec<PlayerEntity> {
    if event.participants.is_empty() {
        return Vec::new();
    }

    let players = match store.list_players().await {
        Ok(players) => players,
        Err(err) => {
            warn!(event_id = %event.id, error = %err, "failed to load roster; rating stage will be empty");
            return Vec::new();
        }
    };

    event
        .participants
        .iter()
        .filter(|id| **id != player_id)
        .filter_map(|id| players.iter().find(|player| player.id == *id).cloned())
        .collect()
}

pub async fn get(state: &SharedState, id: Uuid) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;
    Ok(view(&session).await)
}

/// Drop an open session without writing anything.
pub async fn discard(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    if state.remove_session(id) {
        info!(session_id = %id, "settlement session discarded");
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("settlement session `{id}`")))
    }
}

/// Answer the attendance question; a "no" closes the session with nothing written.
pub async fn confirm_attendance(
    state: &SharedState,
    id: Uuid,
    attended: bool,
) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;

    if !attended {
        session
            .advance(SettlementEvent::DidNotAttend, |_, draft| draft)
            .await?;
        state.remove_session(id);
        info!(session_id = %id, "player did not attend; settlement aborted");
        return Ok(view(&session).await);
    }

    let context = session.context();
    if !context.event.has_participant(context.player.id) {
        return Err(ServiceError::InvalidState(format!(
            "player `{}` is not a participant of event `{}`",
            context.player.id, context.event.id
        )));
    }
    session
        .advance(SettlementEvent::Attended, |_, draft| draft)
        .await?;
    Ok(view(&session).await)
}

pub async fn set_score(
    state: &SharedState,
    id: Uuid,
    request: ScoreRequest,
) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;
    let score = ScorePair::new(request.team_a(), request.team_b());
    session
        .edit_draft(SettlementStage::ScoringInput, |draft| {
            Ok(draft.with_score(score))
        })
        .await?;
    Ok(view(&session).await)
}

/// Select or deselect a co-participant for rating.
pub async fn toggle_participant(
    state: &SharedState,
    id: Uuid,
    player_id: Uuid,
) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;
    session
        .edit_draft(SettlementStage::RatingInput, |draft| {
            Ok(draft.toggle_participant(player_id)?)
        })
        .await?;
    Ok(view(&session).await)
}

pub async fn rate_participant(
    state: &SharedState,
    id: Uuid,
    player_id: Uuid,
    request: PeerRatingRequest,
) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;
    let update: PeerScoresUpdate = request.into();
    session
        .edit_draft(SettlementStage::RatingInput, |draft| {
            Ok(draft.with_peer_scores(player_id, update)?)
        })
        .await?;
    Ok(view(&session).await)
}

/// Leave the rating stage without committing any rating.
pub async fn skip_ratings(state: &SharedState, id: Uuid) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;
    session
        .advance(SettlementEvent::SkipRatings, |_, draft| draft.skip_ratings())
        .await?;
    Ok(view(&session).await)
}

pub async fn set_self_report(
    state: &SharedState,
    id: Uuid,
    request: SelfReportRequest,
) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;
    let update: SelfReportUpdate = request.into();
    session
        .edit_draft(SettlementStage::SelfReportInput, |draft| {
            Ok(draft.with_self_report(update))
        })
        .await?;
    Ok(view(&session).await)
}

/// Entering the rating stage or leaving it forward re-opens ratings after a skip.
fn reopen_ratings(stage: SettlementStage, draft: SettlementDraft) -> SettlementDraft {
    match stage {
        SettlementStage::RatingInput => draft.resume_ratings(),
        _ => draft,
    }
}

pub async fn next(state: &SharedState, id: Uuid) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;
    let from = session.stage().await;
    session
        .advance(SettlementEvent::Next, move |_, draft| {
            reopen_ratings(from, draft)
        })
        .await?;
    Ok(view(&session).await)
}

pub async fn back(state: &SharedState, id: Uuid) -> Result<SettlementView, ServiceError> {
    let session = state.session(id)?;
    session
        .advance(SettlementEvent::Back, reopen_ratings)
        .await?;
    Ok(view(&session).await)
}

/// Persist the draft. On failure the session stays on the summary and can be retried.
pub async fn commit(state: &SharedState, id: Uuid) -> Result<CommitResponse, ServiceError> {
    let session = state.session(id)?;
    let store = state.require_entity_store().await?;
    let context = session.context().clone();
    let reward_points = state.config().reward_points();

    let result = session
        .run_transition(
            SettlementEvent::Commit,
            state.commit_timeout(),
            move |draft| committer::commit(store, context, draft, reward_points),
        )
        .await;

    let (outcome, _) = match result {
        Ok(done) => done,
        Err(err) => {
            warn!(session_id = %id, error = %err, "settlement commit failed; staying on summary");
            return Err(err);
        }
    };

    state.remove_session(id);
    let session_view = view(&session).await;
    Ok(CommitResponse {
        session: session_view,
        already_settled: outcome.already_settled,
        ratings_written: outcome.ratings_written,
        points_awarded: outcome.points_awarded,
        games_played: outcome.player.games_played,
        total_points: outcome.player.total_points,
        feed_post_id: outcome.feed_post_id,
        newly_unlocked: outcome
            .newly_unlocked
            .into_iter()
            .map(AchievementView::unlocked)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            entity_store::{
                faulty::FaultyEntityStore,
                memory::{Fixtures, MemoryEntityStore},
            },
            models::{Feeling, PerceivedEffort},
        },
        dto::stage::VisibleStage,
        state::AppState,
    };
    use serde_json::json;

    struct World {
        state: SharedState,
        store: FaultyEntityStore,
        event_id: Uuid,
        players: [Uuid; 3],
        outsider: Uuid,
    }

    fn player(username: &str) -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            username: username.into(),
            avatar_url: None,
            games_played: 0,
            total_points: 0,
            games_organized: 0,
            friends: Vec::new(),
            avg_overall_rating: 0.0,
            avg_sportsmanship_rating: 0.0,
            credited_events: Vec::new(),
        }
    }

    async fn world_with(config: AppConfig, status: EventStatus) -> World {
        let (p1, p2, p3, outsider) = (player("ari"), player("ben"), player("cy"), player("dov"));
        let players = [p1.id, p2.id, p3.id];
        let event = EventEntity {
            id: Uuid::new_v4(),
            title: "Friday hoops".into(),
            sport_type: "basketball".into(),
            location_name: "Community court".into(),
            status,
            participants: players.to_vec(),
            confirmed_attendance: Vec::new(),
            score_team_a: None,
            score_team_b: None,
            settled_by: Vec::new(),
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        };
        let event_id = event.id;
        let outsider_id = outsider.id;
        let store = FaultyEntityStore::new(MemoryEntityStore::with_fixtures(Fixtures {
            events: vec![event],
            players: vec![p1, p2, p3, outsider],
        }));
        let state = AppState::with_store(config, Arc::new(store.clone())).await;
        World {
            state,
            store,
            event_id,
            players,
            outsider: outsider_id,
        }
    }

    async fn world() -> World {
        world_with(AppConfig::default(), EventStatus::Completed).await
    }

    async fn open(world: &World, player_id: Uuid) -> Uuid {
        start(
            &world.state,
            StartSettlementRequest {
                event_id: world.event_id,
                player_id,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn to_summary(world: &World, id: Uuid) {
        let state = &world.state;
        confirm_attendance(state, id, true).await.unwrap();
        next(state, id).await.unwrap();
        next(state, id).await.unwrap();
        next(state, id).await.unwrap();
    }

    fn write_calls(store: &FaultyEntityStore) -> u32 {
        [
            "save_rating",
            "set_rating_averages",
            "save_self_report",
            "record_event_result",
            "save_feed_post",
            "credit_player",
            "mark_settled",
        ]
        .iter()
        .map(|op| store.calls(op))
        .sum()
    }

    #[tokio::test]
    async fn roster_excludes_the_settling_player() {
        let w = world().await;
        let id = open(&w, w.players[0]).await;
        let view = get(&w.state, id).await.unwrap();

        let roster: Vec<Uuid> = view.draft.roster.iter().map(|r| r.player_id).collect();
        assert_eq!(roster, vec![w.players[1], w.players[2]]);
        assert!(view.draft.roster.iter().all(|r| r.selected));
        assert_eq!(view.stage, VisibleStage::Confirming);
    }

    #[tokio::test]
    async fn roster_falls_back_to_empty_when_players_cannot_be_listed() {
        let w = world().await;
        w.store.fail_next("list_players", 1);
        let id = open(&w, w.players[0]).await;
        assert!(get(&w.state, id).await.unwrap().draft.roster.is_empty());
    }

    #[tokio::test]
    async fn not_attending_writes_nothing_even_for_outsiders() {
        let w = world().await;
        for player_id in [w.players[0], w.outsider] {
            let id = open(&w, player_id).await;
            let view = confirm_attendance(&w.state, id, false).await.unwrap();
            assert_eq!(view.stage, VisibleStage::Aborted);
            assert!(matches!(get(&w.state, id).await, Err(ServiceError::NotFound(_))));
        }
        assert_eq!(write_calls(&w.store), 0);
    }

    #[tokio::test]
    async fn outsiders_cannot_confirm_attendance() {
        let w = world().await;
        let id = open(&w, w.outsider).await;
        let err = confirm_attendance(&w.state, id, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn score_reaches_summary_unchanged() {
        let w = world().await;
        let id = open(&w, w.players[0]).await;
        confirm_attendance(&w.state, id, true).await.unwrap();
        set_score(
            &w.state,
            id,
            ScoreRequest {
                team_a: json!(0),
                team_b: json!("17"),
            },
        )
        .await
        .unwrap();
        next(&w.state, id).await.unwrap();
        next(&w.state, id).await.unwrap();
        let view = next(&w.state, id).await.unwrap();

        assert_eq!(view.stage, VisibleStage::Summary);
        assert_eq!((view.draft.team_a, view.draft.team_b), (0, 17));
        assert_eq!(view.draft.score, "0 - 17");
    }

    #[tokio::test]
    async fn edits_are_only_accepted_in_their_stage() {
        let w = world().await;
        let id = open(&w, w.players[0]).await;
        let err = set_score(
            &w.state,
            id,
            ScoreRequest {
                team_a: json!(1),
                team_b: json!(1),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        confirm_attendance(&w.state, id, true).await.unwrap();
        let err = toggle_participant(&w.state, id, w.players[1])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn going_back_after_skip_reopens_ratings() {
        let w = world().await;
        let id = open(&w, w.players[0]).await;
        confirm_attendance(&w.state, id, true).await.unwrap();
        next(&w.state, id).await.unwrap();

        let view = skip_ratings(&w.state, id).await.unwrap();
        assert_eq!(view.stage, VisibleStage::SelfReportInput);
        assert!(view.draft.ratings_skipped);

        let view = back(&w.state, id).await.unwrap();
        assert_eq!(view.stage, VisibleStage::RatingInput);
        assert!(!view.draft.ratings_skipped);
        assert_eq!(view.draft.roster.len(), 2);
    }

    #[tokio::test]
    async fn full_flow_commits_and_closes_the_session() {
        let w = world().await;
        let [p1, p2, p3] = w.players;
        let id = open(&w, p1).await;
        let state = &w.state;

        confirm_attendance(state, id, true).await.unwrap();
        set_score(
            state,
            id,
            ScoreRequest {
                team_a: json!(3),
                team_b: json!(1),
            },
        )
        .await
        .unwrap();
        next(state, id).await.unwrap();
        toggle_participant(state, id, p3).await.unwrap();
        rate_participant(
            state,
            id,
            p2,
            PeerRatingRequest {
                effort: None,
                teamwork: None,
                sportsmanship: None,
                overall: Some(5),
            },
        )
        .await
        .unwrap();
        next(state, id).await.unwrap();
        set_self_report(
            state,
            id,
            SelfReportRequest {
                perceived_effort: Some(PerceivedEffort::High),
                duration_minutes: Some(json!("75")),
                feeling: Some(Feeling::Great),
            },
        )
        .await
        .unwrap();
        next(state, id).await.unwrap();

        let response = commit(state, id).await.unwrap();
        assert_eq!(response.session.stage, VisibleStage::Complete);
        assert_eq!(response.points_awarded, 10);
        assert_eq!(response.games_played, 1);
        assert_eq!(response.total_points, 10);
        assert_eq!(response.ratings_written, 1);
        assert_eq!(response.newly_unlocked.len(), 1);
        assert_eq!(response.newly_unlocked[0].id, "first_game");
        assert!(get(state, id).await.is_err());

        let memory = w.store.inner();
        assert_eq!(memory.ratings().len(), 1);
        assert_eq!(memory.ratings()[0].rated_player_id, p2);
        assert_eq!(memory.self_reports()[0].duration_minutes, 75);
        assert_eq!(memory.feed_posts()[0].score, "3 - 1");
    }

    #[tokio::test]
    async fn failed_commit_stays_on_summary_and_retries_cleanly() {
        let w = world().await;
        let p1 = w.players[0];
        let id = open(&w, p1).await;
        to_summary(&w, id).await;

        w.store.fail_next("save_feed_post", 1);
        let err = commit(&w.state, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        let view = get(&w.state, id).await.unwrap();
        assert_eq!(view.stage, VisibleStage::Summary);
        assert!(view.pending_stage.is_none());

        let response = commit(&w.state, id).await.unwrap();
        assert_eq!(response.points_awarded, 10);
        let player = w.store.inner().player(p1).unwrap();
        assert_eq!(player.games_played, 1);
        assert_eq!(player.total_points, 10);
        assert_eq!(w.store.inner().ratings().len(), 2);
    }

    #[tokio::test]
    async fn commit_timeout_aborts_the_transition() {
        let config = AppConfig::default().with_commit_timeout(Some(Duration::from_millis(20)));
        let w = world_with(config, EventStatus::Completed).await;
        let id = open(&w, w.players[0]).await;
        to_summary(&w, id).await;

        w.store.stall("mark_settled", Duration::from_millis(500));
        let err = commit(&w.state, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        let view = get(&w.state, id).await.unwrap();
        assert_eq!(view.stage, VisibleStage::Summary);
        assert!(view.pending_stage.is_none());
    }

    #[tokio::test]
    async fn concurrent_settlers_both_confirm_attendance() {
        let w = world().await;
        let [p1, p2, _] = w.players;
        let a = open(&w, p1).await;
        let b = open(&w, p2).await;
        to_summary(&w, a).await;
        to_summary(&w, b).await;

        let (ra, rb) = tokio::join!(commit(&w.state, a), commit(&w.state, b));
        ra.unwrap();
        rb.unwrap();

        let event = w.store.inner().event(w.event_id).unwrap();
        assert_eq!(event.confirmed_attendance.len(), 2);
        assert!(event.confirmed_attendance.contains(&p1));
        assert!(event.confirmed_attendance.contains(&p2));
        assert_eq!(w.store.inner().feed_posts().len(), 2);
    }

    #[tokio::test]
    async fn settled_and_cancelled_events_cannot_be_reopened() {
        let w = world().await;
        let p1 = w.players[0];
        let id = open(&w, p1).await;
        to_summary(&w, id).await;
        commit(&w.state, id).await.unwrap();

        let err = start(
            &w.state,
            StartSettlementRequest {
                event_id: w.event_id,
                player_id: p1,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let cancelled = world_with(AppConfig::default(), EventStatus::Cancelled).await;
        let err = start(
            &cancelled.state,
            StartSettlementRequest {
                event_id: cancelled.event_id,
                player_id: cancelled.players[0],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn starting_twice_resumes_the_open_session() {
        let w = world().await;
        let first = open(&w, w.players[0]).await;
        let second = open(&w, w.players[0]).await;
        assert_eq!(first, second);
        assert_eq!(w.state.session_count(), 1);
    }

    #[tokio::test]
    async fn degraded_mode_rejects_new_sessions() {
        let w = world().await;
        w.state.clear_entity_store().await;
        let err = start(
            &w.state,
            StartSettlementRequest {
                event_id: w.event_id,
                player_id: w.players[0],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
