use uuid::Uuid;

use crate::{dao::models::RatingEntity, error::ServiceError, state::SharedState};

/// Reliability-weighted averages of the peer ratings a player received.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingSummary {
    pub count: usize,
    pub total_weight: f64,
    pub effort: f64,
    pub teamwork: f64,
    pub sportsmanship: f64,
    pub overall: f64,
}

impl RatingSummary {
    /// Aggregate ratings; an empty or zero-weight set yields all zeros.
    pub fn from_ratings(ratings: &[RatingEntity]) -> Self {
        let total_weight: f64 = ratings
            .iter()
            .map(|r| r.rater_reliability_weight.max(0.0))
            .sum();
        if total_weight <= 0.0 {
            return Self {
                count: ratings.len(),
                ..Self::default()
            };
        }

        let weighted = |axis: fn(&RatingEntity) -> u8| {
            ratings
                .iter()
                .map(|r| f64::from(axis(r)) * r.rater_reliability_weight.max(0.0))
                .sum::<f64>()
                / total_weight
        };

        Self {
            count: ratings.len(),
            total_weight,
            effort: weighted(|r| r.effort),
            teamwork: weighted(|r| r.teamwork),
            sportsmanship: weighted(|r| r.sportsmanship),
            overall: weighted(|r| r.overall),
        }
    }
}

/// Load and aggregate the ratings received by `player_id`.
pub async fn summary_for(
    state: &SharedState,
    player_id: Uuid,
) -> Result<RatingSummary, ServiceError> {
    let store = state.require_entity_store().await?;
    if store.find_player(player_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("player `{player_id}`")));
    }
    let ratings = store.list_ratings_for_player(player_id).await?;
    Ok(RatingSummary::from_ratings(&ratings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn rating(overall: u8, weight: f64) -> RatingEntity {
        RatingEntity {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            rater_id: Uuid::new_v4(),
            rated_player_id: Uuid::new_v4(),
            effort: 3,
            teamwork: 3,
            sportsmanship: 4,
            overall,
            rater_reliability_weight: weight,
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn no_ratings_gives_zeros() {
        let summary = RatingSummary::from_ratings(&[]);
        assert_eq!(summary, RatingSummary::default());
    }

    #[test]
    fn weights_scale_each_rating() {
        let summary = RatingSummary::from_ratings(&[rating(5, 3.0), rating(1, 1.0)]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_weight, 4.0);
        assert_eq!(summary.overall, 4.0);
        assert_eq!(summary.sportsmanship, 4.0);
    }
}
