use serde::Serialize;
use utoipa::ToSchema;

/// Whether the entity store is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Settlements can be started and committed.
    Ok,
    /// No entity store; settlement requests answer 503.
    Degraded,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Settlement sessions currently held in memory.
    pub open_sessions: usize,
}
