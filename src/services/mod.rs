/// Achievement catalog and progress evaluation.
pub mod achievements;
/// Settlement write fan-out.
pub mod committer;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Player read projections.
pub mod player_service;
/// Weighted peer rating aggregates.
pub mod rating_summary;
/// Settlement session operations.
pub mod settlement_service;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
