//! Converge's wiring layer: the lifecycle/queue engine, reviews, intake,
//! trend projections, semantic indexing, and agent authorization — every
//! module here owns a `Store`/`EventLog` handle and composes the pure-compute
//! crates (`converge-risk`, `converge-policy`, `converge-projections`,
//! `converge-semantic`, `converge-auth`, `converge-security`) into the
//! system's actual behavior.

mod agents;
mod indexer;
mod intake;
mod lifecycle;
mod projections;
mod reviews;
mod security;
mod trends;

pub use agents::Agents;
pub use indexer::{IndexOutcome, Indexer, ReindexSummary};
pub use intake::{IntakeController, IntakeDecision, THROTTLE_ACCEPT_RATIO};
pub use lifecycle::{
    DrainOptions, Engine, QueueDecision, QueueDecisionKind, ValidateOutcome, DEFAULT_MAX_RETRIES, QUEUE_LOCK_NAME,
};
pub use projections::Projections;
pub use reviews::{review_sla_hours, Reviews};
pub use security::SecurityScans;
pub use trends::{
    DecisionDistribution, IntegrationMetrics, RiskTrendPoint, Trends, DEFAULT_TREND_LIMIT, HEALTH_TREND_LIMIT,
    QUERY_LIMIT_LARGE,
};
