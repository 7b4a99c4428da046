//! Derived read models for Converge: everything here is computed at query
//! time from events and intents, nothing is a persisted cache.

mod compliance;
mod health;
mod models;
mod predictions;
mod queue;
mod verification;

pub use compliance::{compliance_report, ComplianceInputs};
pub use health::{change_health, repo_health, ChangeHealthInputs, RepoHealthInputs};
pub use models::{
    AgentPerformance, ChangeHealth, ComplianceCheck, ComplianceReport, DebtBreakdown, HealthStatus, PendingIntent,
    PredictionSignal, QueueState, RepoHealth, VerificationDebt,
};
pub use predictions::{predict_issues, PredictionInputs, RiskSample, SimSample};
pub use queue::{agent_performance, queue_state, AgentEventCounts};
pub use verification::{
    verification_debt, VerificationInputs, VerificationParams, DEFAULT_QUEUE_CAPACITY, DEFAULT_REVIEW_CAPACITY,
    DEFAULT_STALE_HOURS,
};
