//! Core domain types for Converge.
//!
//! This crate has no behavior of its own — it is the shared vocabulary that
//! every other `converge-*` crate builds on: the `Intent`/`Event` entities,
//! the `EventType` wire registry, the `ConvergeError` taxonomy, typed event
//! payloads, and the ownership/glob matcher used by the authorization layer.

mod error;
mod event_type;
mod models;
mod ownership;
pub mod payloads;

pub use error::{ConvergeError, ConvergeResult};
pub use event_type::EventType;
pub use models::{
    ActionOverride, AgentPolicy, ChainState, CommitLink, CommitRole, ComplianceThresholds,
    Embedding, Event, FindingCategory, FindingSeverity, Intent, IntentSemantic, IntentTechnical,
    QueueLock, ReviewStatus, ReviewTask, RiskLevel, RiskPolicy, SecurityFinding, Simulation,
    Status, WebhookDelivery, now,
};
pub use ownership::{OwnershipConfig, OwnershipRule, glob_match};
