//! # Converge
//!
//! Event-sourced merge-queue coordination: risk-gated intent validation,
//! simulated-merge-before-real-merge, human review routing, and adaptive
//! intake control for repositories fed by both human and agent
//! contributors.
//!
//! Converge treats the event log as the single source of truth. Every read
//! model — repo health, verification debt, compliance status, queue state,
//! agent trust — is derived at query time from the log and the intent
//! table; nothing is a persisted cache that can drift from what actually
//! happened.
//!
//! ## Pipeline
//!
//! The core flow is **simulate -> evaluate risk -> evaluate policy ->
//! queue -> merge**:
//!
//! 1. [`scm::ScmPort::simulate_merge`] dry-runs a merge and records conflicts.
//! 2. [`risk::evaluate_risk`] scores entropy, containment, and propagation.
//! 3. [`policy::evaluate`] turns the risk score and a tenant's risk profile
//!    into a pass/warn/block verdict.
//! 4. [`core::Engine::process_queue`] drains validated intents in
//!    priority order, executing each merge through the same `ScmPort` and
//!    retrying or rejecting on failure.
//!
//! ## Key types
//!
//! - [`core::Engine`] — the lifecycle/queue state machine (§4.7).
//! - [`core::Reviews`] — human review task routing and SLA tracking (§4.9).
//! - [`core::Projections`] — store-backed assembly of the read models in
//!   [`projections`] (§4.10).
//! - [`core::IntakeController`] — accept/throttle/pause gating on repo
//!   health and verification debt (§4.13).
//! - [`core::SecurityScans`] — scanner orchestration and finding persistence
//!   (§4.15).
//!
//! ## Modules
//!
//! - [`types`] — shared domain vocabulary: `Intent`, `Event`, `EventType`,
//!   typed payloads, the ownership matcher.
//! - [`config`] — `Converge.toml` + `CONVERGE_*` env layering and the
//!   feature-flag registry.
//! - [`store`] — the `ConvergeStore` trait and its SQLite implementation.
//! - [`events`] — the append-only event log facade and tamper-evident
//!   audit chain.
//! - [`lock`] — the distributed table lock guarding queue drains.
//! - [`risk`] — entropy/containment/propagation risk scoring.
//! - [`policy`] — risk-profile-driven pass/warn/block evaluation.
//! - [`scm`] — the `ScmPort` trait and its git-backed implementation.
//! - [`semantic`] — canonical text, checksums, and embedding providers.
//! - [`auth`] — agent authorization and separation-of-duties checks.
//! - [`webhook`] — inbound GitHub delivery verification and outbound
//!   signed notifications.
//! - [`projections`] — pure read-model compute functions.
//! - [`security`] — scanner port, pattern scanner, and scan orchestration
//!   types.
//! - [`core`] — the orchestrating wiring layer: everything above composed
//!   into the lifecycle engine, reviews, intake, trends, and indexing.

pub use converge_auth as auth;
pub use converge_config as config;
pub use converge_core as core;
pub use converge_events as events;
pub use converge_lock as lock;
pub use converge_policy as policy;
pub use converge_projections as projections;
pub use converge_risk as risk;
pub use converge_scm as scm;
pub use converge_security as security;
pub use converge_semantic as semantic;
pub use converge_store as store;
pub use converge_types as types;
pub use converge_webhook as webhook;
