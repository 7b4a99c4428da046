//! Typed event payload constructors.
//!
//! Mirrors the reference's `event_payloads.py`: a typed payload is worth the
//! ceremony for the high-volume, structurally-stable event families; rarer or
//! free-form events just carry a `serde_json::Value` map. Every typed payload
//! implements `to_json` for storage as the event's opaque `payload` blob.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn to_json<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).expect("payload types are always serializable")
}

/// `simulation.completed` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationPayload {
    pub mergeable: bool,
    pub conflicts: Vec<String>,
    pub files_changed: Vec<String>,
    pub source: String,
    pub target: String,
}

impl SimulationPayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}

/// `check.completed` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckPayload {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckPayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}

/// A single gate outcome inside a `PolicyEvaluation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatePayload {
    pub gate: String,
    pub passed: bool,
    pub reason: String,
    pub value: f64,
    pub threshold: f64,
}

impl GatePayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}

/// `policy.evaluated` / `risk.shadow_evaluated` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyPayload {
    pub verdict: String,
    pub gates: Vec<GatePayload>,
    pub mode: String,
}

impl PolicyPayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}

/// `intent.dependency_blocked` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPayload {
    pub unmet: Vec<String>,
}

impl BlockPayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}

/// `intent.merged` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePayload {
    pub merged_commit: String,
}

impl MergePayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}

/// `intent.requeued` payload, also carried on the final `intent.rejected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeFailedPayload {
    pub error: String,
    pub retries: u32,
}

impl MergeFailedPayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}

/// `intent.rejected` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectPayload {
    pub reason: String,
    pub retries: u32,
}

impl RejectPayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}

/// `intent.created` / `intent.updated` payload from webhook intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakePayload {
    pub source: String,
    pub target: String,
    pub origin_type: String,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl IntakePayload {
    pub fn to_value(&self) -> Value {
        to_json(self)
    }
}
