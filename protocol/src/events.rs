//! Typed event payloads, one per chain type.
//!
//! The engine treats `event` as an opaque JSON value. Producers that know
//! which chain they are firing can build one of these payloads instead of
//! hand-assembling JSON.

use crate::chain::ChainType;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Payload for `pre_inject` chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreInjectEvent {
    pub injection_target: String,
    pub injection_format: String,
    pub raw_constitution: String,
}

/// Payload for `post_select` chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSelectEvent {
    pub candidates: Vec<serde_json::Value>,
    pub selection_rationale: String,
    pub selection_algorithm: String,
    pub scores: BTreeMap<String, f64>,
}

/// Payload for `on_transition` chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionEvent {
    pub previous_state: String,
    pub new_state: String,
    pub trigger: String,
    pub transition_metadata: BTreeMap<String, serde_json::Value>,
}

/// Payload for `on_conflict` chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictEvent {
    pub conflicting_rules: Vec<serde_json::Value>,
    pub composition_strategy: String,
    pub conflict_severity: String,
}

/// Payload for `on_violation` chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationEvent {
    pub output: String,
    pub violated_rules: Vec<serde_json::Value>,
    pub severity: String,
    pub violation_evidence: String,
    pub retry_count: u32,
}

/// Payload for `periodic` chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicEvent {
    pub elapsed_ms: u64,
    pub interval_ms: u64,
    pub tick_count: u64,
}

/// A payload tagged with the chain it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chain", rename_all = "snake_case")]
pub enum ChainEvent {
    PreInject(PreInjectEvent),
    PostSelect(PostSelectEvent),
    OnTransition(TransitionEvent),
    OnConflict(ConflictEvent),
    OnViolation(ViolationEvent),
    Periodic(PeriodicEvent),
}

impl ChainEvent {
    /// Returns the [`ChainType`] this payload is fired on.
    pub fn chain_type(&self) -> ChainType {
        match self {
            ChainEvent::PreInject(_) => ChainType::PreInject,
            ChainEvent::PostSelect(_) => ChainType::PostSelect,
            ChainEvent::OnTransition(_) => ChainType::OnTransition,
            ChainEvent::OnConflict(_) => ChainType::OnConflict,
            ChainEvent::OnViolation(_) => ChainType::OnViolation,
            ChainEvent::Periodic(_) => ChainType::Periodic,
        }
    }
}

impl From<ChainEvent> for serde_json::Value {
    fn from(event: ChainEvent) -> Self {
        // Payload fields are strings, numbers and JSON values, so this
        // cannot fail in practice.
        serde_json::to_value(event).unwrap_or_default()
    }
}
