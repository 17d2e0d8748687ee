//! Lifecycle notifications emitted by the hook chain engine.

use crate::chain::ChainType;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

/// Kind of lifecycle transition a hook went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LifecycleEventKind {
    /// The hook was admitted into the registry.
    Registered,
    /// The hook's handler is about to be invoked.
    Fired,
    /// The handler returned an outcome (including `Abort`).
    Completed,
    /// The hook was passed over without invoking its handler.
    Skipped,
    /// The handler failed, panicked, or timed out.
    Error,
    /// The hook was removed from the registry.
    Deregistered,
}

/// A single lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    pub hook_name: String,
    pub chain_type: ChainType,
    pub timestamp: DateTime<Utc>,
    /// Skip reason or error text, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LifecycleEvent {
    /// Builds an event stamped with the current time.
    pub fn now(
        kind: LifecycleEventKind,
        hook_name: impl Into<String>,
        chain_type: ChainType,
    ) -> Self {
        Self {
            kind,
            hook_name: hook_name.into(),
            chain_type,
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
