//! Core types for the hook chain: inputs, outcomes, and results.

use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use vtp_protocol::ChainType;

/// Lowest admissible priority.
pub const MIN_PRIORITY: i64 = 0;
/// Highest admissible priority. Higher runs first.
pub const MAX_PRIORITY: i64 = 100;
/// Shortest admissible timeout budget, in milliseconds.
pub const MIN_TIMEOUT_MS: i64 = 1;
/// Longest admissible timeout budget, in milliseconds.
pub const MAX_TIMEOUT_MS: i64 = 30_000;
/// Budget applied when a definition does not set one.
pub const DEFAULT_TIMEOUT_MS: i64 = 5_000;

/// What a fire call is executed against.
///
/// All four values are opaque to the engine. `session_id` selects which
/// session-scoped hooks are merged into the chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionInput {
    pub context: serde_json::Value,
    pub constitution: serde_json::Value,
    pub event: serde_json::Value,
    pub session: serde_json::Value,
    pub session_id: Option<String>,
}

impl ExecutionInput {
    pub fn new(context: serde_json::Value, constitution: serde_json::Value) -> Self {
        Self {
            context,
            constitution,
            ..Default::default()
        }
    }

    pub fn with_event(mut self, event: impl Into<serde_json::Value>) -> Self {
        self.event = event.into();
        self
    }

    pub fn with_session(mut self, session: serde_json::Value) -> Self {
        self.session = session;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Scratch space shared by every hook of a single fire call.
///
/// A fresh, empty state is created for each call and dropped when the call
/// returns.
#[derive(Debug, Default)]
pub struct ChainState {
    entries: DashMap<String, serde_json::Value>,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Stores a value, returning the previous one.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered copy of the current entries.
    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// Audit metadata one handler attaches to its own entry in the result.
///
/// Created empty for each invocation. Whatever the handler wrote is kept
/// regardless of the outcome, including when the handler faults.
#[derive(Debug, Default)]
pub struct Annotations {
    entries: DashMap<String, serde_json::Value>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, serde_json::Value> {
        self.entries.into_iter().collect()
    }
}

/// The view of an [`ExecutionInput`] a single handler receives.
///
/// `context` and `constitution` reflect every `Modify` applied earlier in
/// the same walk.
#[derive(Debug, Clone, Copy)]
pub struct HookInput<'a> {
    pub chain_type: ChainType,
    pub context: &'a serde_json::Value,
    pub constitution: &'a serde_json::Value,
    pub event: &'a serde_json::Value,
    pub session: &'a serde_json::Value,
    pub chain_state: &'a ChainState,
    pub annotations: &'a Annotations,
}

impl HookInput<'_> {
    /// Attaches audit metadata to this hook's [`HookExecution`].
    pub fn annotate(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.annotations.insert(key, value);
    }
}

/// Result returned by a hook handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HookOutcome {
    /// No change, pass to the next hook.
    Continue,

    /// Replace the context and/or constitution for every later hook.
    Modify {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        constitution: Option<serde_json::Value>,
    },

    /// Stop the chain. Not an error.
    Abort { reason: String },
}

impl HookOutcome {
    pub fn modify_context(context: serde_json::Value) -> Self {
        HookOutcome::Modify {
            context: Some(context),
            constitution: None,
        }
    }

    pub fn modify_constitution(constitution: serde_json::Value) -> Self {
        HookOutcome::Modify {
            context: None,
            constitution: Some(constitution),
        }
    }

    pub fn modify(context: serde_json::Value, constitution: serde_json::Value) -> Self {
        HookOutcome::Modify {
            context: Some(context),
            constitution: Some(constitution),
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        HookOutcome::Abort {
            reason: reason.into(),
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, HookOutcome::Abort { .. })
    }
}

impl fmt::Display for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOutcome::Continue => write!(f, "continue"),
            HookOutcome::Modify { .. } => write!(f, "modify"),
            HookOutcome::Abort { reason } => write!(f, "abort: {reason}"),
        }
    }
}

/// One entry of [`ChainResult::per_hook_results`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookExecution {
    pub hook_name: String,
    pub outcome: HookOutcome,
    /// Wall-clock time spent in the handler, measured by the engine.
    pub duration_ms: u64,
    /// Set when the handler failed; the outcome is then `Continue`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    /// Metadata the handler attached through [`HookInput::annotate`].
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, serde_json::Value>,
}

/// Aggregate result of one fire call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainResult {
    pub chain_type: ChainType,
    /// False only when a handler aborted.
    pub completed: bool,
    /// Invoked hooks in execution order. Skipped hooks are omitted.
    pub per_hook_results: Vec<HookExecution>,
    pub aborted_by: Option<String>,
    pub abort_reason: Option<String>,
    pub final_context: serde_json::Value,
    pub final_constitution: serde_json::Value,
    /// More than the configured share of invoked hooks faulted.
    pub cascade_failure: bool,
}

impl ChainResult {
    /// Result of firing a chain with nothing to run.
    pub fn empty(chain_type: ChainType, input: ExecutionInput) -> Self {
        Self {
            chain_type,
            completed: true,
            per_hook_results: Vec::new(),
            aborted_by: None,
            abort_reason: None,
            final_context: input.context,
            final_constitution: input.constitution,
            cascade_failure: false,
        }
    }

    /// Names of the invoked hooks, in order.
    pub fn hook_names(&self) -> Vec<&str> {
        self.per_hook_results
            .iter()
            .map(|execution| execution.hook_name.as_str())
            .collect()
    }
}
