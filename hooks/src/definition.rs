//! Hook definitions and the handler contract.

use crate::types::DEFAULT_TIMEOUT_MS;
use crate::types::HookInput;
use crate::types::HookOutcome;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use vtp_protocol::ChainType;

/// Hook handler trait
///
/// The engine awaits each handler to completion before moving on, so a
/// handler may rely on the context produced by every earlier hook in the
/// chain. Returning `Err` is a handler fault: the engine records it as
/// `Continue` and reports it through an `error` lifecycle event.
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn handle(&self, input: &HookInput<'_>) -> anyhow::Result<HookOutcome>;
}

/// Synchronous handler function type.
pub type HookHandlerFn = Arc<dyn Fn(&HookInput<'_>) -> anyhow::Result<HookOutcome> + Send + Sync>;

/// Predicate deciding whether a hook applies to a given input.
pub type HookCondition = Arc<dyn Fn(&HookInput<'_>) -> bool + Send + Sync>;

/// Handler that calls a plain Rust function.
///
/// The function runs on the calling task, so a timeout budget cannot
/// interrupt it; its duration is still measured.
#[derive(Clone)]
pub struct NativeHandler {
    function: HookHandlerFn,
}

impl NativeHandler {
    pub fn new(function: HookHandlerFn) -> Self {
        Self { function }
    }
}

impl fmt::Debug for NativeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl HookHandler for NativeHandler {
    async fn handle(&self, input: &HookInput<'_>) -> anyhow::Result<HookOutcome> {
        (self.function)(input)
    }
}

/// Wraps a closure as a shareable handler.
pub fn handler_fn<F>(function: F) -> Arc<dyn HookHandler>
where
    F: Fn(&HookInput<'_>) -> anyhow::Result<HookOutcome> + Send + Sync + 'static,
{
    Arc::new(NativeHandler::new(Arc::new(function)))
}

/// A registered interception handler.
///
/// Immutable once registered, except for the enabled flag.
pub struct HookDefinition {
    name: String,
    chain_type: ChainType,
    priority: i64,
    timeout_budget_ms: i64,
    enabled: AtomicBool,
    handler: Arc<dyn HookHandler>,
    condition: Option<HookCondition>,
    description: String,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl HookDefinition {
    pub fn new(
        name: impl Into<String>,
        chain_type: ChainType,
        priority: i64,
        handler: Arc<dyn HookHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            chain_type,
            priority,
            timeout_budget_ms: DEFAULT_TIMEOUT_MS,
            enabled: AtomicBool::new(true),
            handler,
            condition: None,
            description: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Shorthand for a definition backed by [`handler_fn`].
    pub fn from_fn<F>(
        name: impl Into<String>,
        chain_type: ChainType,
        priority: i64,
        function: F,
    ) -> Self
    where
        F: Fn(&HookInput<'_>) -> anyhow::Result<HookOutcome> + Send + Sync + 'static,
    {
        Self::new(name, chain_type, priority, handler_fn(function))
    }

    pub fn with_timeout_ms(mut self, timeout_budget_ms: i64) -> Self {
        self.timeout_budget_ms = timeout_budget_ms;
        self
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.enabled.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&HookInput<'_>) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_type(&self) -> ChainType {
        self.chain_type
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn timeout_budget_ms(&self) -> i64 {
        self.timeout_budget_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn handler(&self) -> &Arc<dyn HookHandler> {
        &self.handler
    }

    pub fn condition(&self) -> Option<&HookCondition> {
        self.condition.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }
}

impl fmt::Debug for HookDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDefinition")
            .field("name", &self.name)
            .field("chain_type", &self.chain_type)
            .field("priority", &self.priority)
            .field("timeout_budget_ms", &self.timeout_budget_ms)
            .field("enabled", &self.is_enabled())
            .field("has_condition", &self.condition.is_some())
            .finish_non_exhaustive()
    }
}

/// Why a handler invocation produced no outcome.
#[derive(Debug, thiserror::Error)]
pub enum HandlerFault {
    #[error("handler failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("timed out after {budget_ms} ms")]
    TimedOut { budget_ms: u64 },
}
