//! Hook engine
//!
//! Owns the chain store and the event bus, and walks a chain for each fire
//! call. One engine is meant to be created per logical scope and shared by
//! reference (usually behind an `Arc`).

use crate::bus::EventBus;
use crate::bus::ListenerHandle;
use crate::definition::HandlerFault;
use crate::definition::HookDefinition;
use crate::definition::HookHandler;
use crate::store::ChainStore;
use crate::store::HookScope;
use crate::types::Annotations;
use crate::types::ChainResult;
use crate::types::ChainState;
use crate::types::ExecutionInput;
use crate::types::HookExecution;
use crate::types::HookInput;
use crate::types::HookOutcome;
use crate::validation::ValidationError;
use futures::FutureExt;
use parking_lot::ReentrantMutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;
use vtp_protocol::ChainEvent;
use vtp_protocol::ChainType;
use vtp_protocol::EngineSettings;
use vtp_protocol::LifecycleEvent;
use vtp_protocol::LifecycleEventKind;

const SKIP_DISABLED: &str = "disabled";
const SKIP_PREDICATE_FALSE: &str = "predicate_false";
const SKIP_PREDICATE_ERROR: &str = "predicate_error";

/// Registry, executor and event bus for the hook chains.
#[derive(Default)]
pub struct HookEngine {
    store: ChainStore,
    bus: EventBus,
    settings: EngineSettings,
    /// Held across a registry change and its lifecycle event so that
    /// events reach listeners in registry order. Never held by `fire`.
    registration: ReentrantMutex<()>,
}

impl HookEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            store: ChainStore::new(),
            bus: EventBus::new(),
            settings,
            registration: ReentrantMutex::new(()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Registers a deployment-scoped hook.
    ///
    /// Either the definition is admitted whole, or a [`ValidationError`] is
    /// returned and nothing changes.
    pub fn register(&self, definition: HookDefinition) -> Result<(), ValidationError> {
        self.register_in(definition, HookScope::Deployment)
    }

    /// Registers a hook that only runs for fire calls carrying `session_id`.
    pub fn register_for_session(
        &self,
        session_id: impl Into<String>,
        definition: HookDefinition,
    ) -> Result<(), ValidationError> {
        self.register_in(definition, HookScope::Session(session_id.into()))
    }

    fn register_in(
        &self,
        definition: HookDefinition,
        scope: HookScope,
    ) -> Result<(), ValidationError> {
        let _registration = self.registration.lock();
        let stored = self.store.insert(definition, scope.clone())?;
        info!(
            name = stored.name(),
            chain = %stored.chain_type(),
            priority = stored.priority(),
            %scope,
            "Registered hook"
        );
        self.emit(LifecycleEvent::now(
            LifecycleEventKind::Registered,
            stored.name(),
            stored.chain_type(),
        ));
        Ok(())
    }

    /// Removes a hook by name from any chain or scope.
    ///
    /// Returns `false` for an unknown name.
    pub fn unregister(&self, name: &str) -> bool {
        let _registration = self.registration.lock();
        match self.store.remove(name) {
            Some(removed) => {
                info!(name, chain = %removed.chain_type(), "Deregistered hook");
                self.emit(LifecycleEvent::now(
                    LifecycleEventKind::Deregistered,
                    removed.name(),
                    removed.chain_type(),
                ));
                true
            }
            None => false,
        }
    }

    /// Removes every hook registered for a session. Returns how many were removed.
    pub fn clear_session(&self, session_id: &str) -> usize {
        let _registration = self.registration.lock();
        let removed = self.store.clear_session(session_id);
        for hook in &removed {
            self.emit(LifecycleEvent::now(
                LifecycleEventKind::Deregistered,
                hook.name(),
                hook.chain_type(),
            ));
        }
        info!(session_id, count = removed.len(), "Cleared session hooks");
        removed.len()
    }

    /// Toggles a live hook. Returns `false` for an unknown name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.store.get(name) {
            Some(hook) => {
                hook.set_enabled(enabled);
                debug!(name, enabled, "Toggled hook");
                true
            }
            None => false,
        }
    }

    /// Ordered snapshot of the deployment chain for `chain_type`.
    pub fn get_chain(&self, chain_type: ChainType) -> Vec<Arc<HookDefinition>> {
        self.store.chain(chain_type)
    }

    /// Ordered snapshot of the chain a fire call for `session_id` would walk.
    pub fn get_session_chain(
        &self,
        chain_type: ChainType,
        session_id: &str,
    ) -> Vec<Arc<HookDefinition>> {
        self.store.session_chain(chain_type, session_id)
    }

    pub fn get(&self, name: &str) -> Option<Arc<HookDefinition>> {
        self.store.get(name)
    }

    /// Number of live hooks across every chain and scope.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Subscribes to lifecycle events.
    ///
    /// `registered` and `deregistered` events arrive in the order the
    /// registry changed, even when several threads register at once. A
    /// listener may itself register or unregister hooks; the nested events
    /// are delivered before the outer event reaches later listeners.
    pub fn add_event_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.bus.add_listener(listener)
    }

    pub fn remove_event_listener(&self, handle: ListenerHandle) -> bool {
        self.bus.remove_listener(handle)
    }

    fn emit(&self, event: LifecycleEvent) {
        self.bus.emit(&event);
    }

    /// Executes the chain for `chain_type` against `input`.
    ///
    /// Handlers run one at a time in chain order, each seeing the context
    /// and constitution left by the previous `Modify`. An `Abort` stops the
    /// walk. Handler faults (errors, panics, timeouts) are recorded as
    /// `Continue` and never escape this call.
    pub async fn fire(&self, chain_type: ChainType, input: ExecutionInput) -> ChainResult {
        let chain = match input.session_id.as_deref() {
            Some(session_id) => self.store.session_chain(chain_type, session_id),
            None => self.store.chain(chain_type),
        };

        if chain.is_empty() {
            return ChainResult::empty(chain_type, input);
        }

        let ExecutionInput {
            mut context,
            mut constitution,
            event,
            session,
            ..
        } = input;
        let chain_state = ChainState::new();
        let mut per_hook_results = Vec::new();
        let mut faults = 0usize;

        for hook in &chain {
            if !hook.is_enabled() {
                self.skip(hook, SKIP_DISABLED);
                continue;
            }

            let annotations = Annotations::new();
            let hook_input = HookInput {
                chain_type,
                context: &context,
                constitution: &constitution,
                event: &event,
                session: &session,
                chain_state: &chain_state,
                annotations: &annotations,
            };

            if let Some(condition) = hook.condition() {
                match std::panic::catch_unwind(AssertUnwindSafe(|| condition(&hook_input))) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.skip(hook, SKIP_PREDICATE_FALSE);
                        continue;
                    }
                    Err(_) => {
                        warn!(hook = hook.name(), "Hook condition panicked, skipping");
                        self.skip(hook, SKIP_PREDICATE_ERROR);
                        continue;
                    }
                }
            }

            self.emit(LifecycleEvent::now(LifecycleEventKind::Fired, hook.name(), chain_type));
            debug!(hook = hook.name(), chain = %chain_type, "Firing hook");

            let start = Instant::now();
            let result = self.invoke(hook, &hook_input).await;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (outcome, fault) = match result {
                Ok(outcome) => {
                    debug!(hook = hook.name(), %outcome, duration_ms, "Hook completed");
                    self.emit(LifecycleEvent::now(
                        LifecycleEventKind::Completed,
                        hook.name(),
                        chain_type,
                    ));
                    (outcome, None)
                }
                Err(fault) => {
                    faults += 1;
                    warn!(
                        hook = hook.name(),
                        duration_ms,
                        "Hook fault, continuing: {fault}"
                    );
                    let message = fault.to_string();
                    self.emit(
                        LifecycleEvent::now(LifecycleEventKind::Error, hook.name(), chain_type)
                            .with_details(message.clone()),
                    );
                    (HookOutcome::Continue, Some(message))
                }
            };

            per_hook_results.push(HookExecution {
                hook_name: hook.name().to_string(),
                outcome: outcome.clone(),
                duration_ms,
                fault,
                annotations: annotations.into_map(),
            });

            match outcome {
                HookOutcome::Continue => {}
                HookOutcome::Modify {
                    context: new_context,
                    constitution: new_constitution,
                } => {
                    if let Some(new_context) = new_context {
                        context = new_context;
                    }
                    if let Some(new_constitution) = new_constitution {
                        constitution = new_constitution;
                    }
                }
                HookOutcome::Abort { reason } => {
                    info!(hook = hook.name(), chain = %chain_type, "Chain aborted: {reason}");
                    return ChainResult {
                        chain_type,
                        completed: false,
                        per_hook_results,
                        aborted_by: Some(hook.name().to_string()),
                        abort_reason: Some(reason),
                        final_context: context,
                        final_constitution: constitution,
                        cascade_failure: false,
                    };
                }
            }
        }

        let invoked = per_hook_results.len();
        let cascade_failure = invoked > 0
            && (faults as f64 / invoked as f64) > self.settings.cascade_failure_threshold;
        if cascade_failure {
            warn!(chain = %chain_type, invoked, faults, "Cascading hook failure");
        }

        ChainResult {
            chain_type,
            completed: true,
            per_hook_results,
            aborted_by: None,
            abort_reason: None,
            final_context: context,
            final_constitution: constitution,
            cascade_failure,
        }
    }

    /// Fires the chain matching a typed payload.
    pub async fn fire_event(&self, event: ChainEvent, input: ExecutionInput) -> ChainResult {
        let chain_type = event.chain_type();
        self.fire(chain_type, input.with_event(event)).await
    }

    fn skip(&self, hook: &HookDefinition, reason: &str) {
        debug!(hook = hook.name(), reason, "Skipping hook");
        self.emit(
            LifecycleEvent::now(LifecycleEventKind::Skipped, hook.name(), hook.chain_type())
                .with_details(reason),
        );
    }

    /// Runs one handler, folding errors, panics and timeouts into a fault.
    async fn invoke(
        &self,
        hook: &HookDefinition,
        input: &HookInput<'_>,
    ) -> Result<HookOutcome, HandlerFault> {
        let call = AssertUnwindSafe(hook.handler().handle(input)).catch_unwind();

        let result = if self.settings.enforce_timeouts {
            let budget_ms = u64::try_from(hook.timeout_budget_ms()).unwrap_or_default();
            match tokio::time::timeout(Duration::from_millis(budget_ms), call).await {
                Ok(result) => result,
                Err(_elapsed) => return Err(HandlerFault::TimedOut { budget_ms }),
            }
        } else {
            call.await
        };

        match result {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => Err(HandlerFault::Failed(err)),
            Err(panic) => Err(HandlerFault::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn continue_hook(name: &str, priority: i64) -> HookDefinition {
        HookDefinition::from_fn(name, ChainType::PreInject, priority, |_| {
            Ok(HookOutcome::Continue)
        })
    }

    fn slow_hook(name: &str, delay: Duration) -> HookDefinition {
        HookDefinition::new(name, ChainType::OnViolation, 90, Arc::new(SlowHandler { delay }))
    }

    fn input() -> ExecutionInput {
        ExecutionInput::new(json!({"company": []}), json!({"rules": ["base"]}))
    }

    type Recorded = Arc<Mutex<Vec<(LifecycleEventKind, String, Option<String>)>>>;

    fn record_events(engine: &HookEngine) -> Recorded {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        engine.add_event_listener(move |event| {
            let entry = (event.kind, event.hook_name.clone(), event.details.clone());
            sink.lock().unwrap().push(entry);
        });
        events
    }

    struct SlowHandler {
        delay: Duration,
    }

    #[async_trait]
    impl HookHandler for SlowHandler {
        async fn handle(&self, _input: &HookInput<'_>) -> anyhow::Result<HookOutcome> {
            tokio::time::sleep(self.delay).await;
            Ok(HookOutcome::abort("should have timed out"))
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl HookHandler for PanickingHandler {
        async fn handle(&self, _input: &HookInput<'_>) -> anyhow::Result<HookOutcome> {
            panic!("handler bug");
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_noop_success() {
        let engine = HookEngine::new();
        let events = record_events(&engine);

        let result = engine.fire(ChainType::OnConflict, input()).await;

        assert!(result.completed);
        assert!(result.per_hook_results.is_empty());
        assert_eq!(result.aborted_by, None);
        assert_eq!(result.final_context, json!({"company": []}));
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_sequence_for_mixed_chain() {
        let engine = HookEngine::new();
        engine.register(continue_hook("first", 90)).unwrap();
        engine
            .register(continue_hook("disabled", 80).with_enabled(false))
            .unwrap();
        engine
            .register(HookDefinition::from_fn("failing", ChainType::PreInject, 70, |_| {
                anyhow::bail!("no scores")
            }))
            .unwrap();
        engine
            .register(HookDefinition::from_fn("stop", ChainType::PreInject, 60, |_| {
                Ok(HookOutcome::abort("out of scope"))
            }))
            .unwrap();
        engine.register(continue_hook("never", 50)).unwrap();
        let events = record_events(&engine);

        let result = engine.fire(ChainType::PreInject, input()).await;

        assert!(!result.completed);
        assert_eq!(result.aborted_by.as_deref(), Some("stop"));
        assert_eq!(result.abort_reason.as_deref(), Some("out of scope"));
        assert_eq!(result.hook_names(), vec!["first", "failing", "stop"]);

        let seen = events.lock().unwrap().clone();
        let expected = vec![
            (LifecycleEventKind::Fired, "first".to_string(), None),
            (LifecycleEventKind::Completed, "first".to_string(), None),
            (
                LifecycleEventKind::Skipped,
                "disabled".to_string(),
                Some("disabled".to_string()),
            ),
            (LifecycleEventKind::Fired, "failing".to_string(), None),
            (
                LifecycleEventKind::Error,
                "failing".to_string(),
                Some("handler failed: no scores".to_string()),
            ),
            (LifecycleEventKind::Fired, "stop".to_string(), None),
            (LifecycleEventKind::Completed, "stop".to_string(), None),
        ];
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_failing_handler_recorded_as_continue() {
        let engine = HookEngine::new();
        engine
            .register(HookDefinition::from_fn("failing", ChainType::PreInject, 90, |_| {
                Err(anyhow::anyhow!("boom"))
            }))
            .unwrap();
        engine.register(continue_hook("after", 10)).unwrap();

        let result = engine.fire(ChainType::PreInject, input()).await;

        assert!(result.completed);
        assert_eq!(result.hook_names(), vec!["failing", "after"]);
        assert_eq!(result.per_hook_results[0].outcome, HookOutcome::Continue);
        assert_eq!(
            result.per_hook_results[0].fault.as_deref(),
            Some("handler failed: boom")
        );
        assert_eq!(result.per_hook_results[1].fault, None);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let engine = HookEngine::new();
        engine
            .register(HookDefinition::new(
                "panics",
                ChainType::PostSelect,
                90,
                Arc::new(PanickingHandler),
            ))
            .unwrap();
        engine
            .register(HookDefinition::from_fn("after", ChainType::PostSelect, 10, |_| {
                Ok(HookOutcome::modify_context(json!("after ran")))
            }))
            .unwrap();
        let events = record_events(&engine);

        let result = engine.fire(ChainType::PostSelect, input()).await;

        assert!(result.completed);
        assert_eq!(result.final_context, json!("after ran"));
        assert_eq!(result.per_hook_results[0].outcome, HookOutcome::Continue);
        assert_eq!(
            result.per_hook_results[0].fault.as_deref(),
            Some("handler panicked: handler bug")
        );
        let errors: Vec<Option<String>> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, name, _)| *kind == LifecycleEventKind::Error && name == "panics")
            .map(|(_, _, details)| details.clone())
            .collect();
        assert_eq!(
            errors,
            vec![Some("handler panicked: handler bug".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_treated_as_continue() {
        let engine = HookEngine::new();
        engine
            .register(slow_hook("slow", Duration::from_secs(60)).with_timeout_ms(50))
            .unwrap();
        engine
            .register(HookDefinition::from_fn("after", ChainType::OnViolation, 10, |_| {
                Ok(HookOutcome::Continue)
            }))
            .unwrap();

        let result = engine.fire(ChainType::OnViolation, input()).await;

        assert!(result.completed);
        assert_eq!(result.hook_names(), vec!["slow", "after"]);
        assert_eq!(result.per_hook_results[0].outcome, HookOutcome::Continue);
        assert_eq!(
            result.per_hook_results[0].fault.as_deref(),
            Some("timed out after 50 ms")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_hook_records_its_budget_as_duration() {
        let engine = HookEngine::new();
        engine
            .register(slow_hook("slow", Duration::from_secs(60)).with_timeout_ms(50))
            .unwrap();

        let result = engine.fire(ChainType::OnViolation, input()).await;

        let slow = &result.per_hook_results[0];
        assert!(slow.fault.is_some());
        assert!(slow.duration_ms >= 50, "{}", slow.duration_ms);
        assert!(slow.duration_ms < 60_000, "{}", slow.duration_ms);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_only_mode_lets_slow_handler_finish() {
        let engine = HookEngine::with_settings(EngineSettings {
            enforce_timeouts: false,
            ..Default::default()
        });
        engine
            .register(slow_hook("slow", Duration::from_millis(200)).with_timeout_ms(1))
            .unwrap();

        let result = engine.fire(ChainType::OnViolation, input()).await;

        assert!(!result.completed);
        assert_eq!(result.aborted_by.as_deref(), Some("slow"));
        assert_eq!(result.per_hook_results[0].fault, None);
        assert!(result.per_hook_results[0].duration_ms >= 200);
    }

    #[tokio::test]
    async fn test_annotations_reach_results_for_every_outcome() {
        let engine = HookEngine::new();
        engine
            .register(HookDefinition::from_fn("tag", ChainType::PreInject, 90, |input| {
                input.annotate("tier", "constitutional");
                Ok(HookOutcome::Continue)
            }))
            .unwrap();
        engine
            .register(HookDefinition::from_fn("faulty", ChainType::PreInject, 80, |input| {
                input.annotate("attempted", true);
                anyhow::bail!("scorer offline")
            }))
            .unwrap();
        engine.register(continue_hook("quiet", 70)).unwrap();
        engine
            .register(HookDefinition::from_fn("gate", ChainType::PreInject, 60, |input| {
                input.annotate("matched_rule", "scope");
                input.annotate("confidence", 0.9);
                Ok(HookOutcome::abort("out of scope"))
            }))
            .unwrap();

        let result = engine.fire(ChainType::PreInject, input()).await;
        let annotations: Vec<&BTreeMap<String, serde_json::Value>> = result
            .per_hook_results
            .iter()
            .map(|execution| &execution.annotations)
            .collect();

        assert_eq!(result.hook_names(), vec!["tag", "faulty", "quiet", "gate"]);
        assert_eq!(
            annotations[0],
            &BTreeMap::from([("tier".to_string(), json!("constitutional"))])
        );
        assert_eq!(
            annotations[1],
            &BTreeMap::from([("attempted".to_string(), json!(true))])
        );
        assert!(annotations[2].is_empty());
        assert_eq!(
            annotations[3],
            &BTreeMap::from([
                ("confidence".to_string(), json!(0.9)),
                ("matched_rule".to_string(), json!("scope")),
            ])
        );
    }

    #[tokio::test]
    async fn test_condition_skips_hook() {
        let engine = HookEngine::new();
        let only_sessions = continue_hook("only-sessions", 90)
            .with_condition(|input| input.session.get("environment").is_some());
        let broken =
            continue_hook("broken-condition", 80).with_condition(|_| panic!("bad predicate"));
        engine.register(only_sessions).unwrap();
        engine.register(broken).unwrap();
        engine.register(continue_hook("plain", 70)).unwrap();
        let events = record_events(&engine);

        let result = engine.fire(ChainType::PreInject, input()).await;
        assert_eq!(result.hook_names(), vec!["plain"]);

        let skipped: Vec<(String, String)> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, _, _)| *kind == LifecycleEventKind::Skipped)
            .map(|(_, name, details)| (name.clone(), details.clone().unwrap_or_default()))
            .collect();
        assert_eq!(
            skipped,
            vec![
                ("only-sessions".to_string(), "predicate_false".to_string()),
                ("broken-condition".to_string(), "predicate_error".to_string()),
            ]
        );

        let result = engine
            .fire(
                ChainType::PreInject,
                input().with_session(json!({"environment": "prod"})),
            )
            .await;
        assert_eq!(result.hook_names(), vec!["only-sessions", "plain"]);
    }

    #[tokio::test]
    async fn test_cascade_failure_detected() {
        let engine = HookEngine::new();
        for (name, priority) in [("a", 90), ("b", 80)] {
            engine
                .register(HookDefinition::from_fn(name, ChainType::Periodic, priority, |_| {
                    anyhow::bail!("down")
                }))
                .unwrap();
        }
        engine
            .register(HookDefinition::from_fn("c", ChainType::Periodic, 70, |_| {
                Ok(HookOutcome::Continue)
            }))
            .unwrap();

        let result = engine.fire(ChainType::Periodic, input()).await;
        assert!(result.completed);
        assert!(result.cascade_failure);

        engine.unregister("a");
        let result = engine.fire(ChainType::Periodic, input()).await;
        // One fault out of two is not more than half.
        assert!(!result.cascade_failure);
    }

    #[tokio::test]
    async fn test_set_enabled_toggles_live_hook() {
        let engine = HookEngine::new();
        engine.register(continue_hook("toggle", 50)).unwrap();

        assert!(engine.set_enabled("toggle", false));
        assert!(!engine.set_enabled("missing", false));
        assert!(!engine.get_chain(ChainType::PreInject)[0].is_enabled());
        let result = engine.fire(ChainType::PreInject, input()).await;
        assert!(result.per_hook_results.is_empty());

        engine.set_enabled("toggle", true);
        let result = engine.fire(ChainType::PreInject, input()).await;
        assert_eq!(result.hook_names(), vec!["toggle"]);
    }

    #[tokio::test]
    async fn test_session_hooks_only_fire_for_their_session() {
        let engine = HookEngine::new();
        engine.register(continue_hook("deployment", 50)).unwrap();
        engine
            .register_for_session("s1", continue_hook("session-high", 90))
            .unwrap();
        engine
            .register_for_session("s1", continue_hook("session-tie", 50))
            .unwrap();

        let result = engine.fire(ChainType::PreInject, input()).await;
        assert_eq!(result.hook_names(), vec!["deployment"]);

        let result = engine
            .fire(ChainType::PreInject, input().with_session_id("s1"))
            .await;
        assert_eq!(
            result.hook_names(),
            vec!["session-high", "deployment", "session-tie"]
        );

        assert_eq!(engine.len(), 3);
        assert_eq!(engine.clear_session("s1"), 2);
        assert_eq!(engine.len(), 1);
        let result = engine
            .fire(ChainType::PreInject, input().with_session_id("s1"))
            .await;
        assert_eq!(result.hook_names(), vec!["deployment"]);
    }

    #[test]
    fn test_registration_events_follow_registry_order_across_threads() {
        const ROUNDS: usize = 500;
        let engine = Arc::new(HookEngine::new());
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&kinds);
        engine.add_event_listener(move |event| sink.lock().unwrap().push(event.kind));

        let remover = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let mut removed = 0;
                while removed < ROUNDS {
                    if engine.unregister("contended") {
                        removed += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        };
        for _ in 0..ROUNDS {
            while engine.register(continue_hook("contended", 50)).is_err() {
                std::thread::yield_now();
            }
        }
        remover.join().unwrap();

        let kinds = kinds.lock().unwrap();
        assert_eq!(kinds.len(), 2 * ROUNDS);
        let registered = LifecycleEventKind::Registered;
        let deregistered = LifecycleEventKind::Deregistered;
        for pair in kinds.chunks(2) {
            assert_eq!(pair, [registered, deregistered]);
        }
    }

    #[test]
    fn test_listener_may_register_from_registration_event() {
        let engine = Arc::new(HookEngine::new());
        let weak = Arc::downgrade(&engine);
        engine.add_event_listener(move |event| {
            if event.kind != LifecycleEventKind::Registered || event.hook_name != "primary" {
                return;
            }
            if let Some(engine) = weak.upgrade() {
                engine.register(continue_hook("companion", 10)).unwrap();
            }
        });

        engine.register(continue_hook("primary", 50)).unwrap();

        assert!(engine.get("companion").is_some());
        assert_eq!(engine.len(), 2);
    }

    #[tokio::test]
    async fn test_fire_event_routes_to_payload_chain() {
        let engine = HookEngine::new();
        engine
            .register(HookDefinition::from_fn("escalate", ChainType::OnTransition, 50, |input| {
                if input.event["new_state"] == "emergency" {
                    input.chain_state.insert("adherence_escalated", true);
                    Ok(HookOutcome::modify_context(json!({"adherence": "strict"})))
                } else {
                    Ok(HookOutcome::Continue)
                }
            }))
            .unwrap();

        let event = ChainEvent::OnTransition(vtp_protocol::events::TransitionEvent {
            previous_state: "calm".to_string(),
            new_state: "emergency".to_string(),
            ..Default::default()
        });
        let result = engine.fire_event(event, input()).await;

        assert_eq!(result.chain_type, ChainType::OnTransition);
        assert_eq!(result.final_context, json!({"adherence": "strict"}));
    }
}
