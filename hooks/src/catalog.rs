//! Catalog of named handlers that configuration files can refer to.

use crate::definition::HookHandler;
use crate::definition::handler_fn;
use crate::types::HookInput;
use crate::types::HookOutcome;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Handler catalog
///
/// The host fills a catalog with its native handlers before loading a
/// configuration; each `[[hooks]]` entry then binds one of them by id.
#[derive(Default, Clone)]
pub struct HandlerCatalog {
    handlers: BTreeMap<String, Arc<dyn HookHandler>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler, replacing any previous one with the same id.
    pub fn register(&mut self, id: impl Into<String>, handler: Arc<dyn HookHandler>) {
        self.handlers.insert(id.into(), handler);
    }

    /// Adds a synchronous function handler.
    ///
    /// # Example
    ///
    /// ```
    /// use vtp_hooks::HandlerCatalog;
    /// use vtp_hooks::HookOutcome;
    ///
    /// let mut catalog = HandlerCatalog::new();
    /// catalog.register_fn("deny-all", |_input| Ok(HookOutcome::abort("denied")));
    /// assert!(catalog.contains("deny-all"));
    /// ```
    pub fn register_fn<F>(&mut self, id: impl Into<String>, function: F)
    where
        F: Fn(&HookInput<'_>) -> anyhow::Result<HookOutcome> + Send + Sync + 'static,
    {
        self.register(id, handler_fn(function));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn HookHandler>> {
        self.handlers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn list(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCatalog")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
