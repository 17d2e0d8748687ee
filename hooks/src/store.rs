//! Per-chain ordered storage of hook definitions.

use crate::definition::HookDefinition;
use crate::validation::ValidationError;
use crate::validation::validate_definition;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use vtp_protocol::ChainType;

type Chain = Vec<Arc<HookDefinition>>;

/// Where a definition lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookScope {
    /// Applies to every fire call.
    Deployment,
    /// Applies only to fire calls carrying this session id.
    Session(String),
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookScope::Deployment => write!(f, "deployment"),
            HookScope::Session(id) => write!(f, "session:{id}"),
        }
    }
}

#[derive(Default)]
struct StoreInner {
    deployment: HashMap<ChainType, Chain>,
    sessions: HashMap<String, HashMap<ChainType, Chain>>,
    names: HashSet<String>,
}

/// Chain store
///
/// Each chain is kept sorted by descending priority. The sort is stable, so
/// among equal priorities the earlier registration stays first. Names are
/// unique across every chain and scope.
#[derive(Default)]
pub struct ChainStore {
    inner: RwLock<StoreInner>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates and stores a definition.
    ///
    /// On error the store is left untouched.
    pub fn insert(
        &self,
        definition: HookDefinition,
        scope: HookScope,
    ) -> Result<Arc<HookDefinition>, ValidationError> {
        validate_definition(&definition)?;

        let mut inner = self.write();
        if inner.names.contains(definition.name()) {
            return Err(ValidationError::DuplicateName(definition.name().to_string()));
        }

        let definition = Arc::new(definition);
        inner.names.insert(definition.name().to_string());
        let chain = match scope {
            HookScope::Deployment => inner
                .deployment
                .entry(definition.chain_type())
                .or_default(),
            HookScope::Session(session_id) => inner
                .sessions
                .entry(session_id)
                .or_default()
                .entry(definition.chain_type())
                .or_default(),
        };
        chain.push(Arc::clone(&definition));
        chain.sort_by_key(|hook| Reverse(hook.priority()));

        Ok(definition)
    }

    /// Removes a definition from whichever chain holds it.
    pub fn remove(&self, name: &str) -> Option<Arc<HookDefinition>> {
        let mut inner = self.write();
        if !inner.names.remove(name) {
            return None;
        }

        let StoreInner {
            deployment,
            sessions,
            ..
        } = &mut *inner;
        let removed = std::iter::once(deployment)
            .chain(sessions.values_mut())
            .find_map(|chains| remove_from(chains, name));
        sessions.retain(|_, chains| chains.values().any(|chain| !chain.is_empty()));
        removed
    }

    /// Removes every hook registered for a session.
    pub fn clear_session(&self, session_id: &str) -> Vec<Arc<HookDefinition>> {
        let mut inner = self.write();
        let Some(chains) = inner.sessions.remove(session_id) else {
            return Vec::new();
        };
        let removed: Vec<Arc<HookDefinition>> = chains.into_values().flatten().collect();
        for hook in &removed {
            inner.names.remove(hook.name());
        }
        removed
    }

    /// Ordered snapshot of the deployment chain.
    pub fn chain(&self, chain_type: ChainType) -> Vec<Arc<HookDefinition>> {
        self.read()
            .deployment
            .get(&chain_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Deployment and session hooks merged by priority.
    ///
    /// At equal priority deployment hooks come first.
    pub fn session_chain(
        &self,
        chain_type: ChainType,
        session_id: &str,
    ) -> Vec<Arc<HookDefinition>> {
        let inner = self.read();
        let deployment = inner
            .deployment
            .get(&chain_type)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let session = inner
            .sessions
            .get(session_id)
            .and_then(|chains| chains.get(&chain_type))
            .map(Vec::as_slice)
            .unwrap_or_default();
        merge_by_priority(deployment, session)
    }

    pub fn get(&self, name: &str) -> Option<Arc<HookDefinition>> {
        let inner = self.read();
        if !inner.names.contains(name) {
            return None;
        }
        inner
            .deployment
            .values()
            .chain(inner.sessions.values().flat_map(HashMap::values))
            .flatten()
            .find(|hook| hook.name() == name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().names.contains(name)
    }

    /// Total number of live definitions across every scope.
    pub fn len(&self) -> usize {
        self.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn remove_from(chains: &mut HashMap<ChainType, Chain>, name: &str) -> Option<Arc<HookDefinition>> {
    chains.values_mut().find_map(|chain| {
        let index = chain.iter().position(|hook| hook.name() == name)?;
        Some(chain.remove(index))
    })
}

/// Merges two chains that are each sorted by descending priority.
fn merge_by_priority(deployment: &[Arc<HookDefinition>], session: &[Arc<HookDefinition>]) -> Chain {
    let mut merged = Vec::with_capacity(deployment.len() + session.len());
    let (mut d, mut s) = (0, 0);
    while d < deployment.len() && s < session.len() {
        if deployment[d].priority() >= session[s].priority() {
            merged.push(Arc::clone(&deployment[d]));
            d += 1;
        } else {
            merged.push(Arc::clone(&session[s]));
            s += 1;
        }
    }
    merged.extend(deployment[d..].iter().cloned());
    merged.extend(session[s..].iter().cloned());
    merged
}
