//! Synchronous lifecycle notification channel.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tracing::warn;
use vtp_protocol::LifecycleEvent;

/// Observer callback type.
pub type LifecycleListener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Identity of a registered listener, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

type Entry = (ListenerHandle, LifecycleListener);

/// Event bus
///
/// Listeners receive every event emitted after they were added, in
/// emission order, on the emitting thread. Nothing is buffered or replayed.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let handle = ListenerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().push((handle, Arc::new(listener)));
        handle
    }

    /// Returns whether the handle was registered.
    ///
    /// After this returns the listener is not started for any further
    /// event, including one whose delivery is already under way. A call
    /// that already started on another thread runs to completion.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != handle);
        listeners.len() < before
    }

    pub fn listener_count(&self) -> usize {
        self.read().len()
    }

    fn is_live(&self, handle: ListenerHandle) -> bool {
        self.read().iter().any(|(id, _)| *id == handle)
    }

    /// Delivers an event to every current listener.
    ///
    /// The listener set is snapshotted per event and the lock is released
    /// before any listener runs, so listeners may add or remove listeners.
    /// Listeners added during delivery see the next event. A panicking
    /// listener is logged and does not stop delivery.
    pub fn emit(&self, event: &LifecycleEvent) {
        let listeners: Vec<Entry> = self
            .read()
            .iter()
            .map(|(handle, listener)| (*handle, Arc::clone(listener)))
            .collect();

        for (handle, listener) in listeners {
            if !self.is_live(handle) {
                continue;
            }
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(
                    kind = %event.kind,
                    hook = %event.hook_name,
                    "Lifecycle listener panicked"
                );
            }
        }
    }
}
