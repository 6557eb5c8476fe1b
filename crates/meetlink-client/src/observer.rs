//! Observer registry shared by the signaling client and ping/pong

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

use crate::event::SignalingClientEvent;

/// Receives every event the signaling client publishes.
///
/// Called synchronously from the transport's event context. Implementations
/// may call back into the client.
pub trait SignalingClientObserver: Send + Sync {
    fn handle_signaling_client_event(&self, event: &SignalingClientEvent);
}

impl<F> SignalingClientObserver for F
where
    F: Fn(&SignalingClientEvent) + Send + Sync,
{
    fn handle_signaling_client_event(&self, event: &SignalingClientEvent) {
        self(event)
    }
}

/// Identity of an observer, ignoring the vtable half of the fat pointer
fn same_observer<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Set of observers keyed by `Arc` identity
pub(crate) struct ObserverSet<T: ?Sized> {
    observers: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> ObserverSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Returns false if already registered
    pub(crate) fn add(&self, observer: Arc<T>) -> bool {
        let mut observers = self.observers.lock();
        if observers.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    pub(crate) fn remove(&self, observer: &Arc<T>) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| !same_observer(o, observer));
        observers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.lock().len()
    }

    /// Call `f` on a snapshot of the set. The lock is released first so
    /// observers can register and remove while being notified. A panicking
    /// observer is logged and skipped.
    pub(crate) fn for_each(&self, what: &str, f: impl Fn(&T)) {
        let snapshot: Vec<Arc<T>> = self.observers.lock().clone();
        for observer in snapshot {
            if catch_unwind(AssertUnwindSafe(|| f(&observer))).is_err() {
                error!("observer panicked while handling {}", what);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_no_duplicates() {
        let set: ObserverSet<dyn Fn() + Send + Sync> = ObserverSet::new();
        let a: Arc<dyn Fn() + Send + Sync> = Arc::new(|| {});
        assert!(set.add(a.clone()));
        assert!(!set.add(a.clone()));
        assert_eq!(set.len(), 1);
        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_panic_isolated() {
        let calls = Arc::new(AtomicU32::new(0));
        let set: ObserverSet<dyn Fn() + Send + Sync> = ObserverSet::new();
        set.add(Arc::new(|| panic!("boom")));
        let counter = calls.clone();
        set.add(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        set.for_each("test", |f| f());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
