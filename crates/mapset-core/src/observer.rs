//! Observers of package lifecycle events.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::event::{Event, EventList};
use crate::file::LocalPackageFile;

/// Listener for package lifecycle changes.
///
/// Callbacks can run on *any* thread, most often the one that released the
/// last handle of a package, so they should return quickly. They are never
/// called while the registry lock is held and may call back into the registry.
pub trait Observer: Send + Sync {
    /// A package was registered for the first time and can be used.
    fn on_registered(&self, _file: &LocalPackageFile) {}

    /// A package was replaced by a newer version. Equivalent to
    /// `on_registered(new)` plus `on_deregistered(old)`.
    fn on_updated(&self, _new: &LocalPackageFile, _old: &LocalPackageFile) {}

    /// A package was deregistered and can no longer be used.
    fn on_deregistered(&self, _file: &LocalPackageFile) {}
}

fn same(a: &Arc<dyn Observer>, b: &Arc<dyn Observer>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Thread-safe observer set.
///
/// Dispatch holds a reentrant lock, so removal from another thread waits for
/// the dispatch in progress, while a callback may add or remove observers on
/// its own thread. An observer removed mid-dispatch is not called again.
#[derive(Default)]
pub struct ObserverList {
    observers: ReentrantMutex<RefCell<Vec<Arc<dyn Observer>>>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer. Returns false if it is already present.
    pub fn add(&self, observer: Arc<dyn Observer>) -> bool {
        let guard = self.observers.lock();
        let mut observers = guard.borrow_mut();
        if observers.iter().any(|o| same(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Removes an observer. Returns false if it was not present.
    pub fn remove(&self, observer: &Arc<dyn Observer>) -> bool {
        let guard = self.observers.lock();
        let mut observers = guard.borrow_mut();
        let before = observers.len();
        observers.retain(|o| !same(o, observer));
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.lock().borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers every event, in order, to every observer.
    pub fn dispatch(&self, events: EventList) {
        if events.is_empty() {
            return;
        }
        let guard = self.observers.lock();
        for event in events {
            let snapshot = guard.borrow().clone();
            for observer in &snapshot {
                if !guard.borrow().iter().any(|o| same(o, observer)) {
                    continue;
                }
                match &event {
                    Event::Registered(file) => observer.on_registered(file),
                    Event::Updated { new, old } => observer.on_updated(new, old),
                    Event::Deregistered(file) => observer.on_deregistered(file),
                }
            }
        }
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}
