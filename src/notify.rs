//! Change notification registry.
//!
//! One event kind: the cover state changed. Listeners are plain callbacks
//! receiving a [`CoverState`] copy. Fan-out runs synchronously on the
//! publishing thread, in registration order.
//!
//! The listener list is copied before delivery, so a callback may
//! unsubscribe itself (or anyone else) while being called. A panicking
//! listener is logged and skipped; the others still get the snapshot.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::error;
use parking_lot::Mutex;

use crate::app::state::CoverState;

/// Handle returned by [`ChangeNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registered state-change callback.
pub type Listener = Arc<dyn Fn(&CoverState) + Send + Sync>;

#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&CoverState) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver `state` to every listener registered at the time of the call.
    pub fn publish(&self, state: &CoverState) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(state))).is_err() {
                error!("notify: listener panicked, skipped");
            }
        }
    }
}
