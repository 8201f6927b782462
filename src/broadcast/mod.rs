//! In-memory fan-out of freshly appended project events to live listeners.
//!
//! The listener set is process-local and lost on restart; there is no
//! replay-on-reconnect. A listener that connects after a broadcast never
//! receives it and must refetch current state instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::board::events::EventRecord;

/// Handle returned by [`ProjectBroadcaster::subscribe`], used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    tx: mpsc::UnboundedSender<String>,
}

/// Fan-out registry keyed by project id.
///
/// Delivery order per project matches broadcast call order; nothing is
/// guaranteed across projects. A failed delivery silently deregisters the
/// listener, which is how disconnects are detected.
#[derive(Default)]
pub struct ProjectBroadcaster {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl ProjectBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        // Listener registration never panics while holding the lock, but a
        // poisoned map is still fully usable for fan-out.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a listener for one project's live feed and hand back the
    /// receiving end. Events are serialized JSON in the stored wire shape.
    pub fn subscribe(&self, project_id: &str) -> (ListenerId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry()
            .entry(project_id.to_string())
            .or_default()
            .push(Listener { id, tx });
        debug!(project_id, listener = id.0, "listener subscribed");
        (id, rx)
    }

    /// Deregister a listener. Unknown ids are ignored, so dropping the same
    /// subscription twice is harmless.
    pub fn unsubscribe(&self, project_id: &str, listener_id: ListenerId) {
        let mut registry = self.registry();
        if let Some(listeners) = registry.get_mut(project_id) {
            listeners.retain(|l| l.id != listener_id);
            if listeners.is_empty() {
                registry.remove(project_id);
            }
        }
    }

    /// Deliver one stored event to every listener of its project. Listeners
    /// whose channel is gone are dropped from the registry on the spot.
    pub fn broadcast(&self, project_id: &str, record: &EventRecord) {
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(project_id, error = %e, "failed to serialize event for fan-out");
                return;
            }
        };

        let mut registry = self.registry();
        if let Some(listeners) = registry.get_mut(project_id) {
            listeners.retain(|l| l.tx.send(payload.clone()).is_ok());
            if listeners.is_empty() {
                registry.remove(project_id);
            }
        }
    }

    pub fn listener_count(&self, project_id: &str) -> usize {
        self.registry()
            .get(project_id)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    /// Drop every listener. Receivers see their channel close.
    pub fn shutdown(&self) {
        self.registry().clear();
    }
}
