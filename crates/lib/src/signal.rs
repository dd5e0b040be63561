//! Typed publish/subscribe channels.
//!
//! Every bridge owns one [`Signal`] per event kind. Subscribers register a
//! callback with [`Signal::connect`] and get back a [`SlotId`] they can use to
//! disconnect later. The in-memory realtime provider uses the same type for its
//! remote event subscriptions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A subscriber callback for events of type `T`.
pub type Slot<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle identifying one connected slot on a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

/// A typed event channel with a fixed payload type.
///
/// Emission is synchronous: every slot connected at the time of the call runs
/// to completion, in connection order, before `emit` returns. The slot list is
/// snapshotted before dispatch, so slots may connect or disconnect slots
/// (including themselves) while an emission is in progress.
pub struct Signal<T> {
    next_id: AtomicU64,
    slots: Mutex<Vec<(SlotId, Slot<T>)>>,
}

impl<T> Signal<T> {
    /// Create a signal with no subscribers.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Connect a callback, returning the id needed to disconnect it.
    pub fn connect<F>(&self, callback: F) -> SlotId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.connect_slot(Arc::new(callback))
    }

    /// Connect an already shared callback.
    pub fn connect_slot(&self, slot: Slot<T>) -> SlotId {
        let id = SlotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().unwrap().push((id, slot));
        id
    }

    /// Disconnect a slot. Returns false if it was not connected.
    pub fn disconnect(&self, id: SlotId) -> bool {
        let mut slots = self.slots.lock().unwrap();
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id);
        slots.len() != before
    }

    /// Disconnect every slot.
    pub fn disconnect_all(&self) {
        self.slots.lock().unwrap().clear();
    }

    /// Deliver `args` to every connected slot.
    pub fn emit(&self, args: &T) {
        // Clone the slots so the lock is not held while callbacks run.
        let slots: Vec<Slot<T>> = self
            .slots
            .lock()
            .unwrap()
            .iter()
            .map(|(_, slot)| slot.clone())
            .collect();
        for slot in slots {
            slot(args);
        }
    }

    /// Number of connected slots.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Check if no slots are connected.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &format!("<{} slots>", self.len()))
            .finish()
    }
}
