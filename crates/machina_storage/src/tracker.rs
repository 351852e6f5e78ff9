//! Storage-wide modification counter with transactional listener dispatch.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use machina_transaction::{SnapshotParticipant, Snapshots, Transaction, update_snapshots};

/// Callback fired after a storage changed.
pub(crate) type Listener = Rc<dyn Fn()>;

/// Counts visible modifications of a storage and notifies its listener.
///
/// Inside a transaction the increment is provisional: it is undone if the
/// transaction aborts, and the listener fires once when the outer transaction
/// commits, however many nested scopes touched the storage.
#[derive(Default)]
pub(crate) struct ModificationTracker {
    modifications: Cell<u64>,
    listener: RefCell<Option<Listener>>,
    snapshots: Snapshots<u64>,
}

impl ModificationTracker {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn modifications(&self) -> u64 {
        self.modifications.get()
    }

    pub(crate) fn set_listener(&self, listener: Listener) {
        *self.listener.borrow_mut() = Some(listener);
    }

    pub(crate) fn mark_modified(self: &Rc<Self>, transaction: Option<&Transaction<'_>>) {
        match transaction {
            Some(transaction) => {
                update_snapshots(self, transaction);
                self.increment();
            }
            None => {
                self.increment();
                self.notify();
            }
        }
    }

    fn increment(&self) {
        self.modifications
            .set(self.modifications.get().wrapping_add(1));
    }

    fn notify(&self) {
        // Cloned so the listener may replace itself.
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            tracing::debug!(modifications = self.modifications.get(), "storage modified");
            listener();
        }
    }
}

impl SnapshotParticipant for ModificationTracker {
    type Snapshot = u64;

    fn snapshots(&self) -> &Snapshots<u64> {
        &self.snapshots
    }

    fn create_snapshot(&self) -> u64 {
        self.modifications.get()
    }

    fn read_snapshot(&self, snapshot: u64) {
        self.modifications.set(snapshot);
    }

    fn on_final_commit(&self) {
        self.notify();
    }
}
