//! Snapshot participants.
//!
//! A [`SnapshotParticipant`] makes its state revocable by saving a snapshot the
//! first time it is mutated in a scope. The snapshot is restored if the scope
//! aborts, handed to the parent scope if a nested scope commits, and released
//! once the outer scope commits, at which point
//! [`on_final_commit`](SnapshotParticipant::on_final_commit) runs.
//!
//! Because a participant registers at most one close callback per scope, its
//! final-commit hook runs at most once per outer transaction no matter how many
//! nested scopes mutated it.

use core::cell::RefCell;
use std::rc::Rc;

use crate::transaction::{CloseContext, Transaction, TransactionResult};

/// Depth-indexed snapshot stack owned by a participant.
///
/// Slot `d` holds the state the participant had before its first mutation in
/// the open scope at depth `d`.
#[derive(Debug)]
pub struct Snapshots<S> {
    stack: RefCell<Vec<Option<S>>>,
}

impl<S> Default for Snapshots<S> {
    fn default() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
        }
    }
}

impl<S> Snapshots<S> {
    /// Creates an empty snapshot stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a snapshot is held for any open scope.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.stack.borrow().iter().any(Option::is_some)
    }

    fn contains(&self, depth: usize) -> bool {
        self.stack
            .borrow()
            .get(depth)
            .is_some_and(Option::is_some)
    }

    fn put(&self, depth: usize, snapshot: S) {
        let mut stack = self.stack.borrow_mut();
        if stack.len() <= depth {
            stack.resize_with(depth + 1, || None);
        }
        stack[depth] = Some(snapshot);
    }

    fn take(&self, depth: usize) -> Option<S> {
        self.stack.borrow_mut().get_mut(depth).and_then(Option::take)
    }
}

/// A participant whose state can be restored when a transaction aborts.
///
/// Implementors call [`update_snapshots`] before every mutation performed
/// inside a transaction.
pub trait SnapshotParticipant: 'static {
    /// Saved state.
    type Snapshot: 'static;

    /// Returns the participant's snapshot stack.
    fn snapshots(&self) -> &Snapshots<Self::Snapshot>;

    /// Captures the current state.
    fn create_snapshot(&self) -> Self::Snapshot;

    /// Restores a previously captured state.
    fn read_snapshot(&self, snapshot: Self::Snapshot);

    /// Called once after an outer transaction that mutated this participant
    /// committed.
    fn on_final_commit(&self) {}
}

/// Saves a snapshot of `participant` for `transaction` unless one was already
/// saved for that scope.
///
/// Must be called before the participant is mutated.
pub fn update_snapshots<P: SnapshotParticipant>(participant: &Rc<P>, transaction: &Transaction<'_>) {
    let depth = transaction.nesting_depth();
    if participant.snapshots().contains(depth) {
        return;
    }

    participant
        .snapshots()
        .put(depth, participant.create_snapshot());
    let participant = Rc::clone(participant);
    transaction.add_close_callback(move |context, result| close(&participant, context, result));
}

fn close<P: SnapshotParticipant>(participant: &Rc<P>, context: &CloseContext, result: TransactionResult) {
    let depth = context.nesting_depth();
    let Some(snapshot) = participant.snapshots().take(depth) else {
        return;
    };

    if result.was_aborted() {
        participant.read_snapshot(snapshot);
    } else if depth > 0 {
        // The parent keeps the oldest snapshot; ours is redundant if it has one.
        if !participant.snapshots().contains(depth - 1) {
            participant.snapshots().put(depth - 1, snapshot);
            let participant = Rc::clone(participant);
            context.add_parent_close_callback(move |context, result| {
                close(&participant, context, result);
            });
        }
    } else {
        let participant = Rc::clone(participant);
        context.add_outer_close_callback(move |result| {
            if result.was_committed() {
                participant.on_final_commit();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[derive(Default)]
    struct Cell64 {
        value: Cell<u64>,
        commits: Cell<u32>,
        snapshots: Snapshots<u64>,
    }

    impl SnapshotParticipant for Cell64 {
        type Snapshot = u64;

        fn snapshots(&self) -> &Snapshots<u64> {
            &self.snapshots
        }

        fn create_snapshot(&self) -> u64 {
            self.value.get()
        }

        fn read_snapshot(&self, snapshot: u64) {
            self.value.set(snapshot);
        }

        fn on_final_commit(&self) {
            self.commits.set(self.commits.get() + 1);
        }
    }

    fn set(cell: &Rc<Cell64>, transaction: &Transaction<'_>, value: u64) {
        update_snapshots(cell, transaction);
        cell.value.set(value);
    }

    #[test]
    fn abort_restores_state() {
        let cell = Rc::new(Cell64::default());
        let transaction = Transaction::open_outer();
        set(&cell, &transaction, 5);
        set(&cell, &transaction, 7);
        transaction.abort();
        assert_eq!(cell.value.get(), 0);
        assert!(!cell.snapshots.is_tracking());
    }

    #[test]
    fn commit_keeps_state_and_fires_final_commit_once() {
        let cell = Rc::new(Cell64::default());
        let mut outer = Transaction::open_outer();
        set(&cell, &outer, 1);
        for value in 2..5 {
            let inner = outer.open_nested();
            set(&cell, &inner, value);
            inner.commit();
        }
        outer.commit();
        assert_eq!(cell.value.get(), 4);
        assert_eq!(cell.commits.get(), 1);
    }

    #[test]
    fn nested_commit_then_outer_abort_restores_original() {
        let cell = Rc::new(Cell64::default());
        let mut outer = Transaction::open_outer();
        {
            let inner = outer.open_nested();
            set(&cell, &inner, 9);
            inner.commit();
        }
        assert_eq!(cell.value.get(), 9);
        outer.abort();
        assert_eq!(cell.value.get(), 0);
        assert_eq!(cell.commits.get(), 0);
    }

    #[test]
    fn inner_abort_only_reverts_inner_changes() {
        let cell = Rc::new(Cell64::default());
        let mut outer = Transaction::open_outer();
        set(&cell, &outer, 3);
        {
            let inner = outer.open_nested();
            set(&cell, &inner, 8);
            inner.abort();
        }
        assert_eq!(cell.value.get(), 3);
        outer.commit();
        assert_eq!(cell.value.get(), 3);
    }
}
