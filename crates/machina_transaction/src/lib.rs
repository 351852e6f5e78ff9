//! Nested, revocable mutation scopes for machina (Layer 0).
//!
//! `machina_transaction` provides the transactional context every storage
//! mutation in machina is routed through:
//!
//! - [`transaction`] - [`Transaction`] scopes, close callbacks and outer close callbacks
//! - [`snapshot`] - [`SnapshotParticipant`] and the snapshot bookkeeping that makes
//!   participants revocable
//!
//! # Model
//!
//! A transaction is opened as an *outer* scope and may open any number of
//! *nested* scopes, one at a time. Closing a scope either commits it or aborts
//! it:
//!
//! - an aborted scope undoes every mutation performed since it was opened
//! - a committed nested scope hands its mutations to its parent; they only
//!   become permanent once the outer scope commits
//!
//! The borrow checker enforces the stack discipline: [`Transaction::open_nested`]
//! borrows the parent mutably, so only the innermost open scope can be used.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use machina_transaction::prelude::*;
//!
//! struct Counter {
//!     value: Cell<u64>,
//!     snapshots: Snapshots<u64>,
//! }
//!
//! impl SnapshotParticipant for Counter {
//!     type Snapshot = u64;
//!
//!     fn snapshots(&self) -> &Snapshots<u64> {
//!         &self.snapshots
//!     }
//!
//!     fn create_snapshot(&self) -> u64 {
//!         self.value.get()
//!     }
//!
//!     fn read_snapshot(&self, snapshot: u64) {
//!         self.value.set(snapshot);
//!     }
//! }
//!
//! let counter = Rc::new(Counter { value: Cell::new(0), snapshots: Snapshots::new() });
//!
//! let mut outer = Transaction::open_outer();
//! update_snapshots(&counter, &outer);
//! counter.value.set(1);
//!
//! {
//!     let inner = outer.open_nested();
//!     update_snapshots(&counter, &inner);
//!     counter.value.set(2);
//!     inner.abort();
//! }
//!
//! assert_eq!(counter.value.get(), 1);
//! outer.commit();
//! assert_eq!(counter.value.get(), 1);
//! ```

/// Snapshot-based participants that can be rolled back.
pub mod snapshot;

/// Transaction scopes and their lifecycle callbacks.
pub mod transaction;

pub use snapshot::{SnapshotParticipant, Snapshots, update_snapshots};
pub use transaction::{
    CloseContext, Transaction, TransactionError, TransactionId, TransactionResult,
};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::snapshot::*;
    pub use crate::transaction::*;
}
