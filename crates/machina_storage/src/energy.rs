//! Machine energy buffers.

use core::cell::Cell;
use core::fmt;
use std::rc::Rc;

use machina_transaction::{SnapshotParticipant, Snapshots, Transaction, update_snapshots};
use serde_json::Value;

use crate::error::{PacketError, StorageError};
use crate::packet::PacketBuf;
use crate::sync::LongSyncHandler;
use crate::tracker::ModificationTracker;

struct EnergyState {
    amount: Cell<u64>,
    capacity: u64,
    max_insert: u64,
    max_extract: u64,
    tracker: Rc<ModificationTracker>,
    snapshots: Snapshots<u64>,
}

impl SnapshotParticipant for EnergyState {
    type Snapshot = u64;

    fn snapshots(&self) -> &Snapshots<u64> {
        &self.snapshots
    }

    fn create_snapshot(&self) -> u64 {
        self.amount.get()
    }

    fn read_snapshot(&self, snapshot: u64) {
        self.amount.set(snapshot);
    }
}

/// A bounded amount of energy with per-operation transfer limits.
///
/// Energy has no identity, so this is a plain counter with the same
/// transactional semantics as a resource slot. Clones share the buffer.
///
/// # Example
///
/// ```
/// use machina_storage::energy::EnergyStorage;
///
/// let battery = EnergyStorage::new(10_000, 100, 50).unwrap();
/// assert_eq!(battery.insert(500, None), 100);
/// assert_eq!(battery.extract(500, None), 50);
/// assert_eq!(battery.amount(), 50);
/// ```
#[derive(Clone)]
pub struct EnergyStorage {
    state: Rc<EnergyState>,
}

impl fmt::Debug for EnergyStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnergyStorage")
            .field("amount", &self.amount())
            .field("capacity", &self.state.capacity)
            .field("max_insert", &self.state.max_insert)
            .field("max_extract", &self.state.max_extract)
            .finish()
    }
}

impl EnergyStorage {
    /// Creates an empty buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: u64, max_insert: u64, max_extract: u64) -> Result<Self, StorageError> {
        if capacity == 0 {
            return Err(StorageError::InvalidCapacity {
                capacity,
                max: u64::MAX,
            });
        }
        Ok(Self {
            state: Rc::new(EnergyState {
                amount: Cell::new(0),
                capacity,
                max_insert,
                max_extract,
                tracker: ModificationTracker::new(),
                snapshots: Snapshots::new(),
            }),
        })
    }

    /// Returns the stored energy.
    #[must_use]
    pub fn amount(&self) -> u64 {
        self.state.amount.get()
    }

    /// Returns the capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.state.capacity
    }

    /// Returns the largest amount accepted per insertion.
    #[must_use]
    pub fn max_insert(&self) -> u64 {
        self.state.max_insert
    }

    /// Returns the largest amount released per extraction.
    #[must_use]
    pub fn max_extract(&self) -> u64 {
        self.state.max_extract
    }

    /// Returns `true` if no energy is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amount() == 0
    }

    /// Returns `true` if the buffer is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.amount() >= self.state.capacity
    }

    /// Returns `true` if all of `amount` could be inserted.
    #[must_use]
    pub fn can_insert(&self, amount: u64) -> bool {
        amount > 0 && self.simulate_insert(amount) == amount
    }

    /// Returns `true` if all of `amount` could be extracted.
    #[must_use]
    pub fn can_extract(&self, amount: u64) -> bool {
        amount > 0 && self.simulate_extract(amount) == amount
    }

    /// Returns how much [`insert`](Self::insert) would accept.
    #[must_use]
    pub fn simulate_insert(&self, amount: u64) -> u64 {
        self.state
            .capacity
            .saturating_sub(self.amount())
            .min(self.state.max_insert)
            .min(amount)
    }

    /// Returns how much [`extract`](Self::extract) would release.
    #[must_use]
    pub fn simulate_extract(&self, amount: u64) -> u64 {
        self.amount().min(self.state.max_extract).min(amount)
    }

    /// Inserts up to `amount`, returning the energy accepted.
    pub fn insert(&self, amount: u64, transaction: Option<&Transaction<'_>>) -> u64 {
        let inserted = self.simulate_insert(amount);
        if inserted > 0 {
            self.update(self.amount() + inserted, transaction);
        }
        inserted
    }

    /// Extracts up to `amount`, returning the energy released.
    pub fn extract(&self, amount: u64, transaction: Option<&Transaction<'_>>) -> u64 {
        let extracted = self.simulate_extract(amount);
        if extracted > 0 {
            self.update(self.amount() - extracted, transaction);
        }
        extracted
    }

    /// Extracts exactly `amount`, or nothing if less is available.
    pub fn extract_exact(&self, amount: u64, transaction: Option<&Transaction<'_>>) -> bool {
        if !self.can_extract(amount) {
            return false;
        }
        self.extract(amount, transaction) == amount
    }

    /// Sets the stored energy directly, ignoring transfer limits. The change
    /// is undone if `transaction` aborts.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidAmount`] if `amount` exceeds the capacity.
    pub fn set_amount(
        &self,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> Result<(), StorageError> {
        if amount > self.state.capacity {
            return Err(StorageError::InvalidAmount {
                amount,
                capacity: self.state.capacity,
            });
        }
        self.update(amount, transaction);
        Ok(())
    }

    fn update(&self, amount: u64, transaction: Option<&Transaction<'_>>) {
        if let Some(transaction) = transaction {
            update_snapshots(&self.state, transaction);
        }
        self.state.amount.set(amount);
        self.state.tracker.mark_modified(transaction);
    }

    /// Returns the number of visible modifications since creation.
    #[must_use]
    pub fn modifications(&self) -> u64 {
        self.state.tracker.modifications()
    }

    /// Sets the callback fired after the stored energy changed.
    pub fn set_listener(&self, listener: impl Fn() + 'static) {
        self.state.tracker.set_listener(Rc::new(listener));
    }

    /// Returns a handler that sends the stored energy to a client.
    #[must_use]
    pub fn sync_handler(&self) -> LongSyncHandler {
        let server = self.clone();
        let client = self.clone();
        LongSyncHandler::new(move || server.amount(), move |amount| client.load(amount))
    }

    fn load(&self, amount: u64) {
        self.state.amount.set(amount.min(self.state.capacity));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────

    /// Serializes the stored energy.
    #[must_use]
    pub fn create_tag(&self) -> Value {
        Value::from(self.amount())
    }

    /// Restores energy written by [`create_tag`](Self::create_tag). Malformed
    /// data empties the buffer; excess energy is clamped to the capacity.
    pub fn read_tag(&self, value: &Value) {
        let amount = value.as_u64().unwrap_or_else(|| {
            tracing::warn!(%value, "malformed energy data; buffer left empty");
            0
        });
        self.load(amount);
    }

    /// Writes the stored energy to a packet.
    pub fn write_packet(&self, buf: &mut PacketBuf) {
        buf.write_varint(self.amount());
    }

    /// Reads energy written by [`write_packet`](Self::write_packet).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is truncated.
    pub fn read_packet(&self, buf: &mut PacketBuf) -> Result<(), PacketError> {
        self.load(buf.read_varint()?);
        Ok(())
    }
}
