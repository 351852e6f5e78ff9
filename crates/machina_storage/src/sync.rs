//! Incremental client synchronization.
//!
//! A [`SyncHandler`] decides whether its value changed since the last sync and,
//! if so, writes an update to a [`PacketBuf`]. The client side reads the
//! update with the mirror handler.
//!
//! Handlers compare modification counts, so they must be polled outside of
//! transactions: a count observed mid-transaction may be rolled back.

use crate::error::PacketError;
use crate::packet::PacketBuf;
use crate::resource::Resource;
use crate::slot::ResourceSlot;

/// A value that can be sent to, and applied on, a client.
pub trait SyncHandler {
    /// Returns `true` if the value changed since the last [`sync`](SyncHandler::sync).
    fn needs_syncing(&self) -> bool;

    /// Writes the changes and records the synced state.
    fn sync(&mut self, buf: &mut PacketBuf);

    /// Applies changes written by [`sync`](SyncHandler::sync).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    fn read(&mut self, buf: &mut PacketBuf) -> Result<(), PacketError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// StorageSyncHandler
// ─────────────────────────────────────────────────────────────────────────────

/// Sends only the slots whose modification count changed.
///
/// Wire format: the number of changed slots, then each slot's index followed
/// by its packet form.
pub struct StorageSyncHandler<R: Resource> {
    slots: Vec<ResourceSlot<R>>,
    synced: Vec<Option<u64>>,
}

impl<R: Resource> StorageSyncHandler<R> {
    /// Creates a handler over `slots`. Every slot is sent on the first sync.
    #[must_use]
    pub fn new(slots: Vec<ResourceSlot<R>>) -> Self {
        let synced = vec![None; slots.len()];
        Self { slots, synced }
    }

    fn changed(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .zip(&self.synced)
            .enumerate()
            .filter(|(_, (slot, synced))| **synced != Some(slot.mod_count()))
            .map(|(index, _)| index)
    }
}

impl<R: Resource> SyncHandler for StorageSyncHandler<R> {
    fn needs_syncing(&self) -> bool {
        self.changed().next().is_some()
    }

    fn sync(&mut self, buf: &mut PacketBuf) {
        let changed: Vec<usize> = self.changed().collect();
        buf.write_varint(changed.len() as u64);
        for index in changed {
            let slot = &self.slots[index];
            buf.write_varint(index as u64);
            slot.write_packet(buf);
            self.synced[index] = Some(slot.mod_count());
        }
    }

    fn read(&mut self, buf: &mut PacketBuf) -> Result<(), PacketError> {
        let count = buf.read_varint()?;
        for _ in 0..count {
            let index = buf.read_varint()?;
            let slot = usize::try_from(index)
                .ok()
                .and_then(|index| self.slots.get(index))
                .ok_or_else(|| {
                    PacketError::InvalidData(format!(
                        "slot index {index} out of range ({} slots)",
                        self.slots.len()
                    ))
                })?;
            slot.read_packet(buf)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LongSyncHandler
// ─────────────────────────────────────────────────────────────────────────────

/// Sends a single `u64` whenever it changes, such as an energy level.
pub struct LongSyncHandler {
    supplier: Box<dyn Fn() -> u64>,
    consumer: Box<dyn FnMut(u64)>,
    value: u64,
}

impl LongSyncHandler {
    /// Creates a handler reading from `supplier` on the server and writing to
    /// `consumer` on the client.
    #[must_use]
    pub fn new(supplier: impl Fn() -> u64 + 'static, consumer: impl FnMut(u64) + 'static) -> Self {
        Self {
            supplier: Box::new(supplier),
            consumer: Box::new(consumer),
            value: 0,
        }
    }

    /// Returns the last value synced or read.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }
}

impl SyncHandler for LongSyncHandler {
    fn needs_syncing(&self) -> bool {
        self.value != (self.supplier)()
    }

    fn sync(&mut self, buf: &mut PacketBuf) {
        self.value = (self.supplier)();
        buf.write_u64(self.value);
    }

    fn read(&mut self, buf: &mut PacketBuf) -> Result<(), PacketError> {
        self.value = buf.read_u64()?;
        (self.consumer)(self.value);
        Ok(())
    }
}
