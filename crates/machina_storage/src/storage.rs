//! Machine resource storages.
//!
//! A [`ResourceStorage`] composes the [`SlotGroup`]s of one resource kind in a
//! machine, keyed by their [`SlotGroupType`]. It owns the storage-wide
//! modification counter and the change listener used to trigger
//! synchronization.
//!
//! # Change notification
//!
//! Every slot mutation marks the storage modified. Outside a transaction the
//! listener fires immediately. Inside a transaction the increment is
//! provisional, and the listener fires once after the outer transaction
//! commits, no matter how many slots or nested scopes were involved.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use machina_storage::prelude::*;
//! use machina_transaction::Transaction;
//!
//! let water = Fluid::new(Identifier::parse("minecraft:water").unwrap());
//! let tank = ResourceSlot::<Fluid>::builder().capacity(FLUID_BUCKET).build().unwrap();
//! let storage = ResourceStorage::builder()
//!     .group(SlotGroupType::INPUT, SlotGroup::of(tank))
//!     .build()
//!     .unwrap();
//!
//! let notified = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&notified);
//! storage.set_listener(move || counter.set(counter.get() + 1));
//!
//! let mut transaction = Transaction::open_outer();
//! let input = storage.group(&SlotGroupType::INPUT).unwrap();
//! input.insert(&water, None, 1000, Some(&transaction));
//! {
//!     let nested = transaction.open_nested();
//!     input.insert(&water, None, 1000, Some(&nested));
//!     nested.commit();
//! }
//! transaction.commit();
//!
//! assert_eq!(input.count(&water, None), 2000);
//! assert_eq!(notified.get(), 1);
//! ```

use core::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use machina_transaction::Transaction;
use serde_json::Value;

use crate::error::{PacketError, StorageError};
use crate::group::{SlotGroup, SlotGroupType};
use crate::packet::PacketBuf;
use crate::resource::Resource;
use crate::slot::ResourceSlot;
use crate::sync::StorageSyncHandler;
use crate::tracker::ModificationTracker;

/// Builder for [`ResourceStorage`].
pub struct ResourceStorageBuilder<R: Resource> {
    groups: Vec<(SlotGroupType, SlotGroup<R>)>,
}

impl<R: Resource> Default for ResourceStorageBuilder<R> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<R: Resource> ResourceStorageBuilder<R> {
    /// Adds a group. Groups keep the order they are added in.
    #[must_use]
    pub fn group(mut self, group_type: SlotGroupType, group: SlotGroup<R>) -> Self {
        self.groups.push((group_type, group));
        self
    }

    /// Builds the storage.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateGroup`] if two groups share a type.
    pub fn build(self) -> Result<ResourceStorage<R>, StorageError> {
        let mut index = HashMap::with_capacity(self.groups.len());
        for (position, (group_type, _)) in self.groups.iter().enumerate() {
            if index.insert(group_type.clone(), position).is_some() {
                return Err(StorageError::DuplicateGroup(group_type.name().to_owned()));
            }
        }

        let tracker = ModificationTracker::new();
        let slots: Vec<ResourceSlot<R>> = self
            .groups
            .iter()
            .flat_map(|(_, group)| group.iter().cloned())
            .collect();
        for slot in &slots {
            slot.attach(&tracker);
        }

        tracing::debug!(
            resource_type = %R::TYPE,
            groups = self.groups.len(),
            slots = slots.len(),
            "built resource storage"
        );

        Ok(ResourceStorage {
            groups: self.groups,
            index,
            slots,
            tracker,
        })
    }
}

/// The storage of one resource kind in a machine.
pub struct ResourceStorage<R: Resource> {
    groups: Vec<(SlotGroupType, SlotGroup<R>)>,
    index: HashMap<SlotGroupType, usize>,
    slots: Vec<ResourceSlot<R>>,
    tracker: Rc<ModificationTracker>,
}

impl<R: Resource> fmt::Debug for ResourceStorage<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStorage")
            .field("groups", &self.groups)
            .field("modifications", &self.tracker.modifications())
            .finish()
    }
}

impl<R: Resource> ResourceStorage<R> {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> ResourceStorageBuilder<R> {
        ResourceStorageBuilder::default()
    }

    /// Creates a storage with no groups.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
            slots: Vec::new(),
            tracker: ModificationTracker::new(),
        }
    }

    /// Iterates over the groups in declaration order.
    pub fn groups(&self) -> impl Iterator<Item = (&SlotGroupType, &SlotGroup<R>)> {
        self.groups.iter().map(|(group_type, group)| (group_type, group))
    }

    /// Iterates over the group types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &SlotGroupType> {
        self.groups.iter().map(|(group_type, _)| group_type)
    }

    /// Returns the group of `group_type`.
    #[must_use]
    pub fn group(&self, group_type: &SlotGroupType) -> Option<&SlotGroup<R>> {
        self.index
            .get(group_type)
            .map(|position| &self.groups[*position].1)
    }

    /// Returns the group of `group_type`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownGroup`] if the storage has no such group.
    pub fn try_group(&self, group_type: &SlotGroupType) -> Result<&SlotGroup<R>, StorageError> {
        self.group(group_type)
            .ok_or_else(|| StorageError::UnknownGroup(group_type.name().to_owned()))
    }

    /// Returns the slot at `index` in the flattened slot list.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&ResourceSlot<R>> {
        self.slots.get(index)
    }

    /// Returns every slot, groups in declaration order.
    #[must_use]
    pub fn slots(&self) -> &[ResourceSlot<R>] {
        &self.slots
    }

    /// Returns the total number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slot holds anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(ResourceSlot::is_empty)
    }

    /// Returns the number of visible modifications since creation.
    #[must_use]
    pub fn modifications(&self) -> u64 {
        self.tracker.modifications()
    }

    /// Marks the storage modified.
    ///
    /// With a transaction, the increment is undone if it aborts and the
    /// listener fires after the outer transaction commits.
    pub fn mark_modified(&self, transaction: Option<&Transaction<'_>>) {
        self.tracker.mark_modified(transaction);
    }

    /// Sets the callback fired after the storage changed.
    pub fn set_listener(&self, listener: impl Fn() + 'static) {
        self.tracker.set_listener(Rc::new(listener));
    }

    /// Returns a handler that sends changed slots to a client.
    #[must_use]
    pub fn sync_handler(&self) -> StorageSyncHandler<R> {
        StorageSyncHandler::new(self.slots.clone())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────

    /// Serializes every group, in declaration order, as a JSON array.
    #[must_use]
    pub fn create_tag(&self) -> Value {
        Value::Array(
            self.groups
                .iter()
                .map(|(_, group)| group.create_tag())
                .collect(),
        )
    }

    /// Restores groups written by [`create_tag`](Self::create_tag). Missing or
    /// malformed data leaves slots empty.
    pub fn read_tag(&self, value: &Value) {
        let blocks = match value.as_array() {
            Some(blocks) => blocks.as_slice(),
            None => {
                tracing::warn!("storage data is not a list; slots left empty");
                &[]
            }
        };
        for (position, (_, group)) in self.groups.iter().enumerate() {
            group.read_tag(blocks.get(position).unwrap_or(&Value::Null));
        }
    }

    /// Writes every group, in declaration order.
    pub fn write_packet(&self, buf: &mut PacketBuf) {
        for (_, group) in &self.groups {
            group.write_packet(buf);
        }
    }

    /// Reads groups written by [`write_packet`](Self::write_packet).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read_packet(&self, buf: &mut PacketBuf) -> Result<(), PacketError> {
        for (_, group) in &self.groups {
            group.read_packet(buf)?;
        }
        Ok(())
    }
}
