//! Transactional resource storage for machina (Layer 1).
//!
//! `machina_storage` holds the resources of machines: items, fluids, gases
//! and energy. It is built from a few layered pieces:
//!
//! - [`resource`] - resource kinds, identifiers, auxiliary [`Tag`]s, variants and stacks
//! - [`filter`] - composable [`ResourceFilter`] predicates
//! - [`slot`] - [`ResourceSlot`], a bounded container for one variant
//! - [`group`] - [`SlotGroup`], ordered slots sharing a role
//! - [`storage`] - [`ResourceStorage`], every group of one kind in a machine
//! - [`energy`] - [`EnergyStorage`], a bounded energy buffer
//! - [`transfer`] - the [`Storage`] trait and transactional moves
//! - [`io`] - what automation may see on each machine side
//! - [`sync`] and [`packet`] - client synchronization
//!
//! Every mutation accepts an optional [`Transaction`]. Without one the change
//! is immediate; with one it is provisional and undone if the transaction
//! aborts. Change listeners fire once per outer commit.
//!
//! # Example
//!
//! ```
//! use machina_storage::prelude::*;
//!
//! let stone = Item::new(Identifier::parse("minecraft:stone").unwrap());
//! let slot = ResourceSlot::<Item>::builder().build().unwrap();
//!
//! assert_eq!(slot.insert(&stone, None, 100, None), 64);
//! assert_eq!(slot.amount(), 64);
//!
//! let transaction = Transaction::open_outer();
//! assert_eq!(slot.extract(&stone, None, 60, Some(&transaction)), 60);
//! transaction.abort();
//! assert_eq!(slot.amount(), 64);
//! ```

/// Energy buffers.
pub mod energy;

/// Error types.
pub mod error;

/// Resource filters.
pub mod filter;

/// Slot groups and access policies.
pub mod group;

/// External exposure of machine sides.
pub mod io;

/// Streaming byte buffers for client packets.
pub mod packet;

/// Resource kinds, variants and stacks.
pub mod resource;

/// Resource slots.
pub mod slot;

/// Machine resource storages.
pub mod storage;

/// Client synchronization handlers.
pub mod sync;

/// The storage trait and transactional moves.
pub mod transfer;

mod tracker;

pub use energy::EnergyStorage;
pub use error::{IdentifierError, PacketError, StorageError};
pub use filter::{FilterDescriptor, ResourceFilter};
pub use group::{InputType, SlotGroup, SlotGroupType};
pub use io::{ExposedStorage, IoFace, Matching, ResourceFlow};
pub use machina_transaction::Transaction;
pub use packet::PacketBuf;
pub use resource::{
    FLUID_BUCKET, Fluid, Gas, ITEM_STACK_SIZE, Identifier, Item, Resource, ResourceStack,
    ResourceType, ResourceVariant, Tag,
};
pub use slot::{ResourceSlot, SlotBuilder, SlotDisplay, SlotIcon};
pub use storage::{ResourceStorage, ResourceStorageBuilder};
pub use sync::{LongSyncHandler, StorageSyncHandler, SyncHandler};
pub use transfer::{Storage, move_all, move_energy, move_resource};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::energy::EnergyStorage;
    pub use crate::error::{IdentifierError, PacketError, StorageError};
    pub use crate::filter::{FilterDescriptor, ResourceFilter};
    pub use crate::group::{InputType, SlotGroup, SlotGroupType};
    pub use crate::io::{ExposedStorage, IoFace, Matching, ResourceFlow};
    pub use crate::packet::PacketBuf;
    pub use crate::resource::{
        FLUID_BUCKET, Fluid, Gas, ITEM_STACK_SIZE, Identifier, Item, Resource, ResourceStack,
        ResourceType, ResourceVariant, Tag,
    };
    pub use crate::slot::{ResourceSlot, SlotBuilder, SlotDisplay, SlotIcon};
    pub use crate::storage::{ResourceStorage, ResourceStorageBuilder};
    pub use crate::sync::{LongSyncHandler, StorageSyncHandler, SyncHandler};
    pub use crate::transfer::{Storage, move_all, move_energy, move_resource};
    pub use machina_transaction::Transaction;
}
