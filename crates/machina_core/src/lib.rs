//! Ambient infrastructure for machina (Layer 2).
//!
//! - [`tracing_setup`] - installs a `tracing` subscriber for hosts without one
//! - [`persistence`] - saves and loads registered storages as one document
//! - [`machine`] - the [`MachineStorages`] bundle and the [`Machine`] tick hook
//!   consumed by the world layer

/// Machine storage bundles and the tick hook.
pub mod machine;

/// Persistence of storages.
pub mod persistence;

/// Tracing subscriber setup.
pub mod tracing_setup;

pub use machine::{BlockPos, Direction, Machine, MachineStorages};
pub use persistence::{PersistenceError, PersistenceRegistry, PersistentStorage, Storable};
pub use tracing_setup::{TracingConfig, TracingFormat, TracingSetup};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::machine::{BlockPos, Direction, Machine, MachineStorages};
    pub use crate::persistence::{
        PersistenceError, PersistenceRegistry, PersistentStorage, Storable,
    };
    pub use crate::tracing_setup::{TracingConfig, TracingFormat, TracingSetup};
}
