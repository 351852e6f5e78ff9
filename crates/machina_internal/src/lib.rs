//! # machina Internal Library
//!
//! Re-exports the core machina crates for convenience.

/// Layer 0: Nested transactions and snapshot participants.
pub use machina_transaction;

/// Layer 1: Resource slots, groups, storages and transfers.
pub use machina_storage;

/// Layer 2: Tracing setup, persistence and machine integration.
pub use machina_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use machina_core::prelude::*;
    pub use machina_storage::prelude::*;
    pub use machina_transaction::prelude::*;
}
