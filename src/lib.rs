//! Transactional resource storage for machine entities.
//!
//! machina stores the items, fluids, gases and energy held by machines, and
//! moves them between storages inside nested, revocable transactions.
//!
//! ```
//! use machina::prelude::*;
//!
//! let lava = Fluid::new(Identifier::parse("minecraft:lava").unwrap());
//! let builder = ResourceSlot::<Fluid>::builder().capacity(FLUID_BUCKET);
//! let (source, target) = (builder.build().unwrap(), builder.build().unwrap());
//! source.set(&lava, None, FLUID_BUCKET, None).unwrap();
//!
//! let moved = move_resource(&ResourceVariant::of(lava), &source, &target, 500, None);
//! assert_eq!(moved, 500);
//! assert_eq!(source.amount(), FLUID_BUCKET - 500);
//! ```

pub use machina_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use machina_internal::prelude::*;
}
