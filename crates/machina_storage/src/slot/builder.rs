use crate::error::StorageError;
use crate::filter::ResourceFilter;
use crate::resource::{ITEM_STACK_SIZE, Identifier, Resource, ResourceType};

use super::{ResourceSlot, SlotDisplay, SlotIcon};

/// Builder for [`ResourceSlot`].
///
/// The builder can be reused: every [`build`](SlotBuilder::build) creates a
/// fresh, independent slot.
///
/// # Example
///
/// ```
/// use machina_storage::prelude::*;
///
/// let builder = ResourceSlot::<Fluid>::builder()
///     .pos(8, 8)
///     .capacity(FLUID_BUCKET * 4);
///
/// let a = builder.build().unwrap();
/// let b = builder.build().unwrap();
/// assert!(!a.ptr_eq(&b));
/// assert_eq!(a.display().x, 8);
/// ```
#[derive(Debug, Clone)]
pub struct SlotBuilder<R: Resource> {
    display: SlotDisplay,
    filter: ResourceFilter<R>,
    strict_filter: Option<ResourceFilter<R>>,
    capacity: Option<u64>,
}

impl<R: Resource> Default for SlotBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> SlotBuilder<R> {
    /// Creates a builder with no filter, the default display and, for items,
    /// a capacity of one stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            display: SlotDisplay::default(),
            filter: ResourceFilter::Any,
            strict_filter: None,
            capacity: (R::TYPE == ResourceType::Item).then_some(ITEM_STACK_SIZE),
        }
    }

    /// Sets the screen position.
    #[must_use]
    pub fn pos(mut self, x: i32, y: i32) -> Self {
        self.display.x = x;
        self.display.y = y;
        self
    }

    /// Sets the horizontal screen position.
    #[must_use]
    pub fn x(mut self, x: i32) -> Self {
        self.display.x = x;
        self
    }

    /// Sets the vertical screen position.
    #[must_use]
    pub fn y(mut self, y: i32) -> Self {
        self.display.y = y;
        self
    }

    /// Sets the on-screen size.
    #[must_use]
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.display.width = width;
        self.display.height = height;
        self
    }

    /// Sets the icon drawn while the slot is empty.
    #[must_use]
    pub fn icon(mut self, atlas: Identifier, sprite: Identifier) -> Self {
        self.display.icon = Some(SlotIcon { atlas, sprite });
        self
    }

    /// Sets the insertion filter.
    #[must_use]
    pub fn filter(mut self, filter: ResourceFilter<R>) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the filter reported to automation. Defaults to the insertion
    /// filter.
    #[must_use]
    pub fn strict_filter(mut self, filter: ResourceFilter<R>) -> Self {
        self.strict_filter = Some(filter);
        self
    }

    /// Sets the capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Builds a new slot.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidCapacity`] if no capacity was set (for
    /// non-item slots), the capacity is zero, or an item slot exceeds
    /// [`ITEM_STACK_SIZE`].
    pub fn build(&self) -> Result<ResourceSlot<R>, StorageError> {
        let max = match R::TYPE {
            ResourceType::Item => ITEM_STACK_SIZE,
            _ => u64::MAX,
        };
        let capacity = self.capacity.unwrap_or(0);
        if capacity == 0 || capacity > max {
            return Err(StorageError::InvalidCapacity { capacity, max });
        }

        let strict_filter = self
            .strict_filter
            .clone()
            .unwrap_or_else(|| self.filter.clone());
        Ok(ResourceSlot::from_parts(
            capacity,
            self.filter.clone(),
            strict_filter,
            self.display.clone(),
        ))
    }
}
