//! Single-resource slots.
//!
//! A [`ResourceSlot`] holds at most one [`ResourceVariant`] with an amount
//! bounded by its capacity. All mutation goes through
//! [`insert`](ResourceSlot::insert) / [`extract`](ResourceSlot::extract) (or
//! their derived forms), which accept an optional [`Transaction`]: when one is
//! given, the change is provisional and rolled back if the transaction aborts.
//!
//! # Example
//!
//! ```
//! use machina_storage::prelude::*;
//! use machina_transaction::Transaction;
//!
//! let stone = Item::new(Identifier::parse("minecraft:stone").unwrap());
//! let slot = ResourceSlot::<Item>::builder().build().unwrap();
//!
//! let transaction = Transaction::open_outer();
//! assert_eq!(slot.insert(&stone, None, 100, Some(&transaction)), 64);
//! transaction.abort();
//! assert!(slot.is_empty());
//!
//! assert_eq!(slot.insert(&stone, None, 10, None), 10);
//! assert_eq!(slot.amount(), 10);
//! ```

mod builder;
mod display;

use core::cell::{Cell, OnceCell, RefCell};
use core::fmt;
use std::rc::Rc;

use machina_transaction::{SnapshotParticipant, Snapshots, Transaction, update_snapshots};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use builder::SlotBuilder;
pub use display::{SLOT_SIZE, SlotDisplay, SlotIcon};

use crate::error::{PacketError, StorageError};
use crate::filter::ResourceFilter;
use crate::packet::PacketBuf;
use crate::resource::{Resource, ResourceStack, ResourceVariant, Tag, tags_equal};
use crate::tracker::ModificationTracker;

/// How the tag of held contents is matched on extraction.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TagMatch<'a> {
    /// Any tag matches.
    Any,
    /// Only this exact tag matches (`None` meaning untagged).
    Exact(Option<&'a Tag>),
}

impl<'a> TagMatch<'a> {
    /// `None` matches any tag; `Some` matches exactly.
    pub(crate) fn from_query(tag: Option<&'a Tag>) -> Self {
        match tag {
            Some(tag) => Self::Exact(Some(tag)),
            None => Self::Any,
        }
    }

    fn accepts(self, tag: Option<&Tag>) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => tags_equal(expected, tag),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Slot state
// ─────────────────────────────────────────────────────────────────────────────

struct SlotState<R: Resource> {
    contents: RefCell<ResourceStack<R>>,
    mod_count: Cell<u64>,
    capacity: u64,
    filter: ResourceFilter<R>,
    strict_filter: ResourceFilter<R>,
    display: SlotDisplay,
    owner: OnceCell<Rc<ModificationTracker>>,
    snapshots: Snapshots<(ResourceStack<R>, u64)>,
}

impl<R: Resource> SnapshotParticipant for SlotState<R> {
    type Snapshot = (ResourceStack<R>, u64);

    fn snapshots(&self) -> &Snapshots<Self::Snapshot> {
        &self.snapshots
    }

    fn create_snapshot(&self) -> Self::Snapshot {
        (self.contents.borrow().clone(), self.mod_count.get())
    }

    fn read_snapshot(&self, (contents, mod_count): Self::Snapshot) {
        *self.contents.borrow_mut() = contents;
        self.mod_count.set(mod_count);
    }
}

/// Persisted form of a slot.
#[derive(Serialize, Deserialize)]
struct SlotRecord<R> {
    present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<R>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<Tag>,
    #[serde(default, skip_serializing_if = "is_zero")]
    amount: u64,
}

fn is_zero(amount: &u64) -> bool {
    *amount == 0
}

// ─────────────────────────────────────────────────────────────────────────────
// ResourceSlot
// ─────────────────────────────────────────────────────────────────────────────

/// A bounded container for a single resource variant.
///
/// `ResourceSlot` is a shared handle: clones refer to the same slot. Use
/// [`ptr_eq`](ResourceSlot::ptr_eq) to tell slots apart.
pub struct ResourceSlot<R: Resource> {
    state: Rc<SlotState<R>>,
}

impl<R: Resource> Clone for ResourceSlot<R> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<R: Resource> fmt::Debug for ResourceSlot<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSlot")
            .field("contents", &*self.state.contents.borrow())
            .field("capacity", &self.state.capacity)
            .field("mod_count", &self.state.mod_count.get())
            .finish_non_exhaustive()
    }
}

impl<R: Resource> ResourceSlot<R> {
    /// Returns a builder for a new slot.
    #[must_use]
    pub fn builder() -> SlotBuilder<R> {
        SlotBuilder::new()
    }

    fn from_parts(
        capacity: u64,
        filter: ResourceFilter<R>,
        strict_filter: ResourceFilter<R>,
        display: SlotDisplay,
    ) -> Self {
        Self {
            state: Rc::new(SlotState {
                contents: RefCell::new(ResourceStack::empty()),
                mod_count: Cell::new(0),
                capacity,
                filter,
                strict_filter,
                display,
                owner: OnceCell::new(),
                snapshots: Snapshots::new(),
            }),
        }
    }

    /// Returns `true` if both handles refer to the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Links this slot to the storage that owns it.
    pub(crate) fn attach(&self, owner: &Rc<ModificationTracker>) {
        if self.state.owner.set(Rc::clone(owner)).is_err() {
            tracing::warn!("slot already belongs to a storage; keeping its first owner");
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────

    /// Returns a copy of the contents.
    #[must_use]
    pub fn stack(&self) -> ResourceStack<R> {
        self.state.contents.borrow().clone()
    }

    /// Returns the resource held, if any.
    #[must_use]
    pub fn resource(&self) -> Option<R> {
        self.state.contents.borrow().resource().cloned()
    }

    /// Returns the tag of the resource held, if any.
    #[must_use]
    pub fn tag(&self) -> Option<Tag> {
        self.state.contents.borrow().tag().cloned()
    }

    /// Returns the exact variant held, if any.
    #[must_use]
    pub fn variant(&self) -> Option<ResourceVariant<R>> {
        self.state.contents.borrow().variant().cloned()
    }

    /// Returns the amount held.
    #[must_use]
    pub fn amount(&self) -> u64 {
        self.state.contents.borrow().amount()
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.state.capacity
    }

    /// Returns how much of `resource` this slot can hold in total.
    #[must_use]
    pub fn capacity_for(&self, resource: &R) -> u64 {
        self.state.capacity.min(resource.max_amount())
    }

    /// Returns the capacity for the resource currently held, or the
    /// configured capacity if empty.
    #[must_use]
    pub fn real_capacity(&self) -> u64 {
        match self.state.contents.borrow().resource() {
            Some(resource) => self.capacity_for(resource),
            None => self.state.capacity,
        }
    }

    /// Returns `true` if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.contents.borrow().is_empty()
    }

    /// Returns `true` if the held amount reached the real capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        !self.is_empty() && self.amount() >= self.real_capacity()
    }

    /// Returns `true` if this slot holds `resource`. A `None` tag matches any
    /// tag.
    #[must_use]
    pub fn contains(&self, resource: &R, tag: Option<&Tag>) -> bool {
        self.holds(resource, TagMatch::from_query(tag))
    }

    pub(crate) fn holds(&self, resource: &R, tag: TagMatch<'_>) -> bool {
        self.state
            .contents
            .borrow()
            .variant()
            .is_some_and(|held| held.resource() == resource && tag.accepts(held.tag()))
    }

    /// Returns the filter applied on insertion.
    #[must_use]
    pub fn filter(&self) -> &ResourceFilter<R> {
        &self.state.filter
    }

    /// Returns the filter reported to automation and screens. Defaults to the
    /// insertion filter.
    #[must_use]
    pub fn strict_filter(&self) -> &ResourceFilter<R> {
        &self.state.strict_filter
    }

    /// Tests `resource` against the strict filter.
    #[must_use]
    pub fn matches_strict(&self, resource: &R, tag: Option<&Tag>) -> bool {
        self.state.strict_filter.test(resource, tag)
    }

    /// Returns the display metadata.
    #[must_use]
    pub fn display(&self) -> &SlotDisplay {
        &self.state.display
    }

    /// Returns the modification count, which changes whenever the contents do.
    #[must_use]
    pub fn mod_count(&self) -> u64 {
        self.state.mod_count.get()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Insertion
    // ─────────────────────────────────────────────────────────────────────

    /// Returns `true` if `resource` could be inserted at all: the filter
    /// accepts it, the slot is empty or holds the same variant, and `amount`
    /// is positive. Capacity is not considered.
    #[must_use]
    pub fn can_insert(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> bool {
        amount > 0
            && self.state.filter.test(resource, tag)
            && self
                .state
                .contents
                .borrow()
                .variant()
                .is_none_or(|held| held.is(resource, tag))
    }

    /// Returns `true` if all of `amount` would fit.
    #[must_use]
    pub fn can_insert_exact(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> bool {
        amount > 0 && self.simulate_insert(resource, tag, amount) == amount
    }

    /// Returns how much of `amount` [`insert`](Self::insert) would accept,
    /// without changing anything.
    #[must_use]
    pub fn simulate_insert(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> u64 {
        if !self.can_insert(resource, tag, amount) {
            return 0;
        }
        self.capacity_for(resource)
            .saturating_sub(self.amount())
            .min(amount)
    }

    /// Inserts up to `amount` of `resource` with `tag`, returning the amount
    /// accepted.
    pub fn insert(
        &self,
        resource: &R,
        tag: Option<&Tag>,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> u64 {
        let inserted = self.simulate_insert(resource, tag, amount);
        if inserted > 0 {
            let variant = ResourceVariant::with_tag(resource.clone(), tag.cloned());
            self.mutate(transaction, |contents| contents.grow(&variant, inserted));
            tracing::trace!(resource = %resource.id(), requested = amount, inserted, "slot insert");
        }
        inserted
    }

    // ─────────────────────────────────────────────────────────────────────
    // Extraction
    // ─────────────────────────────────────────────────────────────────────

    /// Returns `true` if all of `amount` could be extracted.
    #[must_use]
    pub fn can_extract(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> bool {
        amount > 0 && self.simulate_extract(resource, tag, amount) == amount
    }

    /// Returns how much of `amount` [`extract`](Self::extract) would remove,
    /// without changing anything.
    #[must_use]
    pub fn simulate_extract(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> u64 {
        self.extractable(resource, TagMatch::from_query(tag), amount)
    }

    fn extractable(&self, resource: &R, tag: TagMatch<'_>, amount: u64) -> u64 {
        if self.holds(resource, tag) {
            self.amount().min(amount)
        } else {
            0
        }
    }

    /// Extracts up to `amount` of `resource`, returning the amount removed.
    ///
    /// A `None` tag matches whatever tag the contents carry; `Some(tag)`
    /// matches only that tag (an empty tag matching untagged contents).
    pub fn extract(
        &self,
        resource: &R,
        tag: Option<&Tag>,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> u64 {
        self.extract_matching(resource, TagMatch::from_query(tag), amount, transaction)
    }

    pub(crate) fn extract_matching(
        &self,
        resource: &R,
        tag: TagMatch<'_>,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> u64 {
        let extracted = self.extractable(resource, tag, amount);
        if extracted > 0 {
            self.mutate(transaction, |contents| contents.shrink(extracted));
            tracing::trace!(resource = %resource.id(), requested = amount, extracted, "slot extract");
        }
        extracted
    }

    /// Extracts a single unit, returning whether it was removed.
    pub fn extract_one(
        &self,
        resource: &R,
        tag: Option<&Tag>,
        transaction: Option<&Transaction<'_>>,
    ) -> bool {
        self.extract_exact(resource, tag, 1, transaction)
    }

    /// Extracts exactly `amount`, or nothing if less is available.
    pub fn extract_exact(
        &self,
        resource: &R,
        tag: Option<&Tag>,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> bool {
        if !self.can_extract(resource, tag, amount) {
            return false;
        }
        self.extract(resource, tag, amount, transaction) == amount
    }

    /// Extracts up to `amount` of whatever the slot holds.
    pub fn extract_any(
        &self,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> ResourceStack<R> {
        let Some(variant) = self.variant() else {
            return ResourceStack::empty();
        };
        let extracted = self.amount().min(amount);
        if extracted > 0 {
            self.mutate(transaction, |contents| contents.shrink(extracted));
        }
        ResourceStack::new(variant, extracted)
    }

    /// Replaces the contents outright, bypassing the filter.
    ///
    /// Like [`insert`](Self::insert), the change is undone if `transaction`
    /// aborts.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidAmount`] if `amount` exceeds the
    /// capacity for `resource`.
    pub fn set(
        &self,
        resource: &R,
        tag: Option<&Tag>,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> Result<(), StorageError> {
        let capacity = self.capacity_for(resource);
        if amount > capacity {
            return Err(StorageError::InvalidAmount { amount, capacity });
        }
        let stack = ResourceStack::new(
            ResourceVariant::with_tag(resource.clone(), tag.cloned()),
            amount,
        );
        self.mutate(transaction, |contents| *contents = stack);
        Ok(())
    }

    fn mutate(
        &self,
        transaction: Option<&Transaction<'_>>,
        change: impl FnOnce(&mut ResourceStack<R>),
    ) {
        if let Some(transaction) = transaction {
            update_snapshots(&self.state, transaction);
        }
        change(&mut *self.state.contents.borrow_mut());
        self.bump();
        if let Some(owner) = self.state.owner.get() {
            owner.mark_modified(transaction);
        }
    }

    fn bump(&self) {
        self.state
            .mod_count
            .set(self.state.mod_count.get().wrapping_add(1));
    }

    /// Loads contents without notifying the owner.
    fn load(&self, stack: ResourceStack<R>) {
        *self.state.contents.borrow_mut() = stack;
        self.bump();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────

    /// Serializes the contents as a tag.
    ///
    /// An empty slot is written as `{"present": false}`; a filled slot adds
    /// `resource`, `tag` (when tagged) and `amount`.
    #[must_use]
    pub fn create_tag(&self) -> Value {
        let contents = self.state.contents.borrow();
        let record = SlotRecord {
            present: !contents.is_empty(),
            resource: contents.resource().cloned(),
            tag: contents.tag().cloned(),
            amount: contents.amount(),
        };
        serde_json::to_value(record).unwrap_or_else(|err| {
            tracing::warn!(%err, "failed to serialize slot; writing it as empty");
            serde_json::json!({ "present": false })
        })
    }

    /// Restores contents written by [`create_tag`](Self::create_tag).
    ///
    /// Malformed or inconsistent data leaves the slot empty (or clamped to its
    /// capacity) instead of failing.
    pub fn read_tag(&self, value: &Value) {
        let record = match SlotRecord::<R>::deserialize(value) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(%err, "malformed slot data; slot left empty");
                self.load(ResourceStack::empty());
                return;
            }
        };

        let stack = match record {
            SlotRecord {
                present: true,
                resource: Some(resource),
                tag,
                amount,
            } => {
                let capacity = self.capacity_for(&resource);
                if amount > capacity {
                    tracing::warn!(
                        resource = %resource.id(),
                        amount,
                        capacity,
                        "stored amount exceeds slot capacity; clamping"
                    );
                }
                ResourceStack::new(ResourceVariant::with_tag(resource, tag), amount.min(capacity))
            }
            SlotRecord { present: true, .. } => {
                tracing::warn!("slot marked present without a resource; slot left empty");
                ResourceStack::empty()
            }
            SlotRecord { present: false, .. } => ResourceStack::empty(),
        };
        self.load(stack);
    }

    /// Writes the contents to a packet.
    pub fn write_packet(&self, buf: &mut PacketBuf) {
        let contents = self.state.contents.borrow();
        match contents.variant() {
            Some(variant) => {
                buf.write_bool(true);
                variant.resource().encode(buf);
                Tag::write_optional(variant.tag(), buf);
                buf.write_varint(contents.amount());
            }
            None => buf.write_bool(false),
        }
    }

    /// Reads contents written by [`write_packet`](Self::write_packet).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed or the amount exceeds the
    /// capacity. The slot is left unchanged on error.
    pub fn read_packet(&self, buf: &mut PacketBuf) -> Result<(), PacketError> {
        if !buf.read_bool()? {
            self.load(ResourceStack::empty());
            return Ok(());
        }
        let resource = R::decode(buf)?;
        let tag = Tag::read_optional(buf)?;
        let amount = buf.read_varint()?;
        let capacity = self.capacity_for(&resource);
        if amount > capacity {
            return Err(PacketError::InvalidData(format!(
                "amount {amount} exceeds slot capacity {capacity}"
            )));
        }
        self.load(ResourceStack::new(ResourceVariant::with_tag(resource, tag), amount));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Fluid, Identifier, Item};
    use serde_json::json;

    fn fluid(path: &str) -> Fluid {
        Fluid::new(Identifier::new("minecraft", path).unwrap())
    }

    fn item(path: &str) -> Item {
        Item::new(Identifier::new("minecraft", path).unwrap())
    }

    fn tank(capacity: u64) -> ResourceSlot<Fluid> {
        ResourceSlot::builder().capacity(capacity).build().unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Insert
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn insert_is_capped_by_capacity() {
        let slot = ResourceSlot::<Item>::builder().capacity(64).build().unwrap();
        assert_eq!(slot.insert(&item("diamond"), None, 100, None), 64);
        assert_eq!(slot.resource(), Some(item("diamond")));
        assert_eq!(slot.amount(), 64);
        assert!(slot.is_full());
    }

    #[test]
    fn insert_respects_item_max_stack() {
        let slot = ResourceSlot::<Item>::builder().build().unwrap();
        let pearl = item("ender_pearl").with_max_stack(16);
        assert_eq!(slot.insert(&pearl, None, 20, None), 16);
        assert_eq!(slot.real_capacity(), 16);
        assert!(slot.is_full());
    }

    #[test]
    fn insert_rejects_other_variants() {
        let slot = tank(1000);
        let tagged = Tag::new().with("temperature", json!(400));
        slot.insert(&fluid("water"), None, 10, None);
        assert!(!slot.can_insert(&fluid("lava"), None, 1));
        assert_eq!(slot.insert(&fluid("lava"), None, 10, None), 0);
        assert_eq!(slot.insert(&fluid("water"), Some(&tagged), 10, None), 0);
        assert_eq!(slot.insert(&fluid("water"), Some(&Tag::new()), 10, None), 10);
        assert_eq!(slot.amount(), 20);
    }

    #[test]
    fn zero_insert_is_rejected() {
        let slot = tank(1000);
        assert!(!slot.can_insert(&fluid("water"), None, 0));
        assert_eq!(slot.insert(&fluid("water"), None, 0, None), 0);
        assert_eq!(slot.mod_count(), 0);
    }

    #[test]
    fn filter_gates_insertion_only() {
        let slot = ResourceSlot::<Fluid>::builder()
            .capacity(1000)
            .filter(ResourceFilter::resource(fluid("water")))
            .strict_filter(ResourceFilter::none())
            .build()
            .unwrap();
        assert_eq!(slot.insert(&fluid("lava"), None, 10, None), 0);
        assert_eq!(slot.insert(&fluid("water"), None, 10, None), 10);
        assert!(!slot.matches_strict(&fluid("water"), None));
    }

    #[test]
    fn can_insert_ignores_capacity() {
        let slot = tank(10);
        slot.insert(&fluid("water"), None, 10, None);
        assert!(slot.can_insert(&fluid("water"), None, 5));
        assert!(!slot.can_insert_exact(&fluid("water"), None, 5));
    }

    #[test]
    fn insert_near_u64_max_saturates() {
        let slot = tank(u64::MAX);
        slot.set(&fluid("water"), None, u64::MAX - 5, None).unwrap();
        assert_eq!(slot.insert(&fluid("water"), None, u64::MAX, None), 5);
        assert_eq!(slot.amount(), u64::MAX);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Extract
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn extract_mismatched_resource_returns_zero() {
        let slot = tank(81_000);
        slot.set(&fluid("water"), None, 1000, None).unwrap();
        assert_eq!(slot.extract(&fluid("lava"), None, 500, None), 0);
        assert_eq!(slot.amount(), 1000);
        assert_eq!(slot.resource(), Some(fluid("water")));
    }

    #[test]
    fn extract_tag_matching() {
        let slot = tank(1000);
        let hot = Tag::new().with("temperature", json!(1300));
        let cold = Tag::new().with("temperature", json!(10));
        slot.set(&fluid("water"), Some(&hot), 100, None).unwrap();

        assert_eq!(slot.simulate_extract(&fluid("water"), Some(&cold), 10), 0);
        assert_eq!(slot.simulate_extract(&fluid("water"), Some(&Tag::new()), 10), 0);
        assert_eq!(slot.simulate_extract(&fluid("water"), Some(&hot), 10), 10);
        assert_eq!(slot.extract(&fluid("water"), None, 10, None), 10);
        assert_eq!(slot.amount(), 90);
    }

    #[test]
    fn draining_resets_to_empty() {
        let slot = tank(1000);
        let tag = Tag::new().with("a", json!(1));
        slot.set(&fluid("water"), Some(&tag), 100, None).unwrap();
        assert_eq!(slot.extract(&fluid("water"), None, 500, None), 100);
        assert!(slot.is_empty());
        assert_eq!(slot.tag(), None);
        assert_eq!(slot.stack(), ResourceStack::empty());
    }

    #[test]
    fn exact_extraction_is_all_or_nothing() {
        let slot = tank(1000);
        slot.set(&fluid("water"), None, 5, None).unwrap();
        assert!(!slot.extract_exact(&fluid("water"), None, 6, None));
        assert_eq!(slot.amount(), 5);
        assert!(slot.extract_exact(&fluid("water"), None, 5, None));
        assert!(slot.is_empty());
        assert!(!slot.extract_one(&fluid("water"), None, None));
    }

    #[test]
    fn extract_any_drains_whatever_is_held() {
        let slot = tank(1000);
        assert!(slot.extract_any(10, None).is_empty());
        slot.set(&fluid("lava"), None, 30, None).unwrap();
        let taken = slot.extract_any(10, None);
        assert_eq!(taken.resource(), Some(&fluid("lava")));
        assert_eq!(taken.amount(), 10);
        assert_eq!(slot.amount(), 20);
    }

    #[test]
    fn set_rejects_amount_over_capacity() {
        let slot = tank(100);
        assert_eq!(
            slot.set(&fluid("water"), None, 101, None),
            Err(StorageError::InvalidAmount {
                amount: 101,
                capacity: 100
            })
        );
        assert!(slot.is_empty());
        slot.set(&fluid("water"), None, 0, None).unwrap();
        assert!(slot.is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn abort_restores_contents_and_mod_count() {
        let slot = tank(1000);
        slot.set(&fluid("water"), None, 100, None).unwrap();
        let before = (slot.stack(), slot.mod_count());

        let transaction = Transaction::open_outer();
        slot.extract(&fluid("water"), None, 100, Some(&transaction));
        slot.insert(&fluid("lava"), None, 50, Some(&transaction));
        assert_eq!(slot.resource(), Some(fluid("lava")));
        transaction.abort();

        assert_eq!((slot.stack(), slot.mod_count()), before);
    }

    #[test]
    fn set_joins_the_transaction() {
        let slot = tank(1000);

        let transaction = Transaction::open_outer();
        slot.insert(&fluid("water"), None, 10, Some(&transaction));
        slot.set(&fluid("water"), None, 500, Some(&transaction)).unwrap();
        transaction.commit();
        assert_eq!(slot.amount(), 500);

        let transaction = Transaction::open_outer();
        slot.insert(&fluid("water"), None, 10, Some(&transaction));
        slot.set(&fluid("lava"), None, 20, Some(&transaction)).unwrap();
        transaction.abort();
        assert_eq!(slot.resource(), Some(fluid("water")));
        assert_eq!(slot.amount(), 500);
    }

    #[test]
    fn commit_keeps_contents() {
        let slot = tank(1000);
        let transaction = Transaction::open_outer();
        slot.insert(&fluid("water"), None, 100, Some(&transaction));
        transaction.commit();
        assert_eq!(slot.amount(), 100);
        assert_eq!(slot.mod_count(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn tag_format() {
        let slot = tank(1000);
        assert_eq!(slot.create_tag(), json!({"present": false}));

        let tag = Tag::new().with("purity", json!(0.5));
        slot.set(&fluid("water"), Some(&tag), 250, None).unwrap();
        assert_eq!(
            slot.create_tag(),
            json!({
                "present": true,
                "resource": {"id": "minecraft:water"},
                "tag": {"purity": 0.5},
                "amount": 250,
            })
        );
    }

    #[test]
    fn tag_round_trip() {
        let source = tank(1000);
        source
            .set(&fluid("water"), Some(&Tag::new().with("x", json!(1))), 42, None)
            .unwrap();
        let target = tank(1000);
        target.read_tag(&source.create_tag());
        assert_eq!(target.stack(), source.stack());
    }

    #[test]
    fn malformed_tags_yield_empty_slots() {
        let slot = tank(1000);
        for malformed in [
            json!(null),
            json!("water"),
            json!({"present": true}),
            json!({"present": true, "resource": {"id": "NOT VALID"}, "amount": 5}),
            json!({"present": true, "resource": {"id": "minecraft:water"}, "amount": -5}),
        ] {
            slot.set(&fluid("lava"), None, 10, None).unwrap();
            slot.read_tag(&malformed);
            assert!(slot.is_empty(), "{malformed} should load as empty");
        }
    }

    #[test]
    fn untagged_records_load_without_optional_fields() {
        let slot = tank(1000);
        slot.read_tag(&json!({
            "present": true,
            "resource": {"id": "minecraft:water"},
            "amount": 40,
        }));
        assert_eq!(slot.resource(), Some(fluid("water")));
        assert_eq!(slot.tag(), None);
        assert_eq!(slot.amount(), 40);

        slot.read_tag(&json!({"present": false}));
        assert!(slot.is_empty());
    }

    #[test]
    fn oversized_tag_amount_is_clamped() {
        let slot = tank(100);
        slot.read_tag(&json!({
            "present": true,
            "resource": {"id": "minecraft:water"},
            "amount": 5000,
        }));
        assert_eq!(slot.amount(), 100);
    }

    #[test]
    fn packet_round_trip() {
        let source = tank(1000);
        let target = tank(1000);
        source
            .set(&fluid("lava"), Some(&Tag::new().with("y", json!(true))), 7, None)
            .unwrap();

        let mut buf = PacketBuf::new();
        source.write_packet(&mut buf);
        target.read_packet(&mut buf).unwrap();
        assert!(buf.is_empty());
        assert_eq!(target.stack(), source.stack());

        let empty = tank(1000);
        empty.write_packet(&mut buf);
        target.read_packet(&mut buf).unwrap();
        assert!(target.is_empty());
    }

    #[test]
    fn packet_amount_over_capacity_is_rejected() {
        let source = tank(1000);
        source.set(&fluid("water"), None, 1000, None).unwrap();
        let mut buf = PacketBuf::new();
        source.write_packet(&mut buf);

        let small = tank(10);
        assert!(matches!(
            small.read_packet(&mut buf),
            Err(PacketError::InvalidData(_))
        ));
        assert!(small.is_empty());
    }
}
