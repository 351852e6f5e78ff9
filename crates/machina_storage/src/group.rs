//! Slot groups.
//!
//! A [`SlotGroup`] is an ordered, fixed set of slots that share a role in a
//! machine (all input slots, all output tanks). Group operations walk the
//! member slots in declaration order:
//!
//! - **insert** fills slots already holding the resource first, then empty
//!   slots, so stacks are not fragmented
//! - **extract** drains matching slots front to back
//!
//! Every group operation accepts the same optional transaction as slot
//! operations; with a transaction, the whole walk rolls back on abort.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::borrow::Cow;

use machina_transaction::Transaction;
use serde_json::Value;

use crate::error::PacketError;
use crate::io::ResourceFlow;
use crate::packet::PacketBuf;
use crate::resource::{Resource, Tag};
use crate::slot::{ResourceSlot, TagMatch};

// ─────────────────────────────────────────────────────────────────────────────
// InputType
// ─────────────────────────────────────────────────────────────────────────────

/// Who may move resources in and out of a group.
///
/// Players can always take resources out of a slot; the other rights depend
/// on the group role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    /// Machine inputs: automation may insert, players may insert and extract.
    Input,
    /// Machine outputs: automation may extract, players may only extract.
    Output,
    /// General storage: anyone may insert and extract.
    Storage,
    /// Player-only slots such as battery slots: automation may not touch them.
    Transfer,
}

impl InputType {
    /// Returns `true` if automation may insert.
    #[must_use]
    pub fn external_insertion(self) -> bool {
        matches!(self, Self::Input | Self::Storage)
    }

    /// Returns `true` if automation may extract.
    #[must_use]
    pub fn external_extraction(self) -> bool {
        matches!(self, Self::Output | Self::Storage)
    }

    /// Returns `true` if players may insert.
    #[must_use]
    pub fn player_insertion(self) -> bool {
        !matches!(self, Self::Output)
    }

    /// Returns `true` if players may extract.
    #[must_use]
    pub fn player_extraction(self) -> bool {
        true
    }

    /// Returns the direction automation may move resources, or `None` if it
    /// may not touch the group.
    #[must_use]
    pub fn external_flow(self) -> Option<ResourceFlow> {
        match (self.external_insertion(), self.external_extraction()) {
            (true, true) => Some(ResourceFlow::Both),
            (true, false) => Some(ResourceFlow::Input),
            (false, true) => Some(ResourceFlow::Output),
            (false, false) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SlotGroupType
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a group within a storage.
///
/// Types are compared by name, so a storage can never hold two groups with
/// the same name.
#[derive(Debug, Clone)]
pub struct SlotGroupType {
    name: Cow<'static, str>,
    input_type: InputType,
}

impl SlotGroupType {
    /// Machine inputs.
    pub const INPUT: Self = Self::from_static("input", InputType::Input);
    /// Machine outputs.
    pub const OUTPUT: Self = Self::from_static("output", InputType::Output);
    /// General storage.
    pub const STORAGE: Self = Self::from_static("storage", InputType::Storage);

    /// Creates a group type.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, input_type: InputType) -> Self {
        Self {
            name: name.into(),
            input_type,
        }
    }

    /// Creates a group type with a static name, usable in constants.
    #[must_use]
    pub const fn from_static(name: &'static str, input_type: InputType) -> Self {
        Self {
            name: Cow::Borrowed(name),
            input_type,
        }
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the access policy.
    #[must_use]
    pub fn input_type(&self) -> InputType {
        self.input_type
    }
}

impl PartialEq for SlotGroupType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for SlotGroupType {}

impl Hash for SlotGroupType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for SlotGroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Slot walks
// ─────────────────────────────────────────────────────────────────────────────

/// Inserts across `slots`: first into slots holding the variant, then into
/// empty slots.
pub(crate) fn insert_into<'a, R: Resource>(
    slots: impl Iterator<Item = &'a ResourceSlot<R>> + Clone,
    resource: &R,
    tag: Option<&Tag>,
    amount: u64,
    transaction: Option<&Transaction<'_>>,
) -> u64 {
    let mut inserted = 0u64;
    for merging in [true, false] {
        for slot in slots.clone() {
            if inserted == amount {
                return inserted;
            }
            if slot.is_empty() == merging {
                continue;
            }
            inserted += slot.insert(resource, tag, amount - inserted, transaction);
        }
    }
    inserted
}

/// Same walk as [`insert_into`], without mutation.
pub(crate) fn simulate_insert_into<'a, R: Resource>(
    slots: impl Iterator<Item = &'a ResourceSlot<R>> + Clone,
    resource: &R,
    tag: Option<&Tag>,
    amount: u64,
) -> u64 {
    let mut inserted = 0u64;
    for merging in [true, false] {
        for slot in slots.clone() {
            if slot.is_empty() != merging {
                inserted += slot.simulate_insert(resource, tag, amount - inserted);
            }
        }
    }
    inserted
}

/// Extracts front to back from slots holding `resource`.
pub(crate) fn extract_from<'a, R: Resource>(
    slots: impl Iterator<Item = &'a ResourceSlot<R>>,
    resource: &R,
    tag: TagMatch<'_>,
    amount: u64,
    transaction: Option<&Transaction<'_>>,
) -> u64 {
    let mut extracted = 0u64;
    for slot in slots {
        if extracted == amount {
            break;
        }
        extracted += slot.extract_matching(resource, tag, amount - extracted, transaction);
    }
    extracted
}

// ─────────────────────────────────────────────────────────────────────────────
// SlotGroup
// ─────────────────────────────────────────────────────────────────────────────

/// An ordered, fixed collection of slots holding one kind of resource.
///
/// # Example
///
/// ```
/// use machina_storage::prelude::*;
///
/// let stone = Item::new(Identifier::parse("minecraft:stone").unwrap());
/// let builder = ResourceSlot::<Item>::builder();
/// let group = SlotGroup::new([builder.build().unwrap(), builder.build().unwrap()]);
///
/// group.slot(0).unwrap().set(&stone, None, 10, None).unwrap();
/// assert_eq!(group.insert(&stone, None, 60, None), 60);
/// assert_eq!(group.slot(0).unwrap().amount(), 64);
/// assert_eq!(group.slot(1).unwrap().amount(), 6);
/// ```
pub struct SlotGroup<R: Resource> {
    slots: Vec<ResourceSlot<R>>,
}

impl<R: Resource> fmt::Debug for SlotGroup<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.slots).finish()
    }
}

impl<R: Resource> SlotGroup<R> {
    /// Creates a group from slots, in order.
    #[must_use]
    pub fn new(slots: impl IntoIterator<Item = ResourceSlot<R>>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    /// Creates a group holding a single slot.
    #[must_use]
    pub fn of(slot: ResourceSlot<R>) -> Self {
        Self { slots: vec![slot] }
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns the slot at `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&ResourceSlot<R>> {
        self.slots.get(index)
    }

    /// Returns all slots in order.
    #[must_use]
    pub fn slots(&self) -> &[ResourceSlot<R>] {
        &self.slots
    }

    /// Iterates over the slots in order.
    pub fn iter(&self) -> core::slice::Iter<'_, ResourceSlot<R>> {
        self.slots.iter()
    }

    /// Returns `true` if every slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(ResourceSlot::is_empty)
    }

    /// Returns `true` if every slot is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(ResourceSlot::is_full)
    }

    /// Returns `true` if any slot holds `resource`, with any tag.
    #[must_use]
    pub fn contains_any(&self, resource: &R) -> bool {
        self.slots.iter().any(|slot| slot.contains(resource, None))
    }

    /// Returns the total amount of `resource` held. A `None` tag counts every
    /// tag.
    #[must_use]
    pub fn count(&self, resource: &R, tag: Option<&Tag>) -> u64 {
        self.slots
            .iter()
            .filter(|slot| slot.contains(resource, tag))
            .map(ResourceSlot::amount)
            .fold(0, u64::saturating_add)
    }

    /// Returns the sum of the member slots' modification counts.
    #[must_use]
    pub fn mod_count(&self) -> u64 {
        self.slots
            .iter()
            .map(ResourceSlot::mod_count)
            .fold(0, u64::wrapping_add)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Insertion
    // ─────────────────────────────────────────────────────────────────────

    /// Returns `true` if all of `amount` would fit.
    #[must_use]
    pub fn can_insert(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> bool {
        amount > 0 && self.simulate_insert(resource, tag, amount) == amount
    }

    /// Returns how much [`insert`](Self::insert) would accept.
    #[must_use]
    pub fn simulate_insert(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> u64 {
        simulate_insert_into(self.slots.iter(), resource, tag, amount)
    }

    /// Distributes up to `amount` across the group: slots already holding the
    /// variant first, then empty slots.
    pub fn insert(
        &self,
        resource: &R,
        tag: Option<&Tag>,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> u64 {
        insert_into(self.slots.iter(), resource, tag, amount, transaction)
    }

    /// Inserts into the single best slot: the first one already holding the
    /// variant with room left, else the first empty slot that accepts it.
    pub fn insert_single(
        &self,
        resource: &R,
        tag: Option<&Tag>,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> u64 {
        let target = self
            .slots
            .iter()
            .filter(|slot| !slot.is_empty())
            .chain(self.slots.iter().filter(|slot| slot.is_empty()))
            .find(|slot| slot.simulate_insert(resource, tag, amount) > 0);
        target.map_or(0, |slot| slot.insert(resource, tag, amount, transaction))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Extraction
    // ─────────────────────────────────────────────────────────────────────

    /// Returns `true` if all of `amount` could be extracted.
    #[must_use]
    pub fn can_extract(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> bool {
        amount > 0 && self.simulate_extract(resource, tag, amount) == amount
    }

    /// Returns how much [`extract`](Self::extract) would remove.
    #[must_use]
    pub fn simulate_extract(&self, resource: &R, tag: Option<&Tag>, amount: u64) -> u64 {
        self.count(resource, tag).min(amount)
    }

    /// Drains up to `amount` front to back. A `None` tag matches any tag.
    pub fn extract(
        &self,
        resource: &R,
        tag: Option<&Tag>,
        amount: u64,
        transaction: Option<&Transaction<'_>>,
    ) -> u64 {
        extract_from(
            self.slots.iter(),
            resource,
            TagMatch::from_query(tag),
            amount,
            transaction,
        )
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

    // ─────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────

    /// Serializes the slots, in order, as a JSON array.
    #[must_use]
    pub fn create_tag(&self) -> Value {
        Value::Array(self.slots.iter().map(ResourceSlot::create_tag).collect())
    }

    /// Restores slots written by [`create_tag`](Self::create_tag). Missing or
    /// malformed entries leave the corresponding slots empty.
    pub fn read_tag(&self, value: &Value) {
        let entries = match value.as_array() {
            Some(entries) => entries.as_slice(),
            None => {
                tracing::warn!("slot group data is not a list; slots left empty");
                &[]
            }
        };
        if !entries.is_empty() && entries.len() != self.slots.len() {
            tracing::warn!(
                stored = entries.len(),
                slots = self.slots.len(),
                "slot count changed since the group was saved"
            );
        }
        for (index, slot) in self.slots.iter().enumerate() {
            slot.read_tag(entries.get(index).unwrap_or(&Value::Null));
        }
    }

    /// Writes every slot, in order.
    pub fn write_packet(&self, buf: &mut PacketBuf) {
        for slot in &self.slots {
            slot.write_packet(buf);
        }
    }

    /// Reads slots written by [`write_packet`](Self::write_packet).
    ///
    /// # Errors
    ///
    /// Returns the first slot error; earlier slots keep their new contents.
    pub fn read_packet(&self, buf: &mut PacketBuf) -> Result<(), PacketError> {
        for slot in &self.slots {
            slot.read_packet(buf)?;
        }
        Ok(())
    }
}

impl<'a, R: Resource> IntoIterator for &'a SlotGroup<R> {
    type Item = &'a ResourceSlot<R>;
    type IntoIter = core::slice::Iter<'a, ResourceSlot<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ResourceFilter;
    use crate::resource::{Identifier, Item};
    use serde_json::json;

    fn item(path: &str) -> Item {
        Item::new(Identifier::new("minecraft", path).unwrap())
    }

    fn group(size: usize) -> SlotGroup<Item> {
        let builder = ResourceSlot::<Item>::builder();
        SlotGroup::new((0..size).map(|_| builder.build().unwrap()))
    }

    fn amounts(group: &SlotGroup<Item>) -> Vec<u64> {
        group.iter().map(ResourceSlot::amount).collect()
    }

    #[test]
    fn input_types_follow_access_table() {
        assert_eq!(InputType::Input.external_flow(), Some(ResourceFlow::Input));
        assert_eq!(InputType::Output.external_flow(), Some(ResourceFlow::Output));
        assert_eq!(InputType::Storage.external_flow(), Some(ResourceFlow::Both));
        assert_eq!(InputType::Transfer.external_flow(), None);
        assert!(!InputType::Output.player_insertion());
        assert!(InputType::Transfer.player_insertion());
        assert!(InputType::Output.player_extraction());
    }

    #[test]
    fn group_types_compare_by_name() {
        let custom = SlotGroupType::new("input", InputType::Storage);
        assert_eq!(custom, SlotGroupType::INPUT);
        assert_ne!(SlotGroupType::INPUT, SlotGroupType::OUTPUT);
        assert_eq!(SlotGroupType::OUTPUT.to_string(), "output");
    }

    #[test]
    fn insert_tops_up_before_using_empty_slots() {
        let group = group(2);
        group.slot(0).unwrap().set(&item("x"), None, 10, None).unwrap();
        assert_eq!(group.insert(&item("x"), None, 60, None), 60);
        assert_eq!(amounts(&group), vec![64, 6]);
    }

    #[test]
    fn insert_prefers_matching_slots_over_earlier_empty_ones() {
        let group = group(3);
        group.slot(2).unwrap().set(&item("x"), None, 60, None).unwrap();
        assert_eq!(group.insert(&item("x"), None, 10, None), 10);
        assert_eq!(amounts(&group), vec![6, 0, 64]);
    }

    #[test]
    fn insert_skips_slots_with_other_resources() {
        let group = group(2);
        group.slot(0).unwrap().set(&item("y"), None, 1, None).unwrap();
        assert_eq!(group.insert(&item("x"), None, 100, None), 64);
        assert_eq!(amounts(&group), vec![1, 64]);
        assert_eq!(group.simulate_insert(&item("x"), None, 1), 0);
        assert!(!group.is_full());
    }

    #[test]
    fn simulate_insert_matches_insert() {
        let group = group(3);
        group.slot(1).unwrap().set(&item("x"), None, 30, None).unwrap();
        let before = amounts(&group);
        let simulated = group.simulate_insert(&item("x"), None, 100);
        assert_eq!(amounts(&group), before);
        assert_eq!(group.insert(&item("x"), None, 100, None), simulated);
    }

    #[test]
    fn insert_single_targets_one_slot() {
        let group = group(3);
        group.slot(1).unwrap().set(&item("x"), None, 60, None).unwrap();
        assert_eq!(group.insert_single(&item("x"), None, 10, None), 4);
        assert_eq!(amounts(&group), vec![0, 64, 0]);
        assert_eq!(group.insert_single(&item("x"), None, 10, None), 10);
        assert_eq!(amounts(&group), vec![10, 64, 0]);
    }

    #[test]
    fn extract_drains_front_to_back() {
        let group = group(3);
        group.slot(0).unwrap().set(&item("x"), None, 5, None).unwrap();
        group.slot(1).unwrap().set(&item("y"), None, 5, None).unwrap();
        group.slot(2).unwrap().set(&item("x"), None, 5, None).unwrap();

        assert_eq!(group.count(&item("x"), None), 10);
        assert_eq!(group.extract(&item("x"), None, 7, None), 7);
        assert_eq!(amounts(&group), vec![0, 5, 3]);
        assert!(group.contains_any(&item("y")));
        assert!(!group.is_empty());
    }

    #[test]
    fn exact_extraction_leaves_group_untouched_on_shortfall() {
        let group = group(2);
        group.slot(0).unwrap().set(&item("x"), None, 3, None).unwrap();
        group.slot(1).unwrap().set(&item("x"), None, 3, None).unwrap();
        assert!(!group.extract_exact(&item("x"), None, 7, None));
        assert_eq!(amounts(&group), vec![3, 3]);
        assert!(group.extract_exact(&item("x"), None, 6, None));
        assert!(group.is_empty());
        assert!(!group.extract_one(&item("x"), None, None));
    }

    #[test]
    fn extract_one_consumes_a_single_unit() {
        let group = group(1);
        group.slot(0).unwrap().set(&item("coal"), None, 2, None).unwrap();
        assert!(group.extract_one(&item("coal"), None, None));
        assert_eq!(group.count(&item("coal"), None), 1);
    }

    #[test]
    fn filtered_slots_are_skipped() {
        let only_x = ResourceSlot::<Item>::builder()
            .filter(ResourceFilter::resource(item("x")))
            .build()
            .unwrap();
        let any = ResourceSlot::<Item>::builder().build().unwrap();
        let group = SlotGroup::new([only_x, any]);
        assert_eq!(group.insert(&item("y"), None, 10, None), 10);
        assert_eq!(amounts(&group), vec![0, 10]);
    }

    #[test]
    fn aborted_group_insert_rolls_back_every_slot() {
        let group = group(2);
        let transaction = Transaction::open_outer();
        assert_eq!(group.insert(&item("x"), None, 100, Some(&transaction)), 100);
        transaction.abort();
        assert!(group.is_empty());
        assert_eq!(group.mod_count(), 0);
    }

    #[test]
    fn tag_round_trip_and_short_data() {
        let source = group(2);
        source.slot(1).unwrap().set(&item("x"), None, 9, None).unwrap();
        let target = group(2);
        target.read_tag(&source.create_tag());
        assert_eq!(amounts(&target), vec![0, 9]);

        target.read_tag(&json!([{"present": true, "resource": {"id": "minecraft:x"}, "amount": 2}]));
        assert_eq!(amounts(&target), vec![2, 0]);

        target.read_tag(&json!({"not": "a list"}));
        assert!(target.is_empty());
    }

    #[test]
    fn packet_round_trip() {
        let source = group(3);
        source.slot(0).unwrap().set(&item("x"), None, 1, None).unwrap();
        source.slot(2).unwrap().set(&item("y"), None, 2, None).unwrap();
        let mut buf = PacketBuf::new();
        source.write_packet(&mut buf);

        let target = group(3);
        target.read_packet(&mut buf).unwrap();
        assert_eq!(amounts(&target), vec![1, 0, 2]);
        assert_eq!(target.slot(2).unwrap().resource(), Some(item("y")));
    }
}
