//! External exposure of machine storages.
//!
//! Pipes, conveyors and other automation never see a [`ResourceStorage`]
//! directly. Each side of a machine is configured with an [`IoFace`] which
//! produces an [`ExposedStorage`]: a view limited to the groups whose
//! [`InputType`](crate::group::InputType) grants external access, narrowed
//! further by a [`ResourceFlow`] and a [`Matching`] rule.

use core::fmt;

use machina_transaction::Transaction;
use serde::{Deserialize, Serialize};

use crate::group::{extract_from, insert_into};
use crate::resource::{Resource, ResourceStack, ResourceType, ResourceVariant};
use crate::slot::{ResourceSlot, TagMatch};
use crate::storage::ResourceStorage;
use crate::transfer::Storage;

// ─────────────────────────────────────────────────────────────────────────────
// ResourceFlow
// ─────────────────────────────────────────────────────────────────────────────

/// The direction resources may move through a machine side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFlow {
    /// Resources may only enter the machine.
    Input,
    /// Resources may only leave the machine.
    Output,
    /// Resources may move both ways.
    #[default]
    Both,
}

impl ResourceFlow {
    /// Returns `true` if resources may enter.
    #[must_use]
    pub fn can_flow_in(self) -> bool {
        matches!(self, Self::Input | Self::Both)
    }

    /// Returns `true` if resources may leave.
    #[must_use]
    pub fn can_flow_out(self) -> bool {
        matches!(self, Self::Output | Self::Both)
    }
}

impl fmt::Display for ResourceFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Both => "both",
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Matching
// ─────────────────────────────────────────────────────────────────────────────

/// Restricts which slots or resource an external side may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matching<R> {
    /// Every externally accessible slot.
    Any,
    /// Only the slot at this index in the storage's flattened slot list.
    Slot(usize),
    /// Only this variant, in any accessible slot.
    Resource(ResourceVariant<R>),
}

impl<R> Default for Matching<R> {
    fn default() -> Self {
        Self::Any
    }
}

impl<R: Resource> Matching<R> {
    fn allows_slot(&self, index: usize) -> bool {
        match self {
            Self::Slot(only) => *only == index,
            Self::Any | Self::Resource(_) => true,
        }
    }

    fn allows_variant(&self, variant: &ResourceVariant<R>) -> bool {
        match self {
            Self::Resource(only) => only.is(variant.resource(), variant.tag()),
            Self::Any | Self::Slot(_) => true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExposedStorage
// ─────────────────────────────────────────────────────────────────────────────

/// The part of a [`ResourceStorage`] visible to automation on one side.
///
/// The view shares slots with the storage it was created from, so changes
/// through the view notify the storage listener.
///
/// # Example
///
/// ```
/// use machina_storage::prelude::*;
///
/// let ore = Item::new(Identifier::parse("minecraft:iron_ore").unwrap());
/// let builder = ResourceSlot::<Item>::builder();
/// let storage = ResourceStorage::builder()
///     .group(SlotGroupType::INPUT, SlotGroup::of(builder.build().unwrap()))
///     .group(SlotGroupType::OUTPUT, SlotGroup::of(builder.build().unwrap()))
///     .build()
///     .unwrap();
///
/// let side = ExposedStorage::new(&storage, ResourceFlow::Both, Matching::Any);
/// assert_eq!(side.insertable_slots().len(), 1);
/// assert_eq!(side.extractable_slots().len(), 1);
///
/// let transaction = Transaction::open_outer();
/// assert_eq!(side.insert_variant(&ResourceVariant::of(ore), 10, &transaction), 10);
/// transaction.commit();
/// assert_eq!(storage.slot(0).unwrap().amount(), 10);
/// ```
pub struct ExposedStorage<R: Resource> {
    flow: ResourceFlow,
    matching: Matching<R>,
    insertable: Vec<ResourceSlot<R>>,
    extractable: Vec<ResourceSlot<R>>,
}

impl<R: Resource> fmt::Debug for ExposedStorage<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExposedStorage")
            .field("flow", &self.flow)
            .field("matching", &self.matching)
            .field("insertable", &self.insertable.len())
            .field("extractable", &self.extractable.len())
            .finish()
    }
}

impl<R: Resource> ExposedStorage<R> {
    /// Creates a view over `storage` limited by `flow` and `matching`.
    #[must_use]
    pub fn new(storage: &ResourceStorage<R>, flow: ResourceFlow, matching: Matching<R>) -> Self {
        let mut insertable = Vec::new();
        let mut extractable = Vec::new();
        let mut index = 0;
        for (group_type, group) in storage.groups() {
            let input_type = group_type.input_type();
            for slot in group {
                if matching.allows_slot(index) {
                    if flow.can_flow_in() && input_type.external_insertion() {
                        insertable.push(slot.clone());
                    }
                    if flow.can_flow_out() && input_type.external_extraction() {
                        extractable.push(slot.clone());
                    }
                }
                index += 1;
            }
        }

        tracing::trace!(
            resource_type = %R::TYPE,
            %flow,
            insertable = insertable.len(),
            extractable = extractable.len(),
            "exposed storage"
        );

        Self {
            flow,
            matching,
            insertable,
            extractable,
        }
    }

    /// Returns the configured flow.
    #[must_use]
    pub fn flow(&self) -> ResourceFlow {
        self.flow
    }

    /// Returns the configured matching rule.
    #[must_use]
    pub fn matching(&self) -> &Matching<R> {
        &self.matching
    }

    /// Returns the slots automation may insert into.
    #[must_use]
    pub fn insertable_slots(&self) -> &[ResourceSlot<R>] {
        &self.insertable
    }

    /// Returns the slots automation may extract from.
    #[must_use]
    pub fn extractable_slots(&self) -> &[ResourceSlot<R>] {
        &self.extractable
    }
}

impl<R: Resource> Storage<R> for ExposedStorage<R> {
    fn insert_variant(
        &self,
        variant: &ResourceVariant<R>,
        max_amount: u64,
        transaction: &Transaction<'_>,
    ) -> u64 {
        if !self.matching.allows_variant(variant) {
            return 0;
        }
        insert_into(
            self.insertable.iter(),
            variant.resource(),
            variant.tag(),
            max_amount,
            Some(transaction),
        )
    }

    fn extract_variant(
        &self,
        variant: &ResourceVariant<R>,
        max_amount: u64,
        transaction: &Transaction<'_>,
    ) -> u64 {
        if !self.matching.allows_variant(variant) {
            return 0;
        }
        extract_from(
            self.extractable.iter(),
            variant.resource(),
            TagMatch::Exact(variant.tag()),
            max_amount,
            Some(transaction),
        )
    }

    fn contents(&self) -> Vec<ResourceStack<R>> {
        self.extractable
            .iter()
            .map(ResourceSlot::stack)
            .filter(|stack| {
                stack
                    .variant()
                    .is_some_and(|variant| self.matching.allows_variant(variant))
            })
            .collect()
    }

    fn supports_insertion(&self) -> bool {
        !self.insertable.is_empty()
    }

    fn supports_extraction(&self) -> bool {
        !self.extractable.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IoFace
// ─────────────────────────────────────────────────────────────────────────────

/// The configuration of one machine side.
///
/// A blank face exposes nothing. Resource-level matching is not persisted;
/// build an [`ExposedStorage`] directly with [`Matching::Resource`] for that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoFace {
    /// The resource kind the face transfers, or `None` for a blank face.
    #[serde(default)]
    pub resource_type: Option<ResourceType>,
    /// The direction resources may move.
    #[serde(default)]
    pub flow: ResourceFlow,
    /// Restricts the face to one slot of the storage's flattened slot list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
}

impl Default for IoFace {
    fn default() -> Self {
        Self::blank()
    }
}

impl IoFace {
    /// Creates a face transferring `resource_type` in `flow`.
    #[must_use]
    pub fn new(resource_type: ResourceType, flow: ResourceFlow) -> Self {
        Self {
            resource_type: Some(resource_type),
            flow,
            slot: None,
        }
    }

    /// Creates a face that exposes nothing.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            resource_type: None,
            flow: ResourceFlow::Both,
            slot: None,
        }
    }

    /// Restricts the face to a single slot.
    #[must_use]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Returns `true` if the face exposes nothing.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.resource_type.is_none()
    }

    /// Returns the view of `storage` seen through this face, or `None` if the
    /// face transfers a different resource kind.
    #[must_use]
    pub fn expose<R: Resource>(&self, storage: &ResourceStorage<R>) -> Option<ExposedStorage<R>> {
        if self.resource_type != Some(R::TYPE) {
            return None;
        }
        let matching = self.slot.map_or(Matching::Any, Matching::Slot);
        Some(ExposedStorage::new(storage, self.flow, matching))
    }
}
