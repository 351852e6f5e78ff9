//! Resource identities, auxiliary tags, variants and stacks.
//!
//! Every storage in machina is generic over a [`Resource`] kind. The kind
//! supplies identity, per-variant capacity and packet encoding; everything
//! else (slots, groups, transfers) is shared between kinds.
//!
//! - [`Identifier`] - namespaced id such as `minecraft:water`
//! - [`Tag`] - auxiliary data distinguishing otherwise identical resources
//! - [`ResourceVariant`] - an exact resource + tag pair
//! - [`ResourceStack`] - a variant with an amount, as held by a slot

mod identifier;
mod kinds;
mod tag;

use core::fmt;
use core::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use identifier::{DEFAULT_NAMESPACE, Identifier};
pub use kinds::{Fluid, Gas, Item};
pub use tag::{Tag, tags_equal};

use crate::error::PacketError;
use crate::packet::PacketBuf;

/// Default number of items in a full stack.
pub const ITEM_STACK_SIZE: u64 = 64;

/// Number of droplets in one bucket of fluid.
pub const FLUID_BUCKET: u64 = 81_000;

/// The kind of resource a storage holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Items.
    Item,
    /// Fluids.
    Fluid,
    /// Gases.
    Gas,
    /// Energy, which has no identity.
    Energy,
}

impl ResourceType {
    /// Returns the lowercase name of this type.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Fluid => "fluid",
            Self::Gas => "gas",
            Self::Energy => "energy",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A kind of resource that slots can hold.
///
/// Equality is identity: two values that compare equal are the same resource.
pub trait Resource:
    Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + 'static
{
    /// The resource type this kind belongs to.
    const TYPE: ResourceType;

    /// Returns the identifier of this resource.
    fn id(&self) -> &Identifier;

    /// Returns the largest amount of this resource a single slot may hold,
    /// regardless of the slot capacity.
    fn max_amount(&self) -> u64 {
        u64::MAX
    }

    /// Writes this resource to a packet.
    fn encode(&self, buf: &mut PacketBuf);

    /// Reads a resource written by [`encode`](Resource::encode).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is truncated or malformed.
    fn decode(buf: &mut PacketBuf) -> Result<Self, PacketError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// ResourceVariant
// ─────────────────────────────────────────────────────────────────────────────

/// An exact resource identity: a resource together with its tag.
///
/// The tag is stored in canonical form, so a variant built with an empty tag
/// equals one built without a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceVariant<R> {
    resource: R,
    tag: Option<Tag>,
}

impl<R: Resource> ResourceVariant<R> {
    /// Creates an untagged variant.
    #[must_use]
    pub fn of(resource: R) -> Self {
        Self {
            resource,
            tag: None,
        }
    }

    /// Creates a variant with a tag.
    #[must_use]
    pub fn with_tag(resource: R, tag: Option<Tag>) -> Self {
        Self {
            resource,
            tag: Tag::normalize(tag),
        }
    }

    /// Returns the resource.
    #[must_use]
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Returns the tag, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// Returns `true` if this variant is exactly `resource` with `tag`.
    #[must_use]
    pub fn is(&self, resource: &R, tag: Option<&Tag>) -> bool {
        self.resource == *resource && tags_equal(self.tag.as_ref(), tag)
    }
}

impl<R: Resource> From<R> for ResourceVariant<R> {
    fn from(resource: R) -> Self {
        Self::of(resource)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResourceStack
// ─────────────────────────────────────────────────────────────────────────────

/// A variant with an amount: the contents of a slot.
///
/// A stack is either empty, or holds a variant and a positive amount. There is
/// no "zero of something" state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStack<R> {
    contents: Option<ResourceVariant<R>>,
    amount: u64,
}

impl<R> Default for ResourceStack<R> {
    fn default() -> Self {
        Self {
            contents: None,
            amount: 0,
        }
    }
}

impl<R: Resource> ResourceStack<R> {
    /// Returns the empty stack.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a stack. An amount of zero yields the empty stack.
    #[must_use]
    pub fn new(variant: ResourceVariant<R>, amount: u64) -> Self {
        if amount == 0 {
            return Self::empty();
        }
        Self {
            contents: Some(variant),
            amount,
        }
    }

    /// Returns the variant held, if any.
    #[must_use]
    pub fn variant(&self) -> Option<&ResourceVariant<R>> {
        self.contents.as_ref()
    }

    /// Returns the resource held, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&R> {
        self.contents.as_ref().map(ResourceVariant::resource)
    }

    /// Returns the tag of the resource held, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&Tag> {
        self.contents.as_ref().and_then(ResourceVariant::tag)
    }

    /// Returns the amount held.
    #[must_use]
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Returns `true` if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_none()
    }

    /// Adds `amount` of `variant`. The caller guarantees the stack is empty or
    /// already holds `variant`.
    pub(crate) fn grow(&mut self, variant: &ResourceVariant<R>, amount: u64) {
        if amount == 0 {
            return;
        }
        if self.contents.is_none() {
            self.contents = Some(variant.clone());
        }
        self.amount = self.amount.saturating_add(amount);
    }

    /// Removes up to `amount`, clearing the stack when it reaches zero.
    pub(crate) fn shrink(&mut self, amount: u64) {
        self.amount = self.amount.saturating_sub(amount);
        if self.amount == 0 {
            self.contents = None;
        }
    }
}
