//! Concrete resource kinds.

use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::{ITEM_STACK_SIZE, Identifier, Resource, ResourceType};
use crate::error::PacketError;
use crate::packet::PacketBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Item
// ─────────────────────────────────────────────────────────────────────────────

/// An item type, counted in individual items.
///
/// Two items with the same id are the same item type; the stack size is not
/// part of its identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    id: Identifier,
    #[serde(default = "default_max_stack")]
    max_stack: u64,
}

fn default_max_stack() -> u64 {
    ITEM_STACK_SIZE
}

impl Item {
    /// Creates an item type that stacks to [`ITEM_STACK_SIZE`].
    #[must_use]
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            max_stack: ITEM_STACK_SIZE,
        }
    }

    /// Sets the maximum stack size of this item type.
    #[must_use]
    pub fn with_max_stack(mut self, max_stack: u64) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Returns the maximum number of items one slot holds.
    #[must_use]
    pub fn max_stack(&self) -> u64 {
        self.max_stack
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Resource for Item {
    const TYPE: ResourceType = ResourceType::Item;

    fn id(&self) -> &Identifier {
        &self.id
    }

    fn max_amount(&self) -> u64 {
        self.max_stack
    }

    fn encode(&self, buf: &mut PacketBuf) {
        buf.write_str(&self.id.to_string());
        buf.write_varint(self.max_stack);
    }

    fn decode(buf: &mut PacketBuf) -> Result<Self, PacketError> {
        let id = Identifier::parse(&buf.read_str()?)?;
        let max_stack = buf.read_varint()?;
        Ok(Self { id, max_stack })
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fluid
// ─────────────────────────────────────────────────────────────────────────────

/// A fluid type, counted in droplets ([`FLUID_BUCKET`](super::FLUID_BUCKET) per bucket).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fluid {
    id: Identifier,
}

impl Fluid {
    /// Creates a fluid type.
    #[must_use]
    pub fn new(id: Identifier) -> Self {
        Self { id }
    }
}

impl Resource for Fluid {
    const TYPE: ResourceType = ResourceType::Fluid;

    fn id(&self) -> &Identifier {
        &self.id
    }

    fn encode(&self, buf: &mut PacketBuf) {
        buf.write_str(&self.id.to_string());
    }

    fn decode(buf: &mut PacketBuf) -> Result<Self, PacketError> {
        Ok(Self::new(Identifier::parse(&buf.read_str()?)?))
    }
}

impl fmt::Display for Fluid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gas
// ─────────────────────────────────────────────────────────────────────────────

/// A gas type with its chemical symbol, such as `O2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gas {
    id: Identifier,
    symbol: String,
}

impl Gas {
    /// Creates a gas type.
    #[must_use]
    pub fn new(id: Identifier, symbol: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
        }
    }

    /// Returns the chemical symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Resource for Gas {
    const TYPE: ResourceType = ResourceType::Gas;

    fn id(&self) -> &Identifier {
        &self.id
    }

    fn encode(&self, buf: &mut PacketBuf) {
        buf.write_str(&self.id.to_string());
        buf.write_str(&self.symbol);
    }

    fn decode(buf: &mut PacketBuf) -> Result<Self, PacketError> {
        let id = Identifier::parse(&buf.read_str()?)?;
        let symbol = buf.read_str()?;
        Ok(Self { id, symbol })
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> Identifier {
        Identifier::parse(value).unwrap()
    }

    #[test]
    fn item_defaults_to_full_stack() {
        let item = Item::new(id("minecraft:stone"));
        assert_eq!(item.max_amount(), ITEM_STACK_SIZE);
        assert_eq!(item.clone().with_max_stack(16).max_amount(), 16);
    }

    #[test]
    fn items_are_identified_by_id_alone() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(item: &Item) -> u64 {
            let mut hasher = DefaultHasher::new();
            item.hash(&mut hasher);
            hasher.finish()
        }

        let item = Item::new(id("minecraft:stone"));
        let small = item.clone().with_max_stack(16);
        assert_eq!(small, item);
        assert_eq!(hash_of(&small), hash_of(&item));
        assert_ne!(Item::new(id("minecraft:dirt")), item);
    }

    #[test]
    fn fluids_and_gases_are_unbounded() {
        assert_eq!(Fluid::new(id("minecraft:water")).max_amount(), u64::MAX);
        assert_eq!(Gas::new(id("galacticraft:oxygen"), "O2").max_amount(), u64::MAX);
    }

    #[test]
    fn item_deserializes_without_max_stack() {
        let item: Item = serde_json::from_value(serde_json::json!({"id": "minecraft:dirt"})).unwrap();
        assert_eq!(item, Item::new(id("minecraft:dirt")));
    }

    #[test]
    fn kinds_round_trip_through_packets() {
        let mut buf = PacketBuf::new();
        let item = Item::new(id("minecraft:egg")).with_max_stack(16);
        let gas = Gas::new(id("galacticraft:hydrogen"), "H2");
        item.encode(&mut buf);
        gas.encode(&mut buf);
        assert_eq!(Item::decode(&mut buf).unwrap(), item);
        assert_eq!(Gas::decode(&mut buf).unwrap(), gas);
    }

    #[test]
    fn bad_identifier_in_packet_is_invalid_data() {
        let mut buf = PacketBuf::new();
        buf.write_str("NOT VALID");
        assert!(matches!(
            Fluid::decode(&mut buf),
            Err(PacketError::InvalidData(_))
        ));
    }
}
