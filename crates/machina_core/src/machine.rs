//! Machine integration.
//!
//! The world layer owns placement, ticking and menus. It reaches the storage
//! core through two things defined here: the [`MachineStorages`] bundle every
//! machine carries, and the [`Machine`] trait it drives once per tick.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use machina_storage::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::persistence::{PersistentStorage, Storable};

// ─────────────────────────────────────────────────────────────────────────────
// Positions and sides
// ─────────────────────────────────────────────────────────────────────────────

/// A block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    /// East-west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North-south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Creates a position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the neighbouring position on `side`.
    #[must_use]
    pub fn relative(self, side: Direction) -> Self {
        let (dx, dy, dz) = side.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// One of the six sides of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Negative y.
    Down,
    /// Positive y.
    Up,
    /// Negative z.
    North,
    /// Positive z.
    South,
    /// Negative x.
    West,
    /// Positive x.
    East,
}

impl Direction {
    /// Every side, in index order.
    pub const ALL: [Self; 6] = [
        Self::Down,
        Self::Up,
        Self::North,
        Self::South,
        Self::West,
        Self::East,
    ];

    /// Returns the facing side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Up => Self::Down,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::East => Self::West,
        }
    }

    fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::Down => (0, -1, 0),
            Self::Up => (0, 1, 0),
            Self::North => (0, 0, -1),
            Self::South => (0, 0, 1),
            Self::West => (-1, 0, 0),
            Self::East => (1, 0, 0),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MachineStorages
// ─────────────────────────────────────────────────────────────────────────────

/// Every storage of one machine, plus its side configuration.
///
/// Kinds the machine does not use hold an empty storage. Side faces start
/// blank.
///
/// # Example
///
/// ```
/// use machina_core::machine::{Direction, MachineStorages};
/// use machina_storage::prelude::*;
///
/// let tank = ResourceSlot::<Fluid>::builder().capacity(FLUID_BUCKET * 8).build().unwrap();
/// let storages = MachineStorages::new()
///     .with_fluids(
///         ResourceStorage::builder()
///             .group(SlotGroupType::INPUT, SlotGroup::of(tank))
///             .build()
///             .unwrap(),
///     )
///     .with_energy(EnergyStorage::new(10_000, 100, 0).unwrap());
///
/// assert!(storages.supports(ResourceType::Fluid));
/// assert!(storages.supports(ResourceType::Energy));
/// assert!(!storages.supports(ResourceType::Item));
///
/// storages.set_face(Direction::Up, IoFace::new(ResourceType::Fluid, ResourceFlow::Input));
/// assert!(storages.exposed_fluids(Direction::Up).is_some());
/// assert!(storages.exposed_fluids(Direction::Down).is_none());
/// ```
pub struct MachineStorages {
    items: ResourceStorage<Item>,
    fluids: ResourceStorage<Fluid>,
    gases: ResourceStorage<Gas>,
    energy: Option<EnergyStorage>,
    faces: RefCell<HashMap<Direction, IoFace>>,
}

impl fmt::Debug for MachineStorages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineStorages")
            .field("items", &self.items)
            .field("fluids", &self.fluids)
            .field("gases", &self.gases)
            .field("energy", &self.energy)
            .finish_non_exhaustive()
    }
}

impl Default for MachineStorages {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineStorages {
    /// Creates a bundle with no storages.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: ResourceStorage::empty(),
            fluids: ResourceStorage::empty(),
            gases: ResourceStorage::empty(),
            energy: None,
            faces: RefCell::new(HashMap::new()),
        }
    }

    /// Sets the item storage.
    #[must_use]
    pub fn with_items(mut self, items: ResourceStorage<Item>) -> Self {
        self.items = items;
        self
    }

    /// Sets the fluid storage.
    #[must_use]
    pub fn with_fluids(mut self, fluids: ResourceStorage<Fluid>) -> Self {
        self.fluids = fluids;
        self
    }

    /// Sets the gas storage.
    #[must_use]
    pub fn with_gases(mut self, gases: ResourceStorage<Gas>) -> Self {
        self.gases = gases;
        self
    }

    /// Sets the energy buffer.
    #[must_use]
    pub fn with_energy(mut self, energy: EnergyStorage) -> Self {
        self.energy = Some(energy);
        self
    }

    /// Returns the item storage.
    #[must_use]
    pub fn items(&self) -> &ResourceStorage<Item> {
        &self.items
    }

    /// Returns the fluid storage.
    #[must_use]
    pub fn fluids(&self) -> &ResourceStorage<Fluid> {
        &self.fluids
    }

    /// Returns the gas storage.
    #[must_use]
    pub fn gases(&self) -> &ResourceStorage<Gas> {
        &self.gases
    }

    /// Returns the energy buffer, if the machine has one.
    #[must_use]
    pub fn energy(&self) -> Option<&EnergyStorage> {
        self.energy.as_ref()
    }

    /// Returns `true` if the machine stores `resource_type` at all.
    #[must_use]
    pub fn supports(&self, resource_type: ResourceType) -> bool {
        match resource_type {
            ResourceType::Item => !self.items.slots().is_empty(),
            ResourceType::Fluid => !self.fluids.slots().is_empty(),
            ResourceType::Gas => !self.gases.slots().is_empty(),
            ResourceType::Energy => self.energy.is_some(),
        }
    }

    /// Sets one callback fired after any storage of the machine changed.
    pub fn set_listener(&self, listener: impl Fn() + 'static) {
        let listener: Rc<dyn Fn()> = Rc::new(listener);
        let shared = Rc::clone(&listener);
        self.items.set_listener(move || shared());
        let shared = Rc::clone(&listener);
        self.fluids.set_listener(move || shared());
        let shared = Rc::clone(&listener);
        self.gases.set_listener(move || shared());
        if let Some(energy) = &self.energy {
            energy.set_listener(move || listener());
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sides
    // ─────────────────────────────────────────────────────────────────────

    /// Returns the configuration of `side`.
    #[must_use]
    pub fn face(&self, side: Direction) -> IoFace {
        self.faces.borrow().get(&side).cloned().unwrap_or_default()
    }

    /// Configures `side`. A blank face removes the configuration.
    pub fn set_face(&self, side: Direction, face: IoFace) {
        let mut faces = self.faces.borrow_mut();
        if face.is_blank() {
            faces.remove(&side);
        } else {
            faces.insert(side, face);
        }
    }

    /// Returns the item view automation sees on `side`.
    #[must_use]
    pub fn exposed_items(&self, side: Direction) -> Option<ExposedStorage<Item>> {
        self.face(side).expose(&self.items)
    }

    /// Returns the fluid view automation sees on `side`.
    #[must_use]
    pub fn exposed_fluids(&self, side: Direction) -> Option<ExposedStorage<Fluid>> {
        self.face(side).expose(&self.fluids)
    }

    /// Returns the gas view automation sees on `side`.
    #[must_use]
    pub fn exposed_gases(&self, side: Direction) -> Option<ExposedStorage<Gas>> {
        self.face(side).expose(&self.gases)
    }

    /// Returns the energy buffer if `side` is configured for energy.
    #[must_use]
    pub fn exposed_energy(&self, side: Direction) -> Option<&EnergyStorage> {
        if self.face(side).resource_type == Some(ResourceType::Energy) {
            self.energy.as_ref()
        } else {
            None
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Serialization and sync
    // ─────────────────────────────────────────────────────────────────────

    /// Serializes every storage and the side configuration.
    #[must_use]
    pub fn create_tag(&self) -> Value {
        let mut tag = Map::new();
        tag.insert("items".into(), self.items.create_tag());
        tag.insert("fluids".into(), self.fluids.create_tag());
        tag.insert("gases".into(), self.gases.create_tag());
        if let Some(energy) = &self.energy {
            tag.insert("energy".into(), energy.create_tag());
        }
        let faces: Map<String, Value> = Direction::ALL
            .into_iter()
            .filter_map(|side| {
                let face = self.faces.borrow().get(&side).cloned()?;
                let key = serde_json::to_value(side).ok()?.as_str()?.to_owned();
                Some((key, serde_json::to_value(face).ok()?))
            })
            .collect();
        tag.insert("faces".into(), Value::Object(faces));
        Value::Object(tag)
    }

    /// Restores data written by [`create_tag`](Self::create_tag). Missing or
    /// malformed sections leave the affected storages empty and sides blank.
    pub fn read_tag(&self, value: &Value) {
        if self.supports(ResourceType::Item) {
            self.items.read_tag(section(value, "items"));
        }
        if self.supports(ResourceType::Fluid) {
            self.fluids.read_tag(section(value, "fluids"));
        }
        if self.supports(ResourceType::Gas) {
            self.gases.read_tag(section(value, "gases"));
        }
        if let Some(energy) = &self.energy {
            energy.read_tag(section(value, "energy"));
        }

        let mut faces = self.faces.borrow_mut();
        faces.clear();
        if let Some(saved) = value.get("faces").and_then(Value::as_object) {
            for (key, face) in saved {
                match (
                    serde_json::from_value::<Direction>(Value::String(key.clone())),
                    serde_json::from_value::<IoFace>(face.clone()),
                ) {
                    (Ok(side), Ok(face)) if !face.is_blank() => {
                        faces.insert(side, face);
                    }
                    (Ok(_), Ok(_)) => {}
                    _ => tracing::warn!(side = %key, "malformed side configuration; side left blank"),
                }
            }
        }
    }

    /// Writes every storage to a packet.
    pub fn write_packet(&self, buf: &mut PacketBuf) {
        self.items.write_packet(buf);
        self.fluids.write_packet(buf);
        self.gases.write_packet(buf);
        if let Some(energy) = &self.energy {
            energy.write_packet(buf);
        }
    }

    /// Reads storages written by [`write_packet`](Self::write_packet).
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is malformed.
    pub fn read_packet(&self, buf: &mut PacketBuf) -> Result<(), PacketError> {
        self.items.read_packet(buf)?;
        self.fluids.read_packet(buf)?;
        self.gases.read_packet(buf)?;
        if let Some(energy) = &self.energy {
            energy.read_packet(buf)?;
        }
        Ok(())
    }

    /// Returns sync handlers for every storage, in the order the client menu
    /// reads them.
    #[must_use]
    pub fn sync_handlers(&self) -> Vec<Box<dyn SyncHandler>> {
        let mut handlers: Vec<Box<dyn SyncHandler>> = vec![
            Box::new(self.items.sync_handler()),
            Box::new(self.fluids.sync_handler()),
            Box::new(self.gases.sync_handler()),
        ];
        if let Some(energy) = &self.energy {
            handlers.push(Box::new(energy.sync_handler()));
        }
        handlers
    }
}

fn section<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

impl Storable for MachineStorages {
    fn storage_key() -> &'static str {
        "machine_storages"
    }
}

impl PersistentStorage for MachineStorages {
    fn save(&self) -> Value {
        self.create_tag()
    }

    fn load(&self, value: &Value) {
        self.read_tag(value);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Machine
// ─────────────────────────────────────────────────────────────────────────────

/// A block entity with storages, driven by the world layer.
pub trait Machine {
    /// Returns the machine position.
    fn pos(&self) -> BlockPos;

    /// Returns the machine storages.
    fn storages(&self) -> &MachineStorages;

    /// Advances the machine by one game tick.
    ///
    /// Work that touches several storages should run in one outer
    /// transaction so a tick either completes or leaves no trace.
    fn tick(&mut self);

    /// Returns the key the machine's data is persisted under.
    fn persistence_owner(&self) -> String {
        format!("machine/{}", self.pos())
    }
}
