//! Persistence of machine storages.
//!
//! This module provides:
//!
//! - [`Storable`] - metadata marking a storage type as eligible for
//!   persistence. Storage keys must be unique within an owner.
//! - [`PersistentStorage`] - save/load of a storage to and from a tag.
//! - [`PersistenceRegistry`] - the registry of live storages saved and
//!   loaded together as one document.
//! - [`PersistenceError`] - error type for document-level failures.
//!
//! Data inside a storage never fails to load: malformed entries degrade to
//! empty slots with a warning. Only a document that is not a JSON object at
//! all is rejected.
//!
//! # Document format
//!
//! ```json
//! {
//!   "<owner>": {
//!     "<storage key>": { "version": "1.0.0", "data": <tag> }
//!   }
//! }
//! ```

use core::cell::RefCell;
use std::rc::Rc;

use machina_storage::{EnergyStorage, Resource, ResourceStorage};
use serde_json::{Map, Value};

/// Metadata for a storage type eligible for persistence.
pub trait Storable: 'static {
    /// Stable identifier for this storage type.
    /// Must be unique within the registering owner's namespace.
    fn storage_key() -> &'static str;

    /// Semantic version for the tag format. Defaults to `"1.0.0"`.
    fn schema_version() -> &'static str {
        "1.0.0"
    }
}

/// Save and load of a storage's contents.
pub trait PersistentStorage {
    /// Serializes the contents.
    fn save(&self) -> Value;

    /// Restores contents written by [`save`](PersistentStorage::save).
    /// Malformed data leaves the affected slots empty.
    fn load(&self, value: &Value);
}

impl<R: Resource> PersistentStorage for ResourceStorage<R> {
    fn save(&self) -> Value {
        self.create_tag()
    }

    fn load(&self, value: &Value) {
        self.read_tag(value);
    }
}

impl PersistentStorage for EnergyStorage {
    fn save(&self) -> Value {
        self.create_tag()
    }

    fn load(&self, value: &Value) {
        self.read_tag(value);
    }
}

/// Error type for persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Serialization or deserialization of the document text failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The document does not have the expected shape.
    #[error("invalid persistence document: {0}")]
    InvalidDocument(String),
}

#[derive(Clone)]
struct Entry {
    owner: String,
    storage_key: &'static str,
    schema_version: &'static str,
    storage: Rc<dyn PersistentStorage>,
}

/// Registry of storages saved and loaded together.
///
/// Storages are registered under an owner (typically a machine position) and
/// their [`Storable::storage_key`].
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use machina_core::persistence::{PersistenceRegistry, Storable};
/// use machina_storage::EnergyStorage;
///
/// struct Battery;
/// impl Storable for Battery {
///     fn storage_key() -> &'static str {
///         "battery"
///     }
/// }
///
/// let battery = Rc::new(EnergyStorage::new(1_000, 100, 100).unwrap());
/// battery.set_amount(640, None).unwrap();
///
/// let registry = PersistenceRegistry::new();
/// registry.register_as::<Battery>("machine/0,64,0", battery.clone());
/// let document = registry.save_all();
///
/// battery.set_amount(0, None).unwrap();
/// registry.load_all(&document).unwrap();
/// assert_eq!(battery.amount(), 640);
/// ```
#[derive(Default)]
pub struct PersistenceRegistry {
    entries: RefCell<Vec<Entry>>,
}

impl PersistenceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a storage under `owner` with its own storage key.
    ///
    /// # Panics
    ///
    /// Panics if `owner` already registered a storage with the same key.
    pub fn register<S>(&self, owner: impl Into<String>, storage: Rc<S>)
    where
        S: PersistentStorage + Storable,
    {
        self.register_as::<S>(owner, storage);
    }

    /// Registers a storage under `owner` using the key of marker type `K`.
    ///
    /// Useful for storage types defined elsewhere, such as a plain
    /// [`EnergyStorage`].
    ///
    /// # Panics
    ///
    /// Panics if `owner` already registered a storage with the same key.
    pub fn register_as<K: Storable>(
        &self,
        owner: impl Into<String>,
        storage: Rc<dyn PersistentStorage>,
    ) {
        let owner = owner.into();
        let mut entries = self.entries.borrow_mut();

        let duplicate = entries
            .iter()
            .any(|entry| entry.owner == owner && entry.storage_key == K::storage_key());
        assert!(
            !duplicate,
            "duplicate storage key '{}' registered by owner '{owner}'",
            K::storage_key(),
        );

        tracing::debug!(%owner, key = K::storage_key(), "registered persistent storage");
        entries.push(Entry {
            owner,
            storage_key: K::storage_key(),
            schema_version: K::schema_version(),
            storage,
        });
    }

    /// Removes every storage registered by `owner`, returning how many were
    /// removed.
    pub fn unregister(&self, owner: &str) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|entry| entry.owner != owner);
        before - entries.len()
    }

    /// Returns the number of registered storages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Returns the `(owner, storage key)` pairs, in registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<(String, &'static str)> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| (entry.owner.clone(), entry.storage_key))
            .collect()
    }

    /// Saves every registered storage into one document.
    #[must_use]
    pub fn save_all(&self) -> Value {
        let mut document = Map::new();
        for entry in &self.registered() {
            let owned = document
                .entry(entry.owner.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(owned) = owned {
                let mut record = Map::new();
                record.insert("version".into(), Value::from(entry.schema_version));
                record.insert("data".into(), entry.storage.save());
                owned.insert(entry.storage_key.into(), Value::Object(record));
            }
        }
        Value::Object(document)
    }

    /// Loads every registered storage from a document written by
    /// [`save_all`](Self::save_all).
    ///
    /// Storages missing from the document are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidDocument`] if `document` is not a
    /// JSON object. No storage is modified in that case.
    pub fn load_all(&self, document: &Value) -> Result<(), PersistenceError> {
        let Some(document) = document.as_object() else {
            return Err(PersistenceError::InvalidDocument(
                "expected an object keyed by owner".into(),
            ));
        };

        for entry in &self.registered() {
            let Some(record) = document
                .get(&entry.owner)
                .and_then(|owned| owned.get(entry.storage_key))
            else {
                tracing::debug!(
                    owner = %entry.owner,
                    key = entry.storage_key,
                    "no saved data; storage left untouched"
                );
                continue;
            };

            let version = record.get("version").and_then(Value::as_str);
            if version != Some(entry.schema_version) {
                tracing::warn!(
                    owner = %entry.owner,
                    key = entry.storage_key,
                    saved = ?version,
                    current = entry.schema_version,
                    "schema version mismatch; loading anyway"
                );
            }
            entry.storage.load(record.get("data").unwrap_or(&Value::Null));
        }
        Ok(())
    }

    // Storages may reach back into the registry while saving or loading.
    fn registered(&self) -> Vec<Entry> {
        self.entries.borrow().clone()
    }

    /// Saves every registered storage as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Serialization`] if the document cannot be
    /// written.
    pub fn save_to_string(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(&self.save_all())?)
    }

    /// Loads every registered storage from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Serialization`] if the text is not JSON, or
    /// [`PersistenceError::InvalidDocument`] if it is not an object.
    pub fn load_from_str(&self, text: &str) -> Result<(), PersistenceError> {
        let document: Value = serde_json::from_str(text)?;
        self.load_all(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machina_storage::prelude::*;
    use serde_json::json;

    struct Battery;

    impl Storable for Battery {
        fn storage_key() -> &'static str {
            "battery"
        }
    }

    struct Tanks;

    impl Storable for Tanks {
        fn storage_key() -> &'static str {
            "tanks"
        }

        fn schema_version() -> &'static str {
            "2.0.0"
        }
    }

    fn water() -> Fluid {
        Fluid::new(Identifier::parse("minecraft:water").unwrap())
    }

    fn tanks() -> Rc<ResourceStorage<Fluid>> {
        let tank = ResourceSlot::<Fluid>::builder()
            .capacity(FLUID_BUCKET)
            .build()
            .unwrap();
        Rc::new(
            ResourceStorage::builder()
                .group(SlotGroupType::STORAGE, SlotGroup::of(tank))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn versions() {
        assert_eq!(Battery::schema_version(), "1.0.0");
        assert_eq!(Tanks::schema_version(), "2.0.0");
    }

    #[test]
    fn document_layout() {
        let registry = PersistenceRegistry::new();
        let battery = Rc::new(EnergyStorage::new(100, 10, 10).unwrap());
        battery.set_amount(42, None).unwrap();
        registry.register_as::<Battery>("a", battery);

        assert_eq!(
            registry.save_all(),
            json!({"a": {"battery": {"version": "1.0.0", "data": 42}}})
        );
    }

    #[test]
    fn round_trip_across_owners() {
        let registry = PersistenceRegistry::new();
        let first = tanks();
        let second = tanks();
        registry.register_as::<Tanks>("first", first.clone());
        registry.register_as::<Tanks>("second", second.clone());

        first.slot(0).unwrap().set(&water(), None, 10, None).unwrap();
        second.slot(0).unwrap().set(&water(), None, 20, None).unwrap();
        let text = registry.save_to_string().unwrap();

        first.slot(0).unwrap().set(&water(), None, 0, None).unwrap();
        second.slot(0).unwrap().set(&water(), None, 0, None).unwrap();
        registry.load_from_str(&text).unwrap();

        assert_eq!(first.slot(0).unwrap().amount(), 10);
        assert_eq!(second.slot(0).unwrap().amount(), 20);
    }

    #[test]
    fn missing_entries_leave_storage_untouched() {
        let registry = PersistenceRegistry::new();
        let battery = Rc::new(EnergyStorage::new(100, 10, 10).unwrap());
        battery.set_amount(7, None).unwrap();
        registry.register_as::<Battery>("a", battery.clone());

        registry.load_all(&json!({"b": {}})).unwrap();
        assert_eq!(battery.amount(), 7);
    }

    #[test]
    fn invalid_documents_are_rejected() {
        let registry = PersistenceRegistry::new();
        assert!(matches!(
            registry.load_all(&json!([1, 2, 3])),
            Err(PersistenceError::InvalidDocument(_))
        ));
        assert!(matches!(
            registry.load_from_str("{not json"),
            Err(PersistenceError::Serialization(_))
        ));
    }

    #[test]
    fn unregister_removes_owner() {
        let registry = PersistenceRegistry::new();
        registry.register_as::<Battery>("a", Rc::new(EnergyStorage::new(1, 1, 1).unwrap()));
        registry.register_as::<Tanks>("a", tanks());
        registry.register_as::<Battery>("b", Rc::new(EnergyStorage::new(1, 1, 1).unwrap()));
        assert_eq!(registry.len(), 3);

        assert_eq!(registry.unregister("a"), 2);
        assert_eq!(registry.keys(), vec![("b".to_owned(), "battery")]);
        assert!(!registry.is_empty());
    }

    #[test]
    #[should_panic(expected = "duplicate storage key")]
    fn same_key_same_owner_panics() {
        let registry = PersistenceRegistry::new();
        registry.register_as::<Battery>("a", Rc::new(EnergyStorage::new(1, 1, 1).unwrap()));
        registry.register_as::<Battery>("a", Rc::new(EnergyStorage::new(1, 1, 1).unwrap()));
    }

    struct Unregistering {
        registry: Rc<PersistenceRegistry>,
        loads: core::cell::Cell<u32>,
    }

    impl PersistentStorage for Unregistering {
        fn save(&self) -> Value {
            Value::from(self.registry.len())
        }

        fn load(&self, _value: &Value) {
            self.loads.set(self.loads.get() + 1);
            self.registry.unregister("machine");
        }
    }

    #[test]
    fn storages_may_use_the_registry_while_loading() {
        let registry = Rc::new(PersistenceRegistry::new());
        let storage = Rc::new(Unregistering {
            registry: registry.clone(),
            loads: core::cell::Cell::new(0),
        });
        registry.register_as::<Battery>("machine", storage.clone());
        registry.register_as::<Tanks>("machine", storage.clone());

        let document = registry.save_all();
        assert_eq!(document["machine"]["battery"]["data"], json!(2));

        registry.load_all(&document).unwrap();
        assert_eq!(storage.loads.get(), 2);
        assert!(registry.is_empty());
    }
}
