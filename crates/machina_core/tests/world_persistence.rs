//! Saving and restoring a small world of machines through the registry.

use std::rc::Rc;

use machina_core::prelude::*;
use machina_storage::prelude::*;
use serde_json::json;

fn item(path: &str) -> Item {
    Item::new(Identifier::new("minecraft", path).unwrap())
}

fn gas(path: &str) -> Gas {
    Gas::new(Identifier::new("machina", path).unwrap(), "H")
}

/// A chest with a gas tank: no tick logic, just storage.
struct Cabinet {
    pos: BlockPos,
    storages: Rc<MachineStorages>,
}

impl Cabinet {
    fn new(pos: BlockPos) -> Self {
        let slots = ResourceSlot::<Item>::builder();
        let tank = ResourceSlot::<Gas>::builder().capacity(8_000).build().unwrap();
        let storages = MachineStorages::new()
            .with_items(
                ResourceStorage::builder()
                    .group(
                        SlotGroupType::STORAGE,
                        SlotGroup::new((0..4).map(|_| slots.build().unwrap())),
                    )
                    .build()
                    .unwrap(),
            )
            .with_gases(
                ResourceStorage::builder()
                    .group(SlotGroupType::STORAGE, SlotGroup::of(tank))
                    .build()
                    .unwrap(),
            );
        Self {
            pos,
            storages: Rc::new(storages),
        }
    }
}

impl Machine for Cabinet {
    fn pos(&self) -> BlockPos {
        self.pos
    }

    fn storages(&self) -> &MachineStorages {
        &self.storages
    }

    fn tick(&mut self) {}
}

fn register(registry: &PersistenceRegistry, cabinet: &Cabinet) {
    registry.register(cabinet.persistence_owner(), Rc::clone(&cabinet.storages));
}

#[test]
fn world_round_trip() {
    let registry = PersistenceRegistry::new();
    let east = Cabinet::new(BlockPos::new(10, 64, 0));
    let west = Cabinet::new(BlockPos::new(-10, 64, 0));
    register(&registry, &east);
    register(&registry, &west);

    east.storages().items().slot(2).unwrap().set(&item("diamond"), None, 3, None).unwrap();
    west.storages().gases().slot(0).unwrap().set(&gas("hydrogen"), None, 4_000, None).unwrap();
    east.storages()
        .set_face(Direction::Down, IoFace::new(ResourceType::Item, ResourceFlow::Output));
    let text = registry.save_to_string().unwrap();

    let restored = PersistenceRegistry::new();
    let east_copy = Cabinet::new(east.pos);
    let west_copy = Cabinet::new(west.pos);
    register(&restored, &east_copy);
    register(&restored, &west_copy);
    restored.load_from_str(&text).unwrap();

    assert_eq!(east_copy.storages().items().slot(2).unwrap().amount(), 3);
    assert_eq!(
        west_copy.storages().gases().slot(0).unwrap().resource(),
        Some(gas("hydrogen"))
    );
    assert_eq!(
        east_copy.storages().face(Direction::Down).flow,
        ResourceFlow::Output
    );
    assert!(west_copy.storages().face(Direction::Down).is_blank());
}

#[test]
fn newly_placed_machines_keep_their_state() {
    let registry = PersistenceRegistry::new();
    let cabinet = Cabinet::new(BlockPos::new(0, 0, 0));
    register(&registry, &cabinet);
    cabinet.storages().items().slot(0).unwrap().set(&item("torch"), None, 16, None).unwrap();

    registry.load_all(&json!({"machine/9,9,9": {}})).unwrap();
    assert_eq!(cabinet.storages().items().slot(0).unwrap().amount(), 16);
}

#[test]
fn corrupted_machine_data_empties_only_that_machine() {
    let registry = PersistenceRegistry::new();
    let good = Cabinet::new(BlockPos::new(1, 0, 0));
    let bad = Cabinet::new(BlockPos::new(2, 0, 0));
    register(&registry, &good);
    register(&registry, &bad);
    good.storages().items().slot(0).unwrap().set(&item("torch"), None, 1, None).unwrap();
    bad.storages().items().slot(0).unwrap().set(&item("torch"), None, 1, None).unwrap();

    let mut document = registry.save_all();
    document["machine/2,0,0"]["machine_storages"]["data"]["items"] = json!("corrupted");
    registry.load_all(&document).unwrap();

    assert_eq!(good.storages().items().slot(0).unwrap().amount(), 1);
    assert!(bad.storages().items().is_empty());
}

#[test]
fn removed_machines_are_unregistered() {
    let registry = PersistenceRegistry::new();
    let cabinet = Cabinet::new(BlockPos::new(3, 3, 3));
    register(&registry, &cabinet);
    assert_eq!(
        registry.keys(),
        vec![("machine/3,3,3".to_owned(), "machine_storages")]
    );
    assert_eq!(registry.unregister(&cabinet.persistence_owner()), 1);
    assert!(registry.is_empty());
}
