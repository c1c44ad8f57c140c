//! Seam to the inventory that owns item descriptors and pending stock.
//!
//! The allocator never owns total stock quantity, only where it sits. The
//! inventory keeps the "unplaced" counter that placements draw down and
//! removals refill.

use std::collections::HashMap;

use log::warn;
use parking_lot::RwLock;

use crate::model::{ItemDescriptor, ItemId};

pub trait Inventory: Send + Sync {
    /// Descriptor of an item, `None` if the item is unknown.
    fn descriptor(&self, item_id: ItemId) -> Option<ItemDescriptor>;

    /// Adds `delta` (negative on placement) to the item's unplaced counter.
    fn adjust_unplaced(&self, item_id: ItemId, delta: i64);
}

#[derive(Clone, Debug)]
struct InventoryEntry {
    descriptor: ItemDescriptor,
    unplaced: u64,
}

/// Process-local inventory, used by the service binary and in tests.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    entries: RwLock<HashMap<ItemId, InventoryEntry>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a descriptor, keeping any existing counter.
    pub fn register(&self, descriptor: ItemDescriptor) {
        let mut entries = self.entries.write();
        match entries.get_mut(&descriptor.id) {
            Some(entry) => entry.descriptor = descriptor,
            None => {
                entries.insert(
                    descriptor.id,
                    InventoryEntry {
                        descriptor,
                        unplaced: 0,
                    },
                );
            }
        }
    }

    /// Registers a descriptor with `unplaced` units waiting for a cell.
    pub fn register_with_pending(&self, descriptor: ItemDescriptor, unplaced: u64) {
        let id = descriptor.id;
        self.register(descriptor);
        if let Some(entry) = self.entries.write().get_mut(&id) {
            entry.unplaced = unplaced;
        }
    }

    pub fn unplaced(&self, item_id: ItemId) -> Option<u64> {
        self.entries.read().get(&item_id).map(|e| e.unplaced)
    }
}

impl Inventory for InMemoryInventory {
    fn descriptor(&self, item_id: ItemId) -> Option<ItemDescriptor> {
        self.entries
            .read()
            .get(&item_id)
            .map(|e| e.descriptor.clone())
    }

    fn adjust_unplaced(&self, item_id: ItemId, delta: i64) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&item_id) else {
            warn!("⚠️ Unplaced counter of unknown item {} not adjusted", item_id);
            return;
        };
        let next = entry.unplaced as i128 + i128::from(delta);
        if next < 0 {
            warn!(
                "⚠️ Unplaced counter of item {} would drop to {}, clamping at 0",
                item_id, next
            );
        }
        entry.unplaced = next.clamp(0, i128::from(u64::MAX)) as u64;
    }
}
