// core/inventory.rs

// Local cache of shelf slot availability. The backend owns the authoritative copy; the
// cache only ever moves a slot to unavailable after the backend has confirmed the change,
// so it can lag behind the store under network failure but never run ahead of it.

use std::collections::BTreeMap;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::backend::Backend;

/// One addressable storage location on a shelf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot number on its shelf
    pub id: u32,
    /// Whether an item can be picked from the slot
    pub available: bool,
}

/// A shelf and its slots as served by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shelf {
    /// Shelf name, e.g. `can_shelf`
    pub name: String,
    /// Slots on the shelf
    #[serde(default)]
    pub slots: Vec<Slot>,
}

/// Slot availability keyed by shelf name, then slot id.
#[derive(Clone, Debug, Default)]
pub struct SlotInventory {
    shelves: BTreeMap<String, BTreeMap<u32, bool>>,
}

impl SlotInventory {
    /// Empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inventory seeded from backend shelves.
    pub fn from_shelves(shelves: Vec<Shelf>) -> Self {
        let mut inventory = Self::new();
        inventory.replace(shelves);
        inventory
    }

    /// Replaces the whole cache with a fresh backend snapshot.
    pub fn replace(&mut self, shelves: Vec<Shelf>) {
        self.shelves = shelves
            .into_iter()
            .map(|shelf| {
                let slots = shelf.slots.into_iter().map(|slot| (slot.id, slot.available)).collect();
                (shelf.name, slots)
            })
            .collect();
        info!("Slot inventory loaded: {} shelves", self.shelves.len());
    }

    /// Available slot ids on `shelf_name`, ascending. Unknown shelves have none.
    pub fn list_available(&self, shelf_name: &str) -> Vec<u32> {
        self.shelves
            .get(shelf_name)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|(_, available)| **available)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Cached availability of one slot, `None` when the slot is unknown.
    pub fn is_available(&self, shelf_name: &str, slot_id: u32) -> Option<bool> {
        self.shelves.get(shelf_name)?.get(&slot_id).copied()
    }

    /// Asks the backend to mark a slot unavailable and mirrors the change locally only
    /// once the backend confirms it. Returns whether the slot is now unavailable.
    pub fn mark_unavailable<B: Backend + ?Sized>(&mut self, backend: &B, shelf_name: &str, slot_id: u32) -> bool {
        let Some(slot) = self.shelves.get_mut(shelf_name).and_then(|slots| slots.get_mut(&slot_id)) else {
            warn!("Slot {} is not on shelf {}; not updating", slot_id, shelf_name);
            return false;
        };

        match backend.update_slot_availability(shelf_name, slot_id, false) {
            Ok(()) => {
                *slot = false;
                info!("Slot {} on {} marked as unavailable", slot_id, shelf_name);
                true
            }
            Err(e) => {
                error!("Failed to mark slot {} on {} unavailable: {}", slot_id, shelf_name, e);
                false
            }
        }
    }
}
