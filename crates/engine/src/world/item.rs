use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    HealthPotion,
    ManaPotion,
    IronSword,
    LeatherArmor,
}

pub const ITEM_CATALOG: [ItemKind; 4] = [
    ItemKind::HealthPotion,
    ItemKind::ManaPotion,
    ItemKind::IronSword,
    ItemKind::LeatherArmor,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEffect {
    RestoreHealth(u32),
    RestoreMana(u32),
    RaiseDamage(u32),
    RaiseMaxHealth(u32),
}

impl ItemKind {
    pub fn price(self) -> u32 {
        match self {
            Self::HealthPotion => 50,
            Self::ManaPotion => 50,
            Self::IronSword => 100,
            Self::LeatherArmor => 80,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HealthPotion => "Health Potion",
            Self::ManaPotion => "Mana Potion",
            Self::IronSword => "Iron Sword",
            Self::LeatherArmor => "Leather Armor",
        }
    }

    pub fn effect(self) -> ItemEffect {
        match self {
            Self::HealthPotion => ItemEffect::RestoreHealth(30),
            Self::ManaPotion => ItemEffect::RestoreMana(30),
            Self::IronSword => ItemEffect::RaiseDamage(5),
            Self::LeatherArmor => ItemEffect::RaiseMaxHealth(20),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub kind: ItemKind,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("inventory full ({capacity} slots)")]
    Full { capacity: usize },
    #[error("no inventory slot at index {index}")]
    NoSuchSlot { index: usize },
}

/// Bounded, ordered slot list. Inserting a kind that already has a slot
/// merges quantities instead of taking a new slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    capacity: usize,
    slots: Vec<InventorySlot>,
}

impl Inventory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn slots(&self) -> &[InventorySlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&InventorySlot> {
        self.slots.get(index)
    }

    pub fn quantity_of(&self, kind: ItemKind) -> u32 {
        self.slots
            .iter()
            .filter(|slot| slot.kind == kind)
            .map(|slot| slot.quantity)
            .sum()
    }

    pub fn can_accept(&self, kind: ItemKind) -> bool {
        !self.is_full() || self.slots.iter().any(|slot| slot.kind == kind)
    }

    pub fn add(&mut self, kind: ItemKind, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Ok(());
        }
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.kind == kind) {
            slot.quantity = slot.quantity.saturating_add(quantity);
            return Ok(());
        }
        if self.is_full() {
            return Err(InventoryError::Full {
                capacity: self.capacity,
            });
        }
        self.slots.push(InventorySlot { kind, quantity });
        Ok(())
    }

    /// Takes one unit from the slot, dropping the slot when it empties.
    pub fn take_one(&mut self, index: usize) -> Result<ItemKind, InventoryError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(InventoryError::NoSuchSlot { index })?;
        let kind = slot.kind;
        slot.quantity = slot.quantity.saturating_sub(1);
        if slot.quantity == 0 {
            self.slots.remove(index);
        }
        Ok(kind)
    }

    /// Removes the last `count` slots, newest first.
    pub fn pop_slots(&mut self, count: usize) -> Vec<InventorySlot> {
        let keep = self.slots.len().saturating_sub(count);
        let mut popped = self.slots.split_off(keep);
        popped.reverse();
        popped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_merges_existing_kind_without_new_slot() {
        let mut inventory = Inventory::with_capacity(2);
        inventory.add(ItemKind::HealthPotion, 1).expect("first");
        inventory.add(ItemKind::HealthPotion, 2).expect("merge");
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.quantity_of(ItemKind::HealthPotion), 3);
    }

    #[test]
    fn add_beyond_capacity_fails_and_leaves_length_unchanged() {
        let mut inventory = Inventory::with_capacity(2);
        inventory.add(ItemKind::HealthPotion, 1).expect("a");
        inventory.add(ItemKind::ManaPotion, 1).expect("b");

        let result = inventory.add(ItemKind::IronSword, 1);
        assert_eq!(result, Err(InventoryError::Full { capacity: 2 }));
        assert_eq!(inventory.len(), 2);

        inventory
            .add(ItemKind::ManaPotion, 1)
            .expect("merge still allowed when full");
        assert_eq!(inventory.len(), 2);
    }

    #[test]
    fn take_one_removes_slot_when_empty() {
        let mut inventory = Inventory::with_capacity(4);
        inventory.add(ItemKind::IronSword, 2).expect("add");
        assert_eq!(inventory.take_one(0), Ok(ItemKind::IronSword));
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.take_one(0), Ok(ItemKind::IronSword));
        assert!(inventory.is_empty());
        assert_eq!(
            inventory.take_one(0),
            Err(InventoryError::NoSuchSlot { index: 0 })
        );
    }

    #[test]
    fn pop_slots_takes_from_the_end() {
        let mut inventory = Inventory::with_capacity(4);
        for kind in ITEM_CATALOG {
            inventory.add(kind, 1).expect("add");
        }
        let dropped = inventory.pop_slots(2);
        assert_eq!(
            dropped.iter().map(|slot| slot.kind).collect::<Vec<_>>(),
            vec![ItemKind::LeatherArmor, ItemKind::IronSword]
        );
        assert_eq!(inventory.len(), 2);
    }
}
