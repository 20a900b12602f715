use serde::{Deserialize, Serialize};

use super::config::{EnemyTemplate, PlayerTemplate};
use super::item::{Inventory, InventorySlot, ItemKind};
use super::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub id: EntityId,
    pub position: Vec2,
    pub health: u32,
    pub max_health: u32,
    pub damage: u32,
    pub speed: f32,
    pub attack_cooldown_ms: f32,
}

impl Enemy {
    pub(crate) fn from_template(id: EntityId, position: Vec2, template: &EnemyTemplate) -> Self {
        Self {
            id,
            position,
            health: template.max_health,
            max_health: template.max_health,
            damage: template.damage,
            speed: template.speed,
            attack_cooldown_ms: 0.0,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Npc {
    pub id: EntityId,
    pub position: Vec2,
    pub name: String,
    pub offered: Vec<ItemKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundItem {
    pub id: EntityId,
    pub position: Vec2,
    pub slot: InventorySlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub peer_id: String,
    pub position: Vec2,
    pub health: u32,
    pub max_health: u32,
    pub last_seen_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub position: Vec2,
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub damage: u32,
    pub speed: f32,
    pub gold: u32,
    pub inventory: Inventory,
    pub attack_cooldown_ms: f32,
    pub attacking_ms: f32,
}

impl Player {
    pub(crate) fn from_template(template: &PlayerTemplate, max_inventory: usize) -> Self {
        Self {
            position: Vec2::ZERO,
            health: template.max_health,
            max_health: template.max_health,
            mana: template.max_mana,
            max_mana: template.max_mana,
            damage: template.damage,
            speed: template.speed,
            gold: template.starting_gold,
            inventory: Inventory::with_capacity(max_inventory),
            attack_cooldown_ms: 0.0,
            attacking_ms: 0.0,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }

    pub fn is_attacking(&self) -> bool {
        self.attacking_ms > 0.0
    }
}

/// Reference to an attack target found by the nearest-target scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Enemy {
        chunk: super::chunk::ChunkKey,
        id: EntityId,
    },
    Remote {
        peer_id: String,
    },
}
