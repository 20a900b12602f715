use super::chunk::ChunkKey;
use super::entity::{Enemy, EntityId, GroundItem, Npc, RemotePlayer};
use super::events::FloatingEffect;
use super::item::InventorySlot;
use super::math::Vec2;
use super::trade::TradeSide;

/// Owned, read-only copy of everything a renderer or UI needs for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub player: PlayerView,
    pub camera: Vec2,
    pub dead: bool,
    pub chunks: Vec<ChunkView>,
    pub remote_players: Vec<RemotePlayer>,
    pub trade: Option<TradeView>,
    pub effects: Vec<FloatingEffect>,
}

impl WorldSnapshot {
    pub fn enemy_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.enemies.len()).sum()
    }

    pub fn item_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.items.len()).sum()
    }

    pub fn npc_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.npcs.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub position: Vec2,
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub damage: u32,
    pub gold: u32,
    pub inventory: Vec<InventorySlot>,
    pub inventory_capacity: usize,
    pub attack_cooldown_ms: f32,
    pub attacking: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkView {
    pub key: ChunkKey,
    pub enemies: Vec<Enemy>,
    pub npcs: Vec<Npc>,
    pub items: Vec<GroundItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeView {
    pub npc: EntityId,
    pub npc_name: String,
    pub stock: Vec<InventorySlot>,
    pub selection: Option<(TradeSide, usize)>,
    pub gold: u32,
}
