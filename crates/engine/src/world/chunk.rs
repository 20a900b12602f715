use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::config::{EnemyTemplate, GenerationOdds};
use super::entity::{Enemy, EntityId, EntityIdAllocator, GroundItem, Npc};
use super::item::{InventorySlot, ItemKind, ITEM_CATALOG};
use super::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub y: i32,
}

impl ChunkKey {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn containing(position: Vec2, chunk_size: f32) -> Self {
        key_of(position.x, position.y, chunk_size)
    }

    pub fn chebyshev_distance(self, other: ChunkKey) -> i32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).abs();
        dx.max(dy).min(i64::from(i32::MAX)) as i32
    }

    pub fn origin(self, chunk_size: f32) -> Vec2 {
        Vec2::new(self.x as f32 * chunk_size, self.y as f32 * chunk_size)
    }

    /// The 3x3 block around this key, `dx` outer and `dy` inner.
    pub fn neighborhood(self) -> impl Iterator<Item = ChunkKey> {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).map(move |dy| {
                ChunkKey::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
            })
        })
    }
}

pub fn key_of(world_x: f32, world_y: f32, chunk_size: f32) -> ChunkKey {
    ChunkKey {
        x: floor_div(world_x, chunk_size),
        y: floor_div(world_y, chunk_size),
    }
}

fn floor_div(coord: f32, chunk_size: f32) -> i32 {
    // `as` saturates at the i32 bounds and maps NaN to 0.
    (f64::from(coord) / f64::from(chunk_size)).floor() as i32
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    key: ChunkKey,
    pub(crate) enemies: Vec<Enemy>,
    pub(crate) npcs: Vec<Npc>,
    pub(crate) items: Vec<GroundItem>,
}

impl Chunk {
    fn empty(key: ChunkKey) -> Self {
        Self {
            key,
            enemies: Vec::new(),
            npcs: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    pub fn items(&self) -> &[GroundItem] {
        &self.items
    }

    pub fn entity_count(&self) -> usize {
        self.enemies.len() + self.npcs.len() + self.items.len()
    }

    pub fn spawn_enemy(&mut self, enemy: Enemy) -> EntityId {
        let id = enemy.id;
        self.enemies.push(enemy);
        id
    }

    pub fn spawn_item(&mut self, item: GroundItem) -> EntityId {
        let id = item.id;
        self.items.push(item);
        id
    }

    pub fn spawn_npc(&mut self, npc: Npc) -> EntityId {
        let id = npc.id;
        self.npcs.push(npc);
        id
    }

    /// Returns `None` when the enemy is already gone, so a repeated death
    /// dispatch finds nothing to remove.
    pub fn remove_enemy(&mut self, id: EntityId) -> Option<Enemy> {
        let index = self.enemies.iter().position(|enemy| enemy.id == id)?;
        Some(self.enemies.remove(index))
    }

    pub fn collect_item(&mut self, id: EntityId) -> Option<InventorySlot> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index).slot)
    }

    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.iter().find(|enemy| enemy.id == id)
    }

    pub fn enemy_mut(&mut self, id: EntityId) -> Option<&mut Enemy> {
        self.enemies.iter_mut().find(|enemy| enemy.id == id)
    }

    pub fn npc(&self, id: EntityId) -> Option<&Npc> {
        self.npcs.iter().find(|npc| npc.id == id)
    }

    pub fn item(&self, id: EntityId) -> Option<&GroundItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowChange {
    pub created: Vec<ChunkKey>,
    pub evicted: Vec<ChunkKey>,
}

#[derive(Debug)]
pub struct ChunkStore {
    chunk_size: f32,
    world_seed: u64,
    odds: GenerationOdds,
    enemy_template: EnemyTemplate,
    chunks: BTreeMap<ChunkKey, Chunk>,
    ids: EntityIdAllocator,
}

impl ChunkStore {
    pub fn new(
        chunk_size: f32,
        world_seed: u64,
        odds: GenerationOdds,
        enemy_template: EnemyTemplate,
    ) -> Self {
        Self {
            chunk_size,
            world_seed,
            odds,
            enemy_template,
            chunks: BTreeMap::new(),
            ids: EntityIdAllocator::default(),
        }
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    pub fn key_of(&self, world_x: f32, world_y: f32) -> ChunkKey {
        key_of(world_x, world_y, self.chunk_size)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.chunks.keys().copied()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    pub fn chunk_mut(&mut self, key: ChunkKey) -> Option<&mut Chunk> {
        self.chunks.get_mut(&key)
    }

    pub fn allocate_id(&mut self) -> EntityId {
        self.ids.allocate()
    }

    pub fn get_or_create(&mut self, world_x: f32, world_y: f32) -> &mut Chunk {
        let key = self.key_of(world_x, world_y);
        self.get_or_create_key(key)
    }

    pub fn get_or_create_key(&mut self, key: ChunkKey) -> &mut Chunk {
        if !self.chunks.contains_key(&key) {
            let chunk = self.generate(key);
            debug!(
                chunk_x = key.x,
                chunk_y = key.y,
                entity_count = chunk.entity_count(),
                "chunk_generated"
            );
            self.chunks.insert(key, chunk);
        }
        self.chunks.entry(key).or_insert_with(|| Chunk::empty(key))
    }

    pub fn evict_outside(&mut self, center: ChunkKey, radius: i32) -> Vec<ChunkKey> {
        let evicted = self
            .chunks
            .keys()
            .copied()
            .filter(|key| key.chebyshev_distance(center) > radius)
            .collect::<Vec<_>>();
        for key in &evicted {
            self.chunks.remove(key);
        }
        evicted
    }

    /// Loads every chunk within `radius` of `center` and evicts the rest.
    pub fn ensure_window(&mut self, center: ChunkKey, radius: i32) -> WindowChange {
        let mut change = WindowChange::default();
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                let key = ChunkKey::new(center.x.saturating_add(dx), center.y.saturating_add(dy));
                if !self.chunks.contains_key(&key) {
                    self.get_or_create_key(key);
                    change.created.push(key);
                }
            }
        }
        change.evicted = self.evict_outside(center, radius);
        change
    }

    /// Moves enemies and ground items whose position left their owning chunk
    /// into the loaded chunk that now contains them. Entities whose new chunk
    /// is not loaded stay where they are.
    pub fn rehome(&mut self) -> usize {
        let chunk_size = self.chunk_size;
        let mut enemy_moves = Vec::new();
        let mut item_moves = Vec::new();
        for (key, chunk) in &self.chunks {
            for enemy in &chunk.enemies {
                let owner = ChunkKey::containing(enemy.position, chunk_size);
                if owner != *key && self.chunks.contains_key(&owner) {
                    enemy_moves.push((*key, enemy.id, owner));
                }
            }
            for item in &chunk.items {
                let owner = ChunkKey::containing(item.position, chunk_size);
                if owner != *key && self.chunks.contains_key(&owner) {
                    item_moves.push((*key, item.id, owner));
                }
            }
        }

        let mut moved = 0usize;
        for (from, id, to) in enemy_moves {
            let Some(enemy) = self.chunks.get_mut(&from).and_then(|c| c.remove_enemy(id)) else {
                continue;
            };
            if let Some(target) = self.chunks.get_mut(&to) {
                target.enemies.push(enemy);
                moved = moved.saturating_add(1);
            }
        }
        for (from, id, to) in item_moves {
            let Some(chunk) = self.chunks.get_mut(&from) else {
                continue;
            };
            let Some(index) = chunk.items.iter().position(|item| item.id == id) else {
                continue;
            };
            let item = chunk.items.remove(index);
            if let Some(target) = self.chunks.get_mut(&to) {
                target.items.push(item);
                moved = moved.saturating_add(1);
            }
        }
        moved
    }

    pub fn clear_enemies_within(&mut self, center: Vec2, radius: f32) -> usize {
        let radius_sq = radius * radius;
        let mut removed = 0usize;
        for chunk in self.chunks.values_mut() {
            let before = chunk.enemies.len();
            chunk
                .enemies
                .retain(|enemy| enemy.position.distance_sq(center) >= radius_sq);
            removed = removed.saturating_add(before - chunk.enemies.len());
        }
        removed
    }

    pub fn find_npc(&self, id: EntityId) -> Option<(ChunkKey, &Npc)> {
        self.chunks
            .iter()
            .find_map(|(key, chunk)| chunk.npc(id).map(|npc| (*key, npc)))
    }

    pub(crate) fn spawn_ground_item(
        &mut self,
        key: ChunkKey,
        position: Vec2,
        slot: InventorySlot,
    ) -> Option<EntityId> {
        if !self.chunks.contains_key(&key) {
            return None;
        }
        let id = self.ids.allocate();
        let chunk = self.chunks.get_mut(&key)?;
        Some(chunk.spawn_item(GroundItem { id, position, slot }))
    }

    fn generate(&mut self, key: ChunkKey) -> Chunk {
        let mut rng = chunk_rng(self.world_seed, key);
        let origin = key.origin(self.chunk_size);
        let chunk_size = self.chunk_size;
        let scatter = |rng: &mut ChaCha8Rng| {
            origin.offset(
                rng.gen::<f32>() * chunk_size,
                rng.gen::<f32>() * chunk_size,
            )
        };
        let mut chunk = Chunk::empty(key);

        if rng.gen_bool(self.odds.merchant_chance) {
            let position = scatter(&mut rng);
            chunk.spawn_npc(Npc {
                id: self.ids.allocate(),
                position,
                name: "Merchant".to_string(),
                offered: ITEM_CATALOG.to_vec(),
            });
        }

        let enemy_count = rng.gen_range(0..=self.odds.max_enemies);
        for _ in 0..enemy_count {
            let position = scatter(&mut rng);
            let id = self.ids.allocate();
            chunk.spawn_enemy(Enemy::from_template(id, position, &self.enemy_template));
        }

        let item_count = rng.gen_range(0..=self.odds.max_items);
        for _ in 0..item_count {
            let position = scatter(&mut rng);
            let kind = random_item_kind(&mut rng);
            let id = self.ids.allocate();
            chunk.spawn_item(GroundItem {
                id,
                position,
                slot: InventorySlot { kind, quantity: 1 },
            });
        }
        chunk
    }
}

pub(crate) fn random_item_kind<R: Rng>(rng: &mut R) -> ItemKind {
    ITEM_CATALOG[rng.gen_range(0..ITEM_CATALOG.len())]
}

fn chunk_rng(world_seed: u64, key: ChunkKey) -> ChaCha8Rng {
    let mut hasher = Sha256::new();
    hasher.update(world_seed.to_le_bytes());
    hasher.update(key.x.to_le_bytes());
    hasher.update(key.y.to_le_bytes());
    let digest = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    ChaCha8Rng::seed_from_u64(u64::from_le_bytes(seed))
}
