mod chunk;
mod combat;
mod config;
mod entity;
mod events;
mod item;
mod math;
mod snapshot;
mod state;
mod trade;

#[cfg(test)]
mod tests;

pub use chunk::{key_of, Chunk, ChunkKey, ChunkStore, WindowChange};
pub use combat::{apply_damage, find_nearest_target, tick_cooldown};
pub use config::{
    ConfigError, EnemyTemplate, GenerationOdds, PlayerTemplate, WorldConfig, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_INVENTORY, DEFAULT_RENDER_DISTANCE,
};
pub use entity::{
    Enemy, EntityId, EntityIdAllocator, GroundItem, Npc, Player, RemotePlayer, TargetRef,
};
pub use events::{
    EffectKind, FloatingEffect, Notice, Notify, Severity, WorldEvent, WorldEventBus,
    WorldEventCounts, WorldEventKind,
};
pub use item::{
    Inventory, InventoryError, InventorySlot, ItemEffect, ItemKind, ITEM_CATALOG,
};
pub use math::{normalized_axes, step_toward, Vec2};
pub use snapshot::{ChunkView, PlayerView, TradeView, WorldSnapshot};
pub use state::WorldState;
pub use trade::{TradeError, TradeOutcome, TradeSession, TradeSide};
