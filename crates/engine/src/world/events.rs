use super::chunk::ChunkKey;
use super::entity::EntityId;
use super::item::ItemKind;
use super::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Damage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    pub position: Option<Vec2>,
}

/// Side channel for user-visible messages. Implemented by the UI layer.
pub trait Notify {
    fn notify(&mut self, notice: &Notice);
}

impl Notify for Vec<Notice> {
    fn notify(&mut self, notice: &Notice) {
        self.push(notice.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectKind {
    DamageNumber { amount: u32 },
    AttackArc { from: Vec2, to: Vec2 },
    Text { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatingEffect {
    pub kind: EffectKind,
    pub position: Vec2,
    pub remaining_ms: f32,
    pub life_ms: f32,
}

impl FloatingEffect {
    pub(crate) fn new(kind: EffectKind, position: Vec2, life_ms: f32) -> Self {
        Self {
            kind,
            position,
            remaining_ms: life_ms,
            life_ms,
        }
    }

    /// 1.0 when fresh, 0.0 when expired.
    pub fn opacity(&self) -> f32 {
        if self.life_ms <= 0.0 {
            return 0.0;
        }
        (self.remaining_ms / self.life_ms).clamp(0.0, 1.0)
    }
}

pub(crate) fn age_effects(effects: &mut Vec<FloatingEffect>, elapsed_ms: f32) {
    for effect in effects.iter_mut() {
        effect.remaining_ms = (effect.remaining_ms - elapsed_ms).max(0.0);
    }
    effects.retain(|effect| effect.remaining_ms > 0.0);
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    ChunksStreamed {
        center: ChunkKey,
        created: usize,
        evicted: usize,
    },
    EnemyDamaged {
        id: EntityId,
        amount: u32,
    },
    EnemyDied {
        id: EntityId,
    },
    LootDropped {
        id: EntityId,
        kind: ItemKind,
    },
    RemoteDamaged {
        peer_id: String,
        amount: u32,
    },
    PlayerDamaged {
        amount: u32,
    },
    PlayerDied {
        dropped_slots: usize,
    },
    PlayerRespawned,
    ItemCollected {
        kind: ItemKind,
        quantity: u32,
    },
    ItemUsed {
        kind: ItemKind,
    },
    TradeOpened {
        npc: EntityId,
    },
    TradeCompleted {
        kind: ItemKind,
        price: u32,
    },
    TradeClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEventKind {
    ChunksStreamed,
    EnemyDamaged,
    EnemyDied,
    LootDropped,
    RemoteDamaged,
    PlayerDamaged,
    PlayerDied,
    PlayerRespawned,
    ItemCollected,
    ItemUsed,
    TradeOpened,
    TradeCompleted,
    TradeClosed,
}

impl WorldEvent {
    pub fn kind(&self) -> WorldEventKind {
        match self {
            Self::ChunksStreamed { .. } => WorldEventKind::ChunksStreamed,
            Self::EnemyDamaged { .. } => WorldEventKind::EnemyDamaged,
            Self::EnemyDied { .. } => WorldEventKind::EnemyDied,
            Self::LootDropped { .. } => WorldEventKind::LootDropped,
            Self::RemoteDamaged { .. } => WorldEventKind::RemoteDamaged,
            Self::PlayerDamaged { .. } => WorldEventKind::PlayerDamaged,
            Self::PlayerDied { .. } => WorldEventKind::PlayerDied,
            Self::PlayerRespawned => WorldEventKind::PlayerRespawned,
            Self::ItemCollected { .. } => WorldEventKind::ItemCollected,
            Self::ItemUsed { .. } => WorldEventKind::ItemUsed,
            Self::TradeOpened { .. } => WorldEventKind::TradeOpened,
            Self::TradeCompleted { .. } => WorldEventKind::TradeCompleted,
            Self::TradeClosed => WorldEventKind::TradeClosed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldEventCounts {
    pub total: u32,
    pub damage: u32,
    pub deaths: u32,
    pub pickups: u32,
    pub trades: u32,
}

impl WorldEventCounts {
    fn record(&mut self, kind: WorldEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            WorldEventKind::EnemyDamaged
            | WorldEventKind::RemoteDamaged
            | WorldEventKind::PlayerDamaged => self.damage = self.damage.saturating_add(1),
            WorldEventKind::EnemyDied | WorldEventKind::PlayerDied => {
                self.deaths = self.deaths.saturating_add(1)
            }
            WorldEventKind::ItemCollected => self.pickups = self.pickups.saturating_add(1),
            WorldEventKind::TradeCompleted => self.trades = self.trades.saturating_add(1),
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
pub struct WorldEventBus {
    pending: Vec<WorldEvent>,
    last_tick_counts: WorldEventCounts,
}

impl WorldEventBus {
    pub(crate) fn emit(&mut self, event: WorldEvent) {
        self.pending.push(event);
    }

    pub fn pending(&self) -> &[WorldEvent] {
        &self.pending
    }

    pub fn drain(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn finish_tick(&mut self, first_of_tick: usize) {
        let mut counts = WorldEventCounts::default();
        for event in self.pending.iter().skip(first_of_tick) {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
    }

    pub fn last_tick_counts(&self) -> WorldEventCounts {
        self.last_tick_counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effects_age_and_expire() {
        let mut effects = vec![
            FloatingEffect::new(EffectKind::DamageNumber { amount: 5 }, Vec2::ZERO, 100.0),
            FloatingEffect::new(
                EffectKind::Text {
                    message: "hi".to_string(),
                },
                Vec2::ZERO,
                1_000.0,
            ),
        ];
        age_effects(&mut effects, 50.0);
        assert_eq!(effects.len(), 2);
        assert!((effects[0].opacity() - 0.5).abs() < 1e-5);

        age_effects(&mut effects, 50.0);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].remaining_ms, 900.0);
    }

    #[test]
    fn bus_counts_only_events_from_current_tick() {
        let mut bus = WorldEventBus::default();
        bus.emit(WorldEvent::PlayerDamaged { amount: 1 });
        bus.finish_tick(0);
        let mark = bus.pending().len();
        bus.emit(WorldEvent::EnemyDied { id: EntityId(3) });
        bus.emit(WorldEvent::TradeClosed);
        bus.finish_tick(mark);

        let counts = bus.last_tick_counts();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.deaths, 1);
        assert_eq!(counts.damage, 0);
        assert_eq!(bus.drain().len(), 3);
        assert!(bus.pending().is_empty());
    }
}
