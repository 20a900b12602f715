use std::collections::BTreeSet;

use hollow_engine::app::{Host, InputAction, InputSnapshot};
use hollow_engine::world::{EntityId, ItemKind, Notice, Notify, TradeSide, Vec2, WorldState};
use tracing::{debug, info};

use super::keymap::{key_for, snapshot_from_keys};
use super::settings::ControlMode;

const WANDER_HEADINGS: [InputAction; 4] = [
    InputAction::MoveRight,
    InputAction::MoveDown,
    InputAction::MoveLeft,
    InputAction::MoveUp,
];
const WANDER_LEG_TICKS: u32 = 240;
const RESPAWN_DELAY_TICKS: u32 = 120;
const MERCHANT_SEEK_RANGE: f32 = 400.0;
const STEER_DEADZONE: f32 = 1.0;

/// What the autopilot wants to do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Intent {
    Idle,
    Fight { target: Vec2, in_range: bool },
    VisitMerchant { npc: EntityId, at: Vec2, in_reach: bool },
    Wander { heading: InputAction },
}

/// Headless stand-in for a keyboard player. Fights anything in aggro range,
/// visits each merchant once, drinks potions when hurt and respawns after a
/// short wait. Input goes through the configured key layout.
pub(crate) struct AutopilotHost {
    mode: ControlMode,
    summary_every_frames: u64,
    frames: u64,
    wander_leg: usize,
    wander_ticks: u32,
    dead_ticks: u32,
    visited_merchants: BTreeSet<EntityId>,
    notices: u64,
}

impl AutopilotHost {
    pub(crate) fn new(mode: ControlMode, summary_every_frames: u64) -> Self {
        Self {
            mode,
            summary_every_frames: summary_every_frames.max(1),
            frames: 0,
            wander_leg: 0,
            wander_ticks: 0,
            dead_ticks: 0,
            visited_merchants: BTreeSet::new(),
            notices: 0,
        }
    }

    pub(crate) fn notices_seen(&self) -> u64 {
        self.notices
    }

    pub(crate) fn intent(&self, world: &WorldState) -> Intent {
        if world.is_paused() || world.trade().is_some() {
            return Intent::Idle;
        }
        let config = world.config();
        let origin = world.player().position;

        let nearest_enemy = world
            .chunks()
            .chunks()
            .flat_map(|chunk| chunk.enemies())
            .filter(|enemy| !enemy.is_dead())
            .map(|enemy| (enemy.position, enemy.position.distance(origin)))
            .filter(|(_, distance)| *distance < config.aggro_range)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((target, distance)) = nearest_enemy {
            return Intent::Fight {
                target,
                in_range: distance < config.attack_range,
            };
        }

        let nearest_merchant = world
            .chunks()
            .chunks()
            .flat_map(|chunk| chunk.npcs())
            .filter(|npc| !self.visited_merchants.contains(&npc.id))
            .map(|npc| (npc.id, npc.position, npc.position.distance(origin)))
            .filter(|(_, _, distance)| *distance < MERCHANT_SEEK_RANGE)
            .min_by(|a, b| a.2.total_cmp(&b.2));
        if let Some((npc, at, distance)) = nearest_merchant {
            return Intent::VisitMerchant {
                npc,
                at,
                in_reach: distance < config.interaction_distance,
            };
        }

        Intent::Wander {
            heading: WANDER_HEADINGS[self.wander_leg % WANDER_HEADINGS.len()],
        }
    }

    fn held_keys(&self, intent: Intent, origin: Vec2) -> Vec<&'static str> {
        let mut keys = Vec::new();
        match intent {
            Intent::Idle => {}
            Intent::Fight { target, in_range } => {
                if !in_range {
                    keys.extend(steer(origin, target).map(|action| key_for(self.mode, action)));
                }
                keys.push(key_for(self.mode, InputAction::Attack));
            }
            Intent::VisitMerchant { npc, at, in_reach } => {
                if in_reach {
                    debug!(npc = npc.0, "autopilot_interact");
                    keys.push(key_for(self.mode, InputAction::Interact));
                } else {
                    keys.extend(steer(origin, at).map(|action| key_for(self.mode, action)));
                }
            }
            Intent::Wander { heading } => keys.push(key_for(self.mode, heading)),
        }
        keys
    }

    fn advance_wander(&mut self) {
        self.wander_ticks = self.wander_ticks.saturating_add(1);
        if self.wander_ticks >= WANDER_LEG_TICKS {
            self.wander_ticks = 0;
            self.wander_leg = self.wander_leg.wrapping_add(1);
        }
    }

    fn trade_once(&mut self, world: &mut WorldState) {
        let Some(session) = world.trade() else {
            return;
        };
        let npc = session.npc();
        let gold = world.player().gold;
        let affordable = session
            .stock()
            .iter()
            .position(|slot| slot.kind.price() <= gold);

        if let Some(index) = affordable {
            match world
                .select_trade(TradeSide::Merchant, index)
                .and_then(|_| world.confirm_trade())
            {
                Ok(outcome) => debug!(npc = npc.0, ?outcome, "autopilot_trade"),
                Err(error) => debug!(npc = npc.0, error = %error, "autopilot_trade_failed"),
            }
        }
        world.close_trade();
        self.visited_merchants.insert(npc);
    }

    fn drink_if_hurt(&mut self, world: &mut WorldState) {
        let player = world.player();
        if player.health.saturating_mul(2) >= player.max_health {
            return;
        }
        let potion = player
            .inventory
            .slots()
            .iter()
            .position(|slot| slot.kind == ItemKind::HealthPotion);
        if let Some(index) = potion {
            world.use_item(index);
        }
    }
}

/// Movement actions that bring `from` closer to `to`, at most one per axis.
pub(crate) fn steer(from: Vec2, to: Vec2) -> impl Iterator<Item = InputAction> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let horizontal = if dx > STEER_DEADZONE {
        Some(InputAction::MoveRight)
    } else if dx < -STEER_DEADZONE {
        Some(InputAction::MoveLeft)
    } else {
        None
    };
    let vertical = if dy > STEER_DEADZONE {
        Some(InputAction::MoveDown)
    } else if dy < -STEER_DEADZONE {
        Some(InputAction::MoveUp)
    } else {
        None
    };
    horizontal.into_iter().chain(vertical)
}

impl Notify for AutopilotHost {
    fn notify(&mut self, notice: &Notice) {
        self.notices = self.notices.saturating_add(1);
        info!(message = notice.message.as_str(), severity = ?notice.severity, "notice");
    }
}

impl Host for AutopilotHost {
    fn sample_input(&mut self, world: &WorldState) -> InputSnapshot {
        let intent = self.intent(world);
        if matches!(intent, Intent::Wander { .. }) {
            self.advance_wander();
        }
        let keys = self.held_keys(intent, world.player().position);
        snapshot_from_keys(self.mode, keys)
    }

    fn after_tick(&mut self, world: &mut WorldState) {
        if world.is_paused() {
            self.dead_ticks = self.dead_ticks.saturating_add(1);
            if self.dead_ticks >= RESPAWN_DELAY_TICKS && world.respawn() {
                self.dead_ticks = 0;
                info!("autopilot_respawned");
            }
            return;
        }
        self.dead_ticks = 0;
        self.trade_once(world);
        self.drink_if_hurt(world);
    }

    fn present(&mut self, world: &WorldState) {
        self.frames = self.frames.saturating_add(1);
        if self.frames % self.summary_every_frames != 0 {
            return;
        }
        let snapshot = world.snapshot();
        info!(
            tick = snapshot.tick,
            x = snapshot.player.position.x,
            y = snapshot.player.position.y,
            health = snapshot.player.health,
            max_health = snapshot.player.max_health,
            gold = snapshot.player.gold,
            inventory_slots = snapshot.player.inventory.len(),
            dead = snapshot.dead,
            chunks = snapshot.chunks.len(),
            enemies = snapshot.enemy_count(),
            npcs = snapshot.npc_count(),
            items = snapshot.item_count(),
            remote_players = snapshot.remote_players.len(),
            effects = snapshot.effects.len(),
            "frame_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use hollow_engine::app::InputSource;
    use hollow_engine::world::{ChunkKey, Enemy, Npc, WorldConfig, ITEM_CATALOG};

    use super::*;

    fn empty_world() -> WorldState {
        let mut config = WorldConfig::default();
        config.generation.merchant_chance = 0.0;
        config.generation.max_enemies = 0;
        config.generation.max_items = 0;
        WorldState::new(config).expect("world")
    }

    fn spawn_enemy(world: &mut WorldState, position: Vec2) -> EntityId {
        let template = world.config().enemy;
        let chunk_size = world.config().chunk_size;
        let chunks = world.chunks_mut();
        let id = chunks.allocate_id();
        chunks
            .get_or_create_key(ChunkKey::containing(position, chunk_size))
            .spawn_enemy(Enemy {
                id,
                position,
                health: template.max_health,
                max_health: template.max_health,
                damage: template.damage,
                speed: template.speed,
                attack_cooldown_ms: 0.0,
            })
    }

    fn spawn_merchant(world: &mut WorldState, position: Vec2) -> EntityId {
        let chunk_size = world.config().chunk_size;
        let chunks = world.chunks_mut();
        let id = chunks.allocate_id();
        chunks
            .get_or_create_key(ChunkKey::containing(position, chunk_size))
            .spawn_npc(Npc {
                id,
                position,
                name: "Merchant".to_string(),
                offered: ITEM_CATALOG.to_vec(),
            })
    }

    #[test]
    fn steer_picks_one_action_per_axis() {
        let actions = steer(Vec2::new(0.0, 0.0), Vec2::new(-10.0, 10.0)).collect::<Vec<_>>();
        assert_eq!(actions, vec![InputAction::MoveLeft, InputAction::MoveDown]);
        assert_eq!(steer(Vec2::new(5.0, 5.0), Vec2::new(5.5, 4.5)).count(), 0);
    }

    #[test]
    fn wanders_when_nothing_is_near() {
        let world = empty_world();
        let mut host = AutopilotHost::new(ControlMode::Desktop, 60);

        let input = host.sample_input(&world);
        assert!(input.is_held(InputAction::MoveRight));
        assert!(!input.is_held(InputAction::Attack));
    }

    #[test]
    fn attacks_in_place_when_enemy_is_in_range() {
        let mut world = empty_world();
        spawn_enemy(&mut world, Vec2::new(20.0, 0.0));
        let mut host = AutopilotHost::new(ControlMode::Laptop, 60);

        assert_eq!(
            host.intent(&world),
            Intent::Fight {
                target: Vec2::new(20.0, 0.0),
                in_range: true
            }
        );
        let input = host.sample_input(&world);
        assert!(input.is_held(InputAction::Attack));
        assert!(!input.is_held(InputAction::MoveRight));
    }

    #[test]
    fn closes_in_on_enemy_outside_attack_range() {
        let mut world = empty_world();
        spawn_enemy(&mut world, Vec2::new(0.0, -200.0));
        let mut host = AutopilotHost::new(ControlMode::Laptop, 60);

        let input = host.sample_input(&world);
        assert!(input.is_held(InputAction::MoveUp));
        assert!(input.is_held(InputAction::Attack));
    }

    #[test]
    fn buys_from_merchant_once_and_moves_on() {
        let mut world = empty_world();
        let npc = spawn_merchant(&mut world, Vec2::new(30.0, 0.0));
        let mut host = AutopilotHost::new(ControlMode::Laptop, 60);

        let input = host.sample_input(&world);
        assert!(input.is_held(InputAction::Interact));
        world.tick(1.0 / 60.0, &input);
        assert_eq!(world.trade().map(|session| session.npc()), Some(npc));

        let gold_before = world.player().gold;
        host.after_tick(&mut world);
        assert!(world.trade().is_none());
        assert!(world.player().gold < gold_before);
        assert!(!world.player().inventory.is_empty());
        assert!(matches!(host.intent(&world), Intent::Wander { .. }));
    }

    #[test]
    fn notices_are_counted() {
        let mut host = AutopilotHost::new(ControlMode::Laptop, 60);
        host.notify(&Notice {
            message: "Picked up Health Potion".to_string(),
            severity: hollow_engine::world::Severity::Success,
            position: None,
        });
        assert_eq!(host.notices_seen(), 1);
    }
}
