use std::collections::BTreeMap;

use rand::Rng;
use tracing::{debug, info};

use crate::sync::MessageBody;

use super::chunk::{random_item_kind, ChunkKey, ChunkStore};
use super::entity::{EntityId, RemotePlayer, TargetRef};
use super::events::{EffectKind, Severity, WorldEvent};
use super::item::InventorySlot;
use super::math::{step_toward, Vec2};
use super::state::WorldState;

/// Subtracts `amount` from `health`, flooring at zero. Returns true when
/// this hit took the last point of health.
pub fn apply_damage(health: &mut u32, amount: u32) -> bool {
    let was_alive = *health > 0;
    *health = health.saturating_sub(amount);
    was_alive && *health == 0
}

pub fn tick_cooldown(cooldown_ms: &mut f32, elapsed_ms: f32) {
    *cooldown_ms = (*cooldown_ms - elapsed_ms).max(0.0);
}

/// Nearest living target strictly inside `range`. Enemies are scanned over
/// the 3x3 chunk block around `origin` (`dx` outer, `dy` inner, insertion
/// order within a chunk), then remote players by peer id. Only a strictly
/// nearer candidate replaces the current best.
pub fn find_nearest_target(
    chunks: &ChunkStore,
    remotes: &BTreeMap<String, RemotePlayer>,
    origin: Vec2,
    range: f32,
) -> Option<(TargetRef, f32)> {
    let mut best: Option<(TargetRef, f32)> = None;
    let mut consider = |candidate: TargetRef, distance: f32| {
        if distance < range && best.as_ref().map_or(true, |(_, nearest)| distance < *nearest) {
            best = Some((candidate, distance));
        }
    };

    let center = ChunkKey::containing(origin, chunks.chunk_size());
    for key in center.neighborhood() {
        let Some(chunk) = chunks.chunk(key) else {
            continue;
        };
        for enemy in chunk.enemies() {
            if enemy.is_dead() {
                continue;
            }
            consider(
                TargetRef::Enemy {
                    chunk: key,
                    id: enemy.id,
                },
                enemy.position.distance(origin),
            );
        }
    }
    for (peer_id, remote) in remotes {
        if remote.health == 0 {
            continue;
        }
        consider(
            TargetRef::Remote {
                peer_id: peer_id.clone(),
            },
            remote.position.distance(origin),
        );
    }
    best
}

impl WorldState {
    pub(crate) fn advance_cooldowns(&mut self, elapsed_ms: f32) {
        tick_cooldown(&mut self.player.attack_cooldown_ms, elapsed_ms);
        tick_cooldown(&mut self.player.attacking_ms, elapsed_ms);
        let keys = self.chunks.keys().collect::<Vec<_>>();
        for key in keys {
            let Some(chunk) = self.chunks.chunk_mut(key) else {
                continue;
            };
            for enemy in &mut chunk.enemies {
                tick_cooldown(&mut enemy.attack_cooldown_ms, elapsed_ms);
            }
        }
    }

    /// Attacks the nearest target in range. A no-op while the cooldown runs
    /// or when nothing is in range; only a hit resets the cooldown.
    pub fn try_player_attack(&mut self) -> Option<TargetRef> {
        if self.paused || self.player.attack_cooldown_ms > 0.0 {
            return None;
        }
        let origin = self.player.position;
        let (target, _) =
            find_nearest_target(&self.chunks, &self.remotes, origin, self.config.attack_range)?;
        let amount = self.player.damage;

        match &target {
            TargetRef::Enemy { chunk, id } => {
                let Some(enemy) = self
                    .chunks
                    .chunk_mut(*chunk)
                    .and_then(|chunk| chunk.enemy_mut(*id))
                else {
                    return None;
                };
                let died = apply_damage(&mut enemy.health, amount);
                let position = enemy.position;
                self.record_hit(origin, position, amount);
                self.events
                    .emit(WorldEvent::EnemyDamaged { id: *id, amount });
                if died {
                    self.dispatch_enemy_death(*chunk, *id);
                }
            }
            TargetRef::Remote { peer_id } => {
                let Some(remote) = self.remotes.get_mut(peer_id) else {
                    return None;
                };
                apply_damage(&mut remote.health, amount);
                let position = remote.position;
                self.record_hit(origin, position, amount);
                self.events.emit(WorldEvent::RemoteDamaged {
                    peer_id: peer_id.clone(),
                    amount,
                });
                self.outbox.push(MessageBody::Attack {
                    x: origin.x,
                    y: origin.y,
                });
                self.outbox.push(MessageBody::Damage {
                    target_id: peer_id.clone(),
                    amount,
                });
            }
        }

        self.player.attack_cooldown_ms = self.config.player_attack_cooldown_ms;
        self.player.attacking_ms = self.config.attack_arc_life_ms;
        Some(target)
    }

    pub(crate) fn run_enemy_ai(&mut self, dt_seconds: f32) {
        let player_position = self.player.position;
        let aggro_range = self.config.aggro_range;
        let melee_range = self.config.melee_range;
        let cooldown_ms = self.config.enemy_attack_cooldown_ms;
        let mut hits = Vec::new();

        let keys = self.chunks.keys().collect::<Vec<_>>();
        for key in keys {
            let Some(chunk) = self.chunks.chunk_mut(key) else {
                continue;
            };
            for enemy in &mut chunk.enemies {
                if enemy.is_dead() {
                    continue;
                }
                let distance = enemy.position.distance(player_position);
                if distance >= aggro_range {
                    continue;
                }
                if distance < melee_range && enemy.attack_cooldown_ms <= 0.0 {
                    hits.push((enemy.position, enemy.damage));
                    enemy.attack_cooldown_ms = cooldown_ms;
                }
                let (next, _) =
                    step_toward(enemy.position, player_position, enemy.speed * dt_seconds);
                enemy.position = next;
            }
        }

        for (from, amount) in hits {
            if self.paused {
                break;
            }
            self.damage_player(from, amount);
        }
    }

    pub(crate) fn receive_peer_damage(&mut self, sender_id: &str, amount: u32) {
        if self.paused {
            return;
        }
        let from = self
            .remotes
            .get(sender_id)
            .map(|remote| remote.position)
            .unwrap_or(self.player.position);
        debug!(sender = sender_id, amount, "peer_damage_received");
        self.damage_player(from, amount);
    }

    fn damage_player(&mut self, from: Vec2, amount: u32) {
        let died = apply_damage(&mut self.player.health, amount);
        let position = self.player.position;
        self.record_hit(from, position, amount);
        self.events.emit(WorldEvent::PlayerDamaged { amount });
        if died {
            self.dispatch_player_death();
        }
    }

    fn record_hit(&mut self, from: Vec2, to: Vec2, amount: u32) {
        self.spawn_effect(EffectKind::AttackArc { from, to }, from);
        self.spawn_effect(EffectKind::DamageNumber { amount }, to);
    }

    /// Removes the enemy and rolls its loot. Safe to call twice: the second
    /// call finds nothing to remove and drops nothing.
    pub(crate) fn dispatch_enemy_death(&mut self, chunk: ChunkKey, id: EntityId) -> bool {
        let Some(enemy) = self
            .chunks
            .chunk_mut(chunk)
            .and_then(|owner| owner.remove_enemy(id))
        else {
            return false;
        };
        self.events.emit(WorldEvent::EnemyDied { id });

        if self.rng.gen_bool(self.config.generation.loot_drop_chance) {
            let kind = random_item_kind(&mut self.rng);
            let slot = InventorySlot { kind, quantity: 1 };
            if let Some(item_id) = self.chunks.spawn_ground_item(chunk, enemy.position, slot) {
                self.events.emit(WorldEvent::LootDropped { id: item_id, kind });
            }
        }
        debug!(enemy = id.0, chunk_x = chunk.x, chunk_y = chunk.y, "enemy_died");
        true
    }

    /// Pauses the simulation and scatters half the inventory around the
    /// player. Runs once per death.
    pub(crate) fn dispatch_player_death(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.close_trade();

        let slot_count = self.player.inventory.len();
        let drop_count = slot_count.div_ceil(2);
        let slots = self.player.inventory.pop_slots(drop_count);
        let dropped = self.drop_slots_near_player(slots);

        info!(dropped_slots = dropped, "player_died");
        self.notice(
            "You died! Respawn to continue.",
            Severity::Damage,
            Some(self.player.position),
        );
        self.events.emit(WorldEvent::PlayerDied {
            dropped_slots: dropped,
        });
    }
}
