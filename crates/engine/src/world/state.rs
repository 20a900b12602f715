use std::collections::{BTreeMap, BTreeSet, HashSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::app::{InputAction, InputSource};
use crate::sync::{LocalPeerState, MessageBody, PollReport};

use super::chunk::{ChunkKey, ChunkStore};
use super::config::{ConfigError, WorldConfig};
use super::entity::{EntityId, Player, RemotePlayer};
use super::events::{
    age_effects, EffectKind, FloatingEffect, Notice, Notify, Severity, WorldEvent, WorldEventBus,
};
use super::item::{InventorySlot, ItemEffect, ItemKind};
use super::math::{normalized_axes, Vec2};
use super::snapshot::{ChunkView, PlayerView, TradeView, WorldSnapshot};
use super::trade::{TradeError, TradeOutcome, TradeSession, TradeSide};

/// The whole simulation. Owned by one thread; every mutation goes through
/// `&mut self`.
pub struct WorldState {
    pub(crate) config: WorldConfig,
    pub(crate) chunks: ChunkStore,
    pub(crate) player: Player,
    pub(crate) remotes: BTreeMap<String, RemotePlayer>,
    pub(crate) effects: Vec<FloatingEffect>,
    pub(crate) events: WorldEventBus,
    pub(crate) notices: Vec<Notice>,
    pub(crate) trade: Option<TradeSession>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) paused: bool,
    pub(crate) outbox: Vec<MessageBody>,
    local_peer_id: Option<String>,
    pending_reports: Vec<PollReport>,
    interact_was_down: bool,
    blocked_pickups: HashSet<EntityId>,
    tick_count: u64,
}

impl WorldState {
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let chunks = ChunkStore::new(
            config.chunk_size,
            config.world_seed,
            config.generation,
            config.enemy,
        );
        let player = Player::from_template(&config.player, config.max_inventory);
        let rng = ChaCha8Rng::seed_from_u64(config.world_seed);
        let mut world = Self {
            config,
            chunks,
            player,
            remotes: BTreeMap::new(),
            effects: Vec::new(),
            events: WorldEventBus::default(),
            notices: Vec::new(),
            trade: None,
            rng,
            paused: false,
            outbox: Vec::new(),
            local_peer_id: None,
            pending_reports: Vec::new(),
            interact_was_down: false,
            blocked_pickups: HashSet::new(),
            tick_count: 0,
        };
        world.stream_chunks();
        info!(
            world_seed = world.config.world_seed,
            chunk_count = world.chunks.len(),
            "world_created"
        );
        Ok(world)
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Direct access for hosts and tools that seed or inspect chunk
    /// contents. Chunks outside the window are still evicted next tick.
    pub fn chunks_mut(&mut self) -> &mut ChunkStore {
        &mut self.chunks
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn remote_players(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.remotes.values()
    }

    pub fn remote_player(&self, peer_id: &str) -> Option<&RemotePlayer> {
        self.remotes.get(peer_id)
    }

    pub fn trade(&self) -> Option<&TradeSession> {
        self.trade.as_ref()
    }

    pub fn effects(&self) -> &[FloatingEffect] {
        &self.effects
    }

    pub fn events(&self) -> &WorldEventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut WorldEventBus {
        &mut self.events
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn camera_anchor(&self) -> Vec2 {
        self.player.position
    }

    pub fn player_chunk(&self) -> ChunkKey {
        ChunkKey::containing(self.player.position, self.config.chunk_size)
    }

    pub fn set_local_peer_id(&mut self, peer_id: impl Into<String>) {
        self.local_peer_id = Some(peer_id.into());
    }

    pub fn local_peer_id(&self) -> Option<&str> {
        self.local_peer_id.as_deref()
    }

    pub fn local_peer_state(&self) -> LocalPeerState {
        LocalPeerState {
            x: self.player.position.x,
            y: self.player.position.y,
            health: self.player.health,
            max_health: self.player.max_health,
        }
    }

    pub fn drain_outbox(&mut self) -> Vec<MessageBody> {
        std::mem::take(&mut self.outbox)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn flush_notices<N: Notify + ?Sized>(&mut self, sink: &mut N) {
        for notice in self.notices.drain(..) {
            sink.notify(&notice);
        }
    }

    /// Queues a poll report; it is applied during the next tick.
    pub fn queue_peer_report(&mut self, report: PollReport) {
        self.pending_reports.push(report);
    }

    pub fn tick(&mut self, dt_seconds: f32, input: &dyn InputSource) {
        let first_event = self.events.pending().len();
        let dt_seconds = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        let elapsed_ms = dt_seconds * 1000.0;

        if !self.paused {
            self.move_player(dt_seconds, input);
        }
        self.stream_chunks();

        if !self.paused {
            self.advance_cooldowns(elapsed_ms);
            if input.is_held(InputAction::Attack) {
                self.try_player_attack();
            }
            self.run_enemy_ai(dt_seconds);
        }
        self.chunks.rehome();
        if !self.paused {
            self.collect_nearby_items();
        }

        let interact_down = input.is_held(InputAction::Interact);
        if interact_down && !self.interact_was_down && !self.paused {
            self.toggle_trade();
        }
        self.interact_was_down = interact_down;

        for report in std::mem::take(&mut self.pending_reports) {
            self.apply_peer_report(&report);
        }

        age_effects(&mut self.effects, elapsed_ms);
        self.tick_count = self.tick_count.saturating_add(1);
        self.events.finish_tick(first_event);
    }

    fn move_player(&mut self, dt_seconds: f32, input: &dyn InputSource) {
        let axis = |negative: InputAction, positive: InputAction| {
            let mut value = 0.0;
            if input.is_held(negative) {
                value -= 1.0;
            }
            if input.is_held(positive) {
                value += 1.0;
            }
            value
        };
        let direction = normalized_axes(
            axis(InputAction::MoveLeft, InputAction::MoveRight),
            axis(InputAction::MoveUp, InputAction::MoveDown),
        );
        let step = self.player.speed * dt_seconds;
        self.player.position = self
            .player
            .position
            .offset(direction.x * step, direction.y * step);
    }

    pub(crate) fn stream_chunks(&mut self) {
        let center = self.player_chunk();
        let change = self
            .chunks
            .ensure_window(center, self.config.render_distance);
        if change.created.is_empty() && change.evicted.is_empty() {
            return;
        }
        debug!(
            chunk_x = center.x,
            chunk_y = center.y,
            created = change.created.len(),
            evicted = change.evicted.len(),
            "chunks_streamed"
        );
        self.events.emit(WorldEvent::ChunksStreamed {
            center,
            created: change.created.len(),
            evicted: change.evicted.len(),
        });

        let npc_gone = self
            .trade
            .as_ref()
            .is_some_and(|session| self.chunks.find_npc(session.npc()).is_none());
        if npc_gone {
            self.close_trade();
        }
    }

    fn collect_nearby_items(&mut self) {
        let radius_sq = self.config.pickup_radius * self.config.pickup_radius;
        let position = self.player.position;
        let mut in_reach = Vec::new();
        for key in self.player_chunk().neighborhood() {
            let Some(chunk) = self.chunks.chunk(key) else {
                continue;
            };
            for item in chunk.items() {
                if item.position.distance_sq(position) < radius_sq {
                    in_reach.push((key, item.id, item.slot));
                }
            }
        }

        let mut still_blocked = HashSet::new();
        for (key, id, slot) in in_reach {
            if !self.player.inventory.can_accept(slot.kind) {
                if !self.blocked_pickups.contains(&id) {
                    self.notice("Inventory full", Severity::Warning, Some(position));
                }
                still_blocked.insert(id);
                continue;
            }
            let Some(slot) = self
                .chunks
                .chunk_mut(key)
                .and_then(|chunk| chunk.collect_item(id))
            else {
                continue;
            };
            if self.player.inventory.add(slot.kind, slot.quantity).is_err() {
                continue;
            }
            self.notice(
                format!("Picked up {}", slot.kind.label()),
                Severity::Info,
                Some(position),
            );
            self.events.emit(WorldEvent::ItemCollected {
                kind: slot.kind,
                quantity: slot.quantity,
            });
        }
        self.blocked_pickups = still_blocked;
    }

    /// Consumes one unit from the slot and applies its effect. `None` while
    /// dead or when the slot is empty.
    pub fn use_item(&mut self, index: usize) -> Option<ItemKind> {
        if self.paused {
            return None;
        }
        let kind = self.player.inventory.take_one(index).ok()?;
        let player = &mut self.player;
        let message = match kind.effect() {
            ItemEffect::RestoreHealth(amount) => {
                player.health = player.health.saturating_add(amount).min(player.max_health);
                format!("+{amount} HP")
            }
            ItemEffect::RestoreMana(amount) => {
                player.mana = player.mana.saturating_add(amount).min(player.max_mana);
                format!("+{amount} MP")
            }
            ItemEffect::RaiseDamage(amount) => {
                player.damage = player.damage.saturating_add(amount);
                format!("+{amount} Damage")
            }
            ItemEffect::RaiseMaxHealth(amount) => {
                player.max_health = player.max_health.saturating_add(amount);
                player.health = player.health.saturating_add(amount).min(player.max_health);
                format!("+{amount} Max HP")
            }
        };
        let position = self.player.position;
        self.spawn_effect(EffectKind::Text { message }, position);
        self.events.emit(WorldEvent::ItemUsed { kind });
        Some(kind)
    }

    /// Valid only while dead.
    pub fn respawn(&mut self) -> bool {
        if !self.paused {
            return false;
        }
        let player = &mut self.player;
        player.health = player.max_health;
        player.mana = player.max_mana;
        player.position = Vec2::ZERO;
        player.attack_cooldown_ms = 0.0;
        player.attacking_ms = 0.0;
        self.paused = false;
        self.stream_chunks();
        let cleared = self
            .chunks
            .clear_enemies_within(Vec2::ZERO, self.config.chunk_size / 2.0);
        info!(cleared_enemies = cleared, "player_respawned");
        self.events.emit(WorldEvent::PlayerRespawned);
        true
    }

    pub fn open_trade(&mut self, npc_id: EntityId) -> Result<(), TradeError> {
        if self.paused {
            return Err(TradeError::PlayerDead);
        }
        let Some((key, npc)) = self.chunks.find_npc(npc_id) else {
            return Err(TradeError::UnknownNpc { npc: npc_id });
        };
        let distance = npc.position.distance(self.player.position);
        if distance >= self.config.interaction_distance {
            return Err(TradeError::TooFar {
                distance,
                limit: self.config.interaction_distance,
            });
        }
        let odds = self.config.generation;
        let session = TradeSession::open(
            npc,
            key,
            odds.min_merchant_stock,
            odds.max_merchant_stock,
            &mut self.rng,
        )?;
        info!(
            npc = npc_id.0,
            stock_units = session.stock_units(),
            "trade_opened"
        );
        self.trade = Some(session);
        self.events.emit(WorldEvent::TradeOpened { npc: npc_id });
        Ok(())
    }

    pub fn select_trade(&mut self, side: TradeSide, index: usize) -> Result<bool, TradeError> {
        let session = self.trade.as_mut().ok_or(TradeError::NotOpen)?;
        Ok(session.select(side, index, &self.player))
    }

    pub fn confirm_trade(&mut self) -> Result<Option<TradeOutcome>, TradeError> {
        let session = self.trade.as_mut().ok_or(TradeError::NotOpen)?;
        let position = self.player.position;
        match session.confirm(&mut self.player) {
            Ok(Some(outcome)) => {
                let (kind, price) = match outcome {
                    TradeOutcome::Bought { kind, price } | TradeOutcome::Sold { kind, price } => {
                        (kind, price)
                    }
                };
                info!(?outcome, gold = self.player.gold, "trade_completed");
                self.notice("Trade successful", Severity::Success, Some(position));
                self.events.emit(WorldEvent::TradeCompleted { kind, price });
                Ok(Some(outcome))
            }
            Ok(None) => Ok(None),
            Err(error) => {
                let message = match &error {
                    TradeError::InsufficientGold { .. } => "Not enough gold",
                    TradeError::Inventory(_) => "Inventory full",
                    _ => "Trade failed",
                };
                self.notice(message, Severity::Warning, Some(position));
                Err(error)
            }
        }
    }

    pub fn close_trade(&mut self) -> bool {
        if self.trade.take().is_none() {
            return false;
        }
        self.events.emit(WorldEvent::TradeClosed);
        true
    }

    fn toggle_trade(&mut self) {
        if self.close_trade() {
            return;
        }
        let Some(npc_id) = self.nearest_npc_in_reach() else {
            return;
        };
        if let Err(error) = self.open_trade(npc_id) {
            debug!(error = %error, "trade_open_rejected");
        }
    }

    fn nearest_npc_in_reach(&self) -> Option<EntityId> {
        let position = self.player.position;
        let mut best: Option<(EntityId, f32)> = None;
        for key in self.player_chunk().neighborhood() {
            let Some(chunk) = self.chunks.chunk(key) else {
                continue;
            };
            for npc in chunk.npcs() {
                let distance = npc.position.distance(position);
                if distance < self.config.interaction_distance
                    && best.map_or(true, |(_, nearest)| distance < nearest)
                {
                    best = Some((npc.id, distance));
                }
            }
        }
        best.map(|(id, _)| id)
    }

    /// Mirrors the fresh peer set and handles new messages addressed to us.
    pub fn apply_peer_report(&mut self, report: &PollReport) {
        let fresh = report
            .peers
            .iter()
            .map(|peer| peer.peer_id.as_str())
            .collect::<BTreeSet<_>>();
        self.remotes
            .retain(|peer_id, _| fresh.contains(peer_id.as_str()));
        for peer in &report.peers {
            if self.local_peer_id.as_deref() == Some(peer.peer_id.as_str()) {
                continue;
            }
            self.remotes.insert(
                peer.peer_id.clone(),
                RemotePlayer {
                    peer_id: peer.peer_id.clone(),
                    position: Vec2::new(peer.x, peer.y),
                    health: peer.health,
                    max_health: peer.max_health,
                    last_seen_ms: peer.timestamp,
                },
            );
        }

        for message in &report.messages {
            if self.local_peer_id.as_deref() == Some(message.sender_id.as_str()) {
                continue;
            }
            let Some(body) = message.body() else {
                debug!(kind = message.kind.as_str(), "peer_message_ignored");
                continue;
            };
            match body {
                MessageBody::Damage { target_id, amount } => {
                    if self.local_peer_id.as_deref() == Some(target_id.as_str()) {
                        self.receive_peer_damage(&message.sender_id, amount);
                    }
                }
                MessageBody::Attack { x, y } => {
                    self.spawn_effect(
                        EffectKind::Text {
                            message: "*swing*".to_string(),
                        },
                        Vec2::new(x, y),
                    );
                }
                MessageBody::Position { x, y, health } => {
                    if let Some(remote) = self.remotes.get_mut(&message.sender_id) {
                        remote.position = Vec2::new(x, y);
                        if let Some(health) = health {
                            remote.health = health;
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn notice(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        position: Option<Vec2>,
    ) {
        self.notices.push(Notice {
            message: message.into(),
            severity,
            position,
        });
    }

    pub(crate) fn spawn_effect(&mut self, kind: EffectKind, position: Vec2) {
        let life_ms = match &kind {
            EffectKind::AttackArc { .. } => self.config.attack_arc_life_ms,
            _ => self.config.effect_life_ms,
        };
        self.effects
            .push(FloatingEffect::new(kind, position, life_ms));
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let player = &self.player;
        WorldSnapshot {
            tick: self.tick_count,
            player: PlayerView {
                position: player.position,
                health: player.health,
                max_health: player.max_health,
                mana: player.mana,
                max_mana: player.max_mana,
                damage: player.damage,
                gold: player.gold,
                inventory: player.inventory.slots().to_vec(),
                inventory_capacity: player.inventory.capacity(),
                attack_cooldown_ms: player.attack_cooldown_ms,
                attacking: player.is_attacking(),
            },
            camera: self.camera_anchor(),
            dead: self.paused,
            chunks: self
                .chunks
                .chunks()
                .map(|chunk| ChunkView {
                    key: chunk.key(),
                    enemies: chunk.enemies().to_vec(),
                    npcs: chunk.npcs().to_vec(),
                    items: chunk.items().to_vec(),
                })
                .collect(),
            remote_players: self.remotes.values().cloned().collect(),
            trade: self.trade.as_ref().map(|session| TradeView {
                npc: session.npc(),
                npc_name: self
                    .chunks
                    .find_npc(session.npc())
                    .map(|(_, npc)| npc.name.clone())
                    .unwrap_or_default(),
                stock: session.stock().to_vec(),
                selection: session.selection(),
                gold: player.gold,
            }),
            effects: self.effects.clone(),
        }
    }

    pub(crate) fn drop_slots_near_player(&mut self, slots: Vec<InventorySlot>) -> usize {
        let radius = self.config.death_drop_radius;
        let origin = self.player.position;
        let key = self.player_chunk();
        self.chunks.get_or_create_key(key);
        let mut dropped = 0usize;
        for slot in slots {
            let position = origin.offset(
                self.rng.gen_range(-radius..=radius),
                self.rng.gen_range(-radius..=radius),
            );
            if self.chunks.spawn_ground_item(key, position, slot).is_some() {
                dropped = dropped.saturating_add(1);
            }
        }
        dropped
    }
}
