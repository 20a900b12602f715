use crate::app::{InputAction, InputSnapshot};
use crate::sync::{
    LocalPeerState, ManualClock, MemoryStore, MessageBody, PeerMessage, PeerSyncChannel,
    PeerView, PollReport, SyncConfig,
};

use super::*;

const DT: f32 = 1.0 / 60.0;

fn empty_config() -> WorldConfig {
    let mut config = WorldConfig::default();
    config.generation.merchant_chance = 0.0;
    config.generation.max_enemies = 0;
    config.generation.max_items = 0;
    config
}

fn empty_world() -> WorldState {
    WorldState::new(empty_config()).expect("world")
}

fn idle() -> InputSnapshot {
    InputSnapshot::default()
}

fn held(action: InputAction) -> InputSnapshot {
    InputSnapshot::default().with_action_down(action)
}

fn spawn_enemy(world: &mut WorldState, position: Vec2) -> (ChunkKey, EntityId) {
    let key = ChunkKey::containing(position, world.config.chunk_size);
    let id = world.chunks.allocate_id();
    let enemy = Enemy::from_template(id, position, &world.config.enemy);
    world
        .chunks
        .chunk_mut(key)
        .expect("chunk loaded")
        .spawn_enemy(enemy);
    (key, id)
}

fn spawn_npc(world: &mut WorldState, position: Vec2) -> EntityId {
    let key = ChunkKey::containing(position, world.config.chunk_size);
    let id = world.chunks.allocate_id();
    world
        .chunks
        .chunk_mut(key)
        .expect("chunk loaded")
        .spawn_npc(Npc {
            id,
            position,
            name: "Merchant".to_string(),
            offered: ITEM_CATALOG.to_vec(),
        });
    id
}

fn spawn_item(world: &mut WorldState, position: Vec2, kind: ItemKind) -> EntityId {
    let key = ChunkKey::containing(position, world.config.chunk_size);
    world
        .chunks
        .spawn_ground_item(key, position, InventorySlot { kind, quantity: 1 })
        .expect("chunk loaded")
}

fn enemy(world: &WorldState, key: ChunkKey, id: EntityId) -> Option<&Enemy> {
    world.chunks.chunk(key).and_then(|chunk| chunk.enemy(id))
}

fn damage_numbers(world: &WorldState) -> usize {
    world
        .effects()
        .iter()
        .filter(|effect| matches!(effect.kind, EffectKind::DamageNumber { .. }))
        .count()
}

fn peer(peer_id: &str, x: f32, health: u32) -> PeerView {
    PeerView {
        peer_id: peer_id.to_string(),
        x,
        y: 0.0,
        health,
        max_health: 100,
        timestamp: 1,
    }
}

#[test]
fn new_world_streams_twenty_five_chunks_around_origin() {
    let world = empty_world();
    assert_eq!(world.chunks().len(), 25);
    for x in -2..=2 {
        for y in -2..=2 {
            assert!(world.chunks().contains(ChunkKey::new(x, y)));
        }
    }
}

#[test]
fn moving_player_east_streams_new_column_and_evicts_old_one() {
    let mut world = empty_world();
    world.player.position = Vec2::new(2500.0, 0.0);
    world.tick(0.0, &idle());

    assert_eq!(world.player_chunk(), ChunkKey::new(2, 0));
    assert_eq!(world.chunks().len(), 25);
    assert!(world.chunks().contains(ChunkKey::new(4, 2)));
    assert!(!world.chunks().contains(ChunkKey::new(-2, 0)));
    assert!(!world.chunks().contains(ChunkKey::new(-1, -2)));
}

#[test]
fn evicted_chunk_entities_are_gone_after_return() {
    let mut world = empty_world();
    let (key, id) = spawn_enemy(&mut world, Vec2::new(-1500.0, 0.0));
    world.player.position = Vec2::new(2500.0, 0.0);
    world.tick(0.0, &idle());
    world.player.position = Vec2::ZERO;
    world.tick(0.0, &idle());

    assert!(world.chunks().contains(key));
    assert!(enemy(&world, key, id).is_none());
}

#[test]
fn player_movement_normalizes_diagonal() {
    let mut world = empty_world();
    let input = held(InputAction::MoveRight).with_action_down(InputAction::MoveDown);
    world.tick(1.0, &input);

    let position = world.player().position;
    let travelled = position.distance(Vec2::ZERO);
    assert!((travelled - 300.0).abs() < 1e-3);
    assert!(position.x > 0.0 && position.y > 0.0);
    assert_eq!(world.camera_anchor(), position);
}

#[test]
fn attack_deals_flat_damage_and_gates_on_cooldown() {
    let mut world = empty_world();
    let (key, id) = spawn_enemy(&mut world, Vec2::new(20.0, 0.0));
    {
        let target = world
            .chunks
            .chunk_mut(key)
            .and_then(|chunk| chunk.enemy_mut(id))
            .expect("enemy");
        target.health = 100;
        target.max_health = 100;
    }

    let hit = world.try_player_attack();
    assert_eq!(hit, Some(TargetRef::Enemy { chunk: key, id }));
    assert_eq!(enemy(&world, key, id).expect("alive").health, 75);
    assert_eq!(damage_numbers(&world), 1);
    assert_eq!(world.player().attack_cooldown_ms, 500.0);

    assert_eq!(world.try_player_attack(), None);
    assert_eq!(enemy(&world, key, id).expect("alive").health, 75);
    assert_eq!(damage_numbers(&world), 1);
}

#[test]
fn attack_with_no_target_in_range_keeps_cooldown_clear() {
    let mut world = empty_world();
    spawn_enemy(&mut world, Vec2::new(50.0, 0.0));
    assert_eq!(world.try_player_attack(), None);
    assert_eq!(world.player().attack_cooldown_ms, 0.0);
}

#[test]
fn attack_picks_nearest_and_breaks_ties_by_scan_order() {
    let mut world = empty_world();
    spawn_enemy(&mut world, Vec2::new(40.0, 0.0));
    let (near_key, near_id) = spawn_enemy(&mut world, Vec2::new(10.0, 0.0));
    assert_eq!(
        world.try_player_attack(),
        Some(TargetRef::Enemy {
            chunk: near_key,
            id: near_id
        })
    );

    let mut world = empty_world();
    spawn_enemy(&mut world, Vec2::new(10.0, 10.0));
    let (west_key, west_id) = spawn_enemy(&mut world, Vec2::new(-10.0, 10.0));
    assert_eq!(
        world.try_player_attack(),
        Some(TargetRef::Enemy {
            chunk: west_key,
            id: west_id
        })
    );
}

#[test]
fn enemy_death_removes_enemy_exactly_once() {
    let mut world = empty_world();
    let (key, id) = spawn_enemy(&mut world, Vec2::new(20.0, 0.0));
    world
        .chunks
        .chunk_mut(key)
        .and_then(|chunk| chunk.enemy_mut(id))
        .expect("enemy")
        .health = 25;

    world.try_player_attack();
    assert!(enemy(&world, key, id).is_none());
    let items_after_death = world.snapshot().item_count();
    assert!(items_after_death <= 1);

    assert!(!world.dispatch_enemy_death(key, id));
    assert_eq!(world.snapshot().item_count(), items_after_death);
    let deaths = world
        .events()
        .pending()
        .iter()
        .filter(|event| matches!(event, WorldEvent::EnemyDied { .. }))
        .count();
    assert_eq!(deaths, 1);
}

fn world_with_loot_chance(chance: f64) -> WorldState {
    let mut config = empty_config();
    config.generation.loot_drop_chance = chance;
    WorldState::new(config).expect("world")
}

fn kill_enemy_at(world: &mut WorldState, position: Vec2) -> ChunkKey {
    let (key, id) = spawn_enemy(world, position);
    assert!(world.dispatch_enemy_death(key, id));
    key
}

#[test]
fn enemy_death_always_drops_loot_at_its_position_when_chance_is_one() {
    let mut world = world_with_loot_chance(1.0);
    let position = Vec2::new(20.0, 5.0);
    let key = kill_enemy_at(&mut world, position);

    let items = world.chunks.chunk(key).expect("chunk").items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].position, position);
    assert_eq!(items[0].slot.quantity, 1);

    let drops = world
        .events()
        .pending()
        .iter()
        .filter_map(|event| match event {
            WorldEvent::LootDropped { id, kind } => Some((*id, *kind)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(drops, vec![(items[0].id, items[0].slot.kind)]);
}

#[test]
fn enemy_death_never_drops_loot_when_chance_is_zero() {
    let mut world = world_with_loot_chance(0.0);
    let key = kill_enemy_at(&mut world, Vec2::new(20.0, 5.0));

    assert!(world.chunks.chunk(key).expect("chunk").items().is_empty());
    assert_eq!(world.snapshot().item_count(), 0);
    assert!(!world
        .events()
        .pending()
        .iter()
        .any(|event| matches!(event, WorldEvent::LootDropped { .. })));
}

#[test]
fn enemy_chases_within_aggro_and_ignores_player_outside() {
    let mut world = empty_world();
    let (near_key, near_id) = spawn_enemy(&mut world, Vec2::new(100.0, 0.0));
    let (far_key, far_id) = spawn_enemy(&mut world, Vec2::new(400.0, 0.0));

    world.tick(0.1, &idle());

    let near = enemy(&world, near_key, near_id).expect("near");
    assert!((near.position.x - 88.0).abs() < 1e-3);
    let far = enemy(&world, far_key, far_id).expect("far");
    assert_eq!(far.position, Vec2::new(400.0, 0.0));
    assert_eq!(world.player().health, 100);
}

#[test]
fn enemy_in_melee_range_hits_player_once_per_cooldown() {
    let mut world = empty_world();
    let (key, id) = spawn_enemy(&mut world, Vec2::new(20.0, 0.0));

    world.tick(0.1, &idle());
    assert_eq!(world.player().health, 90);
    assert_eq!(
        enemy(&world, key, id).expect("enemy").attack_cooldown_ms,
        1000.0
    );
    let mut notices: Vec<Notice> = Vec::new();
    world.flush_notices(&mut notices);
    let damage_notices = notices
        .iter()
        .filter(|notice| notice.severity == Severity::Damage)
        .count();
    assert_eq!(damage_numbers(&world) + damage_notices, 1);

    world.tick(0.1, &idle());
    assert_eq!(world.player().health, 90);

    for _ in 0..9 {
        world.tick(0.1, &idle());
    }
    assert_eq!(world.player().health, 80);
}

#[test]
fn player_death_pauses_and_drops_half_the_inventory() {
    let mut world = empty_world();
    for kind in [ItemKind::HealthPotion, ItemKind::ManaPotion, ItemKind::IronSword] {
        world.player.inventory.add(kind, 1).expect("seed inventory");
    }
    world.player.health = 10;
    spawn_enemy(&mut world, Vec2::new(5.0, 0.0));

    world.tick(DT, &idle());

    assert_eq!(world.player().health, 0);
    assert!(world.is_paused());
    assert_eq!(world.player().inventory.len(), 1);
    assert_eq!(
        world.player().inventory.slots()[0].kind,
        ItemKind::HealthPotion
    );
    let snapshot = world.snapshot();
    assert!(snapshot.dead);
    assert_eq!(snapshot.item_count(), 2);
    for chunk in &snapshot.chunks {
        for item in &chunk.items {
            assert!(item.position.x.abs() <= 20.0 && item.position.y.abs() <= 20.0);
        }
    }
    assert!(world
        .events()
        .pending()
        .contains(&WorldEvent::PlayerDied { dropped_slots: 2 }));

    world.tick(1.0, &held(InputAction::MoveRight));
    assert_eq!(world.player().position, Vec2::ZERO);
    assert_eq!(world.player().inventory.len(), 1);
}

#[test]
fn respawn_restores_player_and_clears_nearby_enemies() {
    let mut world = empty_world();
    world.player.position = Vec2::new(300.0, 0.0);
    world.player.health = 5;
    world.player.mana = 0;
    spawn_enemy(&mut world, Vec2::new(310.0, 0.0));
    let (far_key, far_id) = spawn_enemy(&mut world, Vec2::new(1500.0, 1500.0));

    world.tick(DT, &idle());
    assert!(world.is_paused());

    assert!(world.respawn());
    assert!(!world.is_paused());
    assert_eq!(world.player().health, 100);
    assert_eq!(world.player().mana, 100);
    assert_eq!(world.player().position, Vec2::ZERO);
    let enemies_near_spawn = world
        .chunks()
        .chunks()
        .flat_map(|chunk| chunk.enemies())
        .filter(|enemy| enemy.position.distance(Vec2::ZERO) < 500.0)
        .count();
    assert_eq!(enemies_near_spawn, 0);
    assert!(enemy(&world, far_key, far_id).is_some());

    assert!(!world.respawn());
}

#[test]
fn item_in_reach_is_collected_and_merged() {
    let mut world = empty_world();
    world
        .player
        .inventory
        .add(ItemKind::HealthPotion, 1)
        .expect("seed");
    spawn_item(&mut world, Vec2::new(10.0, 0.0), ItemKind::HealthPotion);
    spawn_item(&mut world, Vec2::new(40.0, 0.0), ItemKind::ManaPotion);

    world.tick(DT, &idle());

    assert_eq!(world.player().inventory.len(), 1);
    assert_eq!(
        world.player().inventory.quantity_of(ItemKind::HealthPotion),
        2
    );
    assert_eq!(world.snapshot().item_count(), 1);
}

#[test]
fn full_inventory_leaves_item_and_warns_once() {
    let mut config = empty_config();
    config.max_inventory = 1;
    let mut world = WorldState::new(config).expect("world");
    world
        .player
        .inventory
        .add(ItemKind::HealthPotion, 1)
        .expect("seed");
    spawn_item(&mut world, Vec2::new(10.0, 0.0), ItemKind::ManaPotion);

    world.tick(DT, &idle());
    world.tick(DT, &idle());

    let mut notices: Vec<Notice> = Vec::new();
    world.flush_notices(&mut notices);
    let warnings = notices
        .iter()
        .filter(|notice| notice.message == "Inventory full")
        .count();
    assert_eq!(warnings, 1);
    assert_eq!(world.player().inventory.len(), 1);
    assert_eq!(world.snapshot().item_count(), 1);
}

#[test]
fn interact_edge_toggles_trade_with_nearby_merchant() {
    let mut world = empty_world();
    let npc = spawn_npc(&mut world, Vec2::new(20.0, 0.0));
    let interact = held(InputAction::Interact);

    world.tick(DT, &interact);
    assert_eq!(world.trade().map(TradeSession::npc), Some(npc));
    let units = world.trade().expect("open").stock_units();
    assert!((3..=8).contains(&units));

    world.tick(DT, &interact);
    assert!(world.trade().is_some());

    world.tick(DT, &idle());
    world.tick(DT, &interact);
    assert!(world.trade().is_none());
}

#[test]
fn open_trade_rejects_distant_merchant() {
    let mut world = empty_world();
    let npc = spawn_npc(&mut world, Vec2::new(50.0, 0.0));
    assert!(matches!(
        world.open_trade(npc),
        Err(TradeError::TooFar { .. })
    ));
    assert!(world.trade().is_none());
}

#[test]
fn buying_through_world_charges_gold_and_notifies() {
    let mut world = empty_world();
    let npc = spawn_npc(&mut world, Vec2::new(20.0, 0.0));
    world.open_trade(npc).expect("open");
    let stock = world.trade().expect("open").stock().to_vec();
    let affordable = stock
        .iter()
        .position(|slot| slot.kind.price() <= 100)
        .expect("something affordable");
    let price = stock[affordable].kind.price();

    assert_eq!(world.select_trade(TradeSide::Merchant, affordable), Ok(true));
    let outcome = world.confirm_trade().expect("confirm");

    assert!(matches!(outcome, Some(TradeOutcome::Bought { .. })));
    assert_eq!(world.player().gold, 100 - price);
    assert!(world.trade().is_some());
    let notices = world.drain_notices();
    assert!(notices
        .iter()
        .any(|notice| notice.message == "Trade successful"));
}

#[test]
fn failed_purchase_reports_not_enough_gold() {
    let mut world = empty_world();
    let npc = spawn_npc(&mut world, Vec2::new(20.0, 0.0));
    world.player.gold = 0;
    world.open_trade(npc).expect("open");
    world
        .select_trade(TradeSide::Merchant, 0)
        .expect("session open");

    assert!(matches!(
        world.confirm_trade(),
        Err(TradeError::InsufficientGold { gold: 0, .. })
    ));
    assert!(world
        .drain_notices()
        .iter()
        .any(|notice| notice.message == "Not enough gold"));
}

#[test]
fn trade_closes_when_merchant_chunk_unloads() {
    let mut world = empty_world();
    let npc = spawn_npc(&mut world, Vec2::new(20.0, 0.0));
    world.open_trade(npc).expect("open");

    world.player.position = Vec2::new(10_000.0, 0.0);
    world.tick(0.0, &idle());
    assert!(world.trade().is_none());
}

#[test]
fn trade_calls_without_session_report_not_open() {
    let mut world = empty_world();
    assert_eq!(
        world.select_trade(TradeSide::Player, 0),
        Err(TradeError::NotOpen)
    );
    assert_eq!(world.confirm_trade(), Err(TradeError::NotOpen));
    assert!(!world.close_trade());
}

#[test]
fn use_item_applies_catalog_effects() {
    let mut world = empty_world();
    world.player.health = 50;
    world
        .player
        .inventory
        .add(ItemKind::HealthPotion, 1)
        .expect("seed");
    world
        .player
        .inventory
        .add(ItemKind::IronSword, 1)
        .expect("seed");

    assert_eq!(world.use_item(0), Some(ItemKind::HealthPotion));
    assert_eq!(world.player().health, 80);
    assert_eq!(world.use_item(0), Some(ItemKind::IronSword));
    assert_eq!(world.player().damage, 30);
    assert_eq!(world.use_item(0), None);
}

#[test]
fn peer_report_mirrors_fresh_peers_and_drops_absent_ones() {
    let mut world = empty_world();
    world.set_local_peer_id("1");

    world.queue_peer_report(PollReport {
        peers: vec![peer("2", 10.0, 80), peer("3", 20.0, 100)],
        ..PollReport::default()
    });
    world.tick(0.0, &idle());
    assert_eq!(world.remote_players().count(), 2);
    assert_eq!(world.remote_player("2").expect("mirror").health, 80);

    world.queue_peer_report(PollReport {
        peers: vec![peer("3", 25.0, 90)],
        ..PollReport::default()
    });
    world.tick(0.0, &idle());
    assert!(world.remote_player("2").is_none());
    let mirror = world.remote_player("3").expect("mirror");
    assert_eq!(mirror.position, Vec2::new(25.0, 0.0));
    assert_eq!(mirror.health, 90);
}

#[test]
fn damage_message_for_local_peer_hurts_player() {
    let mut world = empty_world();
    world.set_local_peer_id("1");
    let to_us = MessageBody::Damage {
        target_id: "1".to_string(),
        amount: 25,
    };
    let to_someone_else = MessageBody::Damage {
        target_id: "9".to_string(),
        amount: 25,
    };

    world.apply_peer_report(&PollReport {
        peers: vec![peer("2", 10.0, 100)],
        messages: vec![
            PeerMessage::new(&to_us, 5, "2"),
            PeerMessage::new(&to_someone_else, 6, "2"),
        ],
        ..PollReport::default()
    });

    assert_eq!(world.player().health, 75);
    assert_eq!(damage_numbers(&world), 1);
}

#[test]
fn attacking_remote_player_queues_attack_and_damage_messages() {
    let mut world = empty_world();
    world.set_local_peer_id("1");
    world.apply_peer_report(&PollReport {
        peers: vec![peer("2", 10.0, 100)],
        ..PollReport::default()
    });

    let hit = world.try_player_attack();
    assert_eq!(
        hit,
        Some(TargetRef::Remote {
            peer_id: "2".to_string()
        })
    );
    let outbox = world.drain_outbox();
    assert_eq!(
        outbox,
        vec![
            MessageBody::Attack { x: 0.0, y: 0.0 },
            MessageBody::Damage {
                target_id: "2".to_string(),
                amount: 25
            },
        ]
    );
}

#[test]
fn two_instances_exchange_damage_through_shared_store() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(50_000);
    let start = |id: &str| {
        PeerSyncChannel::start_with_peer_id(
            id.to_string(),
            Box::new(store.clone()),
            Box::new(clock.clone()),
            SyncConfig::default(),
        )
        .expect("channel")
    };
    let mut channel_a = start("100");
    let mut channel_b = start("200");
    let mut world_a = empty_world();
    let mut world_b = empty_world();
    world_a.set_local_peer_id(channel_a.peer_id());
    world_b.set_local_peer_id(channel_b.peer_id());

    channel_b
        .heartbeat(LocalPeerState {
            x: 15.0,
            y: 0.0,
            health: 100,
            max_health: 100,
        })
        .expect("heartbeat b");
    clock.advance(100);
    world_a.queue_peer_report(channel_a.poll().expect("poll a"));
    world_a.tick(DT, &idle());
    world_a.tick(DT, &held(InputAction::Attack));

    clock.advance(1);
    for body in world_a.drain_outbox() {
        channel_a.broadcast(&body).expect("broadcast");
    }
    clock.advance(100);
    world_b.queue_peer_report(channel_b.poll().expect("poll b"));
    world_b.tick(DT, &idle());

    assert_eq!(world_b.player().health, 75);
    assert_eq!(world_a.remote_player("200").expect("mirror").health, 75);
}

#[test]
fn same_seed_and_inputs_give_identical_snapshots() {
    let config = WorldConfig {
        world_seed: 1234,
        ..WorldConfig::default()
    };
    let mut a = WorldState::new(config.clone()).expect("world a");
    let mut b = WorldState::new(config).expect("world b");
    let input = held(InputAction::MoveRight).with_action_down(InputAction::Attack);
    for _ in 0..240 {
        a.tick(DT, &input);
        b.tick(DT, &input);
    }
    assert_eq!(a.snapshot(), b.snapshot());
}
