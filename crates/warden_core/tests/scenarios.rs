//! End-to-end gameplay scenarios against the fixture world.

use std::sync::Arc;

use warden_core::entity::{DroppedItemState, Entity, EntityKind, Station, StatusKind, Transform};
use warden_core::prelude::*;
use warden_core::scheduler::TickScheduler;
use warden_core::systems::mob_ai::MobAiState;
use warden_core::systems::waves::WaveState;
use warden_core::systems::{default_pipeline, System, SystemContext};
use warden_test_utils::determinism::verify_snapshot_roundtrip;
use warden_test_utils::fixtures::*;

fn count_events(report: &TickReport, pred: impl Fn(&Event) -> bool) -> usize {
    report.events().iter().filter(|e| pred(e)).count()
}

fn position_of(report: &TickReport, pred: impl Fn(&Event) -> bool) -> usize {
    report
        .events()
        .iter()
        .position(|e| pred(e))
        .expect("event present")
}

#[test]
fn mining_depletes_node_after_three_swings() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");

    let mut mined = 0;
    for seq in 1..=3 {
        sim.submit(1, seq, Action::Mine { node });
        let report = sim.tick();
        assert!(report.rejections.is_empty(), "{:?}", report.rejections);
        mined += count_events(&report, |e| matches!(e, Event::OreMined { .. }));
        if seq == 3 {
            assert_eq!(
                count_events(&report, |e| matches!(e, Event::NodeDepleted { .. })),
                1
            );
        }
    }

    assert_eq!(mined, 3);
    assert!(!sim.world().store.contains(node));
    assert_eq!(count(&sim, player, COPPER_ORE), 3);

    sim.submit(1, 4, Action::Mine { node });
    let report = sim.tick();
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].reason, RejectReason::StaleTarget);
    assert_eq!(count(&sim, player, COPPER_ORE), 3);
}

#[test]
fn lethal_hit_kills_drops_loot_and_removes_mob_in_one_tick() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let mob = spawn_mob(&mut sim, SLIME, tile(1, 1));
    {
        let world = sim.world_mut();
        let mob_state = world
            .store
            .get_mut(mob)
            .and_then(Entity::as_mob_mut)
            .expect("mob");
        mob_state.health.current = 35;
        let player_state = world
            .store
            .get_mut(player)
            .and_then(Entity::as_player_mut)
            .expect("player");
        player_state.stats.attack = 40;
    }

    sim.submit(1, 1, Action::Attack { target: mob });
    let report = sim.tick();
    assert!(report.rejections.is_empty(), "{:?}", report.rejections);

    assert!(report.events().contains(&Event::DamageDealt {
        target: mob,
        amount: 40,
        remaining: 0,
    }));
    let died = position_of(&report, |e| {
        matches!(e, Event::EntityDied { entity, killer: Some(k), .. } if *entity == mob && *k == player)
    });
    let looted = position_of(&report, |e| matches!(e, Event::LootDropped { source, .. } if *source == mob));
    let removed = position_of(&report, |e| {
        matches!(e, Event::EntityRemoved { entity, kind: EntityKind::Mob } if *entity == mob)
    });
    assert!(died < looted && looted < removed);

    assert!(!sim.world().store.contains(mob));
    assert!(!sim.world().store.ids_of_kind(EntityKind::DroppedItem).is_empty());
}

#[test]
fn killed_player_respawns_with_inventory() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    give(&mut sim, player, COPPER_ORE, 4);
    place(&mut sim, player, tile(3, 3));
    let mob = spawn_mob(&mut sim, SLIME, tile(3, 4));
    {
        let mob_state = sim
            .world_mut()
            .store
            .get_mut(mob)
            .and_then(Entity::as_mob_mut)
            .expect("mob");
        mob_state.stats.attack = 500;
        mob_state.brain.state = MobAiState::Attacking { target: player };
    }

    let report = sim.tick();
    assert!(report.events().contains(&Event::DamageDealt {
        target: player,
        amount: 500,
        remaining: 0,
    }));
    assert_eq!(
        count_events(&report, |e| matches!(e, Event::PlayerRespawned { player: p, .. } if *p == player)),
        1
    );

    let entity = sim.world().store.get(player).expect("player kept");
    let state = entity.as_player().expect("player");
    assert_eq!(state.health.current, state.health.max);
    assert_eq!(entity.position(), tile(0, 0));
    assert_eq!(count(&sim, player, COPPER_ORE), 4);
}

#[test]
fn wave_runs_waiting_spawning_active_cleared() {
    let mut sim = simulation_with(fixture_content_with_wave());
    for _ in 0..30 {
        sim.tick();
    }
    assert_eq!(sim.world().waves[0].state, WaveState::Waiting);

    let report = sim.tick();
    assert_eq!(count_events(&report, |e| matches!(e, Event::WaveStarted { .. })), 1);
    assert_eq!(count_events(&report, |e| matches!(e, Event::MobSpawned { .. })), 2);
    assert_eq!(sim.world().waves[0].state, WaveState::Spawning);

    let report = sim.tick();
    assert_eq!(count_events(&report, |e| matches!(e, Event::MobSpawned { .. })), 1);
    assert!(report.events().contains(&Event::WaveActive {
        wave: FIRST_WAVE.into(),
        spawned: 3,
    }));
    assert_eq!(sim.world().waves[0].state, WaveState::Active);
    assert_eq!(sim.world().store.ids_of_kind(EntityKind::Mob).len(), 3);

    sim.tick();
    assert_eq!(sim.world().waves[0].state, WaveState::Active);

    for mob in sim.world().waves[0].mobs.clone() {
        if let Some(state) = sim.world_mut().store.get_mut(mob).and_then(Entity::as_mob_mut) {
            state.health.current = 0;
        }
    }
    let report = sim.tick();
    assert!(report.events().contains(&Event::WaveCleared {
        wave: FIRST_WAVE.into(),
    }));
    assert_eq!(sim.world().waves[0].state, WaveState::Cleared);
    assert!(sim.world().store.ids_of_kind(EntityKind::Mob).is_empty());
}

#[test]
fn hazard_pulse_damages_and_slows() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    place(&mut sim, player, tile(11, 11));
    while sim.current_tick() < 10 {
        sim.tick();
    }
    let report = sim.tick();
    assert!(report.events().contains(&Event::DamageDealt {
        target: player,
        amount: 5,
        remaining: 95,
    }));
    let statuses = sim.world().store.get(player).expect("player").statuses().to_vec();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].kind, StatusKind::Slowed);
    assert_eq!(statuses[0].expires_at, 25);
}

#[test]
fn fish_cook_and_eat() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let pond = find_station(&sim, |s| matches!(s, Station::FishingSpot(_))).expect("pond");
    let fire = find_station(&sim, |s| *s == Station::CookingFire).expect("fire");

    sim.submit(1, 1, Action::CastLine { spot: pond });
    let report = sim.tick();
    assert_eq!(count_events(&report, |e| matches!(e, Event::LineCast { .. })), 1);
    for _ in 0..5 {
        sim.tick();
    }
    sim.submit(1, 2, Action::ReelIn);
    let report = sim.tick();
    assert_eq!(count_events(&report, |e| matches!(e, Event::FishCaught { .. })), 1);
    assert_eq!(count(&sim, player, RAW_FISH), 1);

    sim.submit(
        1,
        3,
        Action::Cook {
            station: fire,
            recipe: GRILLED_FISH.into(),
        },
    );
    sim.tick();
    assert_eq!(count(&sim, player, RAW_FISH), 0);
    assert_eq!(count(&sim, player, COOKED_FISH), 1);

    sim.world_mut()
        .store
        .get_mut(player)
        .and_then(Entity::as_player_mut)
        .expect("player")
        .health
        .current = 50;
    sim.submit(1, 4, Action::Use { slot: 0 });
    let report = sim.tick();
    assert!(report.events().contains(&Event::ItemUsed {
        player,
        item: COOKED_FISH.into(),
        healed: 25,
    }));
    assert_eq!(count(&sim, player, COOKED_FISH), 0);
}

#[test]
fn vendor_buys_and_sells() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let vendor = find_station(&sim, |s| matches!(s, Station::Vendor(_))).expect("vendor");
    give(&mut sim, player, COPPER_ORE, 2);
    sim.world_mut()
        .store
        .get_mut(player)
        .and_then(Entity::as_player_mut)
        .expect("player")
        .gold = 20;

    sim.submit(
        1,
        1,
        Action::Buy {
            vendor,
            item: BRONZE_PICK.into(),
            quantity: 1,
        },
    );
    sim.submit(
        1,
        2,
        Action::Sell {
            vendor,
            item: COPPER_ORE.into(),
            quantity: 2,
        },
    );
    let report = sim.tick();
    assert!(report.rejections.is_empty(), "{:?}", report.rejections);
    assert_eq!(count(&sim, player, BRONZE_PICK), 1);
    assert_eq!(count(&sim, player, COPPER_ORE), 0);
    let gold = |sim: &Simulation| {
        sim.world()
            .store
            .get(player)
            .and_then(Entity::as_player)
            .expect("player")
            .gold
    };
    assert_eq!(gold(&sim), 9);

    sim.submit(
        1,
        3,
        Action::Buy {
            vendor,
            item: BRONZE_PICK.into(),
            quantity: 1,
        },
    );
    let report = sim.tick();
    assert_eq!(report.rejections[0].reason, RejectReason::InsufficientGold);
    assert_eq!(gold(&sim), 9);
}

#[test]
fn purchases_count_goods_already_owed_this_tick() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let vendor = find_station(&sim, |s| matches!(s, Station::Vendor(_))).expect("vendor");
    let slots = fixture_config().inventory_slots;
    give(&mut sim, player, BRONZE_PICK, u32::try_from(slots - 1).expect("slots"));
    sim.world_mut()
        .store
        .get_mut(player)
        .and_then(Entity::as_player_mut)
        .expect("player")
        .gold = 100;

    let buy = || Action::Buy {
        vendor,
        item: BRONZE_PICK.into(),
        quantity: 1,
    };
    sim.submit(1, 1, buy());
    sim.submit(1, 2, buy());
    let report = sim.tick();

    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].seq, 2);
    assert_eq!(report.rejections[0].reason, RejectReason::InventoryFull);
    assert_eq!(count(&sim, player, BRONZE_PICK), u32::try_from(slots).expect("slots"));
    assert!(sim.world().store.ids_of_kind(EntityKind::DroppedItem).is_empty());
    let gold = sim
        .world()
        .store
        .get(player)
        .and_then(Entity::as_player)
        .expect("player")
        .gold;
    assert_eq!(gold, 85);
}

#[test]
fn swings_spend_stamina() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");
    let cost = fixture_config().swing_stamina_cost;
    let set_stamina = |sim: &mut Simulation, value: u32| {
        sim.world_mut()
            .store
            .get_mut(player)
            .and_then(Entity::as_player_mut)
            .expect("player")
            .stamina = value;
    };
    let stamina = |sim: &Simulation| {
        sim.world()
            .store
            .get(player)
            .and_then(Entity::as_player)
            .expect("player")
            .stamina
    };

    set_stamina(&mut sim, cost - 1);
    sim.submit(1, 1, Action::Mine { node });
    let report = sim.tick();
    assert_eq!(report.rejections[0].reason, RejectReason::Exhausted);
    assert_eq!(count(&sim, player, COPPER_ORE), 0);
    assert_eq!(stamina(&sim), cost);

    sim.submit(1, 2, Action::Mine { node });
    let report = sim.tick();
    assert!(report.rejections.is_empty(), "{:?}", report.rejections);
    assert_eq!(count(&sim, player, COPPER_ORE), 1);
    assert_eq!(stamina(&sim), fixture_config().stamina_regen);
}

#[test]
fn first_enqueued_harvest_wins() {
    let mut sim = fixture_simulation();
    let ada = join(&mut sim, 1, "ada");
    let bob = join(&mut sim, 2, "bob");
    give(&mut sim, ada, WHEAT_SEED, 1);

    sim.submit(
        1,
        1,
        Action::Plant {
            seed: WHEAT_SEED.into(),
            tile: TilePos::new(1, 1),
        },
    );
    sim.tick();
    let crop = first_of_kind(&sim, EntityKind::Crop).expect("crop planted");
    for _ in 0..10 {
        sim.tick();
    }

    sim.submit(2, 1, Action::Harvest { crop });
    sim.submit(1, 2, Action::Harvest { crop });
    let report = sim.tick();
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].connection, 1);
    assert_eq!(report.rejections[0].reason, RejectReason::StaleTarget);
    assert_eq!(count(&sim, bob, WHEAT), 2);
    assert_eq!(count(&sim, ada, WHEAT), 0);
}

#[test]
fn duplicate_commands_apply_once() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");

    sim.submit(1, 7, Action::Mine { node });
    sim.submit(1, 7, Action::Mine { node });
    let report = sim.tick();
    assert_eq!(count_events(&report, |e| matches!(e, Event::OreMined { .. })), 1);
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].reason, RejectReason::Duplicate);

    let report = sim.tick();
    assert!(report.commands.is_empty());
    assert_eq!(count(&sim, player, COPPER_ORE), 1);
}

#[test]
fn resubmitted_command_in_later_tick_is_rejected() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");

    sim.submit(1, 7, Action::Mine { node });
    let report = sim.tick();
    assert!(report.rejections.is_empty(), "{:?}", report.rejections);
    for _ in 0..10 {
        sim.tick();
    }

    sim.submit(1, 7, Action::Mine { node });
    sim.submit(1, 3, Action::Mine { node });
    let report = sim.tick();
    let reasons: Vec<_> = report.rejections.iter().map(|r| (r.seq, r.reason)).collect();
    assert_eq!(
        reasons,
        vec![(7, RejectReason::Duplicate), (3, RejectReason::Duplicate)]
    );
    assert_eq!(count(&sim, player, COPPER_ORE), 1);

    sim.submit(1, 8, Action::Mine { node });
    let report = sim.tick();
    assert!(report.rejections.is_empty(), "{:?}", report.rejections);
    assert_eq!(count(&sim, player, COPPER_ORE), 2);
}

#[test]
fn resubmission_is_caught_after_a_restore() {
    let mut sim = fixture_simulation();
    join(&mut sim, 1, "ada");
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");
    sim.submit(1, 4, Action::Mine { node });
    sim.tick();

    let bytes = sim.encode_snapshot().expect("encode");
    StateResetManager::reset_to_defaults(&mut sim);
    assert!(StateResetManager::restore_from(&mut sim, &bytes).succeeded());
    assert_eq!(sim.world().last_seq.get(&1), Some(&4));

    sim.submit(1, 4, Action::Mine { node });
    let report = sim.tick();
    assert_eq!(report.rejections[0].reason, RejectReason::Duplicate);
}

#[test]
fn last_move_intent_wins() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    sim.submit(
        1,
        1,
        Action::Move {
            destination: tile(5, 0),
        },
    );
    sim.submit(
        1,
        2,
        Action::Move {
            destination: tile(-5, 0),
        },
    );
    let report = sim.tick();
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].seq, 1);
    assert_eq!(report.rejections[0].reason, RejectReason::Superseded);
    let state = sim.world().store.get(player).and_then(Entity::as_player).expect("player");
    assert_eq!(state.destination, Some(tile(-5, 0)));
    assert!(sim.world().store.get(player).expect("player").position().x < fixed(0));
}

#[test]
fn stale_and_unjoined_commands_change_nothing() {
    let mut sim = fixture_simulation();
    join(&mut sim, 1, "ada");
    let before = sim.world().clone();

    sim.submit(1, 1, Action::Attack { target: 9_999 });
    sim.submit(1, 2, Action::Harvest { crop: 9_998 });
    sim.submit(5, 1, Action::ReelIn);
    let report = sim.tick();

    let reasons: Vec<RejectReason> = report.rejections.iter().map(|r| r.reason).collect();
    assert!(reasons.contains(&RejectReason::StaleTarget));
    assert!(reasons.contains(&RejectReason::NotJoined));
    assert_eq!(reasons.len(), 3);
    assert_eq!(report.frame.rejections_for(5).len(), 1);

    let mut expected = before;
    expected.tick += 1;
    expected.last_seq.insert(1, 2);
    assert_eq!(sim.world(), &expected);
}

#[test]
fn rejoin_by_name_keeps_player() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    give(&mut sim, player, COPPER_ORE, 3);

    sim.submit(1, 1, Action::Leave);
    sim.tick();
    assert!(sim.world().player_for(1).is_none());
    assert!(sim.world().store.contains(player));

    assert_eq!(join(&mut sim, 9, "ada"), player);
    assert_eq!(count(&sim, player, COPPER_ORE), 3);

    sim.submit(3, 1, Action::Join { name: "ada".into() });
    let report = sim.tick();
    assert_eq!(report.rejections[0].reason, RejectReason::NameTaken);
}

struct Exploding;

impl System for Exploding {
    fn name(&self) -> &'static str {
        "cooking"
    }

    fn domain(&self) -> Option<Domain> {
        Some(Domain::Cooking)
    }

    fn run(&self, _ctx: &mut SystemContext<'_>) -> std::result::Result<(), SystemFault> {
        panic!("grill on fire");
    }
}

#[test]
fn faulting_system_is_contained_then_disabled() {
    let pipeline: Vec<Box<dyn System>> = default_pipeline()
        .into_iter()
        .map(|s| -> Box<dyn System> {
            if s.name() == "cooking" {
                Box::new(Exploding)
            } else {
                s
            }
        })
        .collect();
    let mut sim = fixture_simulation().with_scheduler(TickScheduler::with_systems(pipeline, 3));
    let player = join(&mut sim, 1, "ada");
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");
    let fire = find_station(&sim, |s| *s == Station::CookingFire).expect("fire");
    let cook = || Action::Cook {
        station: fire,
        recipe: GRILLED_FISH.into(),
    };

    // join ran one faulted tick already
    for seq in 1..=2 {
        sim.submit(1, seq, cook());
        let report = sim.tick();
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.rejections[0].reason, RejectReason::Faulted);
    }
    let cooking = sim
        .system_health()
        .into_iter()
        .find(|h| h.name == "cooking")
        .expect("cooking health");
    assert!(!cooking.is_enabled());
    assert_eq!(cooking.total_faults, 3);

    sim.submit(1, 3, cook());
    sim.submit(1, 4, Action::Mine { node });
    let report = sim.tick();
    assert!(report.faults.is_empty());
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].reason, RejectReason::SystemDisabled);
    assert_eq!(count(&sim, player, COPPER_ORE), 1);
}

#[test]
fn busy_world_round_trips_through_snapshot() {
    let mut sim = simulation_with(fixture_content_with_wave());
    let player = join(&mut sim, 1, "ada");
    give(&mut sim, player, BRONZE_PICK, 1);
    give(&mut sim, player, WHEAT_SEED, 3);
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");
    sim.submit(1, 1, Action::Mine { node });
    sim.submit(
        1,
        2,
        Action::Plant {
            seed: WHEAT_SEED.into(),
            tile: TilePos::new(-1, -1),
        },
    );
    for _ in 0..35 {
        sim.tick();
    }
    verify_snapshot_roundtrip(&sim).expect("round trip");
}

#[test]
fn deltas_converge_replica_to_authority() {
    let mut sim = simulation_with(fixture_content_with_wave());
    let mut replica = sim.full_snapshot().clone();
    let mut frames = Vec::new();

    sim.submit(1, 0, Action::Join { name: "ada".into() });
    frames.push(sim.tick().frame);
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");
    for seq in 1..=3 {
        sim.submit(1, seq, Action::Mine { node });
        frames.push(sim.tick().frame);
    }
    for _ in 0..30 {
        frames.push(sim.tick().frame);
    }

    for frame in &frames {
        frame.delta.apply_to(&mut replica).expect("in-order delta");
    }
    assert_eq!(&replica, sim.full_snapshot());
    assert_eq!(replica.encode().expect("encode"), sim.encode_snapshot().expect("encode"));
}

#[test]
fn corrupt_restore_falls_back_to_defaults() {
    let mut sim = fixture_simulation();
    let player = join(&mut sim, 1, "ada");
    let node = first_of_kind(&sim, EntityKind::ResourceNode).expect("node");

    let mut snapshot = sim.full_snapshot().clone();
    snapshot.sessions.insert(1, node);
    let report = StateResetManager::restore_snapshot(&mut sim, snapshot);
    assert!(matches!(
        report,
        RestoreReport::FellBackToDefaults {
            reason: SnapshotError::Structure(_),
            ..
        }
    ));
    assert_eq!(sim.current_tick(), 0);
    assert!(!sim.world().store.contains(player));

    let mut bytes = sim.encode_snapshot().expect("encode");
    bytes.truncate(bytes.len() / 2);
    let report = StateResetManager::restore_from(&mut sim, &bytes);
    assert!(matches!(
        report,
        RestoreReport::FellBackToDefaults {
            reason: SnapshotError::Decode(_),
            ..
        }
    ));

    let fresh = WorldState::initial(&Arc::new(fixture_content()), &fixture_config());
    assert_eq!(sim.world(), &fresh);
}

#[test]
fn out_of_range_values_fail_validation() {
    let mut sim = fixture_simulation();
    let mob = spawn_mob(&mut sim, SLIME, tile(4, 4));
    let content = Arc::clone(sim.content());

    let mut snapshot = Snapshot::capture(sim.world());
    assert_eq!(snapshot.validate(&content), Ok(()));
    for entity in &mut snapshot.entities {
        if entity.id == mob {
            if let Some(state) = entity.as_mob_mut() {
                state.health.current = state.health.max + 1;
            }
        }
    }
    assert!(matches!(
        snapshot.validate(&content),
        Err(SnapshotError::Structure(_))
    ));

    let mut world = WorldState::initial(&content, &fixture_config());
    world.store.spawn(
        Transform::at(tile(2, 2)),
        Payload::DroppedItem(DroppedItemState {
            stack: ItemStack::new(COPPER_ORE, content.max_stack(COPPER_ORE) + 1),
            despawn_tick: 100,
        }),
    );
    let report = StateResetManager::restore_snapshot(&mut sim, Snapshot::capture(&world));
    assert!(matches!(
        report,
        RestoreReport::FellBackToDefaults {
            reason: SnapshotError::Structure(_),
            ..
        }
    ));
}
