//! Random command scripts must replay identically.

use std::sync::Arc;

use warden_core::replay::{Replay, ReplayPlayer};
use warden_test_utils::determinism::strategies::arb_script;
use warden_test_utils::determinism::{
    find_first_divergence, run_script, verify_script_determinism, verify_snapshot_roundtrip,
};
use warden_test_utils::fixtures::{fixture_config, fixture_content_with_wave, simulation_with};
use warden_test_utils::proptest::prelude::*;

fn setup() -> warden_core::simulation::Simulation {
    simulation_with(fixture_content_with_wave())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_scripts_are_deterministic(script in arb_script(2, 20)) {
        verify_script_determinism(setup, &script, 40).assert_deterministic();
        prop_assert_eq!(find_first_divergence(setup, &script, 40), None);
        let first = run_script(setup, &script, 40);
        let second = run_script(setup, &script, 40);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn random_scripts_leave_a_restorable_world(script in arb_script(3, 15)) {
        let mut sim = setup();
        for commands in &script {
            sim.run_batch(commands.clone());
        }
        prop_assert_eq!(verify_snapshot_roundtrip(&sim), Ok(()));
    }

    #[test]
    fn recorded_scripts_replay_without_desync(script in arb_script(2, 12)) {
        let mut sim = setup();
        let mut replay = Replay::new(&sim).expect("replay");
        let mut recorded_events = Vec::new();
        for commands in &script {
            let report = sim.run_batch(commands.clone());
            recorded_events.push(report.events().to_vec());
            replay.record(&report);
        }
        for _ in 0..25 {
            let report = sim.tick();
            recorded_events.push(report.events().to_vec());
            replay.record(&report);
        }
        replay.finalize(&sim);

        let content = Arc::clone(sim.content());
        let mut player =
            ReplayPlayer::new(replay.clone(), Arc::clone(&content), fixture_config()).expect("player");
        let mut replayed_events = Vec::new();
        while let Some(report) = player.step() {
            replayed_events.push(report.events().to_vec());
        }
        prop_assert_eq!(replayed_events, recorded_events);

        let mut player = ReplayPlayer::new(replay, content, fixture_config()).expect("player");
        prop_assert!(player.verify().is_ok());
    }
}
