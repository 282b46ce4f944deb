//! Tools against files written to a temp directory.

use std::path::Path;
use std::sync::Arc;

use warden_core::prelude::*;
use warden_core::replay::Replay;
use warden_test_utils::fixtures::{fixture_config, fixture_file, fixture_simulation, join};
use warden_tools::{inspect, replay, validate, ToolError};

fn write_content(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("content.ron");
    let text = ron::ser::to_string_pretty(&fixture_file(), ron::ser::PrettyConfig::default())
        .expect("serialize content");
    std::fs::write(&path, text).expect("write content");
    path
}

#[test]
fn fixture_content_round_trips_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_content(dir.path());
    let content = validate::validate_content_file(&path).expect("valid");
    assert!(content.item("copper_ore").is_some());
}

#[test]
fn snapshot_file_is_checked_against_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let content = validate::validate_content_file(&write_content(dir.path())).expect("valid");

    let mut sim = fixture_simulation();
    join(&mut sim, 1, "ada");
    let snap = dir.path().join("snap.bin");
    std::fs::write(&snap, sim.encode_snapshot().expect("encode")).expect("write");

    let summary = inspect::inspect_snapshot_file(&snap, Some(&content)).expect("inspect");
    assert_eq!(summary.tick, 1);
    assert_eq!(summary.players.len(), 1);
    let json = serde_json::to_value(&summary).expect("json");
    assert_eq!(json["players"][0]["name"], "ada");

    std::fs::write(&snap, b"\x01\x00\x00\x00garbage").expect("write");
    let err = inspect::inspect_snapshot_file(&snap, None).unwrap_err();
    assert!(matches!(err, ToolError::Snapshot(SnapshotError::Decode(_))));
}

#[test]
fn recorded_replay_verifies_and_tampering_is_caught() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sim = fixture_simulation();
    let mut recording = Replay::new(&sim).expect("replay");
    sim.submit(1, 0, Action::Join { name: "ada".into() });
    recording.record(&sim.tick());
    sim.submit(
        1,
        1,
        Action::Move {
            destination: Vec2Fixed::from_ints(4, 4),
        },
    );
    for _ in 0..20 {
        recording.record(&sim.tick());
    }
    recording.finalize(&sim);

    let path = dir.path().join("run.replay");
    std::fs::write(&path, recording.to_bytes().expect("encode")).expect("write");
    let content = Arc::clone(sim.content());
    let summary =
        replay::verify_replay_file(&path, Arc::clone(&content), fixture_config()).expect("verified");
    assert_eq!(summary.start_tick, 0);
    assert_eq!(summary.final_tick, 21);
    assert_eq!(summary.commands, 2);

    recording.final_hash ^= 0xFF;
    let err = replay::verify_replay(recording, content, fixture_config()).unwrap_err();
    assert!(matches!(err, ToolError::Core(CoreError::DesyncDetected { .. })));
}

#[test]
fn shipped_content_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/content.ron");
    let content = validate::validate_content_file(&path).expect("shipped content");
    assert!(content.wave("dusk_slimes").is_some());
    assert_eq!(content.world().structures.len(), 5);

    let mut sim = Simulation::new(Arc::new(content), SimConfig::default());
    for _ in 0..100 {
        sim.tick();
    }
    assert!(sim.system_health().iter().all(|h| h.total_faults == 0));
}
