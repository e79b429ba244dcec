use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use tokio::sync::watch;

use skyduel::bot::BotPilot;
use skyduel::config::Tuning;
use skyduel::game::hazards::WorldHazards;
use skyduel::game::input::{Action, InputState};
use skyduel::game::projectile::ProjectileKind;
use skyduel::game::snapshot::FrameEvent;
use skyduel::game::GameSession;
use skyduel::store::MemoryRelay;
use skyduel::sync::protocol::{player_key, BULLETS_STREAM};
use skyduel::sync::Transport;
use skyduel::util::time::unix_millis;

const T0: u64 = 1_700_000_000_000;

fn open_world() -> WorldHazards {
    WorldHazards {
        sun: Vec3::new(5_000.0, 5_000.0, 5_000.0),
        planet: Vec3::new(-5_000.0, 5_000.0, -5_000.0),
        ..Default::default()
    }
}

fn tuning_at(spawn: Vec3) -> Tuning {
    let mut tuning = Tuning::default();
    tuning.combat.spawn_point = spawn;
    tuning.combat.respawn_frames = 3;
    tuning
}

fn session(relay: &Arc<MemoryRelay>, id: &str, spawn: Vec3) -> GameSession<Arc<MemoryRelay>> {
    GameSession::new(relay.clone(), id, &tuning_at(spawn), open_world(), 11, T0)
}

#[test]
fn every_frame_publishes_the_pose() {
    let relay = Arc::new(MemoryRelay::default());
    let mut pilot = session(&relay, "pilot", Vec3::new(0.0, 20.0, 0.0));
    let mut input = InputState::new();

    let snapshot = pilot.tick(&mut input, T0 + 16);
    assert_eq!(snapshot.frame, 1);
    assert!(snapshot.position.z < 0.0);

    let stored = relay.get(&player_key("pilot")).unwrap();
    assert_eq!(stored["health"], 100.0);
    assert_eq!(stored["timestamp"], T0 + 16);
}

#[test]
fn lethal_hit_kills_and_credits_the_attacker_once() {
    let relay = Arc::new(MemoryRelay::default());
    let mut victim = session(&relay, "victim", Vec3::new(0.0, 20.0, 0.0));
    let mut attacker = session(&relay, "attacker", Vec3::new(150.0, 20.0, 0.0));
    let mut victim_input = InputState::new();
    let mut attacker_input = InputState::new();

    attacker.sync().report_hit("victim", ProjectileKind::Rocket, 80.0, T0 + 1);
    let snapshot = victim.tick(&mut victim_input, T0 + 2);
    assert_eq!(snapshot.hud.health, 20.0);
    assert!(!snapshot.hud.is_dead);

    attacker.sync().report_hit("victim", ProjectileKind::Bullet, 20.0, T0 + 3);
    let snapshot = victim.tick(&mut victim_input, T0 + 4);
    assert_eq!(snapshot.hud.health, 0.0);
    assert!(snapshot.hud.is_dead);
    assert!(snapshot.events.contains(&FrameEvent::KilledBy {
        attacker_id: "attacker".into()
    }));
    assert!(snapshot.events.contains(&FrameEvent::Destroyed {
        cause: "health_depleted"
    }));

    let snapshot = attacker.tick(&mut attacker_input, T0 + 5);
    assert_eq!(snapshot.hud.kills, 1);
    let snapshot = attacker.tick(&mut attacker_input, T0 + 6);
    assert_eq!(snapshot.hud.kills, 1);

    // Hits on a dead player change nothing
    attacker.sync().report_hit("victim", ProjectileKind::Bullet, 20.0, T0 + 7);
    let snapshot = victim.tick(&mut victim_input, T0 + 8);
    assert_eq!(snapshot.hud.health, 0.0);
    assert_eq!(attacker.tick(&mut attacker_input, T0 + 9).hud.kills, 1);
}

#[test]
fn destroyed_players_respawn_at_the_spawn_point() {
    let relay = Arc::new(MemoryRelay::default());
    let spawn = Vec3::new(0.0, 20.0, 0.0);
    let mut victim = session(&relay, "victim", spawn);
    let attacker = session(&relay, "attacker", Vec3::new(150.0, 20.0, 0.0));
    let mut input = InputState::new();

    for _ in 0..30 {
        victim.tick(&mut input, T0 + 1);
    }
    attacker.sync().report_hit("victim", ProjectileKind::Bullet, 500.0, T0 + 2);
    assert!(victim.tick(&mut input, T0 + 3).hud.is_dead);

    let mut respawned = None;
    for frame in 0..3 {
        let snapshot = victim.tick(&mut input, T0 + 4 + frame);
        if snapshot.events.contains(&FrameEvent::Respawned) {
            respawned = Some(snapshot);
            break;
        }
    }

    let snapshot = respawned.expect("respawn within the configured frames");
    assert!(!snapshot.hud.is_dead);
    assert_eq!(snapshot.hud.health, 100.0);
    assert_eq!(snapshot.position, spawn);
}

#[test]
fn flying_into_the_ground_destroys() {
    let relay = Arc::new(MemoryRelay::default());
    let mut pilot = session(&relay, "pilot", Vec3::new(0.0, 2.05, 0.0));
    let mut input = InputState::new();
    input.set(Action::PitchDown, true);

    let destroyed = (0..600).any(|frame| {
        pilot
            .tick(&mut input, T0 + frame)
            .events
            .contains(&FrameEvent::Destroyed { cause: "ground" })
    });
    assert!(destroyed);
    assert!(!pilot.combat().is_alive());
}

#[test]
fn gunfire_respects_the_cooldown_and_reaches_peers() {
    let relay = Arc::new(MemoryRelay::default());
    let mut shooter = session(&relay, "shooter", Vec3::new(0.0, 20.0, 0.0));
    let mut observer = session(&relay, "observer", Vec3::new(200.0, 20.0, 0.0));
    let mut input = InputState::new();
    input.set(Action::FireGun, true);

    let shots: usize = (0..31)
        .map(|frame| {
            shooter
                .tick(&mut input, T0 + frame)
                .events
                .iter()
                .filter(|e| matches!(e, FrameEvent::Fired { kind: ProjectileKind::Bullet }))
                .count()
        })
        .sum();
    assert_eq!(shots, 2);
    assert_eq!(shooter.projectiles().len(), 2);

    observer.tick(&mut InputState::new(), T0 + 40);
    assert_eq!(observer.projectiles().len(), 2);
    assert!(observer.projectiles().projectiles().iter().all(|p| !p.is_local));
}

#[test]
fn local_projectiles_report_hits_on_live_targets() {
    let relay = Arc::new(MemoryRelay::default());
    let mut shooter = session(&relay, "shooter", Vec3::new(0.0, 20.0, 0.0));
    let mut target = session(&relay, "target", Vec3::new(0.0, 20.0, -30.0));
    let mut idle = InputState::new();

    target.tick(&mut idle, T0 + 1);

    let mut input = InputState::new();
    input.set(Action::FireGun, true);
    let landed = (0..40).any(|frame| {
        shooter
            .tick(&mut input, T0 + 2 + frame)
            .events
            .iter()
            .any(|e| matches!(e, FrameEvent::HitLanded { victim_id, .. } if victim_id == "target"))
    });
    assert!(landed);

    let snapshot = target.tick(&mut idle, T0 + 60);
    assert_eq!(snapshot.hud.health, 80.0);
}

#[test]
fn fire_records_are_deleted_once_they_expire() {
    let relay = Arc::new(MemoryRelay::default());
    let mut shooter = session(&relay, "shooter", Vec3::new(0.0, 20.0, 0.0));
    let mut observer = session(&relay, "observer", Vec3::new(200.0, 20.0, 0.0));
    let mut trigger = InputState::new();
    trigger.set(Action::FireGun, true);
    let mut idle = InputState::new();

    // One minute of play at 60 Hz with the gun held down
    let mut peak = 0;
    for frame in 0..3600u64 {
        let now = T0 + frame * 16;
        shooter.tick(&mut trigger, now);
        observer.tick(&mut idle, now);
        peak = peak.max(relay.count_under(BULLETS_STREAM));
    }

    // A shot every 30 frames, kept for 10 s
    let live = relay.count_under(BULLETS_STREAM);
    assert!(live > 0);
    assert!(live <= 23, "{live} bullet records left in the store");
    assert!(peak <= 23, "store peaked at {peak} bullet records");
}

#[test]
fn shutdown_removes_the_pose_record() {
    let relay = Arc::new(MemoryRelay::default());
    let mut pilot = session(&relay, "pilot", Vec3::new(0.0, 20.0, 0.0));
    pilot.tick(&mut InputState::new(), T0 + 1);
    assert!(relay.get(&player_key("pilot")).is_some());

    assert_eq!(relay.session_count(), 1);

    pilot.shutdown();
    assert!(relay.get(&player_key("pilot")).is_none());
    assert_eq!(relay.session_count(), 0);
}

#[tokio::test]
async fn run_loop_flies_until_told_to_stop() {
    let relay = Arc::new(MemoryRelay::default());
    let session = GameSession::new(
        relay.clone(),
        "bot-test",
        &tuning_at(Vec3::new(0.0, 60.0, 0.0)),
        open_world(),
        3,
        unix_millis(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(session.run(BotPilot::new(3), shutdown_rx));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(relay.get(&player_key("bot-test")).is_some());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(relay.get(&player_key("bot-test")).is_none());
}
