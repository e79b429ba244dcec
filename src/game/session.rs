//! Frame orchestrator
//!
//! Runs one client's simulation at a fixed 60 Hz: drains network events,
//! advances flight, checks destruction, fires weapons, moves projectiles,
//! and publishes the resulting pose.

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::combat::{CombatMachine, HitOutcome, LifeTransition};
use super::flight::{FlightController, ManeuverState, Pose};
use super::hazards::{CollisionDetector, WorldHazards};
use super::input::{Action, InputState};
use super::projectile::{ProjectileKind, ProjectileSystem, Target};
use super::snapshot::{hud_state, radar_blips, FrameEvent, FrameSnapshot, RADAR_RANGE};
use crate::config::Tuning;
use crate::sync::{InboundEvent, SyncService, Transport};
use crate::util::time::{frame_duration, unix_millis, Timer, FRAME_DURATION_MICROS};

/// Source of per-frame input for a session driven by [`GameSession::run`]
pub trait Pilot: Send {
    /// Look at the last frame and set up input for the next one
    fn steer(&mut self, last: &FrameSnapshot, input: &mut InputState);
}

/// One local player wired to the shared world
pub struct GameSession<T: Transport> {
    flight: FlightController,
    combat: CombatMachine,
    projectiles: ProjectileSystem,
    detector: CollisionDetector,
    sync: SyncService<T>,
    gun_cooldown: u32,
    rocket_cooldown: u32,
    frame: u64,
}

impl<T: Transport> GameSession<T> {
    pub fn new(
        transport: T,
        session_id: impl Into<String>,
        tuning: &Tuning,
        world: WorldHazards,
        seed: u64,
        now: u64,
    ) -> Self {
        let spawn = tuning.combat.spawn_point;
        Self {
            flight: FlightController::new(tuning.flight, spawn),
            combat: CombatMachine::new(tuning.combat),
            projectiles: ProjectileSystem::new(tuning.weapons, seed),
            detector: CollisionDetector::new(world, tuning.hazards),
            sync: SyncService::connect(transport, session_id, now, tuning.sync),
            gun_cooldown: 0,
            rocket_cooldown: 0,
            frame: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        self.sync.session_id()
    }

    pub fn flight(&self) -> &FlightController {
        &self.flight
    }

    pub fn combat(&self) -> &CombatMachine {
        &self.combat
    }

    pub fn projectiles(&self) -> &ProjectileSystem {
        &self.projectiles
    }

    pub fn sync(&self) -> &SyncService<T> {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncService<T> {
        &mut self.sync
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advance one frame. `now` is wall-clock milliseconds.
    pub fn tick(&mut self, input: &mut InputState, now: u64) -> FrameSnapshot {
        self.frame += 1;
        let mut events = Vec::new();

        self.sync.poll(now);
        for event in self.sync.drain_events() {
            self.handle_inbound(event, now, &mut events);
        }

        if self.combat.is_alive() {
            self.fly(input, now, &mut events);
        } else {
            // Triggers pressed while dead do not carry over into the next life
            input.take_roll();
            input.take_flip();
            if self.combat.evaluate(false) == LifeTransition::Respawned {
                self.respawn();
                events.push(FrameEvent::Respawned);
            }
        }

        self.advance_projectiles(now, &mut events);

        let pose = self.flight.pose();
        let combat = *self.combat.state();
        self.sync
            .publish_pose(&pose, self.flight.state().visual_bank_angle, combat.health, now);

        let radar = radar_blips(&pose, self.sync.remote_players(now), RADAR_RANGE);
        FrameSnapshot {
            frame: self.frame,
            position: pose.position,
            heading: pose.heading(),
            pitch: pose.pitch(),
            visual_rotation: self.flight.visual_rotation(),
            hud: hud_state(&combat, self.flight.is_speed_boosted()),
            radar,
            projectiles: self.projectiles.len(),
            events,
        }
    }

    fn fly(&mut self, input: &mut InputState, now: u64, events: &mut Vec<FrameEvent>) {
        let was_idle = self.flight.maneuver().is_idle();
        let pose = self.flight.update(&input.flight_input());

        if was_idle {
            match self.flight.maneuver() {
                ManeuverState::Rolling { .. } => events.push(FrameEvent::RollStarted),
                ManeuverState::Flipping { .. } => events.push(FrameEvent::FlipStarted),
                _ => {}
            }
        }

        let cause = self
            .detector
            .first_contact(pose.position, self.combat.state().health);
        if self.combat.evaluate(cause.is_some()) == LifeTransition::Destroyed {
            if let Some(cause) = cause {
                info!(
                    session_id = %self.sync.session_id(),
                    cause = cause.as_str(),
                    "Destroyed"
                );
                events.push(FrameEvent::destroyed(cause));
            }
            return;
        }

        self.gun_cooldown = self.gun_cooldown.saturating_sub(1);
        self.rocket_cooldown = self.rocket_cooldown.saturating_sub(1);

        if input.is_down(Action::FireGun) && self.gun_cooldown == 0 {
            self.fire(&pose, ProjectileKind::Bullet, now, events);
        }
        if input.is_down(Action::FireRocket) && self.rocket_cooldown == 0 {
            self.fire(&pose, ProjectileKind::Rocket, now, events);
        }
    }

    fn fire(&mut self, pose: &Pose, kind: ProjectileKind, now: u64, events: &mut Vec<FrameEvent>) {
        let owner = self.sync.session_id().to_string();
        self.projectiles.spawn(pose, &owner, true, kind);
        self.sync.announce_fire(pose, kind, now);

        let cooldown = self.projectiles.config().cooldown_frames(kind);
        match kind {
            ProjectileKind::Bullet => self.gun_cooldown = cooldown,
            ProjectileKind::Rocket => self.rocket_cooldown = cooldown,
        }
        events.push(FrameEvent::Fired { kind });
    }

    fn advance_projectiles(&mut self, now: u64, events: &mut Vec<FrameEvent>) {
        let remote: Vec<(String, glam::Vec3)> = self
            .sync
            .remote_players(now)
            .filter(|p| p.is_alive())
            .map(|p| (p.id.clone(), p.position))
            .collect();
        let targets: Vec<Target<'_>> = remote
            .iter()
            .map(|(id, position)| Target {
                id: id.as_str(),
                position: *position,
            })
            .collect();

        let local = self
            .combat
            .is_alive()
            .then(|| self.flight.pose().position);
        let report = self.projectiles.update(&targets, local);

        for hit in report.local_hits {
            debug!(victim_id = %hit.victim_id, damage = hit.damage, "Local projectile hit");
            self.sync.report_hit(&hit.victim_id, hit.kind, hit.damage, now);
            events.push(FrameEvent::HitLanded {
                victim_id: hit.victim_id,
                damage: hit.damage,
            });
        }
    }

    fn handle_inbound(&mut self, event: InboundEvent, now: u64, events: &mut Vec<FrameEvent>) {
        let me = self.sync.session_id().to_string();

        match event {
            InboundEvent::BulletFired(fired) => {
                let origin = Pose::from_rotation(fired.position, fired.rotation);
                self.projectiles.spawn(&origin, &fired.shooter_id, false, fired.kind);
            }
            InboundEvent::HitReported(hit) if hit.victim_id == me => {
                match self.combat.apply_hit(&hit.shooter_id, hit.damage) {
                    HitOutcome::Ignored => {}
                    HitOutcome::Damaged { health } => {
                        events.push(FrameEvent::Damaged {
                            attacker_id: hit.shooter_id,
                            health,
                        });
                    }
                    HitOutcome::Killed { attacker } => {
                        info!(session_id = %me, attacker = %attacker, "Killed by remote player");
                        self.sync.report_kill(&attacker, now);
                        events.push(FrameEvent::KilledBy {
                            attacker_id: attacker,
                        });
                    }
                }
            }
            InboundEvent::KillReported(kill) if kill.killer_id == me && kill.victim_id != me => {
                let kills = self.combat.credit_kill();
                info!(session_id = %me, victim_id = %kill.victim_id, kills, "Kill credited");
                events.push(FrameEvent::KillCredited {
                    victim_id: kill.victim_id,
                    kills,
                });
            }
            InboundEvent::HitReported(_) | InboundEvent::KillReported(_) => {}
        }
    }

    fn respawn(&mut self) {
        self.flight.reset(self.combat.config().spawn_point);
        self.gun_cooldown = 0;
        self.rocket_cooldown = 0;
        info!(session_id = %self.sync.session_id(), "Respawned");
    }

    /// Graceful leave: the pose record is removed immediately
    pub fn shutdown(mut self) {
        self.projectiles.clear();
        info!(session_id = %self.sync.session_id(), frames = self.frame, "Session ended");
        self.sync.shutdown();
    }

    /// Drive the session on a fixed 60 Hz clock until `shutdown` flips to true
    pub async fn run<P: Pilot>(mut self, mut pilot: P, mut shutdown: watch::Receiver<bool>) {
        info!(session_id = %self.sync.session_id(), "Session loop started");

        let mut tick_interval = interval(frame_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut input = InputState::new();
        let mut timer = Timer::new();

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            timer.reset();
            let snapshot = self.tick(&mut input, unix_millis());
            pilot.steer(&snapshot, &mut input);

            let elapsed = timer.elapsed_micros();
            if elapsed > FRAME_DURATION_MICROS {
                warn!(
                    session_id = %self.sync.session_id(),
                    elapsed_us = elapsed,
                    "Frame overran its budget"
                );
            }
        }

        self.shutdown();
    }
}
