//! Headless pilots flown by the server

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::game::input::{Action, InputState, RollDirection};
use crate::game::session::Pilot;
use crate::game::snapshot::{FrameSnapshot, RadarBlip};

/// Below this altitude the bot pulls up
const CLIMB_BELOW: f32 = 25.0;
/// Above this altitude the bot noses down
const DIVE_ABOVE: f32 = 160.0;
/// Maneuvers only start with this much room underneath
const MANEUVER_FLOOR: f32 = 40.0;
const GUN_RANGE: f32 = 120.0;
const ROCKET_RANGE: f32 = 80.0;
/// Horizontal offset per unit of forward distance still counted as on target
const AIM_CONE: f32 = 0.15;

/// Random wanderer that chases and shoots whatever is on radar
pub struct BotPilot {
    rng: ChaCha8Rng,
    wander: Option<Action>,
    wander_frames: u32,
}

impl BotPilot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            wander: None,
            wander_frames: 0,
        }
    }

    fn next_wander(&mut self) {
        if self.wander_frames > 0 {
            self.wander_frames -= 1;
            return;
        }
        self.wander = match self.rng.gen_range(0..3) {
            0 => Some(Action::YawLeft),
            1 => Some(Action::YawRight),
            _ => None,
        };
        self.wander_frames = self.rng.gen_range(30..180);
    }
}

impl Pilot for BotPilot {
    fn steer(&mut self, last: &FrameSnapshot, input: &mut InputState) {
        if last.hud.is_dead {
            input.clear();
            return;
        }

        let altitude = last.position.y;
        input.set(Action::PitchUp, altitude < CLIMB_BELOW);
        input.set(Action::PitchDown, altitude > DIVE_ABOVE);

        self.next_wander();
        let target = nearest_ahead(&last.radar);
        let yaw = match target {
            Some(blip) if blip.local_x < 0.0 => Some(Action::YawLeft),
            Some(_) => Some(Action::YawRight),
            None => self.wander,
        };
        input.set(Action::YawLeft, yaw == Some(Action::YawLeft));
        input.set(Action::YawRight, yaw == Some(Action::YawRight));

        let on_target = target.filter(|blip| blip.local_x.abs() <= blip.local_z * AIM_CONE);
        input.set(
            Action::FireGun,
            on_target.map(|blip| blip.distance <= GUN_RANGE).unwrap_or(false),
        );
        input.set(
            Action::FireRocket,
            on_target
                .map(|blip| blip.distance <= ROCKET_RANGE && self.rng.gen_bool(0.05))
                .unwrap_or(false),
        );

        // Boost is a toggle on the press edge
        input.set(Action::BoostToggle, self.rng.gen_bool(0.002));

        if altitude > MANEUVER_FLOOR {
            if self.rng.gen_bool(1.0 / 900.0) {
                let direction = if self.rng.gen_bool(0.5) {
                    RollDirection::Left
                } else {
                    RollDirection::Right
                };
                input.request_roll(direction);
            } else if self.rng.gen_bool(1.0 / 1500.0) {
                input.request_flip();
            }
        }
    }
}

/// Closest living blip in front of the pilot
fn nearest_ahead(radar: &[RadarBlip]) -> Option<&RadarBlip> {
    radar
        .iter()
        .filter(|blip| blip.alive && blip.local_z > 0.0)
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::snapshot::HudState;
    use glam::{Quat, Vec3};

    fn snapshot(altitude: f32, radar: Vec<RadarBlip>, is_dead: bool) -> FrameSnapshot {
        FrameSnapshot {
            frame: 1,
            position: Vec3::new(0.0, altitude, 0.0),
            heading: 0.0,
            pitch: 0.0,
            visual_rotation: Quat::IDENTITY,
            hud: HudState {
                health: 100.0,
                max_health: 100.0,
                kills: 0,
                is_dead,
                respawn_in_frames: 0,
                speed_boosted: false,
            },
            radar,
            projectiles: 0,
            events: Vec::new(),
        }
    }

    fn blip(local_x: f32, local_z: f32) -> RadarBlip {
        RadarBlip {
            id: "rival".into(),
            local_x,
            local_z,
            altitude_delta: 0.0,
            distance: local_x.hypot(local_z),
            alive: true,
        }
    }

    #[test]
    fn pulls_up_when_low() {
        let mut bot = BotPilot::new(1);
        let mut input = InputState::new();
        bot.steer(&snapshot(10.0, Vec::new(), false), &mut input);
        assert!(input.is_down(Action::PitchUp));
        assert!(!input.is_down(Action::PitchDown));
    }

    #[test]
    fn shoots_at_players_dead_ahead() {
        let mut bot = BotPilot::new(2);
        let mut input = InputState::new();
        bot.steer(&snapshot(60.0, vec![blip(-2.0, 60.0)], false), &mut input);
        assert!(input.is_down(Action::FireGun));
        assert!(input.is_down(Action::YawLeft));
    }

    #[test]
    fn holds_fire_when_target_is_off_axis() {
        let mut bot = BotPilot::new(3);
        let mut input = InputState::new();
        bot.steer(&snapshot(60.0, vec![blip(50.0, 60.0)], false), &mut input);
        assert!(!input.is_down(Action::FireGun));
        assert!(input.is_down(Action::YawRight));
    }

    #[test]
    fn releases_everything_while_dead() {
        let mut bot = BotPilot::new(4);
        let mut input = InputState::new();
        input.set(Action::FireGun, true);
        bot.steer(&snapshot(60.0, vec![blip(0.0, 30.0)], true), &mut input);
        assert!(!input.is_down(Action::FireGun));
    }
}
