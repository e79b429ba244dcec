//! Flight controller: heading/pitch flight model and scripted maneuvers

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_3, FRAC_PI_4, PI, TAU};
use tracing::debug;

use super::input::{FlightInput, RollDirection};
use super::orientation::{build_rotation, extract_angles, forward, up, WORLD_UP};

/// Flight tuning, all rates per frame at the fixed cadence
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Cruise speed (world units per frame)
    pub base_speed: f32,
    /// Speed while boost is toggled on
    pub boosted_speed: f32,
    /// Fraction of the speed gap closed each frame
    pub speed_lerp: f32,
    pub yaw_acceleration: f32,
    pub max_yaw_rate: f32,
    pub pitch_acceleration: f32,
    pub max_pitch_rate: f32,
    /// Multiplier applied to yaw and pitch rates every frame
    pub damping: f32,
    /// Pitch is clamped to +/- this angle
    pub max_pitch_angle: f32,
    /// Multiplicative pitch decay on frames without pitch input
    pub pitch_level_decay: f32,
    /// Pitch snaps to zero below this magnitude
    pub level_epsilon: f32,
    /// Visual bank at full yaw rate
    pub max_bank_angle: f32,
    pub bank_ease: f32,
    /// Idle frames before auto-balance engages
    pub auto_balance_delay_frames: u32,
    /// Fraction of the remaining pitch removed per frame by auto-balance
    pub auto_balance_rate: f32,
    /// Yaw rate considered settled for auto-balance
    pub yaw_settle_threshold: f32,
    /// Barrel roll progress per frame (radians)
    pub roll_speed: f32,
    /// Vertical flip progress per frame (radians)
    pub flip_speed: f32,
    /// Peak pitch reached at the top of a flip
    pub flip_peak_pitch: f32,
    /// Fraction of the up-vector misalignment corrected per frame
    pub stabilization_rate: f32,
    /// Misalignment (radians) at which stabilizing ends
    pub stabilization_threshold: f32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            base_speed: 0.1,
            boosted_speed: 0.35,
            speed_lerp: 0.1,
            yaw_acceleration: 0.0008,
            max_yaw_rate: 0.025,
            pitch_acceleration: 0.0003,
            max_pitch_rate: 0.015,
            damping: 0.92,
            max_pitch_angle: FRAC_PI_3,
            pitch_level_decay: 0.97,
            level_epsilon: 1e-3,
            max_bank_angle: 0.6,
            bank_ease: 0.1,
            auto_balance_delay_frames: 120,
            auto_balance_rate: 0.03,
            yaw_settle_threshold: 0.001,
            roll_speed: 0.15,
            flip_speed: 0.04,
            flip_peak_pitch: FRAC_PI_4,
            stabilization_rate: 0.05,
            stabilization_threshold: 0.01,
        }
    }
}

/// Authoritative pose. The rotation is always rebuilt from heading and pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    heading: f32,
    pitch: f32,
    rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, heading: f32, pitch: f32) -> Self {
        Self {
            position,
            heading,
            pitch,
            rotation: build_rotation(heading, pitch),
        }
    }

    /// Level pose facing -Z
    pub fn at(position: Vec3) -> Self {
        Self::new(position, 0.0, 0.0)
    }

    /// Import an arbitrary rotation, keeping only its heading and pitch
    pub fn from_rotation(position: Vec3, rotation: Quat) -> Self {
        let (heading, pitch) = extract_angles(rotation);
        Self::new(position, heading, pitch)
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn forward(&self) -> Vec3 {
        forward(self.rotation)
    }

    fn set_angles(&mut self, heading: f32, pitch: f32) {
        self.heading = heading;
        self.pitch = pitch;
        self.rotation = build_rotation(heading, pitch);
    }
}

/// Per-frame flight variables owned by the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightState {
    pub current_speed: f32,
    pub target_speed: f32,
    pub yaw_rate: f32,
    pub pitch_rate: f32,
    pub speed_boost_active: bool,
    /// Boost key state last frame, for rising-edge detection
    pub boost_key_was_down: bool,
    /// Frames since the last yaw or pitch input
    pub frames_since_input: u32,
    pub auto_balance_active: bool,
    /// Cosmetic bank into turns; never feeds back into heading or pitch
    pub visual_bank_angle: f32,
}

impl FlightState {
    fn initial(config: &FlightConfig) -> Self {
        Self {
            current_speed: config.base_speed,
            target_speed: config.base_speed,
            yaw_rate: 0.0,
            pitch_rate: 0.0,
            speed_boost_active: false,
            boost_key_was_down: false,
            frames_since_input: 0,
            auto_balance_active: false,
            visual_bank_angle: 0.0,
        }
    }
}

/// Active maneuver. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ManeuverState {
    Idle,
    /// Visual-only barrel roll
    Rolling {
        direction: RollDirection,
        progress: f32,
    },
    /// Half loop that reverses heading
    Flipping { progress: f32, heading_at_start: f32 },
    /// Easing the visual roll layer back to upright after a roll
    Stabilizing,
}

impl ManeuverState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Owns the local airplane's flight path and its cosmetic layers
#[derive(Debug, Clone)]
pub struct FlightController {
    config: FlightConfig,
    pose: Pose,
    state: FlightState,
    maneuver: ManeuverState,
    /// Non-authoritative roll layer driven by rolls and the stabilizer
    visual_roll: Quat,
}

impl FlightController {
    pub fn new(config: FlightConfig, spawn: Vec3) -> Self {
        Self {
            state: FlightState::initial(&config),
            config,
            pose: Pose::at(spawn),
            maneuver: ManeuverState::Idle,
            visual_roll: Quat::IDENTITY,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn state(&self) -> &FlightState {
        &self.state
    }

    pub fn maneuver(&self) -> ManeuverState {
        self.maneuver
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn is_speed_boosted(&self) -> bool {
        self.state.speed_boost_active
    }

    /// Rotation to render: authoritative frame, then bank, then roll layer
    pub fn visual_rotation(&self) -> Quat {
        self.pose.rotation * Quat::from_rotation_z(self.state.visual_bank_angle) * self.visual_roll
    }

    /// Angle between the roll layer's up vector and upright
    pub fn visual_misalignment(&self) -> f32 {
        up(self.visual_roll).dot(WORLD_UP).clamp(-1.0, 1.0).acos()
    }

    /// Advance one fixed frame
    pub fn update(&mut self, input: &FlightInput) -> Pose {
        self.update_speed(input.boost_held);

        match self.maneuver {
            ManeuverState::Idle => {
                if let Some(direction) = input.roll {
                    self.begin_roll(direction);
                } else if input.flip {
                    self.begin_flip();
                } else {
                    self.steer(input);
                }
            }
            ManeuverState::Rolling {
                direction,
                progress,
            } => self.continue_roll(direction, progress),
            ManeuverState::Flipping {
                progress,
                heading_at_start,
            } => self.continue_flip(progress, heading_at_start),
            ManeuverState::Stabilizing => self.stabilize(),
        }

        if !self.maneuver.is_idle() {
            self.ease_bank(0.0);
        }

        // No reverse: the airplane always flies nose-first
        let forward = self.pose.forward();
        self.pose.position += forward * self.state.current_speed;

        self.pose
    }

    /// Full reset used on respawn
    pub fn reset(&mut self, spawn: Vec3) {
        self.pose = Pose::at(spawn);
        self.state = FlightState::initial(&self.config);
        self.maneuver = ManeuverState::Idle;
        self.visual_roll = Quat::IDENTITY;
    }

    /// Adopt an externally supplied rotation. Pitch is clamped to the flight envelope.
    pub fn import_rotation(&mut self, rotation: Quat) {
        let (heading, pitch) = extract_angles(rotation);
        let limit = self.config.max_pitch_angle;
        self.pose.set_angles(heading, pitch.clamp(-limit, limit));
    }

    fn update_speed(&mut self, boost_held: bool) {
        if boost_held && !self.state.boost_key_was_down {
            self.state.speed_boost_active = !self.state.speed_boost_active;
        }
        self.state.boost_key_was_down = boost_held;

        self.state.target_speed = if self.state.speed_boost_active {
            self.config.boosted_speed
        } else {
            self.config.base_speed
        };
        self.state.current_speed +=
            (self.state.target_speed - self.state.current_speed) * self.config.speed_lerp;
    }

    fn steer(&mut self, input: &FlightInput) {
        let cfg = self.config;
        let yaw_intent = input.yaw.clamp(-1.0, 1.0);
        let pitch_intent = input.pitch.clamp(-1.0, 1.0);

        if yaw_intent != 0.0 || pitch_intent != 0.0 {
            self.state.frames_since_input = 0;
            self.state.auto_balance_active = false;
        } else {
            self.state.frames_since_input = self.state.frames_since_input.saturating_add(1);
        }

        let state = &mut self.state;
        state.yaw_rate = (cfg.damping * (state.yaw_rate + yaw_intent * cfg.yaw_acceleration))
            .clamp(-cfg.max_yaw_rate, cfg.max_yaw_rate);
        let heading = self.pose.heading + state.yaw_rate;

        state.pitch_rate = (cfg.damping * (state.pitch_rate + pitch_intent * cfg.pitch_acceleration))
            .clamp(-cfg.max_pitch_rate, cfg.max_pitch_rate);
        let mut pitch =
            (self.pose.pitch + state.pitch_rate).clamp(-cfg.max_pitch_angle, cfg.max_pitch_angle);

        if pitch_intent == 0.0 {
            pitch = level_toward_zero(pitch, cfg.pitch_level_decay, cfg.level_epsilon);
        }

        if !state.auto_balance_active
            && state.frames_since_input > cfg.auto_balance_delay_frames
            && state.yaw_rate.abs() < cfg.yaw_settle_threshold
        {
            state.auto_balance_active = true;
            debug!(pitch, "Auto-balance engaged");
        }
        if state.auto_balance_active {
            pitch = level_toward_zero(pitch, 1.0 - cfg.auto_balance_rate, cfg.level_epsilon);
        }

        let bank_target = -(state.yaw_rate / cfg.max_yaw_rate) * cfg.max_bank_angle;
        self.ease_bank(bank_target);
        self.pose.set_angles(heading, pitch);
    }

    fn ease_bank(&mut self, target: f32) {
        self.state.visual_bank_angle += (target - self.state.visual_bank_angle) * self.config.bank_ease;
    }

    fn begin_roll(&mut self, direction: RollDirection) {
        debug!(?direction, "Barrel roll started");
        self.halt_rates();
        self.maneuver = ManeuverState::Rolling {
            direction,
            progress: 0.0,
        };
    }

    fn continue_roll(&mut self, direction: RollDirection, progress: f32) {
        let progress = progress + self.config.roll_speed;
        self.visual_roll = Quat::from_rotation_z(direction.sign() * progress);

        self.maneuver = if progress >= TAU {
            ManeuverState::Stabilizing
        } else {
            ManeuverState::Rolling {
                direction,
                progress,
            }
        };
    }

    fn stabilize(&mut self) {
        let current_up = up(self.visual_roll);
        let angle = current_up.dot(WORLD_UP).clamp(-1.0, 1.0).acos();

        if angle > self.config.stabilization_threshold {
            let axis = current_up.cross(WORLD_UP);
            // Exactly inverted: any horizontal axis works, roll about the nose
            let axis = if axis.length_squared() > 1e-12 {
                axis.normalize()
            } else {
                Vec3::Z
            };
            let correction = Quat::from_axis_angle(axis, angle * self.config.stabilization_rate);
            self.visual_roll = (correction * self.visual_roll).normalize();
        } else {
            self.visual_roll = Quat::IDENTITY;
            self.state.auto_balance_active = false;
            self.maneuver = ManeuverState::Idle;
        }
    }

    fn begin_flip(&mut self) {
        debug!(heading = self.pose.heading, "Flip started");
        self.halt_rates();
        self.maneuver = ManeuverState::Flipping {
            progress: 0.0,
            heading_at_start: self.pose.heading,
        };
    }

    fn continue_flip(&mut self, progress: f32, heading_at_start: f32) {
        let progress = progress + self.config.flip_speed;

        if progress >= PI {
            // Land exactly on the reversed heading, level
            self.pose.set_angles(heading_at_start + PI, 0.0);
            self.halt_rates();
            self.maneuver = ManeuverState::Idle;
            return;
        }

        let limit = self.config.max_pitch_angle;
        let pitch = (progress.sin() * self.config.flip_peak_pitch).clamp(-limit, limit);
        self.pose.set_angles(heading_at_start + progress, pitch);
        self.maneuver = ManeuverState::Flipping {
            progress,
            heading_at_start,
        };
    }

    fn halt_rates(&mut self) {
        self.state.yaw_rate = 0.0;
        self.state.pitch_rate = 0.0;
        self.state.auto_balance_active = false;
    }
}

fn level_toward_zero(pitch: f32, factor: f32, epsilon: f32) -> f32 {
    let leveled = pitch * factor;
    if leveled.abs() < epsilon {
        0.0
    } else {
        leveled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> FlightController {
        FlightController::new(FlightConfig::default(), Vec3::new(0.0, 20.0, 0.0))
    }

    fn yaw_left() -> FlightInput {
        FlightInput {
            yaw: 1.0,
            ..Default::default()
        }
    }

    fn pitch_up() -> FlightInput {
        FlightInput {
            pitch: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn sustained_yaw_turns_left_without_pitching() {
        let mut flight = FlightController::new(FlightConfig::default(), Vec3::ZERO);
        for _ in 0..90 {
            flight.update(&yaw_left());
        }
        let pose = flight.pose();
        assert!(pose.heading() > 0.0);
        assert_eq!(pose.pitch(), 0.0);
        assert!(flight.state().yaw_rate.abs() <= flight.config().max_yaw_rate);
        // Banks into the left turn
        assert!(flight.state().visual_bank_angle < 0.0);
    }

    #[test]
    fn pitch_never_leaves_the_envelope() {
        let mut flight = controller();
        let limit = flight.config().max_pitch_angle;
        for _ in 0..2_000 {
            let pose = flight.update(&pitch_up());
            assert!(pose.pitch() <= limit);
        }
        assert_eq!(flight.pose().pitch(), limit);

        let down = FlightInput {
            pitch: -1.0,
            ..Default::default()
        };
        for _ in 0..2_000 {
            let pose = flight.update(&down);
            assert!(pose.pitch() >= -limit);
        }
    }

    #[test]
    fn pitch_levels_out_after_release() {
        let mut flight = controller();
        for _ in 0..60 {
            flight.update(&pitch_up());
        }
        assert!(flight.pose().pitch() > 0.0);
        for _ in 0..600 {
            flight.update(&FlightInput::default());
        }
        assert_eq!(flight.pose().pitch(), 0.0);
    }

    #[test]
    fn auto_balance_waits_for_idle_delay() {
        let mut flight = controller();
        flight.update(&yaw_left());
        let delay = flight.config().auto_balance_delay_frames;
        for _ in 0..delay {
            flight.update(&FlightInput::default());
        }
        assert!(!flight.state().auto_balance_active);
        for _ in 0..60 {
            flight.update(&FlightInput::default());
        }
        assert!(flight.state().auto_balance_active);

        flight.update(&pitch_up());
        assert!(!flight.state().auto_balance_active);
    }

    #[test]
    fn flip_lands_on_reversed_heading_for_any_step() {
        for step in [0.013, 0.04, 0.3, 1.0, 4.0] {
            let config = FlightConfig {
                flip_speed: step,
                ..Default::default()
            };
            let mut flight = FlightController::new(config, Vec3::new(0.0, 50.0, 0.0));
            for _ in 0..10 {
                flight.update(&yaw_left());
            }
            let start = flight.pose().heading();

            flight.update(&FlightInput {
                flip: true,
                ..Default::default()
            });
            let mut frames = 0;
            while !flight.maneuver().is_idle() {
                let pose = flight.update(&FlightInput::default());
                assert!(pose.pitch() >= 0.0 && pose.pitch() <= config.flip_peak_pitch);
                frames += 1;
                assert!(frames < 1_000, "flip never finished with step {step}");
            }

            assert_eq!(flight.pose().heading(), start + PI);
            assert_eq!(flight.pose().pitch(), 0.0);
            assert_eq!(flight.state().yaw_rate, 0.0);
            assert_eq!(flight.state().pitch_rate, 0.0);
        }
    }

    #[test]
    fn roll_never_touches_flight_path() {
        let mut flight = controller();
        for _ in 0..30 {
            flight.update(&pitch_up());
        }
        flight.update(&FlightInput {
            roll: Some(RollDirection::Left),
            ..Default::default()
        });
        let heading = flight.pose().heading();
        let pitch = flight.pose().pitch();

        // Steering input is ignored for the whole maneuver
        let noisy = FlightInput {
            yaw: -1.0,
            pitch: 1.0,
            ..Default::default()
        };
        let mut frames = 0;
        while !flight.maneuver().is_idle() {
            let pose = flight.update(&noisy);
            assert_eq!(pose.heading(), heading);
            assert_eq!(pose.pitch(), pitch);
            frames += 1;
            assert!(frames < 500);
        }
    }

    #[test]
    fn roll_stabilizes_then_returns_to_idle() {
        let mut flight = controller();
        flight.update(&FlightInput {
            roll: Some(RollDirection::Right),
            ..Default::default()
        });
        assert!(matches!(
            flight.maneuver(),
            ManeuverState::Rolling {
                direction: RollDirection::Right,
                ..
            }
        ));

        let mut frames = 0;
        while let ManeuverState::Rolling { .. } = flight.maneuver() {
            flight.update(&FlightInput::default());
            frames += 1;
            assert!(frames < 100);
        }
        assert_eq!(flight.maneuver(), ManeuverState::Stabilizing);

        while flight.maneuver() == ManeuverState::Stabilizing {
            flight.update(&FlightInput::default());
            frames += 1;
            assert!(frames < 400);
        }
        assert_eq!(flight.maneuver(), ManeuverState::Idle);
        assert!(flight.visual_misalignment() < 1e-6);
    }

    #[test]
    fn maneuvers_do_not_stack() {
        let mut flight = controller();
        flight.update(&FlightInput {
            flip: true,
            ..Default::default()
        });
        flight.update(&FlightInput {
            roll: Some(RollDirection::Left),
            ..Default::default()
        });
        assert!(matches!(flight.maneuver(), ManeuverState::Flipping { .. }));
    }

    #[test]
    fn boost_toggles_on_rising_edge_only() {
        let mut flight = controller();
        let held = FlightInput {
            boost_held: true,
            ..Default::default()
        };
        for _ in 0..10 {
            flight.update(&held);
        }
        assert!(flight.is_speed_boosted());
        flight.update(&FlightInput::default());
        flight.update(&held);
        assert!(!flight.is_speed_boosted());
    }

    #[test]
    fn always_flies_forward() {
        let mut flight = controller();
        let before = flight.pose().position;
        for _ in 0..10 {
            flight.update(&FlightInput::default());
        }
        let after = flight.pose().position;
        assert!(after.z < before.z);
        assert!((after.x - before.x).abs() < 1e-6);
    }

    #[test]
    fn boosted_speed_eases_in() {
        let mut flight = controller();
        flight.update(&FlightInput {
            boost_held: true,
            ..Default::default()
        });
        let first = flight.state().current_speed;
        assert!(first > flight.config().base_speed);
        assert!(first < flight.config().boosted_speed);
        for _ in 0..200 {
            flight.update(&FlightInput::default());
        }
        assert!((flight.state().current_speed - flight.config().boosted_speed).abs() < 1e-4);
    }

    #[test]
    fn reset_restores_spawn_state() {
        let mut flight = controller();
        for _ in 0..40 {
            flight.update(&FlightInput {
                yaw: 1.0,
                pitch: 1.0,
                boost_held: true,
                ..Default::default()
            });
        }
        flight.update(&FlightInput {
            roll: Some(RollDirection::Left),
            ..Default::default()
        });

        let spawn = Vec3::new(0.0, 20.0, 0.0);
        flight.reset(spawn);
        assert_eq!(flight.pose(), Pose::at(spawn));
        assert_eq!(flight.maneuver(), ManeuverState::Idle);
        assert_eq!(*flight.state(), FlightState::initial(flight.config()));
        assert_eq!(flight.visual_rotation(), Quat::IDENTITY);
    }

    #[test]
    fn imported_rotation_is_clamped() {
        let mut flight = controller();
        flight.import_rotation(Quat::from_rotation_x(1.5));
        assert_eq!(flight.pose().pitch(), flight.config().max_pitch_angle);
    }
}
