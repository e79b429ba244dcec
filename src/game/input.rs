//! Input intents consumed by the frame loop
//!
//! Device polling lives outside the core. Whatever captures keys writes held
//! state and one-shot triggers here; the session reads them once per frame.

use serde::{Deserialize, Serialize};

/// Held-key actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    YawLeft,
    YawRight,
    PitchUp,
    PitchDown,
    BoostToggle,
    FireGun,
    FireRocket,
}

/// Direction of a barrel roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollDirection {
    Left,
    Right,
}

impl RollDirection {
    /// Sign of the roll about the nose axis
    pub fn sign(self) -> f32 {
        match self {
            Self::Left => 1.0,
            Self::Right => -1.0,
        }
    }
}

/// Per-frame intents handed to the flight controller
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlightInput {
    /// -1 (right), 0, +1 (left)
    pub yaw: f32,
    /// -1 (nose down), 0, +1 (nose up)
    pub pitch: f32,
    /// Boost key currently held; the controller toggles on the rising edge
    pub boost_held: bool,
    pub roll: Option<RollDirection>,
    pub flip: bool,
}

/// Key-down state plus one-shot maneuver triggers
#[derive(Debug, Clone, Default)]
pub struct InputState {
    yaw_left: bool,
    yaw_right: bool,
    pitch_up: bool,
    pitch_down: bool,
    boost: bool,
    fire_gun: bool,
    fire_rocket: bool,
    roll: Option<RollDirection>,
    flip: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key transition
    pub fn set(&mut self, action: Action, down: bool) {
        match action {
            Action::YawLeft => self.yaw_left = down,
            Action::YawRight => self.yaw_right = down,
            Action::PitchUp => self.pitch_up = down,
            Action::PitchDown => self.pitch_down = down,
            Action::BoostToggle => self.boost = down,
            Action::FireGun => self.fire_gun = down,
            Action::FireRocket => self.fire_rocket = down,
        }
    }

    pub fn is_down(&self, action: Action) -> bool {
        match action {
            Action::YawLeft => self.yaw_left,
            Action::YawRight => self.yaw_right,
            Action::PitchUp => self.pitch_up,
            Action::PitchDown => self.pitch_down,
            Action::BoostToggle => self.boost,
            Action::FireGun => self.fire_gun,
            Action::FireRocket => self.fire_rocket,
        }
    }

    /// Queue a barrel roll. A newer request replaces one not yet consumed.
    pub fn request_roll(&mut self, direction: RollDirection) {
        self.roll = Some(direction);
    }

    /// Queue a vertical flip
    pub fn request_flip(&mut self) {
        self.flip = true;
    }

    /// Take the pending roll, clearing it
    pub fn take_roll(&mut self) -> Option<RollDirection> {
        self.roll.take()
    }

    /// Take the pending flip edge, clearing it
    pub fn take_flip(&mut self) -> bool {
        std::mem::take(&mut self.flip)
    }

    /// Drop held keys and pending triggers (used while dead)
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Build this frame's flight intents, consuming one-shot triggers
    pub fn flight_input(&mut self) -> FlightInput {
        FlightInput {
            yaw: axis(self.yaw_left, self.yaw_right),
            pitch: axis(self.pitch_up, self.pitch_down),
            boost_held: self.boost,
            roll: self.take_roll(),
            flip: self.take_flip(),
        }
    }
}

fn axis(positive: bool, negative: bool) -> f32 {
    match (positive, negative) {
        (true, false) => 1.0,
        (false, true) => -1.0,
        _ => 0.0,
    }
}
