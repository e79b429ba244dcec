//! Combat life-cycle - health, death, respawn, kill credit

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::util::time::frames_to_millis;

/// Health and respawn tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub max_health: f32,
    /// Frames spent dead before respawning
    pub respawn_frames: u32,
    pub spawn_point: Vec3,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            respawn_frames: 180,
            spawn_point: Vec3::new(0.0, 20.0, 0.0),
        }
    }
}

/// Local player's combat state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatState {
    pub health: f32,
    pub max_health: f32,
    pub is_dead: bool,
    /// Frames left until respawn while dead
    pub respawn_countdown: u32,
    pub kill_count: u32,
}

/// Transition produced by a frame evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeTransition {
    None,
    /// Alive -> Dead this frame
    Destroyed,
    /// Dead -> Alive this frame; the caller resets flight state
    Respawned,
}

/// Result of applying a confirmed hit
#[derive(Debug, Clone, PartialEq)]
pub enum HitOutcome {
    /// Dead players take no damage
    Ignored,
    Damaged { health: f32 },
    /// This hit emptied health; the victim must report a kill naming the attacker
    Killed { attacker: String },
}

/// Alive -> Dead -> Alive state machine
#[derive(Debug, Clone)]
pub struct CombatMachine {
    config: CombatConfig,
    state: CombatState,
}

impl CombatMachine {
    pub fn new(config: CombatConfig) -> Self {
        Self {
            state: CombatState {
                health: config.max_health,
                max_health: config.max_health,
                is_dead: false,
                respawn_countdown: 0,
                kill_count: 0,
            },
            config,
        }
    }

    pub fn state(&self) -> &CombatState {
        &self.state
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn is_alive(&self) -> bool {
        !self.state.is_dead
    }

    /// Per-frame step. `destroyed` is the detector's verdict; it is ignored while dead.
    pub fn evaluate(&mut self, destroyed: bool) -> LifeTransition {
        if self.state.is_dead {
            self.state.respawn_countdown = self.state.respawn_countdown.saturating_sub(1);
            if self.state.respawn_countdown == 0 {
                self.respawn();
                return LifeTransition::Respawned;
            }
            return LifeTransition::None;
        }

        if destroyed {
            self.state.is_dead = true;
            self.state.health = 0.0;
            self.state.respawn_countdown = self.config.respawn_frames.max(1);
            info!(
                kills = self.state.kill_count,
                respawn_ms = frames_to_millis(self.state.respawn_countdown),
                "Player destroyed"
            );
            return LifeTransition::Destroyed;
        }

        LifeTransition::None
    }

    /// Apply a hit confirmed by the network. The resulting death is picked up
    /// by the next frame's destruction check, not here.
    pub fn apply_hit(&mut self, attacker: &str, damage: f32) -> HitOutcome {
        if self.state.is_dead || self.state.health <= 0.0 {
            return HitOutcome::Ignored;
        }

        self.state.health = (self.state.health - damage.max(0.0)).max(0.0);
        if self.state.health <= 0.0 {
            HitOutcome::Killed {
                attacker: attacker.to_string(),
            }
        } else {
            HitOutcome::Damaged {
                health: self.state.health,
            }
        }
    }

    /// A kill confirmation named this client as the killer
    pub fn credit_kill(&mut self) -> u32 {
        self.state.kill_count += 1;
        self.state.kill_count
    }

    fn respawn(&mut self) {
        self.state.is_dead = false;
        self.state.health = self.config.max_health;
        self.state.respawn_countdown = 0;
        info!(spawn = ?self.config.spawn_point, "Player respawned");
    }
}
