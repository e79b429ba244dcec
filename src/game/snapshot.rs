//! Per-frame presentation snapshot
//!
//! Everything a renderer or HUD needs after a tick: the local pose, combat
//! readout, radar blips in the pilot's frame, and the frame's events.

use glam::{Quat, Vec3};
use serde::Serialize;

use super::combat::CombatState;
use super::flight::Pose;
use super::hazards::Destruction;
use super::projectile::ProjectileKind;
use crate::sync::PlayerRecord;

/// Radar display range in world units
pub const RADAR_RANGE: f32 = 300.0;

/// HUD readout
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HudState {
    pub health: f32,
    pub max_health: f32,
    pub kills: u32,
    pub is_dead: bool,
    /// Frames until respawn, zero while alive
    pub respawn_in_frames: u32,
    pub speed_boosted: bool,
}

/// A remote player on radar.
///
/// `local_x` is positive to the pilot's right and `local_z` positive ahead,
/// measured in the horizontal plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarBlip {
    pub id: String,
    pub local_x: f32,
    pub local_z: f32,
    pub altitude_delta: f32,
    pub distance: f32,
    pub alive: bool,
}

/// Something that happened during a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameEvent {
    Fired { kind: ProjectileKind },
    RollStarted,
    FlipStarted,
    HitLanded { victim_id: String, damage: f32 },
    Damaged { attacker_id: String, health: f32 },
    Destroyed { cause: &'static str },
    KilledBy { attacker_id: String },
    KillCredited { victim_id: String, kills: u32 },
    Respawned,
}

impl FrameEvent {
    pub fn destroyed(cause: Destruction) -> Self {
        Self::Destroyed {
            cause: cause.as_str(),
        }
    }
}

/// Output of one tick
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub position: Vec3,
    pub heading: f32,
    pub pitch: f32,
    /// Authoritative rotation with bank and any roll applied on top
    pub visual_rotation: Quat,
    pub hud: HudState,
    pub radar: Vec<RadarBlip>,
    pub projectiles: usize,
    pub events: Vec<FrameEvent>,
}

impl FrameSnapshot {
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.heading, self.pitch)
    }
}

/// Place remote players in the pilot's horizontal frame
pub fn radar_blips<'a>(
    local: &Pose,
    players: impl IntoIterator<Item = &'a PlayerRecord>,
    range: f32,
) -> Vec<RadarBlip> {
    let (sin_h, cos_h) = local.heading().sin_cos();
    let ahead = Vec3::new(-sin_h, 0.0, -cos_h);
    let right = Vec3::new(cos_h, 0.0, -sin_h);

    let mut blips: Vec<RadarBlip> = players
        .into_iter()
        .filter_map(|player| {
            let offset = player.position - local.position;
            let flat = Vec3::new(offset.x, 0.0, offset.z);
            let distance = flat.length();
            if distance > range {
                return None;
            }
            Some(RadarBlip {
                id: player.id.clone(),
                local_x: flat.dot(right),
                local_z: flat.dot(ahead),
                altitude_delta: offset.y,
                distance,
                alive: player.is_alive(),
            })
        })
        .collect();

    blips.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    blips
}

pub fn hud_state(combat: &CombatState, speed_boosted: bool) -> HudState {
    HudState {
        health: combat.health,
        max_health: combat.max_health,
        kills: combat.kill_count,
        is_dead: combat.is_dead,
        respawn_in_frames: combat.respawn_countdown,
        speed_boosted,
    }
}
