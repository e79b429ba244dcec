//! Shared record formats
//! These are the records every client writes into the broadcast store

use glam::{Quat, Vec3};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::game::projectile::ProjectileKind;

/// Path holding one live pose record per client
pub const PLAYERS_PATH: &str = "players";
/// Append-only fire events
pub const BULLETS_STREAM: &str = "bullets";
/// Append-only hit claims
pub const HITS_STREAM: &str = "hits";
/// Append-only kill confirmations
pub const KILLS_STREAM: &str = "kills";

pub fn player_key(session_id: &str) -> String {
    format!("{PLAYERS_PATH}/{session_id}")
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("field `{0}` is not finite")]
    NonFinite(&'static str),

    #[error("field `{0}` is empty")]
    EmptyId(&'static str),
}

/// Semantic checks applied after decoding
pub trait Validate {
    fn validate(&self) -> Result<(), ProtocolError>;
}

/// Decode and validate a record read from the store
pub fn decode<T: DeserializeOwned + Validate>(value: &Value) -> Result<T, ProtocolError> {
    let record = T::deserialize(value)?;
    record.validate()?;
    Ok(record)
}

pub fn encode<T: Serialize>(record: &T) -> Result<Value, ProtocolError> {
    Ok(serde_json::to_value(record)?)
}

/// Live pose of one client, overwritten every frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoseUpdate {
    pub position: Vec3,
    pub heading: f32,
    pub pitch: f32,
    /// Visual bank, for remote rendering only
    #[serde(default)]
    pub bank: f32,
    pub health: f32,
    /// Sender's wall clock, milliseconds
    pub timestamp: u64,
}

impl Validate for PoseUpdate {
    fn validate(&self) -> Result<(), ProtocolError> {
        finite_vec("position", self.position)?;
        finite("heading", self.heading)?;
        finite("pitch", self.pitch)?;
        finite("bank", self.bank)?;
        finite("health", self.health)
    }
}

/// A projectile was fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulletFired {
    pub shooter_id: String,
    #[serde(default = "default_kind")]
    pub kind: ProjectileKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub timestamp: u64,
}

impl Validate for BulletFired {
    fn validate(&self) -> Result<(), ProtocolError> {
        non_empty("shooter_id", &self.shooter_id)?;
        finite_vec("position", self.position)?;
        if !self.rotation.is_finite() {
            return Err(ProtocolError::NonFinite("rotation"));
        }
        Ok(())
    }
}

/// Shooter's claim that its projectile struck the victim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HitReported {
    pub shooter_id: String,
    pub victim_id: String,
    #[serde(default = "default_kind")]
    pub kind: ProjectileKind,
    pub damage: f32,
    pub timestamp: u64,
}

impl Validate for HitReported {
    fn validate(&self) -> Result<(), ProtocolError> {
        non_empty("shooter_id", &self.shooter_id)?;
        non_empty("victim_id", &self.victim_id)?;
        finite("damage", self.damage)
    }
}

/// Victim's confirmation that a hit killed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KillReported {
    pub killer_id: String,
    pub victim_id: String,
    pub timestamp: u64,
}

impl Validate for KillReported {
    fn validate(&self) -> Result<(), ProtocolError> {
        non_empty("killer_id", &self.killer_id)?;
        non_empty("victim_id", &self.victim_id)
    }
}

fn default_kind() -> ProjectileKind {
    ProjectileKind::Bullet
}

fn finite(field: &'static str, value: f32) -> Result<(), ProtocolError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFinite(field))
    }
}

fn finite_vec(field: &'static str, value: Vec3) -> Result<(), ProtocolError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFinite(field))
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() {
        Err(ProtocolError::EmptyId(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pose_wire_format() {
        let value = json!({
            "position": [1.0, 20.0, -3.0],
            "heading": 0.5,
            "pitch": -0.1,
            "bank": 0.2,
            "health": 80.0,
            "timestamp": 1_700_000_000_000u64
        });
        let pose: PoseUpdate = decode(&value).unwrap();
        assert_eq!(pose.position, Vec3::new(1.0, 20.0, -3.0));
        assert_eq!(pose.health, 80.0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let value = json!({
            "killer_id": "a",
            "victim_id": "b",
            "timestamp": 1,
            "bonus": true
        });
        assert!(matches!(
            decode::<KillReported>(&value),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn empty_ids_fail_validation() {
        let value = json!({
            "shooter_id": "",
            "victim_id": "b",
            "damage": 20.0,
            "timestamp": 1
        });
        assert!(matches!(
            decode::<HitReported>(&value),
            Err(ProtocolError::EmptyId("shooter_id"))
        ));
    }

    #[test]
    fn kind_defaults_to_bullet() {
        let value = json!({
            "shooter_id": "a",
            "position": [0.0, 10.0, 0.0],
            "rotation": [0.0, 0.0, 0.0, 1.0],
            "timestamp": 5
        });
        let fired: BulletFired = decode(&value).unwrap();
        assert_eq!(fired.kind, ProjectileKind::Bullet);
        assert_eq!(fired.rotation, Quat::IDENTITY);
    }

    #[test]
    fn encoded_hits_decode_unchanged() {
        let hit = HitReported {
            shooter_id: "a".into(),
            victim_id: "b".into(),
            kind: ProjectileKind::Rocket,
            damage: 40.0,
            timestamp: 9,
        };
        let value = encode(&hit).unwrap();
        assert_eq!(value["kind"], "rocket");
        assert_eq!(decode::<HitReported>(&value).unwrap(), hit);
    }
}
