//! Configuration module - environment variables and simulation tuning

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::game::combat::CombatConfig;
use crate::game::flight::FlightConfig;
use crate::game::hazards::{HazardConfig, WorldConfig};
use crate::game::projectile::WeaponConfig;
use crate::sync::SyncConfig;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines (LOG_FORMAT=json)
    pub log_json: bool,
    /// Allowed client origin for CORS, `*` for any
    pub client_origin: String,

    /// Headless sessions flown by the server itself
    pub bot_count: usize,
    /// Base seed for bot behavior; random when unset
    pub bot_seed: Option<u64>,
    /// Seed for hazard placement, shared by every client of this world
    pub world_seed: u64,

    pub tuning: Tuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let tuning = match env::var("TUNING_FILE") {
            Ok(path) => Tuning::load(Path::new(&path))?,
            Err(_) => Tuning::default(),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            bot_count: parse_var("BOT_COUNT")?.unwrap_or(0),
            bot_seed: parse_var("BOT_SEED")?,
            world_seed: parse_var("WORLD_SEED")?.unwrap_or(7),

            tuning,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Every simulation constant, grouped by subsystem.
///
/// Missing groups and fields fall back to their defaults, so a tuning file
/// only lists what it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub flight: FlightConfig,
    pub weapons: WeaponConfig,
    pub hazards: HazardConfig,
    pub world: WorldConfig,
    pub combat: CombatConfig,
    pub sync: SyncConfig,
}

impl Tuning {
    /// Read a JSON tuning file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::TuningRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate tuning JSON
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let tuning: Self = serde_json::from_str(raw)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Reject values the simulation cannot run with: zero divisors, empty
    /// ranges, and probabilities or blend factors outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let flight = &self.flight;
        positive("flight.base_speed", flight.base_speed)?;
        positive("flight.boosted_speed", flight.boosted_speed)?;
        unit("flight.speed_lerp", flight.speed_lerp)?;
        positive("flight.max_yaw_rate", flight.max_yaw_rate)?;
        positive("flight.max_pitch_rate", flight.max_pitch_rate)?;
        unit("flight.damping", flight.damping)?;
        positive("flight.max_pitch_angle", flight.max_pitch_angle)?;
        unit("flight.pitch_level_decay", flight.pitch_level_decay)?;
        unit("flight.bank_ease", flight.bank_ease)?;
        unit("flight.auto_balance_rate", flight.auto_balance_rate)?;
        positive("flight.roll_speed", flight.roll_speed)?;
        positive("flight.flip_speed", flight.flip_speed)?;
        unit("flight.stabilization_rate", flight.stabilization_rate)?;

        let weapons = &self.weapons;
        positive("weapons.bullet_speed", weapons.bullet_speed)?;
        positive("weapons.rocket_speed", weapons.rocket_speed)?;
        non_negative("weapons.bullet_damage", weapons.bullet_damage)?;
        non_negative("weapons.rocket_damage", weapons.rocket_damage)?;
        non_negative("weapons.hit_radius", weapons.hit_radius)?;
        unit("weapons.trail_spawn_chance", weapons.trail_spawn_chance)?;
        if weapons.max_projectiles == 0 {
            return Err(invalid("weapons.max_projectiles", "must be at least 1"));
        }

        let hazards = &self.hazards;
        non_negative("hazards.collision_margin", hazards.collision_margin)?;
        non_negative("hazards.tower_radius", hazards.tower_radius)?;
        non_negative("hazards.platform_clearance", hazards.platform_clearance)?;
        non_negative("hazards.sun_radius", hazards.sun_radius)?;
        non_negative("hazards.planet_radius", hazards.planet_radius)?;

        let world = &self.world;
        positive("world.spread", world.spread)?;
        non_negative("world.spawn_clearance", world.spawn_clearance)?;
        if world.spawn_clearance >= world.spread / 2.0 {
            return Err(invalid("world.spawn_clearance", "must be less than half of world.spread"));
        }

        positive("combat.max_health", self.combat.max_health)?;

        if self.sync.max_inbound_events == 0 {
            return Err(invalid("sync.max_inbound_events", "must be at least 1"));
        }
        if self.sync.relay_capacity == 0 {
            return Err(invalid("sync.relay_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidTuning {
        field,
        reason: reason.to_string(),
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("must be zero or more, got {value}")))
    }
}

fn unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, &format!("must be within [0, 1], got {value}")))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("Failed to read tuning file {path:?}: {source}")]
    TuningRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid tuning file: {0}")]
    TuningParse(#[from] serde_json::Error),

    #[error("Invalid tuning value {field}: {reason}")]
    InvalidTuning { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tuning_keeps_defaults() {
        let tuning = Tuning::from_json(
            r#"{ "combat": { "respawn_frames": 60 }, "weapons": { "bullet_damage": 25.0 } }"#,
        )
        .unwrap();
        assert_eq!(tuning.combat.respawn_frames, 60);
        assert_eq!(tuning.combat.max_health, 100.0);
        assert_eq!(tuning.weapons.bullet_damage, 25.0);
        assert_eq!(tuning.flight.max_yaw_rate, FlightConfig::default().max_yaw_rate);
    }

    #[test]
    fn malformed_tuning_is_an_error() {
        assert!(matches!(
            Tuning::from_json("{ \"flight\": 3 }"),
            Err(ConfigError::TuningParse(_))
        ));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(Tuning::default().validate().is_ok());
    }

    #[test]
    fn unusable_tuning_values_are_rejected() {
        let cases = [
            (r#"{ "weapons": { "max_projectiles": 0 } }"#, "weapons.max_projectiles"),
            (r#"{ "world": { "spread": 0.0 } }"#, "world.spread"),
            (r#"{ "world": { "spread": 100.0, "spawn_clearance": 80.0 } }"#, "world.spawn_clearance"),
            (r#"{ "flight": { "max_yaw_rate": 0.0 } }"#, "flight.max_yaw_rate"),
            (r#"{ "weapons": { "trail_spawn_chance": 1.5 } }"#, "weapons.trail_spawn_chance"),
            (r#"{ "sync": { "max_inbound_events": 0 } }"#, "sync.max_inbound_events"),
        ];

        for (raw, expected) in cases {
            match Tuning::from_json(raw) {
                Err(ConfigError::InvalidTuning { field, .. }) => assert_eq!(field, expected, "{raw}"),
                other => panic!("{raw} was accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn missing_tuning_file_names_the_path() {
        let err = Tuning::load(Path::new("/nonexistent/tuning.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tuning.json"));
    }
}
