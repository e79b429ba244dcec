//! Game simulation modules

pub mod combat;
pub mod flight;
pub mod hazards;
pub mod input;
pub mod orientation;
pub mod projectile;
pub mod session;
pub mod snapshot;

pub use combat::{CombatConfig, CombatMachine, CombatState};
pub use flight::{FlightConfig, FlightController, Pose};
pub use hazards::{CollisionDetector, HazardConfig, WorldConfig, WorldHazards};
pub use input::{Action, InputState, RollDirection};
pub use projectile::{ProjectileKind, ProjectileSystem, WeaponConfig};
pub use session::{GameSession, Pilot};
pub use snapshot::{FrameEvent, FrameSnapshot};
