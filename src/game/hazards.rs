//! Static world hazards and the destruction check

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Collision margins
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Altitude below which the airplane strikes the ground
    pub ground_floor: f32,
    /// Airplane collision radius added to every hazard radius
    pub collision_margin: f32,
    /// Horizontal radius of a tower's shaft
    pub tower_radius: f32,
    /// Vertical half-thickness of a platform slab
    pub platform_clearance: f32,
    pub sun_radius: f32,
    pub planet_radius: f32,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            ground_floor: 2.0,
            collision_margin: 3.0,
            tower_radius: 5.0,
            platform_clearance: 2.0,
            sun_radius: 12.0,
            planet_radius: 35.0,
        }
    }
}

/// Procedural world population
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub asteroid_count: usize,
    pub tower_count: usize,
    pub platform_count: usize,
    /// Side length of the square the world is scattered over
    pub spread: f32,
    /// No hazard is placed within this horizontal distance of the spawn point
    pub spawn_clearance: f32,
    pub sun_position: Vec3,
    pub planet_position: Vec3,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            asteroid_count: 30,
            tower_count: 20,
            platform_count: 15,
            spread: 2000.0,
            spawn_clearance: 60.0,
            sun_position: Vec3::new(150.0, 120.0, -300.0),
            planet_position: Vec3::new(-200.0, 100.0, -400.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Asteroid {
    pub position: Vec3,
    /// Geometry radius
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tower {
    /// Base of the tower on the ground
    pub position: Vec3,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub position: Vec3,
    /// Horizontal radius of the landing surface
    pub footprint: f32,
}

/// Static hazard lists, read-only once built
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldHazards {
    pub asteroids: Vec<Asteroid>,
    pub towers: Vec<Tower>,
    pub platforms: Vec<Platform>,
    pub sun: Vec3,
    pub planet: Vec3,
}

impl WorldHazards {
    /// Scatter hazards deterministically from a seed
    pub fn generate(seed: u64, config: &WorldConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let half = config.spread / 2.0;

        let ground_spot = |rng: &mut ChaCha8Rng| loop {
            let x = rng.gen_range(-half..half);
            let z = rng.gen_range(-half..half);
            if x.hypot(z) >= config.spawn_clearance {
                return (x, z);
            }
        };

        let asteroids = (0..config.asteroid_count)
            .map(|_| {
                let (x, z) = ground_spot(&mut rng);
                Asteroid {
                    position: Vec3::new(x, rng.gen_range(50.0..250.0), z),
                    radius: rng.gen_range(3.0..11.0),
                }
            })
            .collect();

        let towers = (0..config.tower_count)
            .map(|_| {
                let (x, z) = ground_spot(&mut rng);
                Tower {
                    position: Vec3::new(x, 0.0, z),
                    height: rng.gen_range(20.0..50.0),
                }
            })
            .collect();

        let platforms = (0..config.platform_count)
            .map(|_| {
                let (x, z) = ground_spot(&mut rng);
                Platform {
                    position: Vec3::new(x, rng.gen_range(8.0..28.0), z),
                    footprint: rng.gen_range(6.0..16.0),
                }
            })
            .collect();

        Self {
            asteroids,
            towers,
            platforms,
            sun: config.sun_position,
            planet: config.planet_position,
        }
    }
}

/// What destroyed the airplane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destruction {
    Ground,
    HealthDepleted,
    Asteroid,
    Tower,
    Platform,
    Sun,
    Planet,
}

impl Destruction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::HealthDepleted => "health_depleted",
            Self::Asteroid => "asteroid",
            Self::Tower => "tower",
            Self::Platform => "platform",
            Self::Sun => "sun",
            Self::Planet => "planet",
        }
    }
}

/// Tests the local airplane against the static world
pub struct CollisionDetector {
    world: WorldHazards,
    config: HazardConfig,
}

impl CollisionDetector {
    pub fn new(world: WorldHazards, config: HazardConfig) -> Self {
        Self { world, config }
    }

    pub fn world(&self) -> &WorldHazards {
        &self.world
    }

    /// Whether the airplane at `position` with `health` is destroyed
    pub fn check(&self, position: Vec3, health: f32) -> bool {
        self.first_contact(position, health).is_some()
    }

    /// First destruction cause found, if any
    pub fn first_contact(&self, position: Vec3, health: f32) -> Option<Destruction> {
        let cfg = &self.config;

        if position.y < cfg.ground_floor {
            return Some(Destruction::Ground);
        }
        if health <= 0.0 {
            return Some(Destruction::HealthDepleted);
        }

        let asteroid = self
            .world
            .asteroids
            .iter()
            .any(|a| a.position.distance(position) < a.radius + cfg.collision_margin);
        if asteroid {
            return Some(Destruction::Asteroid);
        }

        let tower = self.world.towers.iter().any(|t| {
            horizontal_distance(t.position, position) < cfg.tower_radius + cfg.collision_margin
                && position.y < t.position.y + t.height
        });
        if tower {
            return Some(Destruction::Tower);
        }

        let platform = self.world.platforms.iter().any(|p| {
            horizontal_distance(p.position, position) < p.footprint
                && (position.y - p.position.y).abs() < cfg.platform_clearance
        });
        if platform {
            return Some(Destruction::Platform);
        }

        if self.world.sun.distance(position) < cfg.sun_radius + cfg.collision_margin {
            return Some(Destruction::Sun);
        }
        if self.world.planet.distance(position) < cfg.planet_radius + cfg.collision_margin {
            return Some(Destruction::Planet);
        }

        None
    }
}

fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    (a.x - b.x).hypot(a.z - b.z)
}
