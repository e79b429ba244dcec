//! Projectile subsystem - bullets, rockets, hit detection

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::flight::Pose;

/// Projectile archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    Bullet,
    /// Slower, shorter-lived, spawns ahead of the nose and leaves a trail
    Rocket,
}

/// Weapon tuning, speeds in world units per frame and lifetimes in frames
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    pub bullet_speed: f32,
    pub bullet_lifetime: u32,
    pub bullet_damage: f32,
    pub rocket_speed: f32,
    pub rocket_lifetime: u32,
    pub rocket_damage: f32,
    /// Distance ahead of the firer where rockets appear
    pub rocket_spawn_offset: f32,
    /// Distance at which a projectile counts as touching a player
    pub hit_radius: f32,
    pub gun_cooldown_frames: u32,
    pub rocket_cooldown_frames: u32,
    /// Chance per frame that a rocket sheds a trail puff
    pub trail_spawn_chance: f32,
    pub trail_lifetime: u32,
    /// Oldest projectiles are dropped beyond this count
    pub max_projectiles: usize,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            bullet_speed: 1.5,
            bullet_lifetime: 200,
            bullet_damage: 20.0,
            rocket_speed: 0.9,
            rocket_lifetime: 150,
            rocket_damage: 40.0,
            rocket_spawn_offset: 3.0,
            hit_radius: 5.0,
            gun_cooldown_frames: 30,
            rocket_cooldown_frames: 90,
            trail_spawn_chance: 0.6,
            trail_lifetime: 20,
            max_projectiles: 512,
        }
    }
}

impl WeaponConfig {
    pub fn damage(&self, kind: ProjectileKind) -> f32 {
        match kind {
            ProjectileKind::Bullet => self.bullet_damage,
            ProjectileKind::Rocket => self.rocket_damage,
        }
    }

    pub fn cooldown_frames(&self, kind: ProjectileKind) -> u32 {
        match kind {
            ProjectileKind::Bullet => self.gun_cooldown_frames,
            ProjectileKind::Rocket => self.rocket_cooldown_frames,
        }
    }
}

/// Decorative exhaust puff behind a rocket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailParticle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub lifetime: u32,
}

/// Live projectile
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub kind: ProjectileKind,
    pub owner_id: String,
    /// Fired by this client; only these report hits
    pub is_local: bool,
    pub position: Vec3,
    /// Fixed at spawn
    pub velocity: Vec3,
    /// Firer's rotation, kept for rendering
    pub rotation: Quat,
    /// Frames left to live
    pub lifetime: u32,
    pub trail: Vec<TrailParticle>,
}

/// Remote player position offered to hit testing
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub id: &'a str,
    pub position: Vec3,
}

/// A locally fired projectile touched a remote player
#[derive(Debug, Clone, PartialEq)]
pub struct LocalHit {
    pub victim_id: String,
    pub kind: ProjectileKind,
    pub damage: f32,
    pub position: Vec3,
}

/// Outcome of one projectile update
#[derive(Debug, Clone, Default)]
pub struct ProjectileReport {
    /// Hits to report to the network
    pub local_hits: Vec<LocalHit>,
    /// Remote projectiles that reached the local player. Damage arrives separately.
    pub incoming_contacts: usize,
    /// Projectiles retired by lifetime
    pub expired: usize,
}

/// Owns every live projectile
pub struct ProjectileSystem {
    projectiles: Vec<Projectile>,
    config: WeaponConfig,
    next_id: u64,
    rng: ChaCha8Rng,
}

impl ProjectileSystem {
    pub fn new(config: WeaponConfig, seed: u64) -> Self {
        Self {
            projectiles: Vec::new(),
            config,
            next_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &WeaponConfig {
        &self.config
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Spawn a projectile from the firer's pose. Returns its local id.
    pub fn spawn(&mut self, origin: &Pose, owner_id: &str, is_local: bool, kind: ProjectileKind) -> u64 {
        let forward = origin.forward();
        let (position, speed, lifetime) = match kind {
            ProjectileKind::Bullet => (
                origin.position,
                self.config.bullet_speed,
                self.config.bullet_lifetime,
            ),
            ProjectileKind::Rocket => (
                origin.position + forward * self.config.rocket_spawn_offset,
                self.config.rocket_speed,
                self.config.rocket_lifetime,
            ),
        };

        if !self.projectiles.is_empty() && self.projectiles.len() >= self.config.max_projectiles {
            let dropped = self.projectiles.remove(0);
            debug!(projectile_id = dropped.id, "Projectile cap reached, dropping oldest");
        }

        let id = self.next_id;
        self.next_id += 1;
        self.projectiles.push(Projectile {
            id,
            kind,
            owner_id: owner_id.to_string(),
            is_local,
            position,
            velocity: forward * speed,
            rotation: origin.rotation(),
            lifetime,
            trail: Vec::new(),
        });
        id
    }

    /// Advance every projectile one frame and run hit tests.
    ///
    /// Local projectiles test `targets` and the first one in range is
    /// credited. Remote projectiles only test `local_position`.
    pub fn update(&mut self, targets: &[Target<'_>], local_position: Option<Vec3>) -> ProjectileReport {
        let mut report = ProjectileReport::default();
        let config = self.config;
        let radius_sq = config.hit_radius * config.hit_radius;
        let rng = &mut self.rng;

        self.projectiles.retain_mut(|projectile| {
            projectile.position += projectile.velocity;
            projectile.lifetime = projectile.lifetime.saturating_sub(1);

            if projectile.kind == ProjectileKind::Rocket {
                update_trail(projectile, &config, rng);
            }

            let hit = if projectile.is_local {
                let victim = targets.iter().find(|target| {
                    target.id != projectile.owner_id
                        && target.position.distance_squared(projectile.position) < radius_sq
                });
                match victim {
                    Some(target) => {
                        report.local_hits.push(LocalHit {
                            victim_id: target.id.to_string(),
                            kind: projectile.kind,
                            damage: config.damage(projectile.kind),
                            position: projectile.position,
                        });
                        true
                    }
                    None => false,
                }
            } else {
                let contact = local_position
                    .map(|local| local.distance_squared(projectile.position) < radius_sq)
                    .unwrap_or(false);
                if contact {
                    report.incoming_contacts += 1;
                }
                contact
            };

            if hit {
                return false;
            }
            if projectile.lifetime == 0 {
                report.expired += 1;
                return false;
            }
            true
        });

        report
    }

    /// Drop everything (session teardown)
    pub fn clear(&mut self) {
        self.projectiles.clear();
    }
}

fn update_trail(projectile: &mut Projectile, config: &WeaponConfig, rng: &mut ChaCha8Rng) {
    projectile.trail.retain_mut(|particle| {
        particle.position += particle.velocity;
        particle.lifetime = particle.lifetime.saturating_sub(1);
        particle.lifetime > 0
    });

    if rng.gen::<f32>() < config.trail_spawn_chance {
        let tail = -projectile.velocity.normalize_or_zero() * 0.7;
        let jitter = Vec3::new(rng.gen_range(-0.06..0.06), rng.gen_range(-0.06..0.06), 0.0);
        let drift = Vec3::new(rng.gen_range(-0.0125..0.0125), rng.gen_range(-0.0125..0.0125), 0.0);
        projectile.trail.push(TrailParticle {
            position: projectile.position + tail + jitter,
            velocity: tail * 0.04 + drift,
            lifetime: config.trail_lifetime,
        });
    }
}
