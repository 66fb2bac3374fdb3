//! Simulation settings, read from a `toml` file.

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
};

use geometry::Aabb;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use spatial::IndexConfig;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    behavior::{Alignment, Behavior, Cohesion, Containment, Separation},
    boid::Limits,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration syntax")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: `{field}` {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Perception radius and force weight of a neighbor-driven behavior.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    pub radius: f32,
    pub weight: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainmentConfig {
    pub look_ahead: f32,
    pub margin: f32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockConfig {
    /// Boids spawned at startup.
    pub count: usize,
    /// The world is the cube `[-half_extent, half_extent]^3`.
    pub half_extent: f32,
    pub index: IndexConfig,
    /// Upper bound on the time step fed to integration, in seconds.
    pub max_dt: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub max_force: f32,
    pub separation: BehaviorConfig,
    pub alignment: BehaviorConfig,
    pub cohesion: BehaviorConfig,
    pub containment: ContainmentConfig,
    /// Behaviors whose radius is at most this share one neighbor query per boid. Zero disables
    /// sharing.
    pub sharing_radius: f32,
    /// Compute steering forces on the rayon pool.
    pub parallel: bool,
    pub seed: u64,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            count: 1_000,
            half_extent: 50.0,
            index: IndexConfig::default(),
            max_dt: 0.1,
            min_speed: 2.0,
            max_speed: 8.0,
            max_force: 12.0,
            separation: BehaviorConfig {
                radius: 2.0,
                weight: 1.5,
            },
            alignment: BehaviorConfig {
                radius: 5.0,
                weight: 1.0,
            },
            cohesion: BehaviorConfig {
                radius: 6.0,
                weight: 1.0,
            },
            containment: ContainmentConfig {
                look_ahead: 8.0,
                margin: 3.0,
                weight: 3.0,
            },
            sharing_radius: 6.0,
            parallel: true,
            seed: 7,
        }
    }
}

impl FlockConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, or writes the defaults there and uses them when it does not exist.
    #[instrument]
    pub fn load<P: AsRef<Path> + Debug>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match std::fs::read_to_string(path) {
            Ok(source) => {
                info!("loading configuration file");
                Self::from_toml_str(&source)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("configuration file not found, using defaults");

                let config = Self::default();
                if let Err(e) = config.write_to(path) {
                    // read-only filesystems are fine, the defaults still apply
                    warn!("failed to write default configuration to {path:?}: {e}");
                }

                Ok(config)
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!("wrote default configuration to {path:?}");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &'static str| {
            Err(ConfigError::Invalid { field, reason })
        };

        if !(self.half_extent > 0.0) {
            return invalid("half_extent", "must be positive");
        }
        if self.index.capacity == 0 {
            return invalid("index.capacity", "must be at least 1");
        }
        if !(self.max_dt > 0.0) {
            return invalid("max_dt", "must be positive");
        }
        if self.min_speed < 0.0 {
            return invalid("min_speed", "must not be negative");
        }
        if self.min_speed > self.max_speed {
            return invalid("min_speed", "must not exceed max_speed");
        }
        if !(self.max_force > 0.0) {
            return invalid("max_force", "must be positive");
        }
        // positions wrap across the world once per step, so one step must not cross it
        if 2.0 * self.half_extent <= self.max_speed * self.max_dt {
            return invalid("half_extent", "must exceed max_speed * max_dt / 2");
        }

        for (field, behavior) in [
            ("separation.radius", self.separation),
            ("alignment.radius", self.alignment),
            ("cohesion.radius", self.cohesion),
        ] {
            if !(behavior.radius > 0.0) {
                return invalid(field, "must be positive");
            }
        }

        if !(self.containment.look_ahead > 0.0) {
            return invalid("containment.look_ahead", "must be positive");
        }
        if self.containment.margin < 0.0 {
            return invalid("containment.margin", "must not be negative");
        }
        if self.sharing_radius < 0.0 {
            return invalid("sharing_radius", "must not be negative");
        }

        Ok(())
    }

    #[must_use]
    pub fn world(&self) -> Aabb {
        Aabb::cube(Vec3::ZERO, self.half_extent)
    }

    #[must_use]
    pub const fn limits(&self) -> Limits {
        Limits {
            min_speed: self.min_speed,
            max_speed: self.max_speed,
            max_force: self.max_force,
        }
    }

    /// The standard behavior set: separation, alignment, cohesion and containment.
    #[must_use]
    pub fn behaviors(&self) -> Vec<Box<dyn Behavior>> {
        vec![
            Box::new(Separation {
                radius: self.separation.radius,
                weight: self.separation.weight,
            }) as Box<dyn Behavior>,
            Box::new(Alignment {
                radius: self.alignment.radius,
                weight: self.alignment.weight,
            }),
            Box::new(Cohesion {
                radius: self.cohesion.radius,
                weight: self.cohesion.weight,
            }),
            Box::new(Containment {
                look_ahead: self.containment.look_ahead,
                margin: self.containment.margin,
                weight: self.containment.weight,
            }),
        ]
    }
}
