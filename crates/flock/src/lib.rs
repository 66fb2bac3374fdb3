//! Boids flocking over a swappable spatial index.
//!
//! Every [`Flock::step`] rebuilds the index from current positions, steers each boid with its
//! behaviors against that snapshot, then integrates and wraps positions back into the world.

pub mod behavior;
pub mod boid;
pub mod config;
mod flock;

pub use behavior::{Alignment, Behavior, Cohesion, Containment, Separation, SteerContext};
pub use boid::{Boid, BoidKey, Limits};
pub use config::{BehaviorConfig, ConfigError, ContainmentConfig, FlockConfig};
pub use flock::Flock;
