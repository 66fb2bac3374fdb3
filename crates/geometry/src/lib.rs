//! Stateless 3-D primitives shared by the spatial indices and the flocking behaviors.
//!
//! Everything here is a pure function of its inputs. Degenerate input (zero-length ray
//! directions, inverted boxes) is not special-cased beyond what the slab tests need and may
//! propagate `NaN`/infinity.

pub mod aabb;
pub mod boundary;
pub mod ray;
pub mod sphere;

pub use aabb::Aabb;
pub use ray::{LineHit, Ray, RayHit};
pub use sphere::Sphere;
