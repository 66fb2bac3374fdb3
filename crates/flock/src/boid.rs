use glam::{Quat, Vec3};
use slotmap::new_key_type;

new_key_type! {
    pub struct BoidKey;
}

/// Bounds applied to every boid when integrating.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Limits {
    pub min_speed: f32,
    pub max_speed: f32,
    /// Cap on the length of each behavior's steering force.
    pub max_force: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Boid {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Rotation taking +Z onto the direction of travel.
    pub orientation: Quat,
}

impl Boid {
    #[must_use]
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        let mut boid = Self {
            position,
            velocity,
            orientation: Quat::IDENTITY,
        };
        boid.face_velocity();
        boid
    }

    /// Unit direction of travel, or zero when stationary.
    #[must_use]
    pub fn heading(&self) -> Vec3 {
        self.velocity.normalize_or_zero()
    }

    /// Semi-implicit Euler step: velocity first, then position with the new velocity.
    pub fn integrate(&mut self, acceleration: Vec3, dt: f32, limits: &Limits) {
        let velocity = self.velocity + acceleration * dt;

        self.velocity = match velocity.try_normalize() {
            Some(direction) => {
                direction * velocity.length().clamp(limits.min_speed, limits.max_speed)
            }
            None => velocity,
        };

        self.position += self.velocity * dt;
        self.face_velocity();
    }

    fn face_velocity(&mut self) {
        if let Some(direction) = self.velocity.try_normalize() {
            self.orientation = Quat::from_rotation_arc(Vec3::Z, direction);
        }
    }
}
