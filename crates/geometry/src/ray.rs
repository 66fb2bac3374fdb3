use std::ops::Mul;

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
}

impl Mul<f32> for Ray {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.origin, self.direction * rhs)
    }
}

impl Ray {
    #[must_use]
    pub const fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    #[must_use]
    pub fn from_points(origin: Vec3, end: Vec3) -> Self {
        let direction = end - origin;
        Self::new(origin, direction)
    }

    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    #[must_use]
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Get the point along the ray at parameter t
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// One crossing of an infinite line with a box boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHit {
    /// Signed parameter along the ray direction; negative is behind the origin.
    pub t: f32,
    pub point: Vec3,
}

impl LineHit {
    #[must_use]
    pub const fn new(t: f32, point: Vec3) -> Self {
        Self { t, point }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub t: f32,
    pub point: Vec3,
    /// Unit axis normal of the crossed face, pointing back against the ray.
    pub normal: Vec3,
}
