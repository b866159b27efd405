//! # Common Types
//!
//! Spatial math shared by every peer. Positions are metres in a right-handed
//! world frame, rotations are unit quaternions.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Vector3 representation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    pub fn one() -> Self {
        Self { x: 1.0, y: 1.0, z: 1.0 }
    }

    pub fn dot(&self, other: &Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Squared distance, for threshold checks that can skip the square root
    pub fn distance_squared(&self, other: &Vector3) -> f32 {
        let d = *self - *other;
        d.dot(&d)
    }

    pub fn distance(&self, other: &Vector3) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn scale(&self, factor: f32) -> Vector3 {
        Vector3::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

/// Quaternion representation, `w` is the scalar part
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Quat::identity()
    }
}

impl Quat {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }

    /// Rotation of `angle_rad` radians around `axis` (normalized here)
    pub fn from_axis_angle(axis: Vector3, angle_rad: f32) -> Self {
        let len = axis.length();
        if len <= f32::EPSILON {
            return Quat::identity();
        }
        let axis = axis.scale(1.0 / len);
        let half = angle_rad * 0.5;
        let s = half.sin();
        Quat::new(axis.x * s, axis.y * s, axis.z * s, half.cos())
    }

    pub fn dot(&self, other: &Quat) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    pub fn normalized(&self) -> Quat {
        let len = self.dot(self).sqrt();
        if len <= f32::EPSILON {
            return Quat::identity();
        }
        Quat::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }

    /// Inverse of a unit quaternion
    pub fn conjugate(&self) -> Quat {
        Quat::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn rotate(&self, v: Vector3) -> Vector3 {
        // v' = v + 2w(u x v) + 2(u x (u x v))
        let u = Vector3::new(self.x, self.y, self.z);
        let uv = u.cross(&v);
        let uuv = u.cross(&uv);
        v + uv.scale(2.0 * self.w) + uuv.scale(2.0)
    }

    /// Smallest angle in radians between two orientations. `q` and `-q` are
    /// the same orientation, so the sign of the dot product is ignored.
    pub fn angle_to(&self, other: &Quat) -> f32 {
        let d = self.normalized().dot(&other.normalized()).abs().min(1.0);
        2.0 * d.acos()
    }
}

impl Mul for Quat {
    type Output = Quat;

    /// Hamilton product: `a * b` applies `b` first, then `a`
    fn mul(self, b: Quat) -> Quat {
        let a = self;
        Quat::new(
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }
}

/// Position + rotation of an object in some frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vector3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vector3::zero(),
            rotation: Quat::identity(),
        }
    }

    pub fn from_position(position: Vector3) -> Self {
        Self {
            position,
            rotation: Quat::identity(),
        }
    }

    /// `self ∘ local`: the world pose of `local`, expressed in this frame
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose {
            position: self.position + self.rotation.rotate(local.position),
            rotation: (self.rotation * local.rotation).normalized(),
        }
    }

    pub fn inverse(&self) -> Pose {
        let inv = self.rotation.conjugate();
        Pose {
            position: inv.rotate(-self.position),
            rotation: inv,
        }
    }

    /// The pose of `world` expressed relative to this frame
    pub fn relative_to_self(&self, world: &Pose) -> Pose {
        self.inverse().compose(world)
    }

    /// Equality within a positional epsilon (metres) and an angular epsilon (radians)
    pub fn approx_eq(&self, other: &Pose, position_eps: f32, angle_eps: f32) -> bool {
        self.position.distance(&other.position) <= position_eps
            && self.rotation.angle_to(&other.rotation) <= angle_eps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn rotate_quarter_turn_about_y() {
        let q = Quat::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), FRAC_PI_2);
        let v = q.rotate(Vector3::new(1.0, 0.0, 0.0));
        assert!(v.distance(&Vector3::new(0.0, 0.0, -1.0)) < 1e-5);
    }

    #[test]
    fn relative_pose_recomposes_to_world() {
        let anchor = Pose::new(
            Vector3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(Vector3::new(0.0, 0.0, 1.0), 0.7),
        );
        let world = Pose::new(
            Vector3::new(-0.5, 4.0, 1.0),
            Quat::from_axis_angle(Vector3::new(1.0, 1.0, 0.0), 1.2),
        );
        let rel = anchor.relative_to_self(&world);
        let back = anchor.compose(&rel);
        assert!(back.approx_eq(&world, 1e-4, 1e-2));
    }

    #[test]
    fn angle_ignores_quaternion_sign() {
        let q = Quat::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), 0.3);
        let neg = Quat::new(-q.x, -q.y, -q.z, -q.w);
        assert!(q.angle_to(&neg) < 1e-2);
    }
}
