//! Pose value types
//!
//! Poses are expressed in the coordinate frame of a reference space: metres,
//! y+ up, z- forward. `Position` and `Orientation` are the wire shapes; the
//! math happens on their `nalgebra` counterparts.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A point in a reference space, in metres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<Vector3<f64>> for Position {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// A unit quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Orientation {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Rotation of `radians` about the y (up) axis
    pub fn from_yaw(radians: f64) -> Self {
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), radians).into()
    }

    /// Normalized rotation; wire values are not trusted to be unit length
    pub fn to_unit_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(Quaternion::new(self.w, self.x, self.y, self.z))
    }

    /// Approximate equality, treating `q` and `-q` as the same rotation
    pub fn approx_eq(&self, other: &Orientation, epsilon: f64) -> bool {
        let dot = self.to_unit_quaternion().coords.dot(&other.to_unit_quaternion().coords);
        (1.0 - dot.abs()) <= epsilon
    }
}

impl From<UnitQuaternion<f64>> for Orientation {
    fn from(q: UnitQuaternion<f64>) -> Self {
        let q = q.into_inner();
        Self::new(q.i, q.j, q.k, q.w)
    }
}

/// A rigid transform sample: position plus orientation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    pub orientation: Orientation,
}

impl Pose {
    pub fn new(position: Position, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// A pose `metres` straight ahead of the origin with identity orientation
    pub fn forward(metres: f64) -> Self {
        Self::new(Position::new(0.0, 0.0, -metres), Orientation::identity())
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.position.to_vector()),
            self.orientation.to_unit_quaternion(),
        )
    }

    /// Column-major 4x4 transform matrix, as scene graphs expect
    pub fn to_matrix(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.to_isometry().to_homogeneous().as_slice());
        out
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(iso: Isometry3<f64>) -> Self {
        Self::new(iso.translation.vector.into(), iso.rotation.into())
    }
}
