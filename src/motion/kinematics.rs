// H-frame kinematics
// Maps motor angular displacements (and raw encoder counts) to Cartesian
// displacement of the end effector.
//
// Both motors drive the same belt, so a single 2x2 linear map covers it:
//   [dx, dy] = r * [[-0.5, 0.5], [-0.5, -0.5]] * [d_phi_1, d_phi_2]

use std::f64::consts::PI;

use serde::Serialize;

use crate::config::PhysicalConstants;

/// Unit transform, scaled by the pulley radius
const BASE_MATRIX: [[f64; 2]; 2] = [[-0.5, 0.5], [-0.5, -0.5]];

/// Cartesian displacement of the end effector (same length unit as the
/// pulley radius)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Displacement {
    pub dx: f64,
    pub dy: f64,
}

impl Displacement {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }
}

/// The fixed matrix relating motor-angle space to Cartesian displacement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicTransform {
    matrix: [[f64; 2]; 2],
}

impl KinematicTransform {
    pub fn from_radius(pulley_radius: f64) -> Self {
        Self {
            matrix: BASE_MATRIX.map(|row| row.map(|a| a * pulley_radius)),
        }
    }

    pub fn matrix(&self) -> [[f64; 2]; 2] {
        self.matrix
    }

    /// Multiply the transform with an angle vector (radians)
    pub fn apply(&self, phi_1: f64, phi_2: f64) -> Displacement {
        let [[a, b], [c, d]] = self.matrix;
        Displacement {
            dx: a * phi_1 + b * phi_2,
            dy: c * phi_1 + d * phi_2,
        }
    }
}

/// Encoder counts to shaft revolutions
pub fn counts_to_revolutions(count: i64, counts_per_revolution: u32) -> f64 {
    count as f64 / f64::from(counts_per_revolution)
}

pub fn revolutions_to_radians(revolutions: f64) -> f64 {
    revolutions * 2.0 * PI
}

/// Kinematics for one rig, built once from its physical constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    transform: KinematicTransform,
    counts_per_revolution: u32,
}

impl Kinematics {
    pub fn new(constants: &PhysicalConstants) -> Self {
        Self {
            transform: KinematicTransform::from_radius(constants.pulley_radius),
            counts_per_revolution: constants.encoder_counts_per_revolution,
        }
    }

    pub fn transform(&self) -> &KinematicTransform {
        &self.transform
    }

    /// Cartesian displacement for two motor angular displacements (radians).
    /// NaN and infinities propagate.
    pub fn displacement_from_angles(&self, d_phi_1: f64, d_phi_2: f64) -> Displacement {
        self.transform.apply(d_phi_1, d_phi_2)
    }

    /// Cartesian displacement for two raw encoder counts.
    ///
    /// Counts are not range-checked; anything outside the encoder's valid
    /// range gives a correspondingly meaningless displacement.
    pub fn position_from_encoder_counts(&self, count_1: i64, count_2: i64) -> Displacement {
        let phi_1 = revolutions_to_radians(counts_to_revolutions(count_1, self.counts_per_revolution));
        let phi_2 = revolutions_to_radians(counts_to_revolutions(count_2, self.counts_per_revolution));
        self.transform.apply(phi_1, phi_2)
    }
}

impl Default for Kinematics {
    fn default() -> Self {
        Self::new(&PhysicalConstants::default())
    }
}

/// [`Kinematics::displacement_from_angles`] with the built-in rig constants
pub fn displacement_from_angles(d_phi_1: f64, d_phi_2: f64) -> Displacement {
    Kinematics::default().displacement_from_angles(d_phi_1, d_phi_2)
}

/// [`Kinematics::position_from_encoder_counts`] with the built-in rig constants
pub fn position_from_encoder_counts(count_1: i64, count_2: i64) -> Displacement {
    Kinematics::default().position_from_encoder_counts(count_1, count_2)
}
