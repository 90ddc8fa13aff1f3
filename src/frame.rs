use nalgebra::{Matrix3, Vector3};

use crate::error::CmcError;

/// Rotation pair mapping the lab frame into the constraint frame.
///
/// The constraint frame is the orthonormal frame whose z axis is the
/// direction along which the net magnetization is held. For a polar angle
/// phi and azimuthal angle theta (both in degrees) the rotation is built as
///
/// ```text
/// R = R_y(phi) * R_z(theta)
/// ```
///
/// so that the third row of R equals the constraint direction
///
/// ```text
/// d = (sin phi cos theta, sin phi sin theta, cos phi)
/// ```
///
/// and `R * d = z_hat`. Both matrices are fixed 3x3 values computed once;
/// every per-step product is a static nine-multiply, six-add operation with
/// no heap involvement.
#[derive(Clone, Debug)]
pub struct ConstraintFrame {
    phi_deg: f64,
    theta_deg: f64,
    rot: Matrix3<f64>,
    rot_t: Matrix3<f64>,
    axis: Vector3<f64>,
}

impl ConstraintFrame {
    /// Build the frame for the given constraint angles in degrees.
    ///
    /// Angles may be any real value and are stored modulo 360. Non-finite
    /// angles are rejected.
    pub fn new(phi_deg: f64, theta_deg: f64) -> Result<Self, CmcError> {
        if !phi_deg.is_finite() || !theta_deg.is_finite() {
            return Err(CmcError::InvalidConfig(format!(
                "constraint angles must be finite, got phi = {}, theta = {}",
                phi_deg, theta_deg
            )));
        }
        let phi_deg = phi_deg.rem_euclid(360.0);
        let theta_deg = theta_deg.rem_euclid(360.0);
        let (sa, ca) = phi_deg.to_radians().sin_cos();
        let (sb, cb) = theta_deg.to_radians().sin_cos();

        #[rustfmt::skip]
        let ry = Matrix3::new(
             ca, 0.0, -sa,
            0.0, 1.0, 0.0,
             sa, 0.0,  ca,
        );
        #[rustfmt::skip]
        let rz = Matrix3::new(
             cb,  sb, 0.0,
            -sb,  cb, 0.0,
            0.0, 0.0, 1.0,
        );
        let rot = ry * rz;
        let rot_t = rot.transpose();
        let axis: Vector3<f64> = rot.row(2).transpose();

        Ok(ConstraintFrame {
            phi_deg,
            theta_deg,
            rot,
            rot_t,
            axis,
        })
    }

    /// Map a lab-frame vector into the constraint frame.
    #[inline]
    pub fn to_frame(&self, v: Vector3<f64>) -> Vector3<f64> {
        self.rot * v
    }

    /// Map a constraint-frame vector back into the lab frame.
    #[inline]
    pub fn to_lab(&self, v: Vector3<f64>) -> Vector3<f64> {
        self.rot_t * v
    }

    /// The constraint direction in lab coordinates (third row of R).
    #[inline]
    pub fn constraint_axis(&self) -> Vector3<f64> {
        self.axis
    }

    pub fn phi_deg(&self) -> f64 {
        self.phi_deg
    }

    pub fn theta_deg(&self) -> f64 {
        self.theta_deg
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rot
    }

    pub fn rotation_t(&self) -> &Matrix3<f64> {
        &self.rot_t
    }
}
