//! Quantities derived from sag and slope: asphericity, aberration of
//! normals and the normal angle.

use super::best_fit::BestFitSphere;

/// Sign with `sign(0) = 0`; NaN also maps to 0.
#[must_use]
pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Signed deviation of the point `(r, z)` from the reference sphere.
#[must_use]
pub fn asphericity(sphere: &BestFitSphere, r: f64, z: f64) -> f64 {
    let value = match *sphere {
        BestFitSphere::ThreePoint { r3, radius } => {
            let s = sign(radius);
            if s == 0.0 {
                return 0.0;
            }
            s * (r3.abs() - ((r3 - z).powi(2) + r * r).sqrt())
        }
        BestFitSphere::FourPoint { r4, zm, rm, g, lz } => {
            let s_lz = sign(lz);
            let s_z = sign(z);
            if s_lz == 0.0 || s_z == 0.0 {
                return 0.0;
            }
            let z0 = zm + s_lz * (g * g - rm * rm).max(0.0).sqrt();
            s_z * (r4 - ((z0 - z).powi(2) + r * r).sqrt())
        }
    };
    finite_or_zero(value)
}

/// `z + r/slope − R`, the axial intercept of the normal relative to the
/// vertex centre of curvature.
#[must_use]
pub fn aberration_of_normals(r: f64, z: f64, slope: f64, radius: f64) -> f64 {
    if slope == 0.0 {
        return 0.0;
    }
    finite_or_zero(z + r / slope - radius)
}

/// Inclination of the surface in degrees.
#[must_use]
pub fn angle_degrees(slope: f64) -> f64 {
    finite_or_zero(slope.atan().to_degrees())
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
