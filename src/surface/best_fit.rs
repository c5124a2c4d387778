//! Reference sphere through the boundary samples of a surface.
//!
//! A surface whose inner radial bound is zero gets the three-point sphere
//! (vertex plus the rim, mirrored about the axis). An annular surface gets the
//! four-point sphere through both boundary circles, centred on the axis.

use serde::Serialize;

use super::evaluator::surface_sag;
use super::implicit::ImplicitSolverOptions;
use super::model::{RadialBounds, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BestFitSphere {
    /// `radius` is the surface's own vertex radius, kept as sign reference.
    ThreePoint { r3: f64, radius: f64 },
    /// `zm`, `rm` are the chord midpoint, `g` its distance to the centre and
    /// `lz` the axial extent of the chord.
    FourPoint {
        r4: f64,
        zm: f64,
        rm: f64,
        g: f64,
        lz: f64,
    },
}

impl BestFitSphere {
    /// `R3 = maxR²/(2·zmax) + zmax/2`; a flat rim gives `R3 = 0`.
    #[must_use]
    pub fn three_point(max_r: f64, z_max: f64, radius: f64) -> Self {
        let r3 = if z_max == 0.0 {
            0.0
        } else {
            max_r * max_r / (2.0 * z_max) + z_max / 2.0
        };
        Self::ThreePoint { r3, radius }
    }

    /// Sphere through `(min_r, z_min)` and `(max_r, z_max)` centred on the axis.
    ///
    /// Equal boundary sags make the chord perpendicular to the axis, which has
    /// no such sphere; `g` and `r4` are then 0.
    #[must_use]
    pub fn four_point(min_r: f64, z_min: f64, max_r: f64, z_max: f64) -> Self {
        let lr = max_r - min_r;
        let lz = z_max - z_min;
        let two_f = (lz * lz + lr * lr).sqrt();
        let zm = (z_max + z_min) / 2.0;
        let rm = (max_r + min_r) / 2.0;

        let (g, r4) = if lz == 0.0 {
            (0.0, 0.0)
        } else {
            let g = two_f * rm / lz.abs();
            let half = two_f / 2.0;
            (g, (g * g + half * half).sqrt())
        };

        Self::FourPoint { r4, zm, rm, g, lz }
    }

    /// Picks the variant from the declared bounds.
    #[must_use]
    pub fn from_boundary(bounds: &RadialBounds, z_min: f64, z_max: f64, radius: f64) -> Self {
        if bounds.is_full_aperture() {
            Self::three_point(bounds.max, z_max, radius)
        } else {
            Self::four_point(bounds.min, z_min, bounds.max, z_max)
        }
    }

    /// Fits the reference sphere of `surface` from its sag at both bounds.
    ///
    /// A boundary sag that cannot be computed is taken as 0.
    #[must_use]
    pub fn fit(surface: &Surface, solvers: &ImplicitSolverOptions) -> Self {
        let bounds = surface.bounds;
        let boundary_sag = |r: f64| match surface_sag(surface, r, solvers) {
            Ok(solved) => solved.z,
            Err(err) => {
                log::warn!(
                    "best-fit sphere: sag of {} at r = {r} failed ({err}); using 0",
                    surface.surface_type()
                );
                0.0
            }
        };

        let z_max = boundary_sag(bounds.max);
        let z_min = if bounds.is_full_aperture() {
            0.0
        } else {
            boundary_sag(bounds.min)
        };
        Self::from_boundary(&bounds, z_min, z_max, surface.reference_radius())
    }

    /// Radius of the reference sphere.
    #[must_use]
    pub fn radius(&self) -> f64 {
        match self {
            Self::ThreePoint { r3, .. } => *r3,
            Self::FourPoint { r4, .. } => *r4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_point_radius_from_rim_sample() {
        // 625/6 + 1.5
        let sphere = BestFitSphere::three_point(25.0, 3.0, 100.0);
        assert!((sphere.radius() - 105.666_666_666_666_67).abs() < 1e-9);
    }

    #[test]
    fn flat_rim_gives_zero_radius() {
        assert_eq!(BestFitSphere::three_point(25.0, 0.0, 100.0).radius(), 0.0);
    }

    #[test]
    fn four_point_recovers_sphere_through_two_circles() {
        // Sphere of radius 50 centred at z = 50: z = 50 − √(2500 − r²)
        let z = |r: f64| 50.0 - (2500.0 - r * r).sqrt();
        let sphere = BestFitSphere::four_point(10.0, z(10.0), 30.0, z(30.0));
        assert!((sphere.radius() - 50.0).abs() < 1e-9, "{sphere:?}");
    }

    #[test]
    fn four_point_with_flat_chord_is_degenerate() {
        let sphere = BestFitSphere::four_point(10.0, 2.0, 30.0, 2.0);
        assert_eq!(sphere.radius(), 0.0);
        let BestFitSphere::FourPoint { g, lz, .. } = sphere else {
            panic!("expected four-point sphere");
        };
        assert_eq!(g, 0.0);
        assert_eq!(lz, 0.0);
    }
}
