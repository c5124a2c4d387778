//! Hook for surfaces that are not rotationally symmetric.
//!
//! Zernike and Irregular surfaces are evaluated by the host application. The
//! engine only forwards the point and the raw parameters and receives a
//! height; slope and the derived quantities stay zero for these families.

use super::params::ParameterMap;

/// External evaluator for non-rotationally-symmetric surfaces.
pub trait FreeformSag: Send + Sync {
    /// Height of the surface at `(x, y)`.
    fn sag(&self, x: f64, y: f64, parameters: &ParameterMap) -> f64;
}

impl<F> FreeformSag for F
where
    F: Fn(f64, f64, &ParameterMap) -> f64 + Send + Sync,
{
    fn sag(&self, x: f64, y: f64, parameters: &ParameterMap) -> f64 {
        self(x, y, parameters)
    }
}
