//! Direct sag and slope formulas for spheres and conic aspheres.

use super::error::{SurfaceError, SurfaceResult, checked_div, checked_sqrt, finite};
use super::model::{AsphereModel, SphereModel};

/// `c·r² / (1 + √(1 − c²r²))` with `c = 1/R`; a zero radius is a plane.
pub fn sphere_sag(model: &SphereModel, r: f64) -> SurfaceResult<f64> {
    let radius = model.radius;
    if radius == 0.0 {
        return Ok(0.0);
    }
    let cr = r / radius;
    let q = sphere_q(cr, r)?;
    finite(cr * r / (1.0 + q), "sphere sag")
}

/// `c·r / √(1 − c²r²)`; negative on the way out of a concave surface.
pub fn sphere_slope(model: &SphereModel, r: f64) -> SurfaceResult<f64> {
    let radius = model.radius;
    if radius == 0.0 {
        return Ok(0.0);
    }
    let cr = r / radius;
    let q = sphere_q(cr, r)?;
    checked_div(cr, q, "sphere slope")
}

/// `√(1 − (r/R)²)`
fn sphere_q(cr: f64, r: f64) -> SurfaceResult<f64> {
    checked_sqrt(1.0 - cr * cr)
        .map_err(|_| SurfaceError::ApertureBeyondParaxial { r })
}

/// Conic base term plus the polynomial in `r`.
pub fn asphere_sag(model: &AsphereModel, r: f64) -> SurfaceResult<f64> {
    let base = match conic_terms(model, r)? {
        Some(conic) => conic.curvature * r * r / (1.0 + conic.q),
        None => 0.0,
    };
    finite(base + model.series.value(r), "asphere sag")
}

/// `c·r/Q + Σ pᵢ·Aᵢ·r^(pᵢ−1)`
pub fn asphere_slope(model: &AsphereModel, r: f64) -> SurfaceResult<f64> {
    let base = match conic_terms(model, r)? {
        Some(conic) => checked_div(conic.curvature * r, conic.q, "asphere slope")?,
        None => 0.0,
    };
    finite(base + model.series.derivative(r), "asphere slope")
}

struct ConicTerms {
    curvature: f64,
    q: f64,
}

/// `None` for a planar base (zero radius).
fn conic_terms(model: &AsphereModel, r: f64) -> SurfaceResult<Option<ConicTerms>> {
    if model.radius == 0.0 {
        return Ok(None);
    }
    let curvature = 1.0 / model.radius;
    let argument = 1.0 - (1.0 + model.conic) * curvature * curvature * r * r;
    let q = checked_sqrt(argument).map_err(|_| SurfaceError::ApertureBeyondParaxial { r })?;
    Ok(Some(ConicTerms { curvature, q }))
}
