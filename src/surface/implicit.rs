//! Iterative sag solvers for surfaces defined by an implicit equation.
//!
//! Each family has a sag-only entry point returning a [`Solution`] and a
//! separate slope function evaluated at the converged height, so callers that
//! only need heights (the best-fit sphere, for instance) never pay for the
//! derivative.
//!
//! Exhausting the iteration budget is not an error: the last iterate is
//! returned with `converged == false`.

use serde::{Deserialize, Serialize};

use super::error::{SurfaceError, SurfaceResult, checked_div, finite};
use super::model::{OpalUnUModel, OpalUnZModel, PolyModel, PowerSeries};

/// Stopping criteria for one iterative solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverOptions {
    /// Absolute bound on the last update `|zₙ₊₁ − zₙ|`.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl SolverOptions {
    /// OpalUnU converges slowly near the edge of its validity range, hence
    /// the large budget.
    pub const FIXED_POINT: Self = Self {
        tolerance: 1e-15,
        max_iterations: 1_000_000,
    };

    pub const NEWTON: Self = Self {
        tolerance: 1e-12,
        max_iterations: 1000,
    };
}

/// Per-family solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImplicitSolverOptions {
    pub opal_unu: SolverOptions,
    pub opal_unz: SolverOptions,
    pub poly: SolverOptions,
}

impl Default for ImplicitSolverOptions {
    fn default() -> Self {
        Self {
            opal_unu: SolverOptions::FIXED_POINT,
            opal_unz: SolverOptions::NEWTON,
            poly: SolverOptions::NEWTON,
        }
    }
}

/// Height found by an iterative solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Solution {
    pub z: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl Solution {
    fn converged(z: f64, iterations: usize) -> Self {
        Self {
            z,
            iterations,
            converged: true,
        }
    }

    fn exhausted(z: f64, iterations: usize) -> Self {
        Self {
            z,
            iterations,
            converged: false,
        }
    }
}

/// Value and derivative of a series evaluated at `t = x / scale`.
struct ScaledSeries {
    value: f64,
    derivative: f64,
}

/// Evaluates `series(x / scale)`; an all-zero series never touches `scale`.
fn scaled_series(
    series: &PowerSeries,
    x: f64,
    scale: f64,
    context: &'static str,
) -> SurfaceResult<ScaledSeries> {
    if series.is_zero() {
        return Ok(ScaledSeries {
            value: 0.0,
            derivative: 0.0,
        });
    }
    let t = checked_div(x, scale, context)?;
    Ok(ScaledSeries {
        value: series.value(t),
        derivative: series.derivative(t),
    })
}

// ---------------------------------------------------------------------------
// OpalUnU: z = (r² + e2·z²)/(2R) + Q(w), w = r²/H²
// ---------------------------------------------------------------------------

fn opal_unu_series(model: &OpalUnUModel, r: f64) -> SurfaceResult<ScaledSeries> {
    let h2 = model.normalization * model.normalization;
    scaled_series(&model.series, r * r, h2, "OpalUnU normalization")
}

/// Fixed-point iteration from `z₀ = 0`.
pub fn opal_unu_sag(model: &OpalUnUModel, r: f64, options: &SolverOptions) -> SurfaceResult<Solution> {
    if model.radius == 0.0 {
        return Err(SurfaceError::ZeroDenominator {
            context: "OpalUnU radius",
        });
    }
    let offset = opal_unu_series(model, r)?.value;
    let two_radius = 2.0 * model.radius;
    let r2 = r * r;

    let mut z = 0.0_f64;
    for iteration in 1..=options.max_iterations {
        let next = finite((r2 + model.e2 * z * z) / two_radius + offset, "OpalUnU iteration")?;
        let step = (next - z).abs();
        z = next;
        if step < options.tolerance {
            return Ok(Solution::converged(z, iteration));
        }
    }

    log::debug!(
        "OpalUnU did not converge at r = {r} after {} iterations",
        options.max_iterations
    );
    Ok(Solution::exhausted(z, options.max_iterations))
}

/// `dz/dr = (r/R + 2r·Q′(w)/H²) / (1 − e2·z/R)`
pub fn opal_unu_slope(model: &OpalUnUModel, r: f64, z: f64) -> SurfaceResult<f64> {
    if model.radius == 0.0 {
        return Err(SurfaceError::ZeroDenominator {
            context: "OpalUnU radius",
        });
    }
    let series = opal_unu_series(model, r)?;
    let mut numerator = r / model.radius;
    if series.derivative != 0.0 {
        let h2 = model.normalization * model.normalization;
        numerator += 2.0 * r * series.derivative / h2;
    }
    let denominator = 1.0 - model.e2 * z / model.radius;
    checked_div(numerator, denominator, "OpalUnU slope")
}

/// `z − (r² + e2·z²)/(2R) − Q(w)`; zero at the solution.
pub fn opal_unu_residual(model: &OpalUnUModel, r: f64, z: f64) -> SurfaceResult<f64> {
    if model.radius == 0.0 {
        return Err(SurfaceError::ZeroDenominator {
            context: "OpalUnU radius",
        });
    }
    let offset = opal_unu_series(model, r)?.value;
    Ok(z - (r * r + model.e2 * z * z) / (2.0 * model.radius) - offset)
}

// ---------------------------------------------------------------------------
// OpalUnZ: z = c·(r² + e2·z²)/2 + Q(z/H)
// ---------------------------------------------------------------------------

fn curvature(radius: f64) -> f64 {
    if radius == 0.0 { 0.0 } else { 1.0 / radius }
}

struct NewtonStep {
    value: f64,
    derivative: f64,
}

fn opal_unz_step(model: &OpalUnZModel, r: f64, z: f64) -> SurfaceResult<NewtonStep> {
    let c = curvature(model.radius);
    let series = scaled_series(&model.series, z, model.normalization, "OpalUnZ normalization")?;
    let q_derivative = if series.derivative == 0.0 {
        0.0
    } else {
        series.derivative / model.normalization
    };
    Ok(NewtonStep {
        value: z - c * (r * r + model.e2 * z * z) / 2.0 - series.value,
        derivative: 1.0 - c * model.e2 * z - q_derivative,
    })
}

/// Newton-Raphson from `z₀ = r/R`.
pub fn opal_unz_sag(model: &OpalUnZModel, r: f64, options: &SolverOptions) -> SurfaceResult<Solution> {
    let mut z = r * curvature(model.radius);
    newton(options, "OpalUnZ", &mut z, |z| opal_unz_step(model, r, z))
}

/// `dz/dr = c·r / f′(z)`
pub fn opal_unz_slope(model: &OpalUnZModel, r: f64, z: f64) -> SurfaceResult<f64> {
    let step = opal_unz_step(model, r, z)?;
    checked_div(curvature(model.radius) * r, step.derivative, "OpalUnZ slope")
}

pub fn opal_unz_residual(model: &OpalUnZModel, r: f64, z: f64) -> SurfaceResult<f64> {
    Ok(opal_unz_step(model, r, z)?.value)
}

// ---------------------------------------------------------------------------
// Poly: r² = z·Q(z)
// ---------------------------------------------------------------------------

fn poly_step(model: &PolyModel, r: f64, z: f64) -> NewtonStep {
    let q = model.q(z);
    NewtonStep {
        value: z * q - r * r,
        derivative: q + z * model.q_derivative(z),
    }
}

/// Newton-Raphson on `P(z) − r²` from `z₀ = 1`.
pub fn poly_sag(model: &PolyModel, r: f64, options: &SolverOptions) -> SurfaceResult<Solution> {
    if model.series.is_zero() {
        return Err(SurfaceError::ZeroDenominator {
            context: "Poly without coefficients",
        });
    }
    let mut z = 1.0;
    newton(options, "Poly", &mut z, |z| Ok(poly_step(model, r, z)))
}

/// `2r / P′(z)`, from differentiating `r² = P(z)` with respect to `r`.
pub fn poly_slope(model: &PolyModel, r: f64, z: f64) -> SurfaceResult<f64> {
    checked_div(2.0 * r, poly_step(model, r, z).derivative, "Poly slope")
}

pub fn poly_residual(model: &PolyModel, r: f64, z: f64) -> f64 {
    poly_step(model, r, z).value
}

/// Shared Newton loop. A zero derivative stops at the current iterate.
fn newton(
    options: &SolverOptions,
    family: &'static str,
    z: &mut f64,
    mut step_at: impl FnMut(f64) -> SurfaceResult<NewtonStep>,
) -> SurfaceResult<Solution> {
    for iteration in 1..=options.max_iterations {
        let step = step_at(*z)?;
        if step.derivative == 0.0 {
            log::debug!("{family}: zero derivative at z = {}, stopping", *z);
            return Ok(Solution::exhausted(*z, iteration));
        }
        let delta = step.value / step.derivative;
        *z = finite(*z - delta, "Newton iteration")?;
        if delta.abs() < options.tolerance {
            return Ok(Solution::converged(*z, iteration));
        }
    }

    log::debug!(
        "{family} did not converge after {} iterations",
        options.max_iterations
    );
    Ok(Solution::exhausted(*z, options.max_iterations))
}
