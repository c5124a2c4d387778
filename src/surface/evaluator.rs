//! Per-point surface evaluation and the grid/profile sweeps built on it.

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::best_fit::BestFitSphere;
use super::cache::{BestFitSphereCache, DEFAULT_CACHE_CAPACITY};
use super::closed_form;
use super::derived;
use super::error::{SurfaceError, SurfaceResult};
use super::freeform::FreeformSag;
use super::implicit::{self, ImplicitSolverOptions, Solution};
use super::model::{FreeformModel, Surface, SurfaceShape};

/// Engine-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    pub solvers: ImplicitSolverOptions,
    /// Maximum number of cached best-fit spheres; 0 disables the cache.
    pub cache_capacity: usize,
    /// Points per side of the square grid used for freeform RMS/PV.
    pub freeform_grid_size: usize,
    /// Wavelength in nanometres that RMS/PV are expressed in; lengths are mm.
    pub reference_wavelength_nm: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            solvers: ImplicitSolverOptions::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            freeform_grid_size: 65,
            reference_wavelength_nm: 632.8,
        }
    }
}

/// Outcome of a single evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum EvaluationStatus {
    #[default]
    Ok,
    /// A formula precondition failed; the affected values are 0.
    DomainError { error: SurfaceError },
    /// The solver ran out of iterations; values come from its last iterate.
    NotConverged { iterations: usize },
}

impl EvaluationStatus {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Everything the engine reports for one point of a surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EvaluationResult {
    pub sag: f64,
    pub slope: f64,
    pub asphericity: f64,
    pub aberration: f64,
    /// Normal inclination in degrees.
    pub angle: f64,
    pub status: EvaluationStatus,
}

impl EvaluationResult {
    #[must_use]
    pub fn failed(error: SurfaceError) -> Self {
        Self {
            status: EvaluationStatus::DomainError { error },
            ..Self::default()
        }
    }
}

/// One sample of a radial profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSample {
    pub r: f64,
    #[serde(flatten)]
    pub result: EvaluationResult,
}

/// Square grid over `[-extent, extent]²`, row-major with `y` varying by row.
///
/// Points outside the declared annulus are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceGrid {
    pub size: usize,
    pub extent: f64,
    pub values: Vec<Option<EvaluationResult>>,
}

impl SurfaceGrid {
    #[must_use]
    pub fn get(&self, column: usize, row: usize) -> Option<&EvaluationResult> {
        if column >= self.size || row >= self.size {
            return None;
        }
        self.values.get(row * self.size + column)?.as_ref()
    }
}

/// Coordinate of grid index `i` on `[-extent, extent]`.
pub(crate) fn grid_coordinate(i: usize, size: usize, extent: f64) -> f64 {
    if size < 2 {
        0.0
    } else {
        -extent + 2.0 * extent * i as f64 / (size - 1) as f64
    }
}

/// Sag-only dispatch; closed-form families report a converged solution.
pub(crate) fn surface_sag(
    surface: &Surface,
    r: f64,
    solvers: &ImplicitSolverOptions,
) -> SurfaceResult<Solution> {
    let closed = |z: f64| Solution {
        z,
        iterations: 0,
        converged: true,
    };
    match &surface.shape {
        SurfaceShape::Sphere(model) => closed_form::sphere_sag(model, r).map(closed),
        SurfaceShape::EvenAsphere(model) | SurfaceShape::OddAsphere(model) => {
            closed_form::asphere_sag(model, r).map(closed)
        }
        SurfaceShape::OpalUnU(model) => implicit::opal_unu_sag(model, r, &solvers.opal_unu),
        SurfaceShape::OpalUnZ(model) => implicit::opal_unz_sag(model, r, &solvers.opal_unz),
        SurfaceShape::Poly(model) => implicit::poly_sag(model, r, &solvers.poly),
        SurfaceShape::Freeform(_) => Err(SurfaceError::FreeformUnavailable),
    }
}

/// Slope at `r`, given the sag `z` already solved there.
pub(crate) fn surface_slope(surface: &Surface, r: f64, z: f64) -> SurfaceResult<f64> {
    match &surface.shape {
        SurfaceShape::Sphere(model) => closed_form::sphere_slope(model, r),
        SurfaceShape::EvenAsphere(model) | SurfaceShape::OddAsphere(model) => {
            closed_form::asphere_slope(model, r)
        }
        SurfaceShape::OpalUnU(model) => implicit::opal_unu_slope(model, r, z),
        SurfaceShape::OpalUnZ(model) => implicit::opal_unz_slope(model, r, z),
        SurfaceShape::Poly(model) => implicit::poly_slope(model, r, z),
        SurfaceShape::Freeform(_) => Ok(0.0),
    }
}

/// Stateless dispatcher plus the best-fit sphere cache it fills.
pub struct SurfaceEvaluator {
    options: EngineOptions,
    cache: BestFitSphereCache,
    freeform: Option<Box<dyn FreeformSag>>,
}

impl Default for SurfaceEvaluator {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl std::fmt::Debug for SurfaceEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceEvaluator")
            .field("options", &self.options)
            .field("cache", &self.cache.stats())
            .field("freeform", &self.freeform.is_some())
            .finish()
    }
}

impl SurfaceEvaluator {
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self {
            cache: BestFitSphereCache::with_capacity(options.cache_capacity),
            options,
            freeform: None,
        }
    }

    #[must_use]
    pub fn with_freeform(mut self, freeform: impl FreeformSag + 'static) -> Self {
        self.set_freeform(freeform);
        self
    }

    pub fn set_freeform(&mut self, freeform: impl FreeformSag + 'static) {
        self.freeform = Some(Box::new(freeform));
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[must_use]
    pub fn cache(&self) -> &BestFitSphereCache {
        &self.cache
    }

    pub(crate) fn freeform(&self) -> Option<&dyn FreeformSag> {
        self.freeform.as_deref()
    }

    /// Reference sphere of `surface`, through the cache.
    #[must_use]
    pub fn best_fit_sphere(&self, surface: &Surface) -> BestFitSphere {
        self.cache.get_or_insert_with(surface.key(), || {
            BestFitSphere::fit(surface, &self.options.solvers)
        })
    }

    /// Evaluates `surface` at radius `r`. `point` is only used by freeform
    /// surfaces and defaults to `(r, 0)`.
    #[must_use]
    pub fn evaluate(&self, surface: &Surface, r: f64, point: Option<(f64, f64)>) -> EvaluationResult {
        if let SurfaceShape::Freeform(model) = &surface.shape {
            return self.evaluate_freeform(model, point.unwrap_or((r, 0.0)));
        }
        let sphere = self.best_fit_sphere(surface);
        self.evaluate_with_sphere(surface, &sphere, r)
    }

    fn evaluate_with_sphere(&self, surface: &Surface, sphere: &BestFitSphere, r: f64) -> EvaluationResult {
        let solved = match surface_sag(surface, r, &self.options.solvers) {
            Ok(solved) => solved,
            Err(error) => return EvaluationResult::failed(error),
        };
        let z = solved.z;
        let mut status = if solved.converged {
            EvaluationStatus::Ok
        } else {
            EvaluationStatus::NotConverged {
                iterations: solved.iterations,
            }
        };

        let slope = match surface_slope(surface, r, z) {
            Ok(slope) => slope,
            Err(error) => {
                status = EvaluationStatus::DomainError { error };
                0.0
            }
        };

        EvaluationResult {
            sag: z,
            slope,
            asphericity: derived::asphericity(sphere, r, z),
            aberration: derived::aberration_of_normals(r, z, slope, surface.reference_radius()),
            angle: derived::angle_degrees(slope),
            status,
        }
    }

    fn evaluate_freeform(&self, model: &FreeformModel, (x, y): (f64, f64)) -> EvaluationResult {
        let Some(freeform) = self.freeform() else {
            return EvaluationResult::failed(SurfaceError::FreeformUnavailable);
        };
        let sag = freeform.sag(x, y, &model.parameters);
        if !sag.is_finite() {
            return EvaluationResult::failed(SurfaceError::NonFinite {
                context: "freeform sag",
            });
        }
        EvaluationResult {
            sag,
            ..EvaluationResult::default()
        }
    }

    /// Evaluates every radius of the declared scan.
    #[must_use]
    pub fn evaluate_profile(&self, surface: &Surface) -> Vec<ProfileSample> {
        let radii = surface.bounds.samples();
        let sphere = (!surface.is_freeform()).then(|| self.best_fit_sphere(surface));
        map_indices(radii.len(), |i| {
            let r = radii[i];
            let result = match &sphere {
                Some(sphere) => self.evaluate_with_sphere(surface, sphere, r),
                None => self.evaluate(surface, r, None),
            };
            ProfileSample { r, result }
        })
    }

    /// Evaluates a `size × size` grid spanning the outer bound.
    ///
    /// A `size` whose square does not fit in `usize` yields an empty grid.
    #[must_use]
    pub fn evaluate_grid(&self, surface: &Surface, size: usize) -> SurfaceGrid {
        let bounds = surface.bounds;
        let extent = bounds.max;
        let Some(count) = size.checked_mul(size) else {
            log::warn!("grid of {size} × {size} points is too large; returning no values");
            return SurfaceGrid {
                size: 0,
                extent,
                values: Vec::new(),
            };
        };
        let sphere = (!surface.is_freeform()).then(|| self.best_fit_sphere(surface));
        let values = map_indices(count, |index| {
            let x = grid_coordinate(index % size, size, extent);
            let y = grid_coordinate(index / size, size, extent);
            let r = x.hypot(y);
            if r < bounds.min || r > bounds.max {
                return None;
            }
            Some(match &sphere {
                Some(sphere) => self.evaluate_with_sphere(surface, sphere, r),
                None => self.evaluate(surface, r, Some((x, y))),
            })
        });
        SurfaceGrid {
            size,
            extent,
            values,
        }
    }
}

#[cfg(feature = "parallel")]
pub(crate) fn map_indices<T, F>(count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..count).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn map_indices<T, F>(count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..count).map(f).collect()
}
