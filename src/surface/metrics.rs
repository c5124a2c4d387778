//! Scalar summaries of a surface over its declared radial scan.
//!
//! `evaluate_metrics` runs the profile once and reduces it to maxima, the
//! f-numbers and, for freeform surfaces, the RMS/PV deviation from the base
//! conic. Points that failed to evaluate are counted in [`ScanDiagnostics`]
//! and contribute zeros to the maxima.

use std::fmt;

use serde::Serialize;

use super::closed_form;
use super::evaluator::{EvaluationStatus, ProfileSample, SurfaceEvaluator, grid_coordinate, map_indices};
use super::model::{AsphereModel, EVEN_ASPHERE_POWERS, FreeformModel, PowerSeries, Surface, SurfaceShape};

/// Nanometres per millimetre.
const NM_PER_MM: f64 = 1.0e6;

/// Bookkeeping for one metrics scan.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDiagnostics {
    /// Radial samples evaluated.
    pub sample_count: usize,

    /// Samples whose status was a domain error.
    pub domain_error_count: usize,

    /// Samples whose solver ran out of iterations.
    pub not_converged_count: usize,

    /// Human-readable notes about skipped or degraded quantities.
    pub warnings: Vec<String>,
}

impl ScanDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// No failed samples and no warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.domain_error_count == 0 && self.not_converged_count == 0 && self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    fn record(&mut self, status: &EvaluationStatus) {
        self.sample_count += 1;
        match status {
            EvaluationStatus::Ok => {}
            EvaluationStatus::DomainError { .. } => self.domain_error_count += 1,
            EvaluationStatus::NotConverged { .. } => self.not_converged_count += 1,
        }
    }

    /// Format: `"samples:{n} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("samples:{}", self.sample_count)];
        if self.domain_error_count > 0 {
            parts.push(format!("domain:{}", self.domain_error_count));
        }
        if self.not_converged_count > 0 {
            parts.push(format!("not-converged:{}", self.not_converged_count));
        }
        if !self.warnings.is_empty() {
            parts.push(format!("warnings:{}", self.warnings.len()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for ScanDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan Diagnostics:")?;
        writeln!(f, "  Samples: {}", self.sample_count)?;
        if self.domain_error_count > 0 {
            writeln!(f, "  Domain errors: {}", self.domain_error_count)?;
        }
        if self.not_converged_count > 0 {
            writeln!(f, "  Not converged: {}", self.not_converged_count)?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        Ok(())
    }
}

/// Maxima and derived figures of one surface.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceMetrics {
    pub max_sag: f64,
    pub max_slope: f64,
    /// Degrees.
    pub max_angle: f64,
    pub max_asphericity: f64,
    pub max_aberration: f64,
    /// Largest `|Δasphericity/Δr|` between consecutive samples.
    pub max_asph_gradient: f64,
    pub best_fit_sphere_radius: f64,
    pub paraxial_f_number: f64,
    pub working_f_number: f64,
    /// Waves RMS; freeform surfaces only.
    pub rms_error: Option<f64>,
    /// Waves peak-to-valley; freeform surfaces only.
    pub pv_error: Option<f64>,
    pub diagnostics: ScanDiagnostics,
}

/// `|R| / (4·maxR)`; 0 for a zero aperture.
#[must_use]
pub fn paraxial_f_number(radius: f64, max_r: f64) -> f64 {
    if max_r == 0.0 {
        return 0.0;
    }
    radius.abs() / (4.0 * max_r.abs())
}

/// `1 / (2·sin(2·atan|slope|))` from the slope at the rim; 0 when flat.
#[must_use]
pub fn working_f_number(edge_slope: f64) -> f64 {
    let sine = (2.0 * edge_slope.abs().atan()).sin();
    if sine == 0.0 || !sine.is_finite() {
        return 0.0;
    }
    1.0 / (2.0 * sine)
}

/// Largest absolute asphericity change per unit radius along the profile.
fn max_asphericity_gradient(profile: &[ProfileSample]) -> f64 {
    profile
        .windows(2)
        .filter_map(|pair| {
            let dr = pair[1].r - pair[0].r;
            (dr > 0.0).then(|| ((pair[1].result.asphericity - pair[0].result.asphericity) / dr).abs())
        })
        .fold(0.0, f64::max)
}

/// RMS and PV of a set of deviations, both in the deviation's unit.
fn rms_and_pv(deviations: &[f64]) -> Option<(f64, f64)> {
    if deviations.is_empty() {
        return None;
    }
    let n = deviations.len() as f64;
    let mean = deviations.iter().sum::<f64>() / n;
    let variance = deviations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let (min, max) = deviations
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| (lo.min(*d), hi.max(*d)));
    Some((variance.sqrt(), max - min))
}

impl SurfaceEvaluator {
    /// Reduces the radial scan of `surface` to [`SurfaceMetrics`].
    #[must_use]
    pub fn evaluate_metrics(&self, surface: &Surface) -> SurfaceMetrics {
        let profile = self.evaluate_profile(surface);
        let mut metrics = SurfaceMetrics::default();

        for sample in &profile {
            let result = &sample.result;
            metrics.diagnostics.record(&result.status);
            metrics.max_sag = metrics.max_sag.max(result.sag.abs());
            metrics.max_slope = metrics.max_slope.max(result.slope.abs());
            metrics.max_angle = metrics.max_angle.max(result.angle.abs());
            metrics.max_asphericity = metrics.max_asphericity.max(result.asphericity.abs());
            metrics.max_aberration = metrics.max_aberration.max(result.aberration.abs());
        }
        metrics.max_asph_gradient = max_asphericity_gradient(&profile);

        let bounds = surface.bounds;
        metrics.paraxial_f_number = paraxial_f_number(surface.reference_radius(), bounds.max);
        let edge_slope = profile.last().map_or(0.0, |sample| sample.result.slope);
        metrics.working_f_number = working_f_number(edge_slope);

        if let SurfaceShape::Freeform(model) = &surface.shape {
            self.freeform_errors(model, surface, &mut metrics);
        } else {
            metrics.best_fit_sphere_radius = self.best_fit_sphere(surface).radius();
        }

        if metrics.diagnostics.domain_error_count > 0 {
            metrics.diagnostics.add_warning(format!(
                "{} of {} samples hit a domain error",
                metrics.diagnostics.domain_error_count, metrics.diagnostics.sample_count
            ));
        }
        log::debug!(
            "metrics for {}: {}",
            surface.surface_type(),
            metrics.diagnostics.summary()
        );
        metrics
    }

    /// Grid scan of external sag against the base conic.
    fn freeform_errors(&self, model: &FreeformModel, surface: &Surface, metrics: &mut SurfaceMetrics) {
        let Some(freeform) = self.freeform() else {
            metrics
                .diagnostics
                .add_warning("no freeform evaluator registered; RMS/PV unavailable");
            return;
        };
        let wavelength_nm = self.options().reference_wavelength_nm;
        if !(wavelength_nm.is_finite() && wavelength_nm > 0.0) {
            metrics
                .diagnostics
                .add_warning(format!("reference wavelength {wavelength_nm} nm is not usable"));
            return;
        }

        let base = AsphereModel {
            radius: model.radius,
            conic: model.conic,
            series: PowerSeries::zero(EVEN_ASPHERE_POWERS),
        };
        let bounds = surface.bounds;
        let size = self.options().freeform_grid_size;
        let Some(count) = size.checked_mul(size) else {
            metrics
                .diagnostics
                .add_warning(format!("freeform grid size {size} is too large; RMS/PV unavailable"));
            return;
        };
        let deviations: Vec<Option<f64>> = map_indices(count, |index| {
            let x = grid_coordinate(index % size, size, bounds.max);
            let y = grid_coordinate(index / size, size, bounds.max);
            let r = x.hypot(y);
            if r < bounds.min || r > bounds.max {
                return None;
            }
            let reference = closed_form::asphere_sag(&base, r).ok()?;
            let sag = freeform.sag(x, y, &model.parameters);
            sag.is_finite().then_some(sag - reference)
        });

        let total = deviations.len();
        let usable: Vec<f64> = deviations.into_iter().flatten().collect();
        log::debug!("freeform scan: {} of {total} grid points inside the aperture", usable.len());
        match rms_and_pv(&usable) {
            Some((rms, pv)) => {
                let to_waves = NM_PER_MM / wavelength_nm;
                metrics.rms_error = Some(rms * to_waves);
                metrics.pv_error = Some(pv * to_waves);
            }
            None => metrics
                .diagnostics
                .add_warning("freeform scan produced no usable grid points"),
        }
    }
}
