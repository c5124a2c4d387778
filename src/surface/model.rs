//! Surface descriptors and the closed set of surface models built from them.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::params::ParameterMap;

/// Polynomial powers used by each family, in coefficient order.
pub const EVEN_ASPHERE_POWERS: &[u32] = &[4, 6, 8, 10, 12, 14, 16, 18, 20];
pub const ODD_ASPHERE_POWERS: &[u32] = &[
    3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
];
pub const OPAL_UNU_POWERS: &[u32] = &[2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];
pub const OPAL_UNZ_POWERS: &[u32] = &[3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];
/// Coefficient `An` of a Poly surface multiplies `z^(n-1)` in `Q(z)`.
pub const POLY_INDICES: &[u32] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];

/// Surface family tag as sent by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceType {
    Sphere,
    EvenAsphere,
    OddAsphere,
    #[serde(alias = "UnU")]
    OpalUnU,
    #[serde(alias = "UnZ")]
    OpalUnZ,
    Poly,
    Zernike,
    Irregular,
}

impl SurfaceType {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sphere => "Sphere",
            Self::EvenAsphere => "EvenAsphere",
            Self::OddAsphere => "OddAsphere",
            Self::OpalUnU => "OpalUnU",
            Self::OpalUnZ => "OpalUnZ",
            Self::Poly => "Poly",
            Self::Zernike => "Zernike",
            Self::Irregular => "Irregular",
        }
    }

    /// Zernike and Irregular surfaces are evaluated outside this crate.
    #[must_use]
    pub fn is_freeform(&self) -> bool {
        matches!(self, Self::Zernike | Self::Irregular)
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw surface as received from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    #[serde(rename = "type")]
    pub surface_type: SurfaceType,
    #[serde(default)]
    pub parameters: ParameterMap,
}

impl SurfaceDescriptor {
    #[must_use]
    pub fn new(surface_type: SurfaceType, parameters: ParameterMap) -> Self {
        Self {
            surface_type,
            parameters,
        }
    }
}

/// Declared radial extent of a surface and the step used for scans.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RadialBounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl RadialBounds {
    #[must_use]
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        if min > max {
            log::debug!("radial bounds {min}..{max} swapped");
            Self {
                min: max,
                max: min,
                step,
            }
        } else {
            Self { min, max, step }
        }
    }

    fn from_parameters(parameters: &ParameterMap) -> Self {
        Self::new(
            parameters.number("minHeight"),
            parameters.number("maxHeight"),
            parameters.number("step"),
        )
    }

    /// A zero inner bound selects the three-point reference sphere.
    #[must_use]
    pub fn is_full_aperture(&self) -> bool {
        self.min == 0.0
    }

    /// Radial sample positions from `min` to `max` at `step`.
    ///
    /// A non-positive or non-finite step yields only the two bounds. The last
    /// sample is always exactly `max`.
    #[must_use]
    pub fn samples(&self) -> Vec<f64> {
        if self.max <= self.min {
            return vec![self.min];
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return vec![self.min, self.max];
        }
        let count = ((self.max - self.min) / self.step).floor() as usize;
        let mut samples: Vec<f64> = (0..=count)
            .map(|i| self.min + i as f64 * self.step)
            .collect();
        match samples.last() {
            Some(&last) if (self.max - last).abs() <= self.step * 1e-9 => {
                if let Some(slot) = samples.last_mut() {
                    *slot = self.max;
                }
            }
            _ => samples.push(self.max),
        }
        samples
    }
}

/// Coefficients paired with the fixed powers of one family.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSeries {
    powers: &'static [u32],
    coefficients: Vec<f64>,
}

impl PowerSeries {
    /// Missing trailing coefficients are treated as zero.
    #[must_use]
    pub fn new(powers: &'static [u32], mut coefficients: Vec<f64>) -> Self {
        coefficients.resize(powers.len(), 0.0);
        Self {
            powers,
            coefficients,
        }
    }

    #[must_use]
    pub fn zero(powers: &'static [u32]) -> Self {
        Self::new(powers, Vec::new())
    }

    fn from_parameters(parameters: &ParameterMap, powers: &'static [u32]) -> Self {
        Self::new(powers, parameters.coefficients("A", powers.iter().copied()))
    }

    #[must_use]
    pub fn powers(&self) -> &'static [u32] {
        self.powers
    }

    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    #[must_use]
    pub fn coefficient(&self, power: u32) -> f64 {
        self.terms()
            .find(|(p, _)| *p == power)
            .map_or(0.0, |(_, a)| a)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.coefficients.iter().all(|a| *a == 0.0)
    }

    fn terms(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.powers.iter().copied().zip(self.coefficients.iter().copied())
    }

    /// `Σ aₙ·tⁿ`
    #[must_use]
    pub fn value(&self, t: f64) -> f64 {
        self.terms()
            .filter(|(_, a)| *a != 0.0)
            .map(|(p, a)| a * t.powi(p as i32))
            .sum()
    }

    /// `Σ n·aₙ·tⁿ⁻¹`
    #[must_use]
    pub fn derivative(&self, t: f64) -> f64 {
        self.terms()
            .filter(|(p, a)| *a != 0.0 && *p > 0)
            .map(|(p, a)| f64::from(p) * a * t.powi(p as i32 - 1))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphereModel {
    pub radius: f64,
}

/// Conic base plus a polynomial in `r` (even or odd powers).
#[derive(Debug, Clone, PartialEq)]
pub struct AsphereModel {
    pub radius: f64,
    pub conic: f64,
    pub series: PowerSeries,
}

/// `z = (r² + e2·z²)/(2R) + Q(w)`, `w = r²/H²`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpalUnUModel {
    pub radius: f64,
    pub e2: f64,
    pub normalization: f64,
    pub series: PowerSeries,
}

/// `z = c·(r² + e2·z²)/2 + Q(z/H)`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpalUnZModel {
    pub radius: f64,
    pub e2: f64,
    pub normalization: f64,
    pub series: PowerSeries,
}

/// `r² = z·Q(z)`, `Q(z) = Σ Aₙ·zⁿ⁻¹`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyModel {
    pub series: PowerSeries,
}

impl PolyModel {
    /// `Q(z)`; the series is stored by index `n`, i.e. power `n - 1`.
    #[must_use]
    pub fn q(&self, z: f64) -> f64 {
        self.series
            .coefficients()
            .iter()
            .enumerate()
            .filter(|(_, a)| **a != 0.0)
            .map(|(i, a)| a * z.powi(i as i32))
            .sum()
    }

    /// `Q′(z)`
    #[must_use]
    pub fn q_derivative(&self, z: f64) -> f64 {
        self.series
            .coefficients()
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, a)| **a != 0.0)
            .map(|(i, a)| i as f64 * a * z.powi(i as i32 - 1))
            .sum()
    }

    /// Radius of the osculating sphere at the vertex: `r² ≈ A1·z` near 0.
    #[must_use]
    pub fn surrogate_radius(&self) -> f64 {
        self.series.coefficient(1) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeformModel {
    pub kind: SurfaceType,
    pub radius: f64,
    pub conic: f64,
    pub parameters: ParameterMap,
}

/// A surface model with its per-family payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceShape {
    Sphere(SphereModel),
    EvenAsphere(AsphereModel),
    OddAsphere(AsphereModel),
    OpalUnU(OpalUnUModel),
    OpalUnZ(OpalUnZModel),
    Poly(PolyModel),
    Freeform(FreeformModel),
}

/// A fully typed surface ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub shape: SurfaceShape,
    pub bounds: RadialBounds,
}

impl Surface {
    #[must_use]
    pub fn new(shape: SurfaceShape, bounds: RadialBounds) -> Self {
        Self { shape, bounds }
    }

    /// Builds a typed surface, sanitizing every parameter to a number.
    #[must_use]
    pub fn from_descriptor(descriptor: &SurfaceDescriptor) -> Self {
        let p = &descriptor.parameters;
        let bounds = RadialBounds::from_parameters(p);
        let shape = match descriptor.surface_type {
            SurfaceType::Sphere => SurfaceShape::Sphere(SphereModel {
                radius: p.number("R"),
            }),
            SurfaceType::EvenAsphere => SurfaceShape::EvenAsphere(AsphereModel {
                radius: p.number("R"),
                conic: p.number("k"),
                series: PowerSeries::from_parameters(p, EVEN_ASPHERE_POWERS),
            }),
            SurfaceType::OddAsphere => SurfaceShape::OddAsphere(AsphereModel {
                radius: p.number("R"),
                conic: p.number("k"),
                series: PowerSeries::from_parameters(p, ODD_ASPHERE_POWERS),
            }),
            SurfaceType::OpalUnU => SurfaceShape::OpalUnU(OpalUnUModel {
                radius: p.number("R"),
                e2: p.number("e2"),
                normalization: p.number("H"),
                series: PowerSeries::from_parameters(p, OPAL_UNU_POWERS),
            }),
            SurfaceType::OpalUnZ => SurfaceShape::OpalUnZ(OpalUnZModel {
                radius: p.number("R"),
                e2: p.number("e2"),
                normalization: p.number("H"),
                series: PowerSeries::from_parameters(p, OPAL_UNZ_POWERS),
            }),
            SurfaceType::Poly => SurfaceShape::Poly(PolyModel {
                series: PowerSeries::from_parameters(p, POLY_INDICES),
            }),
            SurfaceType::Zernike | SurfaceType::Irregular => {
                SurfaceShape::Freeform(FreeformModel {
                    kind: descriptor.surface_type,
                    radius: p.number("R"),
                    conic: p.number("k"),
                    parameters: p.clone(),
                })
            }
        };
        Self::new(shape, bounds)
    }

    #[must_use]
    pub fn surface_type(&self) -> SurfaceType {
        match &self.shape {
            SurfaceShape::Sphere(_) => SurfaceType::Sphere,
            SurfaceShape::EvenAsphere(_) => SurfaceType::EvenAsphere,
            SurfaceShape::OddAsphere(_) => SurfaceType::OddAsphere,
            SurfaceShape::OpalUnU(_) => SurfaceType::OpalUnU,
            SurfaceShape::OpalUnZ(_) => SurfaceType::OpalUnZ,
            SurfaceShape::Poly(_) => SurfaceType::Poly,
            SurfaceShape::Freeform(model) => model.kind,
        }
    }

    /// Vertex radius used as sign reference and aberration offset.
    #[must_use]
    pub fn reference_radius(&self) -> f64 {
        match &self.shape {
            SurfaceShape::Sphere(m) => m.radius,
            SurfaceShape::EvenAsphere(m) | SurfaceShape::OddAsphere(m) => m.radius,
            SurfaceShape::OpalUnU(m) => m.radius,
            SurfaceShape::OpalUnZ(m) => m.radius,
            SurfaceShape::Poly(m) => m.surrogate_radius(),
            SurfaceShape::Freeform(m) => m.radius,
        }
    }

    #[must_use]
    pub fn is_freeform(&self) -> bool {
        matches!(self.shape, SurfaceShape::Freeform(_))
    }

    /// Canonical identity of the full parameter set.
    #[must_use]
    pub fn key(&self) -> SurfaceKey {
        let mut key = String::from(self.surface_type().name());
        push_field(&mut key, "min", self.bounds.min);
        push_field(&mut key, "max", self.bounds.max);
        push_field(&mut key, "step", self.bounds.step);

        match &self.shape {
            SurfaceShape::Sphere(m) => push_field(&mut key, "R", m.radius),
            SurfaceShape::EvenAsphere(m) | SurfaceShape::OddAsphere(m) => {
                push_field(&mut key, "R", m.radius);
                push_field(&mut key, "k", m.conic);
                push_series(&mut key, &m.series);
            }
            SurfaceShape::OpalUnU(m) => {
                push_field(&mut key, "R", m.radius);
                push_field(&mut key, "e2", m.e2);
                push_field(&mut key, "H", m.normalization);
                push_series(&mut key, &m.series);
            }
            SurfaceShape::OpalUnZ(m) => {
                push_field(&mut key, "R", m.radius);
                push_field(&mut key, "e2", m.e2);
                push_field(&mut key, "H", m.normalization);
                push_series(&mut key, &m.series);
            }
            SurfaceShape::Poly(m) => push_series(&mut key, &m.series),
            SurfaceShape::Freeform(m) => {
                for (name, value) in m.parameters.iter() {
                    let _ = write!(key, "|{name}={value:?}");
                }
            }
        }
        SurfaceKey(key)
    }
}

fn push_field(key: &mut String, name: &str, value: f64) {
    let _ = write!(key, "|{name}={:016x}", value.to_bits());
}

fn push_series(key: &mut String, series: &PowerSeries) {
    for (power, a) in series.powers().iter().zip(series.coefficients()) {
        push_field(key, &format!("A{power}"), *a);
    }
}

impl From<&SurfaceDescriptor> for Surface {
    fn from(descriptor: &SurfaceDescriptor) -> Self {
        Self::from_descriptor(descriptor)
    }
}

/// Canonical serialization of a surface's parameters, used as cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceKey(String);

impl SurfaceKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
