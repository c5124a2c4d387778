use serde::Serialize;

/// Everything that can go wrong while evaluating a surface model.
///
/// None of these abort an evaluation: the evaluator zeroes the affected
/// quantity and reports the error through [`super::EvaluationStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SurfaceError {
    #[error("square root of a negative value ({value})")]
    NegativeRadicand { value: f64 },
    #[error("radial position {r} lies beyond the paraxial radius")]
    ApertureBeyondParaxial { r: f64 },
    #[error("division by zero in {context}")]
    ZeroDenominator { context: &'static str },
    #[error("non-finite value produced in {context}")]
    NonFinite { context: &'static str },
    #[error("parameter `{name}` is not numeric: {value}")]
    MalformedParameter { name: String, value: String },
    #[error("no freeform evaluator is registered")]
    FreeformUnavailable,
    #[error("invalid surface descriptor: {message}")]
    InvalidDescriptor { message: String },
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Rejects NaN and infinities produced by an otherwise valid formula.
pub(crate) fn finite(value: f64, context: &'static str) -> SurfaceResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SurfaceError::NonFinite { context })
    }
}

/// Square root that refuses negative arguments instead of yielding NaN.
pub(crate) fn checked_sqrt(value: f64) -> SurfaceResult<f64> {
    if value < 0.0 {
        Err(SurfaceError::NegativeRadicand { value })
    } else {
        Ok(value.sqrt())
    }
}

pub(crate) fn checked_div(numerator: f64, denominator: f64, context: &'static str) -> SurfaceResult<f64> {
    if denominator == 0.0 {
        return Err(SurfaceError::ZeroDenominator { context });
    }
    finite(numerator / denominator, context)
}
