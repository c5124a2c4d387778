mod best_fit;
mod cache;
mod closed_form;
mod derived;
mod error;
mod evaluator;
mod freeform;
mod implicit;
mod metrics;
mod model;
mod params;

pub use best_fit::BestFitSphere;
pub use cache::{BestFitCacheStats, BestFitSphereCache, DEFAULT_CACHE_CAPACITY};
pub use closed_form::{asphere_sag, asphere_slope, sphere_sag, sphere_slope};
pub use derived::{aberration_of_normals, angle_degrees, asphericity, sign};
pub use error::{SurfaceError, SurfaceResult};
pub use evaluator::{
    EngineOptions, EvaluationResult, EvaluationStatus, ProfileSample, SurfaceEvaluator,
    SurfaceGrid,
};
pub use freeform::FreeformSag;
pub use implicit::{
    ImplicitSolverOptions, Solution, SolverOptions, opal_unu_residual, opal_unu_sag,
    opal_unu_slope, opal_unz_residual, opal_unz_sag, opal_unz_slope, poly_residual, poly_sag,
    poly_slope,
};
pub use metrics::{ScanDiagnostics, SurfaceMetrics, paraxial_f_number, working_f_number};
pub use model::{
    AsphereModel, EVEN_ASPHERE_POWERS, FreeformModel, ODD_ASPHERE_POWERS, OPAL_UNU_POWERS,
    OPAL_UNZ_POWERS, OpalUnUModel, OpalUnZModel, POLY_INDICES, PolyModel, PowerSeries,
    RadialBounds, SphereModel, Surface, SurfaceDescriptor, SurfaceKey, SurfaceShape, SurfaceType,
};
pub use params::{ParamValue, ParameterMap, coerce_number};

#[cfg(test)]
mod tests;
