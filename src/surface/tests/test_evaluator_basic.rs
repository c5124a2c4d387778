use crate::surface::{
    EngineOptions, EvaluationStatus, ImplicitSolverOptions, ParamValue, ParameterMap,
    SolverOptions, Surface, SurfaceDescriptor, SurfaceError, SurfaceEvaluator, SurfaceType,
};

const TOLERANCE: f64 = 1e-9;

fn surface(surface_type: SurfaceType, parameters: ParameterMap) -> Surface {
    Surface::from_descriptor(&SurfaceDescriptor::new(surface_type, parameters))
}

fn sphere(radius: f64, max: f64) -> Surface {
    surface(
        SurfaceType::Sphere,
        ParameterMap::new().with("R", radius).with("maxHeight", max).with("step", 1.0),
    )
}

#[test]
fn scenario_sphere_at_25() {
    let evaluator = SurfaceEvaluator::default();
    let result = evaluator.evaluate(&sphere(100.0, 25.0), 25.0, None);
    assert!(result.status.is_ok());
    assert!((result.sag - 3.175_416_344_8).abs() < TOLERANCE, "sag was {}", result.sag);
    assert!((result.slope - 0.258_198_889_7).abs() < TOLERANCE, "slope was {}", result.slope);
    assert!(result.aberration.abs() < 1e-9, "a sphere has no aberration of normals");
    assert!(result.asphericity.abs() < 1e-9, "a sphere is its own best fit");
    assert!((result.angle - 0.258_198_889_7_f64.atan().to_degrees()).abs() < 1e-6);
}

#[test]
fn scenario_parabola_at_10() {
    let evaluator = SurfaceEvaluator::default();
    let parabola = surface(
        SurfaceType::EvenAsphere,
        ParameterMap::new()
            .with("R", 50.0)
            .with("k", -1.0)
            .with("maxHeight", 20.0),
    );
    let result = evaluator.evaluate(&parabola, 10.0, None);
    assert!((result.sag - 1.0).abs() < TOLERANCE, "sag was {}", result.sag);
    // normal of a parabola meets the axis at R + z
    assert!((result.aberration - 1.0).abs() < TOLERANCE, "aberration was {}", result.aberration);
}

#[test]
fn scenario_unu_matches_sphere() {
    let evaluator = SurfaceEvaluator::default();
    let unu = surface(
        SurfaceType::OpalUnU,
        ParameterMap::new()
            .with("R", 100.0)
            .with("e2", 1.0)
            .with("H", 10.0)
            .with("maxHeight", 25.0),
    );
    let result = evaluator.evaluate(&unu, 25.0, None);
    let reference = evaluator.evaluate(&sphere(100.0, 25.0), 25.0, None);
    assert!(result.status.is_ok(), "status was {:?}", result.status);
    assert!((result.sag - reference.sag).abs() < 1e-12);
    assert!((result.slope - reference.slope).abs() < 1e-10);
}

#[test]
fn exhausted_solver_is_reported_with_last_iterate() {
    let options = EngineOptions {
        solvers: ImplicitSolverOptions {
            opal_unu: SolverOptions {
                tolerance: 1e-15,
                max_iterations: 3,
            },
            ..ImplicitSolverOptions::default()
        },
        ..EngineOptions::default()
    };
    let evaluator = SurfaceEvaluator::new(options);
    let unu = surface(
        SurfaceType::OpalUnU,
        ParameterMap::new().with("R", 100.0).with("e2", 1.0).with("maxHeight", 25.0),
    );
    let result = evaluator.evaluate(&unu, 20.0, None);
    assert_eq!(result.status, EvaluationStatus::NotConverged { iterations: 3 });
    assert!(result.sag > 0.0 && result.slope > 0.0);
}

#[test]
fn empty_poly_is_a_domain_error() {
    let evaluator = SurfaceEvaluator::default();
    let poly = surface(SurfaceType::Poly, ParameterMap::new().with("maxHeight", 5.0));
    let result = evaluator.evaluate(&poly, 2.0, None);
    assert!(matches!(
        result.status,
        EvaluationStatus::DomainError {
            error: SurfaceError::ZeroDenominator { .. }
        }
    ));
    assert_eq!(result.sag, 0.0);
}

#[test]
fn malformed_parameters_are_sanitized_to_zero() {
    let evaluator = SurfaceEvaluator::default();
    let plane = surface(
        SurfaceType::Sphere,
        ParameterMap::new()
            .with("R", "not a radius")
            .with("maxHeight", ParamValue::Text("10,5".into())),
    );
    assert_eq!(plane.reference_radius(), 0.0);
    assert_eq!(plane.bounds.max, 10.5);
    let result = evaluator.evaluate(&plane, 4.0, None);
    assert!(result.status.is_ok());
    assert_eq!(result.sag, 0.0);
    assert_eq!(result.slope, 0.0);
}

#[test]
fn freeform_contract_only_reports_sag() {
    let evaluator = SurfaceEvaluator::default()
        .with_freeform(|x: f64, y: f64, p: &ParameterMap| p.number("Z4") * (x * x + y * y));
    let zernike = surface(
        SurfaceType::Zernike,
        ParameterMap::new().with("Z4", 0.01).with("maxHeight", 10.0),
    );

    let on_axis = evaluator.evaluate(&zernike, 3.0, None);
    assert!((on_axis.sag - 0.09).abs() < TOLERANCE);
    let off_axis = evaluator.evaluate(&zernike, 0.0, Some((3.0, 4.0)));
    assert!((off_axis.sag - 0.25).abs() < TOLERANCE);
    for result in [on_axis, off_axis] {
        assert!(result.status.is_ok());
        assert_eq!(result.slope, 0.0);
        assert_eq!(result.asphericity, 0.0);
        assert_eq!(result.aberration, 0.0);
        assert_eq!(result.angle, 0.0);
    }
    assert_eq!(evaluator.cache().stats().misses, 0, "freeform never fits a sphere");
}

#[test]
fn non_finite_freeform_sag_is_a_domain_error() {
    let evaluator = SurfaceEvaluator::default().with_freeform(|_: f64, _: f64, _: &ParameterMap| f64::NAN);
    let irregular = surface(SurfaceType::Irregular, ParameterMap::new().with("maxHeight", 1.0));
    let result = evaluator.evaluate(&irregular, 0.5, None);
    assert_eq!(result.sag, 0.0);
    assert!(matches!(
        result.status,
        EvaluationStatus::DomainError {
            error: SurfaceError::NonFinite { .. }
        }
    ));
}

#[test]
fn profile_and_grid_share_one_fit() {
    let evaluator = SurfaceEvaluator::default();
    let surface = sphere(200.0, 10.0);
    let profile = evaluator.evaluate_profile(&surface);
    let grid = evaluator.evaluate_grid(&surface, 9);
    assert_eq!(profile.len(), 11);
    assert_eq!(grid.values.len(), 81);
    let stats = evaluator.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);

    let on_grid = grid.get(8, 4).expect("rim point on the x axis");
    let on_profile = &profile.last().expect("non-empty profile").result;
    assert!((on_grid.sag - on_profile.sag).abs() < 1e-12);
}

#[test]
fn annular_grid_masks_the_hole() {
    let evaluator = SurfaceEvaluator::default();
    let annulus = surface(
        SurfaceType::Sphere,
        ParameterMap::new()
            .with("R", 100.0)
            .with("minHeight", 4.0)
            .with("maxHeight", 10.0),
    );
    let grid = evaluator.evaluate_grid(&annulus, 5);
    assert!(grid.get(2, 2).is_none(), "centre is inside the hole");
    assert!(grid.get(0, 2).is_some());
    assert!(grid.get(0, 0).is_none(), "corner is outside the rim");
    assert!(grid.get(5, 0).is_none());
}
