use crate::surface::{
    BestFitSphere, ImplicitSolverOptions, ParameterMap, Surface, SurfaceDescriptor,
    SurfaceEvaluator, SurfaceType,
};

const BOUNDARY_TOLERANCE: f64 = 1e-6;

fn surface(surface_type: SurfaceType, parameters: ParameterMap) -> Surface {
    Surface::from_descriptor(&SurfaceDescriptor::new(surface_type, parameters))
}

fn assert_boundaries_vanish(surface: &Surface) {
    let evaluator = SurfaceEvaluator::default();
    for r in [surface.bounds.min, surface.bounds.max] {
        let result = evaluator.evaluate(surface, r, None);
        assert!(result.status.is_ok(), "{} failed at r = {r}: {:?}", surface.surface_type(), result.status);
        assert!(
            result.asphericity.abs() < BOUNDARY_TOLERANCE,
            "{} asphericity at boundary r = {r} was {}",
            surface.surface_type(),
            result.asphericity
        );
    }
}

#[test]
fn three_point_scenario_radius() {
    let sphere = BestFitSphere::three_point(25.0, 3.0, 100.0);
    let expected = 625.0 / 6.0 + 1.5;
    assert!((sphere.radius() - expected).abs() < 1e-9, "R3 was {}", sphere.radius());
}

#[test]
fn concave_three_point_fit_is_negative_and_vanishes_at_boundaries() {
    let concave = surface(
        SurfaceType::Sphere,
        ParameterMap::new().with("R", -100.0).with("maxHeight", 30.0),
    );
    let fit = BestFitSphere::fit(&concave, &ImplicitSolverOptions::default());
    assert!((fit.radius() + 100.0).abs() < 1e-9, "fit radius {}", fit.radius());
    assert_boundaries_vanish(&concave);

    let concave_asphere = surface(
        SurfaceType::EvenAsphere,
        ParameterMap::new()
            .with("R", -150.0)
            .with("k", -0.5)
            .with("A4", -1e-7)
            .with("maxHeight", 30.0),
    );
    assert_boundaries_vanish(&concave_asphere);
}

#[test]
fn three_point_of_a_sphere_is_the_sphere() {
    let sphere = surface(
        SurfaceType::Sphere,
        ParameterMap::new().with("R", 100.0).with("maxHeight", 30.0),
    );
    let fit = BestFitSphere::fit(&sphere, &ImplicitSolverOptions::default());
    assert!(matches!(fit, BestFitSphere::ThreePoint { .. }));
    assert!((fit.radius() - 100.0).abs() < 1e-9, "fit radius {}", fit.radius());
}

#[test]
fn four_point_of_a_sphere_is_the_sphere() {
    let sphere = surface(
        SurfaceType::Sphere,
        ParameterMap::new()
            .with("R", 100.0)
            .with("minHeight", 10.0)
            .with("maxHeight", 30.0),
    );
    let fit = BestFitSphere::fit(&sphere, &ImplicitSolverOptions::default());
    assert!(matches!(fit, BestFitSphere::FourPoint { .. }));
    assert!((fit.radius() - 100.0).abs() < 1e-6, "fit radius {}", fit.radius());
}

#[test]
fn full_aperture_asphere_boundaries() {
    let asphere = surface(
        SurfaceType::EvenAsphere,
        ParameterMap::new()
            .with("R", 80.0)
            .with("k", -0.5)
            .with("A4", 1e-6)
            .with("maxHeight", 20.0)
            .with("step", 0.5),
    );
    assert_boundaries_vanish(&asphere);
}

#[test]
fn annular_asphere_boundaries() {
    let asphere = surface(
        SurfaceType::EvenAsphere,
        ParameterMap::new()
            .with("R", 80.0)
            .with("k", -0.5)
            .with("A4", 1e-6)
            .with("minHeight", 5.0)
            .with("maxHeight", 20.0)
            .with("step", 0.5),
    );
    assert_boundaries_vanish(&asphere);
}

#[test]
fn implicit_family_boundaries() {
    let unu = surface(
        SurfaceType::OpalUnU,
        ParameterMap::new()
            .with("R", 150.0)
            .with("e2", 0.6)
            .with("H", 20.0)
            .with("A2", 5e-3)
            .with("maxHeight", 20.0),
    );
    assert_boundaries_vanish(&unu);

    let unz = surface(
        SurfaceType::OpalUnZ,
        ParameterMap::new()
            .with("R", 150.0)
            .with("e2", 0.6)
            .with("H", 20.0)
            .with("A3", 1e-3)
            .with("minHeight", 4.0)
            .with("maxHeight", 20.0),
    );
    assert_boundaries_vanish(&unz);

    let poly = surface(
        SurfaceType::Poly,
        ParameterMap::new()
            .with("A1", 300.0)
            .with("A2", -0.6)
            .with("maxHeight", 20.0),
    );
    assert_boundaries_vanish(&poly);
}

#[test]
fn boundary_failure_falls_back_to_zero_sag() {
    // maxHeight beyond the sphere: the rim sag cannot be computed
    let sphere = surface(
        SurfaceType::Sphere,
        ParameterMap::new().with("R", 10.0).with("maxHeight", 12.0),
    );
    let fit = BestFitSphere::fit(&sphere, &ImplicitSolverOptions::default());
    assert_eq!(fit.radius(), 0.0);
}
