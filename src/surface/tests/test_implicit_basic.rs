use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::surface::{
    OPAL_UNU_POWERS, OPAL_UNZ_POWERS, OpalUnUModel, OpalUnZModel, POLY_INDICES, PolyModel,
    PowerSeries, SolverOptions, SphereModel, opal_unu_residual, opal_unu_sag, opal_unu_slope,
    opal_unz_residual, opal_unz_sag, opal_unz_slope, poly_residual, poly_sag, poly_slope,
    sphere_sag, sphere_slope,
};

const TOLERANCE: f64 = 1e-12;
const RESIDUAL_TOLERANCE: f64 = 1e-10;

fn unu(radius: f64, e2: f64, normalization: f64, coefficients: Vec<f64>) -> OpalUnUModel {
    OpalUnUModel {
        radius,
        e2,
        normalization,
        series: PowerSeries::new(OPAL_UNU_POWERS, coefficients),
    }
}

fn unz(radius: f64, e2: f64, normalization: f64, coefficients: Vec<f64>) -> OpalUnZModel {
    OpalUnZModel {
        radius,
        e2,
        normalization,
        series: PowerSeries::new(OPAL_UNZ_POWERS, coefficients),
    }
}

fn poly(coefficients: Vec<f64>) -> PolyModel {
    PolyModel {
        series: PowerSeries::new(POLY_INDICES, coefficients),
    }
}

#[test]
fn opal_unu_spherical_converges_to_sphere() {
    let model = unu(100.0, 1.0, 25.0, Vec::new());
    let sphere = SphereModel { radius: 100.0 };
    for i in 0..=25 {
        let r = f64::from(i);
        let solved = opal_unu_sag(&model, r, &SolverOptions::FIXED_POINT).unwrap();
        assert!(solved.converged, "OpalUnU did not converge at r = {r}");
        let expected = sphere_sag(&sphere, r).unwrap();
        assert!(
            (solved.z - expected).abs() < TOLERANCE,
            "OpalUnU sag at r = {r}: {} vs sphere {expected}",
            solved.z
        );
        let slope = opal_unu_slope(&model, r, solved.z).unwrap();
        let expected = sphere_slope(&sphere, r).unwrap();
        assert!((slope - expected).abs() < 1e-10, "OpalUnU slope at r = {r}");
    }
}

#[test]
fn opal_unz_spherical_reproduces_sphere_over_sweep() {
    let model = unz(100.0, 1.0, 30.0, Vec::new());
    let sphere = SphereModel { radius: 100.0 };
    for i in 0..=90 {
        let r = f64::from(i);
        let solved = opal_unz_sag(&model, r, &SolverOptions::NEWTON).unwrap();
        assert!(solved.converged, "OpalUnZ did not converge at r = {r}");
        let expected = sphere_sag(&sphere, r).unwrap();
        assert!(
            (solved.z - expected).abs() < 1e-10,
            "OpalUnZ sag at r = {r}: {} vs sphere {expected}",
            solved.z
        );
        let slope = opal_unz_slope(&model, r, solved.z).unwrap();
        let expected = sphere_slope(&sphere, r).unwrap();
        assert!((slope - expected).abs() < 1e-8, "OpalUnZ slope at r = {r}");
    }
}

#[test]
fn poly_with_sphere_coefficients_reproduces_sphere() {
    // r² = z·(2R − z)
    let radius = 100.0;
    let model = poly(vec![2.0 * radius, -1.0]);
    let sphere = SphereModel { radius };
    assert_eq!(model.surrogate_radius(), radius);
    for i in 0..=60 {
        let r = f64::from(i);
        let solved = poly_sag(&model, r, &SolverOptions::NEWTON).unwrap();
        assert!(solved.converged, "Poly did not converge at r = {r}");
        let expected = sphere_sag(&sphere, r).unwrap();
        assert!((solved.z - expected).abs() < 1e-10, "Poly sag at r = {r}");
        let slope = poly_slope(&model, r, solved.z).unwrap();
        let expected = sphere_slope(&sphere, r).unwrap();
        assert!((slope - expected).abs() < 1e-8, "Poly slope at r = {r}");
    }
}

#[test]
fn opal_unu_residual_vanishes_with_coefficients() {
    let model = unu(100.0, 0.9, 25.0, vec![1e-2, 0.0, -1e-3]);
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let r: f64 = rng.random_range(0.0..20.0);
        let solved = opal_unu_sag(&model, r, &SolverOptions::FIXED_POINT).unwrap();
        assert!(solved.converged, "OpalUnU did not converge at r = {r}");
        let residual = opal_unu_residual(&model, r, solved.z).unwrap();
        assert!(residual.abs() < RESIDUAL_TOLERANCE, "OpalUnU residual {residual} at r = {r}");
    }
}

#[test]
fn opal_unz_residual_vanishes_with_coefficients() {
    let model = unz(200.0, 0.8, 20.0, vec![1e-3, -2e-4]);
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let r: f64 = rng.random_range(0.0..30.0);
        let solved = opal_unz_sag(&model, r, &SolverOptions::NEWTON).unwrap();
        assert!(solved.converged, "OpalUnZ did not converge at r = {r}");
        let residual = opal_unz_residual(&model, r, solved.z).unwrap();
        assert!(residual.abs() < RESIDUAL_TOLERANCE, "OpalUnZ residual {residual} at r = {r}");
    }
}

#[test]
fn poly_residual_vanishes_with_higher_terms() {
    let model = poly(vec![150.0, -0.8, 1e-3]);
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..200 {
        let r: f64 = rng.random_range(0.0..40.0);
        let solved = poly_sag(&model, r, &SolverOptions::NEWTON).unwrap();
        assert!(solved.converged, "Poly did not converge at r = {r}");
        let residual = poly_residual(&model, r, solved.z);
        assert!(residual.abs() < 1e-8, "Poly residual {residual} at r = {r}");
    }
}

#[test]
fn solvers_are_deterministic() {
    let u = unu(120.0, 0.7, 20.0, vec![5e-3, 1e-4]);
    let z = unz(120.0, 0.7, 20.0, vec![2e-3]);
    let p = poly(vec![240.0, -0.7]);
    for r in [0.0, 3.3, 12.5, 19.9] {
        let a = opal_unu_sag(&u, r, &SolverOptions::FIXED_POINT).unwrap();
        let b = opal_unu_sag(&u, r, &SolverOptions::FIXED_POINT).unwrap();
        assert_eq!(a, b, "OpalUnU differs between runs at r = {r}");
        let a = opal_unz_sag(&z, r, &SolverOptions::NEWTON).unwrap();
        let b = opal_unz_sag(&z, r, &SolverOptions::NEWTON).unwrap();
        assert_eq!(a, b, "OpalUnZ differs between runs at r = {r}");
        let a = poly_sag(&p, r, &SolverOptions::NEWTON).unwrap();
        let b = poly_sag(&p, r, &SolverOptions::NEWTON).unwrap();
        assert_eq!(a, b, "Poly differs between runs at r = {r}");
    }
}

#[test]
fn tight_budget_reports_non_convergence() {
    let model = unu(100.0, 1.0, 25.0, Vec::new());
    let options = SolverOptions {
        tolerance: 1e-15,
        max_iterations: 2,
    };
    let solved = opal_unu_sag(&model, 20.0, &options).unwrap();
    assert!(!solved.converged);
    assert_eq!(solved.iterations, 2);
    assert!(solved.z.is_finite() && solved.z > 0.0);
}
