mod common;

use pme::{EvaluationConfig, Pme};

use crate::common::water_dimer;

/// Dimer with the second water soft, permanent electrostatics only (the polarization
/// response carries its own window and is tested separately).
fn soft_dimer() -> Pme {
    let (mut sites, coords) = water_dimer();
    for site in sites[3..].iter_mut() {
        site.soft = true;
    }
    let mut keywords = common::keywords();
    keywords.polarization = "none".into();
    Pme::aperiodic(sites, &coords, &keywords).unwrap()
}

fn at_lambda(engine: &mut Pme, coords: &[[f64; 3]], lambda: f64) -> pme::EnergyReport {
    let config = EvaluationConfig {
        lambda: Some(lambda),
        ..EvaluationConfig::default()
    };
    engine.energy(coords, &config).unwrap()
}

#[test]
fn test_lambda_endpoints() {
    let (_, coords) = water_dimer();
    let mut engine = soft_dimer();

    // λ = 1 is full electrostatics.
    let full = engine
        .energy(&coords, &EvaluationConfig::default())
        .unwrap();
    let end = at_lambda(&mut engine, &coords, 1.0);
    assert!((end.total - full.total).abs() < 1e-10);

    // λ = 0 removes every pair with a soft end from the real-space sum; the hard
    // water's internal pairs are fully masked, so nothing remains.
    let start = at_lambda(&mut engine, &coords, 0.0);
    assert!(start.total.abs() < 1e-12, "U(0) = {}", start.total);
}

#[test]
fn test_lambda_derivative_matches_finite_difference() {
    let (_, coords) = water_dimer();
    let mut engine = soft_dimer();

    let h = 1e-4;
    for i in 1..10 {
        let lambda = i as f64 / 10.0;
        let report = at_lambda(&mut engine, &coords, lambda);
        let plus = at_lambda(&mut engine, &coords, lambda + h);
        let minus = at_lambda(&mut engine, &coords, lambda - h);

        let numeric = (plus.total - minus.total) / (2.0 * h);
        assert!(
            (numeric - report.dudl).abs() < 1e-3,
            "λ = {lambda}: numeric {numeric} vs analytic {}",
            report.dudl
        );

        let numeric2 = (plus.dudl - minus.dudl) / (2.0 * h);
        assert!(
            (numeric2 - report.d2udl2).abs() < 1e-4,
            "λ = {lambda}: numeric d² {numeric2} vs analytic {}",
            report.d2udl2
        );
    }
}

#[test]
fn test_lambda_curve_is_monotone_toward_coupling() {
    // The soft water's interaction switches on smoothly; no wild oscillations.
    let (_, coords) = water_dimer();
    let mut engine = soft_dimer();

    let start = at_lambda(&mut engine, &coords, 0.0).total;
    assert!(start.abs() < 1e-12);
    let mut curve = Vec::new();
    for i in 1..=10 {
        let u = at_lambda(&mut engine, &coords, i as f64 / 10.0).total;
        assert!(u.is_finite());
        curve.push(u);
    }
    // The dimer binds: the fully coupled end lies well below the decoupled one.
    assert!(curve[9] < start - 1.0);
}

#[test]
fn test_hard_system_ignores_lambda() {
    let (sites, coords) = water_dimer();
    let mut keywords = common::keywords();
    keywords.polarization = "none".into();
    let mut engine = Pme::aperiodic(sites, &coords, &keywords).unwrap();

    let full = engine
        .energy(&coords, &EvaluationConfig::default())
        .unwrap();
    let half = engine
        .energy(
            &coords,
            &EvaluationConfig {
                lambda: Some(0.5),
                ..EvaluationConfig::default()
            },
        )
        .unwrap();

    assert!((full.total - half.total).abs() < 1e-12);
    assert_eq!(half.dudl, 0.0);
}
