mod common;

use pme::{EvaluationConfig, Pme};

use crate::common::{net_gradient, water_dimer};

#[test]
fn test_water_dimer_energy() {
    let (sites, coords) = water_dimer();
    let mut engine = Pme::aperiodic(sites, &coords, &common::keywords()).unwrap();

    let report = engine
        .energy(&coords, &EvaluationConfig::default())
        .unwrap();

    // A hydrogen-bonded AMOEBA dimer binds through its permanent multipoles and pays
    // a positive polarization cost of roughly a kcal/mol; the total sits near
    // -6.5 kcal/mol at the 2.98 Å separation.
    assert!(report.permanent < -4.0, "permanent {}", report.permanent);
    assert!(report.polarization > 0.0, "polarization {}", report.polarization);
    assert!(
        report.total > -9.0 && report.total < -4.0,
        "total {}",
        report.total
    );
    assert!((report.total - (report.permanent + report.polarization)).abs() < 1e-12);
    assert!(report.scf.status.is_converged());
    assert!(report.scf.iterations <= 20);
    assert!(report.interactions > 0);

    // Newton's third law across the dimer.
    let net = net_gradient(&report.gradient);
    for j in 0..3 {
        assert!(net[j].abs() < 1e-7, "net gradient {:?}", net);
    }

    // The molecules attract along the hydrogen-bond axis: the donor's net gradient
    // points down the axis, the acceptor's up, and they cancel exactly.
    let donor: f64 = (0..3).map(|i| report.gradient[[i, 0]]).sum();
    let acceptor: f64 = (3..6).map(|i| report.gradient[[i, 0]]).sum();
    assert!(donor < 0.0, "donor net gradient {donor}");
    assert!((donor + acceptor).abs() < 1e-7);
}

#[test]
fn test_scf_converges_quickly() {
    let (sites, coords) = water_dimer();
    let mut engine = Pme::aperiodic(sites, &coords, &common::keywords()).unwrap();

    let report = engine
        .energy(&coords, &EvaluationConfig::energy_only())
        .unwrap();

    assert!(report.scf.status.is_converged());
    assert!(report.scf.iterations <= 20, "took {}", report.scf.iterations);
    assert!(report.scf.eps < 1e-6);
}

#[test]
fn test_energy_only_matches_gradient_run() {
    let (sites, coords) = water_dimer();
    let mut engine = Pme::aperiodic(sites, &coords, &common::keywords()).unwrap();

    let with_grad = engine
        .energy(&coords, &EvaluationConfig::default())
        .unwrap();
    let energy_only = engine
        .energy(&coords, &EvaluationConfig::energy_only())
        .unwrap();

    assert!((with_grad.total - energy_only.total).abs() < 1e-10);
}

#[test]
fn test_concurrent_sections_match_sequential() {
    let (sites, coords) = water_dimer();
    let mut engine = Pme::aperiodic(sites, &coords, &common::keywords()).unwrap();

    let sequential = engine
        .energy(&coords, &EvaluationConfig::default())
        .unwrap();
    let concurrent = engine
        .energy(
            &coords,
            &EvaluationConfig {
                concurrent_sections: true,
                ..EvaluationConfig::default()
            },
        )
        .unwrap();

    assert!((sequential.total - concurrent.total).abs() < 1e-10);
}

#[test]
fn test_interaction_count() {
    let (sites, coords) = water_dimer();
    let mut engine = Pme::aperiodic(sites, &coords, &common::keywords()).unwrap();

    let report = engine
        .energy(&coords, &EvaluationConfig::energy_only())
        .unwrap();

    // Six sites, all within the cutoff: 15 unique pairs.
    assert_eq!(report.interactions, 15);
}
