use std::process::exit;

use multipole::{FrameStyle, MultipoleSite};
use pme::{EvaluationConfig, Pme};

const BOHR: f64 = 0.52917720859;

fn water_sites(base: usize) -> Vec<MultipoleSite> {
    let b2 = BOHR * BOHR;

    let mut o_pole = [0.0; 10];
    o_pole[0] = -0.51966;
    o_pole[3] = 0.14279 * BOHR;
    o_pole[4] = 0.37928 * b2;
    o_pole[5] = -0.41809 * b2;
    o_pole[6] = 0.03881 * b2;

    let mut h_pole = [0.0; 10];
    h_pole[0] = 0.25983;
    h_pole[1] = -0.03859 * BOHR;
    h_pole[3] = -0.05818 * BOHR;
    h_pole[4] = -0.03673 * b2;
    h_pole[5] = -0.10739 * b2;
    h_pole[6] = 0.14412 * b2;
    h_pole[8] = -0.00203 * b2;

    let (o, h1, h2) = (base, base + 1, base + 2);
    let group = vec![o, h1, h2];

    let mut oxygen =
        MultipoleSite::new(o, o_pole, FrameStyle::Bisector, &[h1, h2]).polarize(0.837, 0.39);
    oxygen.bonded12 = vec![h1, h2];
    oxygen.ip11 = group.clone();
    let mut hyd1 =
        MultipoleSite::new(h1, h_pole, FrameStyle::ZThenX, &[o, h2]).polarize(0.496, 0.39);
    hyd1.bonded12 = vec![o];
    hyd1.bonded13 = vec![h2];
    hyd1.ip11 = group.clone();
    let mut hyd2 =
        MultipoleSite::new(h2, h_pole, FrameStyle::ZThenX, &[o, h1]).polarize(0.496, 0.39);
    hyd2.bonded12 = vec![o];
    hyd2.bonded13 = vec![h1];
    hyd2.ip11 = group;

    vec![oxygen, hyd1, hyd2]
}

fn main() {
    let mut sites = water_sites(0);
    sites.extend(water_sites(3));

    let half = (104.52f64 / 2.0).to_radians();
    let l = 0.9572;
    let coords = vec![
        // Donor, one O-H leg down the O–O axis.
        [0.0, 0.0, 0.0],
        [l, 0.0, 0.0],
        [l * (2.0 * half).cos(), -l * (2.0 * half).sin(), 0.0],
        // Acceptor, bisector continuing along x.
        [2.98, 0.0, 0.0],
        [2.98 + l * half.cos(), 0.0, l * half.sin()],
        [2.98 + l * half.cos(), 0.0, -l * half.sin()],
    ];

    let keywords = config::get_keywords();
    let mut engine = match Pme::aperiodic(sites, &coords, &keywords) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("{}", err);
            exit(2);
        }
    };

    match engine.energy(&coords, &EvaluationConfig::default()) {
        Ok(report) => {
            dbg!(&report);
        }
        Err(err) => {
            eprintln!("{}", err);
            exit(2);
        }
    };
}
