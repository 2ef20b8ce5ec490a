//! AMOEBA-style water fixtures shared by the scenario tests.

use config::Keywords;
use multipole::{FrameStyle, MultipoleSite};

/// Bohr radius in Å; parameter-file dipoles and quadrupoles arrive in atomic units.
pub const BOHR: f64 = 0.52917720859;

pub const OH_LENGTH: f64 = 0.9572;
pub const HOH_ANGLE_DEG: f64 = 104.52;

/// The three sites of one water, at indices `base..base+3` (O, H, H).
pub fn water_sites(base: usize) -> Vec<MultipoleSite> {
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
    let group: Vec<usize> = vec![o, h1, h2];

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

/// Water coordinates: oxygen at `origin`, the HOH bisector along `bisector` (unit),
/// hydrogens in the plane spanned by `bisector` and `in_plane` (unit, orthogonal).
pub fn water_coords(
    origin: [f64; 3],
    bisector: [f64; 3],
    in_plane: [f64; 3],
) -> Vec<[f64; 3]> {
    let half = (HOH_ANGLE_DEG / 2.0).to_radians();
    let (c, s) = (half.cos(), half.sin());
    let h = |sign: f64| {
        [
            origin[0] + OH_LENGTH * (c * bisector[0] + sign * s * in_plane[0]),
            origin[1] + OH_LENGTH * (c * bisector[1] + sign * s * in_plane[1]),
            origin[2] + OH_LENGTH * (c * bisector[2] + sign * s * in_plane[2]),
        ]
    };
    vec![origin, h(1.0), h(-1.0)]
}

/// A hydrogen-bonded water dimer with O–O = 2.98 Å along x: the donor points one O–H
/// roughly along +x at the acceptor, whose bisector continues along +x.
pub fn water_dimer() -> (Vec<MultipoleSite>, Vec<[f64; 3]>) {
    let mut sites = water_sites(0);
    sites.extend(water_sites(3));

    // Donor: rotate the bisector so one O-H leg lies on the O–O axis.
    let half = (HOH_ANGLE_DEG / 2.0).to_radians();
    let donor = water_coords(
        [0.0, 0.0, 0.0],
        [half.cos(), -half.sin(), 0.0],
        [half.sin(), half.cos(), 0.0],
    );
    let acceptor = water_coords([2.98, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]);

    let mut coords = donor;
    coords.extend(acceptor);
    (sites, coords)
}

pub fn keywords() -> Keywords {
    Keywords::default()
}

/// Off-diagonal-free helper: the largest |component| of a gradient row sum.
pub fn net_gradient(gradient: &ndarray::Array2<f64>) -> [f64; 3] {
    let mut net = [0.0; 3];
    for row in gradient.rows() {
        for j in 0..3 {
            net[j] += row[j];
        }
    }
    net
}
