use rayon::prelude::*;

use crate::ewald::TholeScales;
use crate::field::{RealSpaceInputs, dot};

/// Per-thread accumulator of the induced-field region.
struct MutualAccumulator {
    field: Vec<[f64; 3]>,
    field_cr: Vec<[f64; 3]>,
}

impl MutualAccumulator {
    fn new(n: usize) -> Self {
        Self {
            field: vec![[0.0; 3]; n],
            field_cr: vec![[0.0; 3]; n],
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.field.iter_mut().zip(other.field) {
            for j in 0..3 {
                a[j] += b[j];
            }
        }
        for (a, b) in self.field_cr.iter_mut().zip(other.field_cr) {
            for j in 0..3 {
                a[j] += b[j];
            }
        }
        self
    }
}

/// Computes the real-space field the current induced dipoles produce at every
/// asymmetric-unit site, for both masking conventions.
///
/// Only dipole sources enter, damped by the Thole `scale3`/`scale5` pair; covalent
/// masks do not apply to the mutual coupling.
pub(crate) fn induced_field(
    input: &RealSpaceInputs,
    induced: &[Vec<[f64; 3]>],
    induced_cr: &[Vec<[f64; 3]>],
) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
    let n = input.sites.len();
    let acc = (0..n)
        .into_par_iter()
        .fold(
            || MutualAccumulator::new(n),
            |mut acc, i| {
                accumulate_site(input, induced, induced_cr, i, &mut acc);
                acc
            },
        )
        .reduce(|| MutualAccumulator::new(n), MutualAccumulator::merge);
    (acc.field, acc.field_cr)
}

fn accumulate_site(
    input: &RealSpaceInputs,
    induced: &[Vec<[f64; 3]>],
    induced_cr: &[Vec<[f64; 3]>],
    i: usize,
    acc: &mut MutualAccumulator,
) {
    let site = &input.sites[i];
    let ri = input.coords[0][i];
    let ui = induced[0][i];
    let uip = induced_cr[0][i];

    for s in 0..input.num_images {
        let op = input.space_group.op(s);
        for &k in input.lists.neighbors(s, i) {
            let rk = input.coords[s][k];
            let mut dx = [rk[0] - ri[0], rk[1] - ri[1], rk[2] - ri[2]];
            let r2 = input.cell.image(&mut dx);
            if r2 > input.ewald.off2 {
                continue;
            }
            let r = r2.sqrt();

            let ks = &input.sites[k];
            let bn: [f64; 3] = input.ewald.bn(r, r2);
            let thole = TholeScales::evaluate(
                r,
                r2,
                &dx,
                site.pdamp * ks.pdamp,
                site.thole.min(ks.thole),
            );

            let self_scale = if s > 0 && i == k { 0.5 } else { 1.0 };

            let rr3 = (1.0 - thole.scale3) / (r * r2);
            let rr5 = 3.0 * (1.0 - thole.scale5) / (r * r2 * r2);

            let uk = induced[s][k];
            let ukp = induced_cr[s][k];

            let uir = dot(&ui, &dx);
            let uipr = dot(&uip, &dx);
            let ukr = dot(&uk, &dx);
            let ukpr = dot(&ukp, &dx);

            let mut fid = [0.0; 3];
            let mut fkd = [0.0; 3];
            let mut fip = [0.0; 3];
            let mut fkp = [0.0; 3];
            for j in 0..3 {
                // Ewald dipole field minus the Thole-damped correction.
                fid[j] = self_scale
                    * (-bn[1] * uk[j] + bn[2] * ukr * dx[j] + rr3 * uk[j] - rr5 * ukr * dx[j]);
                fkd[j] = self_scale
                    * (-bn[1] * ui[j] + bn[2] * uir * dx[j] + rr3 * ui[j] - rr5 * uir * dx[j]);
                fip[j] = self_scale
                    * (-bn[1] * ukp[j] + bn[2] * ukpr * dx[j] + rr3 * ukp[j]
                        - rr5 * ukpr * dx[j]);
                fkp[j] = self_scale
                    * (-bn[1] * uip[j] + bn[2] * uipr * dx[j] + rr3 * uip[j]
                        - rr5 * uipr * dx[j]);
            }

            for j in 0..3 {
                acc.field[i][j] += fid[j];
                acc.field_cr[i][j] += fip[j];
            }
            let (fkd, fkp) = if s == 0 {
                (fkd, fkp)
            } else {
                (op.rotate_inverse(&fkd), op.rotate_inverse(&fkp))
            };
            for j in 0..3 {
                acc.field[k][j] += fkd[j];
                acc.field_cr[k][j] += fkp[j];
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::NeighborLists;
    use crate::ewald::EwaldParameters;
    use crate::options::MaskRules;
    use crystal::{SpaceGroup, UnitCell};
    use multipole::{FrameStyle, MultipoleSite};

    #[test]
    fn test_bare_dipole_field() {
        let cell = UnitCell::aperiodic();
        let group = SpaceGroup::p1();
        let coords = vec![vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]];
        let lists = NeighborLists::build(&cell, &group, &coords[0], 50.0);
        let sites = vec![
            MultipoleSite::new(0, [0.0; 10], FrameStyle::None, &[]),
            MultipoleSite::new(1, [0.0; 10], FrameStyle::None, &[]),
        ];
        let multipoles = vec![vec![[0.0; 10]; 2]];
        let input = RealSpaceInputs {
            sites: &sites,
            cell: &cell,
            space_group: &group,
            lists: &lists,
            coords: &coords,
            multipoles: &multipoles,
            ewald: EwaldParameters::new(0.0, 50.0),
            masks: MaskRules::from(&config::Keywords::default()),
            num_images: 1,
        };

        // A dipole along x at atom 1 produces 2μ/r³ along x at atom 0.
        let induced = vec![vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]];
        let zero = vec![vec![[0.0; 3]; 2]];
        let (field, _) = induced_field(&input, &induced, &zero);

        let expected = 2.0 * 0.5 / 8.0;
        assert!((field[0][0] - expected).abs() < 1e-12);
        // And the transverse field at atom 1 from nothing is zero.
        assert!(field[1][0].abs() < 1e-15);
    }
}
