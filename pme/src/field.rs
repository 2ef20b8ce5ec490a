use rayon::prelude::*;

use crystal::{SpaceGroup, UnitCell};
use multipole::tensor::*;
use multipole::{Multipole, MultipoleSite};

use crate::NeighborLists;
use crate::ewald::{EwaldParameters, TholeScales};
use crate::options::MaskRules;

/// A multipole loaded for pair arithmetic: charge, dipole and the quadrupole as a full
/// 3×3 matrix with the conventional one-third folded in.
#[derive(Clone, Copy)]
pub(crate) struct LoadedMultipole {
    pub c: f64,
    pub d: [f64; 3],
    pub q: [[f64; 3]; 3],
}

impl LoadedMultipole {
    pub fn load(m: &Multipole) -> Self {
        const THIRD: f64 = 1.0 / 3.0;
        Self {
            c: m[T000],
            d: [m[T100], m[T010], m[T001]],
            q: [
                [m[T200] * THIRD, m[T110] * THIRD, m[T101] * THIRD],
                [m[T110] * THIRD, m[T020] * THIRD, m[T011] * THIRD],
                [m[T101] * THIRD, m[T011] * THIRD, m[T002] * THIRD],
            ],
        }
    }

    /// `Q·v`.
    pub fn qv(&self, v: &[f64; 3]) -> [f64; 3] {
        [
            self.q[0][0] * v[0] + self.q[0][1] * v[1] + self.q[0][2] * v[2],
            self.q[1][0] * v[0] + self.q[1][1] * v[1] + self.q[1][2] * v[2],
            self.q[2][0] * v[0] + self.q[2][1] * v[1] + self.q[2][2] * v[2],
        ]
    }
}

/// Inputs shared by the real-space regions, borrowed read-only for the duration of one
/// parallel region.
pub(crate) struct RealSpaceInputs<'a> {
    pub sites: &'a [MultipoleSite],
    pub cell: &'a UnitCell,
    pub space_group: &'a SpaceGroup,
    pub lists: &'a NeighborLists,
    pub coords: &'a [Vec<[f64; 3]>],
    pub multipoles: &'a [Vec<Multipole>],
    pub ewald: EwaldParameters,
    pub masks: MaskRules,
    /// Number of symmetry images in play (1 when symmetry is off).
    pub num_images: usize,
}

/// Per-thread accumulator of the permanent-field region.
struct FieldAccumulator {
    field: Vec<[f64; 3]>,
    field_cr: Vec<[f64; 3]>,
    mask_d: Vec<f64>,
    mask_p: Vec<f64>,
}

impl FieldAccumulator {
    fn new(n: usize) -> Self {
        Self {
            field: vec![[0.0; 3]; n],
            field_cr: vec![[0.0; 3]; n],
            mask_d: vec![1.0; n],
            mask_p: vec![1.0; n],
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

/// Computes the permanent electric field and its polarization-masked companion at
/// every asymmetric-unit site.
///
/// Covalent masks apply only while processing the asymmetric-unit image; they are set
/// before an atom's neighbor sweep and restored after it, so the per-thread mask
/// arrays stay all-ones between atoms.
pub(crate) fn permanent_field(input: &RealSpaceInputs) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
    let n = input.sites.len();
    let acc = (0..n)
        .into_par_iter()
        .fold(
            || FieldAccumulator::new(n),
            |mut acc, i| {
                accumulate_site(input, i, &mut acc);
                acc
            },
        )
        .reduce(|| FieldAccumulator::new(n), FieldAccumulator::merge);
    (acc.field, acc.field_cr)
}

fn accumulate_site(input: &RealSpaceInputs, i: usize, acc: &mut FieldAccumulator) {
    let site = &input.sites[i];

    // d-mask over the polarization group, p-mask over the covalent shells.
    for &k in &site.ip11 {
        acc.mask_d[k] = input.masks.d11;
    }
    for &k in &site.bonded12 {
        acc.mask_p[k] = input.masks.p12;
    }
    for &k in &site.bonded13 {
        acc.mask_p[k] = input.masks.p13;
    }
    for &k in &site.bonded14 {
        if site.ip11.contains(&k) {
            acc.mask_p[k] = config::INTRA14_MASK;
        }
    }

    let mi = LoadedMultipole::load(&input.multipoles[0][i]);
    let ri = input.coords[0][i];

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

            let mk = LoadedMultipole::load(&input.multipoles[s][k]);
            let bn: [f64; 4] = input.ewald.bn(r, r2);

            let ks = &input.sites[k];
            let thole = TholeScales::evaluate(
                r,
                r2,
                &dx,
                site.pdamp * ks.pdamp,
                site.thole.min(ks.thole),
            );

            let (dmask, pmask, self_scale) = if s == 0 {
                (acc.mask_d[k], acc.mask_p[k], 1.0)
            } else if i == k {
                (1.0, 1.0, 0.5)
            } else {
                (1.0, 1.0, 1.0)
            };

            let rr3 = 1.0 / (r * r2);
            let rr5 = 3.0 * rr3 / r2;
            let rr7 = 5.0 * rr5 / r2;
            let drr3 = (1.0 - dmask * thole.scale3) * rr3;
            let drr5 = (1.0 - dmask * thole.scale5) * rr5;
            let drr7 = (1.0 - dmask * thole.scale7) * rr7;
            let prr3 = (1.0 - pmask * thole.scale3) * rr3;
            let prr5 = (1.0 - pmask * thole.scale5) * rr5;
            let prr7 = (1.0 - pmask * thole.scale7) * rr7;

            let dir = dot(&mi.d, &dx);
            let dkr = dot(&mk.d, &dx);
            let qiv = mi.qv(&dx);
            let qkv = mk.qv(&dx);
            let qir = dot(&qiv, &dx);
            let qkr = dot(&qkv, &dx);

            let mut fid = [0.0; 3];
            let mut fkd = [0.0; 3];
            let mut fip = [0.0; 3];
            let mut fkp = [0.0; 3];
            for j in 0..3 {
                // Field at i from k's multipole, and at k from i's, with the Ewald
                // kernel minus the masked/damped Coulomb part.
                let fim = -dx[j] * (bn[1] * mk.c - bn[2] * dkr + bn[3] * qkr)
                    - bn[1] * mk.d[j]
                    + 2.0 * bn[2] * qkv[j];
                let fkm = dx[j] * (bn[1] * mi.c + bn[2] * dir + bn[3] * qir)
                    - bn[1] * mi.d[j]
                    - 2.0 * bn[2] * qiv[j];

                let fidc = -dx[j] * (drr3 * mk.c - drr5 * dkr + drr7 * qkr)
                    - drr3 * mk.d[j]
                    + 2.0 * drr5 * qkv[j];
                let fkdc = dx[j] * (drr3 * mi.c + drr5 * dir + drr7 * qir)
                    - drr3 * mi.d[j]
                    - 2.0 * drr5 * qiv[j];
                let fipc = -dx[j] * (prr3 * mk.c - prr5 * dkr + prr7 * qkr)
                    - prr3 * mk.d[j]
                    + 2.0 * prr5 * qkv[j];
                let fkpc = dx[j] * (prr3 * mi.c + prr5 * dir + prr7 * qir)
                    - prr3 * mi.d[j]
                    - 2.0 * prr5 * qiv[j];

                fid[j] = self_scale * (fim - fidc);
                fkd[j] = self_scale * (fkm - fkdc);
                fip[j] = self_scale * (fim - fipc);
                fkp[j] = self_scale * (fkm - fkpc);
            }

            for j in 0..3 {
                acc.field[i][j] += fid[j];
                acc.field_cr[i][j] += fip[j];
            }
            // Symmetry-mate contributions act on the asymmetric-unit atom through the
            // inverse rotation.
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

    // Restore the masks before yielding the atom.
    for &k in &site.ip11 {
        acc.mask_d[k] = 1.0;
    }
    for &k in &site.bonded12 {
        acc.mask_p[k] = 1.0;
    }
    for &k in &site.bonded13 {
        acc.mask_p[k] = 1.0;
    }
    for &k in &site.bonded14 {
        acc.mask_p[k] = 1.0;
    }
}

pub(crate) fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[cfg(test)]
mod test {
    use super::*;
    use crystal::SpaceGroup;
    use multipole::FrameStyle;

    struct Fixture {
        sites: Vec<MultipoleSite>,
        cell: UnitCell,
        group: SpaceGroup,
        lists: NeighborLists,
        coords: Vec<Vec<[f64; 3]>>,
        multipoles: Vec<Vec<Multipole>>,
    }

    impl Fixture {
        fn two_charges(c0: f64, c1: f64, separation: f64) -> Self {
            let mut m0 = [0.0; 10];
            m0[T000] = c0;
            let mut m1 = [0.0; 10];
            m1[T000] = c1;

            let cell = UnitCell::aperiodic();
            let group = SpaceGroup::p1();
            let coords = vec![vec![[0.0, 0.0, 0.0], [separation, 0.0, 0.0]]];
            let lists = NeighborLists::build(&cell, &group, &coords[0], 50.0);

            Self {
                sites: vec![
                    MultipoleSite::new(0, m0, FrameStyle::None, &[]),
                    MultipoleSite::new(1, m1, FrameStyle::None, &[]),
                ],
                cell,
                group,
                lists,
                coords,
                multipoles: vec![vec![m0, m1]],
            }
        }

        fn input(&self) -> RealSpaceInputs<'_> {
            RealSpaceInputs {
                sites: &self.sites,
                cell: &self.cell,
                space_group: &self.group,
                lists: &self.lists,
                coords: &self.coords,
                multipoles: &self.multipoles,
                ewald: EwaldParameters::new(0.0, 50.0),
                masks: MaskRules::from(&config::Keywords::default()),
                num_images: 1,
            }
        }
    }

    #[test]
    fn test_point_charge_field() {
        // Field at the origin from a unit charge at +3x is -1/9 x̂; at the charge from
        // the origin's charge it is +1/9 x̂.
        let fixture = Fixture::two_charges(1.0, 1.0, 3.0);
        let (field, field_cr) = permanent_field(&fixture.input());

        assert!((field[0][0] + 1.0 / 9.0).abs() < 1e-12);
        assert!((field[1][0] - 1.0 / 9.0).abs() < 1e-12);
        assert!(field[0][1].abs() < 1e-15 && field[0][2].abs() < 1e-15);
        // No covalent topology: both masking conventions agree.
        assert_eq!(field, field_cr);
    }

    #[test]
    fn test_masked_partner_feels_no_field() {
        let mut fixture = Fixture::two_charges(1.0, 1.0, 3.0);
        fixture.sites[0].bonded12 = vec![1];
        fixture.sites[1].bonded12 = vec![0];

        let (field, field_cr) = permanent_field(&fixture.input());
        // p12 = 0 wipes the polarization-masked field; the d-field is untouched
        // because the partners share no polarization group.
        assert!(field_cr[0][0].abs() < 1e-15);
        assert!(field[0][0].abs() > 1e-3);
    }
}
