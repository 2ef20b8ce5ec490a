use rayon::prelude::*;

use crate::ewald::TholeScales;
use crate::field::{LoadedMultipole, RealSpaceInputs, dot};
use crate::lambda::LambdaFactors;
use crate::options::PolarizationMode;

/// Inputs of the real-space energy region.
pub(crate) struct EnergyInputs<'a> {
    pub real: RealSpaceInputs<'a>,
    pub induced: &'a [Vec<[f64; 3]>],
    pub induced_cr: &'a [Vec<[f64; 3]>],
    pub polarization: PolarizationMode,
    pub gradient: bool,
    pub lambda: LambdaFactors,
}

/// Reduced output of the real-space energy region, in kcal/mol and kcal/mol/Å.
pub(crate) struct EnergyOutput {
    pub e_permanent: f64,
    pub e_polarization: f64,
    pub interactions: usize,
    pub grad: Vec<[f64; 3]>,
    pub torque: Vec<[f64; 3]>,
    pub dudl: f64,
    pub d2udl2: f64,
    pub dudl_grad: Vec<[f64; 3]>,
}

/// Per-thread accumulator: gradients and torques stay image-local and are rotated back
/// onto the asymmetric unit only at reduction time.
struct EnergyAccumulator {
    e_permanent: f64,
    e_polarization: f64,
    interactions: usize,
    dudl: f64,
    d2udl2: f64,
    grad: Vec<Vec<[f64; 3]>>,
    torque: Vec<Vec<[f64; 3]>>,
    dudl_grad: Vec<Vec<[f64; 3]>>,
    mask_m: Vec<f64>,
    mask_p: Vec<f64>,
    mask_d: Vec<f64>,
}

impl EnergyAccumulator {
    fn new(images: usize, n: usize) -> Self {
        Self {
            e_permanent: 0.0,
            e_polarization: 0.0,
            interactions: 0,
            dudl: 0.0,
            d2udl2: 0.0,
            grad: vec![vec![[0.0; 3]; n]; images],
            torque: vec![vec![[0.0; 3]; n]; images],
            dudl_grad: vec![vec![[0.0; 3]; n]; images],
            mask_m: vec![1.0; n],
            mask_p: vec![1.0; n],
            mask_d: vec![1.0; n],
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.e_permanent += other.e_permanent;
        self.e_polarization += other.e_polarization;
        self.interactions += other.interactions;
        self.dudl += other.dudl;
        self.d2udl2 += other.d2udl2;
        for (mine, theirs) in [
            (&mut self.grad, &other.grad),
            (&mut self.torque, &other.torque),
            (&mut self.dudl_grad, &other.dudl_grad),
        ] {
            for (a, b) in mine.iter_mut().zip(theirs) {
                for (x, y) in a.iter_mut().zip(b) {
                    for j in 0..3 {
                        x[j] += y[j];
                    }
                }
            }
        }
        self
    }
}

/// Evaluates the real-space permanent and polarization pair sums with gradients and
/// torques.
pub(crate) fn real_space_energy(input: &EnergyInputs) -> EnergyOutput {
    let n = input.real.sites.len();
    let images = input.real.num_images;

    let acc = (0..n)
        .into_par_iter()
        .fold(
            || EnergyAccumulator::new(images, n),
            |mut acc, i| {
                accumulate_site(input, i, &mut acc);
                acc
            },
        )
        .reduce(
            || EnergyAccumulator::new(images, n),
            EnergyAccumulator::merge,
        );

    // Rotate symmetry-mate contributions back onto the asymmetric unit.
    let mut grad = vec![[0.0; 3]; n];
    let mut torque = vec![[0.0; 3]; n];
    let mut dudl_grad = vec![[0.0; 3]; n];
    for s in 0..images {
        let op = input.real.space_group.op(s);
        for i in 0..n {
            let (g, t, dg) = if s == 0 {
                (acc.grad[0][i], acc.torque[0][i], acc.dudl_grad[0][i])
            } else {
                (
                    op.rotate_inverse(&acc.grad[s][i]),
                    op.rotate_inverse(&acc.torque[s][i]),
                    op.rotate_inverse(&acc.dudl_grad[s][i]),
                )
            };
            for j in 0..3 {
                grad[i][j] += g[j];
                torque[i][j] += t[j];
                dudl_grad[i][j] += dg[j];
            }
        }
    }

    EnergyOutput {
        e_permanent: acc.e_permanent,
        e_polarization: acc.e_polarization,
        interactions: acc.interactions,
        grad,
        torque,
        dudl: acc.dudl,
        d2udl2: acc.d2udl2,
        dudl_grad,
    }
}

fn accumulate_site(input: &EnergyInputs, i: usize, acc: &mut EnergyAccumulator) {
    let real = &input.real;
    let site = &real.sites[i];
    let f = config::ELECTRIC;

    for &k in &site.bonded12 {
        acc.mask_m[k] = real.masks.m12;
        acc.mask_p[k] = real.masks.p12;
    }
    for &k in &site.bonded13 {
        acc.mask_m[k] = real.masks.m13;
        acc.mask_p[k] = real.masks.p13;
    }
    for &k in &site.bonded14 {
        acc.mask_m[k] = real.masks.m14;
        if site.ip11.contains(&k) {
            acc.mask_p[k] = config::INTRA14_MASK;
        }
    }
    for &k in &site.bonded15 {
        acc.mask_m[k] = real.masks.m15;
    }
    for &k in &site.ip11 {
        acc.mask_d[k] = real.masks.d11;
    }

    let mi = LoadedMultipole::load(&real.multipoles[0][i]);
    let ri = real.coords[0][i];
    let ui = input.induced[0][i];
    let uip = input.induced_cr[0][i];

    for s in 0..real.num_images {
        for &k in real.lists.neighbors(s, i) {
            let rk = real.coords[s][k];
            let mut dx = [rk[0] - ri[0], rk[1] - ri[1], rk[2] - ri[2]];
            let r2 = real.cell.image(&mut dx);
            if r2 > real.ewald.off2 {
                continue;
            }
            acc.interactions += 1;

            let ks = &real.sites[k];
            let soft = site.soft || ks.soft;
            let lambda = &input.lambda;
            // Softcore buffering applies to pairs with a soft end only.
            let (r2b, perm_scale, pol_scale) = if soft {
                (
                    r2 + lambda.lalpha,
                    lambda.lpow_perm,
                    lambda.lpow_pol,
                )
            } else {
                (r2, 1.0, 1.0)
            };
            let rb = r2b.sqrt();
            let r = r2.sqrt();

            let mk = LoadedMultipole::load(&real.multipoles[s][k]);
            let bn: [f64; 7] = real.ewald.bn(rb, r2b);
            let thole = TholeScales::evaluate(
                r,
                r2,
                &dx,
                site.pdamp * ks.pdamp,
                site.thole.min(ks.thole),
            );

            let (mscale, pscale, dscale, self_scale) = if s == 0 {
                (acc.mask_m[k], acc.mask_p[k], acc.mask_d[k], 1.0)
            } else if i == k {
                (1.0, 1.0, 1.0, 0.5)
            } else {
                (1.0, 1.0, 1.0, 1.0)
            };

            let pair = pair_interaction(
                &mi,
                &mk,
                &dx,
                rb,
                r2b,
                &ui,
                &uip,
                &input.induced[s][k],
                &input.induced_cr[s][k],
                &bn,
                &thole,
                mscale,
                pscale,
                dscale,
                input.polarization,
                input.gradient,
            );

            let wp = f * self_scale * perm_scale;
            let wi = f * self_scale * pol_scale;
            acc.e_permanent += wp * pair.e_perm;
            acc.e_polarization += wi * pair.e_pol;

            if soft {
                // Smoothstep prefactor terms plus the softcore radial chain rule.
                let fss = f * self_scale;
                let radial = lambda.dlalpha * (perm_scale * pair.dperm_dr2
                    + pol_scale * pair.dpol_dr2);
                acc.dudl += fss
                    * (lambda.dlpow_perm * pair.e_perm
                        + lambda.dlpow_pol * pair.e_pol
                        + radial);
                acc.d2udl2 += fss
                    * (lambda.d2lpow_perm * pair.e_perm
                        + lambda.d2lpow_pol * pair.e_pol
                        + 2.0 * lambda.dlalpha
                            * (lambda.dlpow_perm * pair.dperm_dr2
                                + lambda.dlpow_pol * pair.dpol_dr2)
                        + lambda.d2lalpha
                            * (perm_scale * pair.dperm_dr2 + pol_scale * pair.dpol_dr2)
                        + lambda.dlalpha * lambda.dlalpha
                            * (perm_scale * pair.d2perm_dr2
                                + pol_scale * pair.d2pol_dr2));
            }

            if input.gradient {
                for j in 0..3 {
                    let g = wp * pair.frc_perm[j] + wi * pair.frc_pol[j];
                    acc.grad[0][i][j] += g;
                    acc.grad[s][k][j] -= g;
                    let t_i = wp * pair.trq_perm_i[j] + wi * pair.trq_pol_i[j];
                    let t_k = wp * pair.trq_perm_k[j] + wi * pair.trq_pol_k[j];
                    acc.torque[0][i][j] += t_i;
                    acc.torque[s][k][j] += t_k;
                    if soft {
                        let dg = f
                            * self_scale
                            * (lambda.dlpow_perm * pair.frc_perm[j]
                                + lambda.dlpow_pol * pair.frc_pol[j]);
                        acc.dudl_grad[0][i][j] += dg;
                        acc.dudl_grad[s][k][j] -= dg;
                    }
                }
            }
        }
    }

    for &k in &site.bonded12 {
        acc.mask_m[k] = 1.0;
        acc.mask_p[k] = 1.0;
    }
    for &k in &site.bonded13 {
        acc.mask_m[k] = 1.0;
        acc.mask_p[k] = 1.0;
    }
    for &k in &site.bonded14 {
        acc.mask_m[k] = 1.0;
        acc.mask_p[k] = 1.0;
    }
    for &k in &site.bonded15 {
        acc.mask_m[k] = 1.0;
    }
    for &k in &site.ip11 {
        acc.mask_d[k] = 1.0;
    }
}

/// One pair's energies, gradient and torques, in electrostatic units (the caller
/// applies `ELECTRIC`, masks' self-image weight and any lambda window).
struct PairResult {
    e_perm: f64,
    e_pol: f64,
    frc_perm: [f64; 3],
    frc_pol: [f64; 3],
    trq_perm_i: [f64; 3],
    trq_perm_k: [f64; 3],
    trq_pol_i: [f64; 3],
    trq_pol_k: [f64; 3],
    /// Radial derivatives `∂E/∂(r²)` and `∂²E/∂(r²)²` feeding the softcore lambda
    /// chain rule.
    dperm_dr2: f64,
    dpol_dr2: f64,
    d2perm_dr2: f64,
    d2pol_dr2: f64,
}

/// The high-order scalar-product pair kernel.
///
/// Scalar products `sc`, `gl` combine charge, dipole and quadrupole through the damped
/// Ewald family `bn`; the rational-distance counterparts `rr` carry the masked and
/// Thole-damped part that the Ewald sum must give back. Index conventions follow the
/// classic formulation of the AMOEBA real-space sum.
#[allow(clippy::too_many_arguments)]
fn pair_interaction(
    mi: &LoadedMultipole,
    mk: &LoadedMultipole,
    dx: &[f64; 3],
    rb: f64,
    r2b: f64,
    ui: &[f64; 3],
    uip: &[f64; 3],
    uk: &[f64; 3],
    ukp: &[f64; 3],
    bn: &[f64; 7],
    thole: &TholeScales,
    mscale: f64,
    pscale: f64,
    dscale: f64,
    polarization: PolarizationMode,
    gradient: bool,
) -> PairResult {
    let rr1 = 1.0 / rb;
    let rr3 = rr1 / r2b;
    let rr5 = 3.0 * rr3 / r2b;
    let rr7 = 5.0 * rr5 / r2b;
    let rr9 = 7.0 * rr7 / r2b;
    let rr11 = 9.0 * rr9 / r2b;
    let rr13 = 11.0 * rr11 / r2b;

    let (ci, di, ck, dk) = (mi.c, mi.d, mk.c, mk.d);
    let qiv = mi.qv(dx);
    let qkv = mk.qv(dx);

    // Scalar products of the permanent multipoles.
    let sc2 = dot(&di, &dk);
    let sc3 = dot(&di, dx);
    let sc4 = dot(&dk, dx);
    let sc5 = dot(&qiv, dx);
    let sc6 = dot(&qkv, dx);
    let sc7 = dot(&qiv, &dk);
    let sc8 = dot(&qkv, &di);
    let sc9 = dot(&qiv, &qkv);
    let mut sc10 = 0.0;
    for a in 0..3 {
        for b in 0..3 {
            sc10 += mi.q[a][b] * mk.q[a][b];
        }
    }

    let gl0 = ci * ck;
    let gl1 = ck * sc3 - ci * sc4;
    let gl2 = ci * sc6 + ck * sc5 - sc3 * sc4;
    let gl3 = sc3 * sc6 - sc4 * sc5;
    let gl4 = sc5 * sc6;
    let gl5 = -4.0 * sc9;
    let gl6 = sc2;
    let gl7 = 2.0 * (sc7 - sc8);
    let gl8 = 2.0 * sc10;

    let e = bn[0] * gl0
        + bn[1] * (gl1 + gl6)
        + bn[2] * (gl2 + gl7 + gl8)
        + bn[3] * (gl3 + gl5)
        + bn[4] * gl4;
    let efix = rr1 * gl0
        + rr3 * (gl1 + gl6)
        + rr5 * (gl2 + gl7 + gl8)
        + rr7 * (gl3 + gl5)
        + rr9 * gl4;
    let e_perm = e - (1.0 - mscale) * efix;

    // Scalar products against the induced dipoles, for both masking conventions.
    let sci1 = dot(&di, uk) + dot(&dk, ui);
    let sci3 = dot(ui, dx);
    let sci4 = dot(uk, dx);
    let sci7 = dot(&qiv, uk);
    let sci8 = dot(&qkv, ui);
    let scip1 = dot(&di, ukp) + dot(&dk, uip);
    let scip2 = dot(ui, ukp) + dot(uip, uk);
    let scip3 = dot(uip, dx);
    let scip4 = dot(ukp, dx);
    let scip7 = dot(&qiv, ukp);
    let scip8 = dot(&qkv, uip);

    let gli1 = ck * sci3 - ci * sci4;
    let gli2 = -sc3 * sci4 - sci3 * sc4;
    let gli3 = sci3 * sc6 - sci4 * sc5;
    let gli6 = sci1;
    let gli7 = 2.0 * (sci7 - sci8);
    let glip1 = ck * scip3 - ci * scip4;
    let glip2 = -sc3 * scip4 - scip3 * sc4;
    let glip3 = scip3 * sc6 - scip4 * sc5;
    let glip6 = scip1;
    let glip7 = 2.0 * (scip7 - scip8);

    let psc3 = 1.0 - thole.scale3 * pscale;
    let psc5 = 1.0 - thole.scale5 * pscale;
    let psc7 = 1.0 - thole.scale7 * pscale;
    let dsc3 = 1.0 - thole.scale3 * dscale;
    let dsc5 = 1.0 - thole.scale5 * dscale;
    let dsc7 = 1.0 - thole.scale7 * dscale;
    let usc3 = 1.0 - thole.scale3;
    let usc5 = 1.0 - thole.scale5;

    let ei = 0.5 * (bn[1] * (gli1 + gli6) + bn[2] * (gli2 + gli7) + bn[3] * gli3);
    let eifix = 0.5
        * (rr3 * (gli1 + gli6) * psc3 + rr5 * (gli2 + gli7) * psc5 + rr7 * gli3 * psc7);
    let e_pol = ei - eifix;

    let mut out = PairResult {
        e_perm,
        e_pol,
        frc_perm: [0.0; 3],
        frc_pol: [0.0; 3],
        trq_perm_i: [0.0; 3],
        trq_perm_k: [0.0; 3],
        trq_pol_i: [0.0; 3],
        trq_pol_k: [0.0; 3],
        dperm_dr2: 0.0,
        dpol_dr2: 0.0,
        d2perm_dr2: 0.0,
        d2pol_dr2: 0.0,
    };

    // Radial derivatives for the lambda path come from the gf(1)-style scalars.
    let gf1 = bn[1] * gl0
        + bn[2] * (gl1 + gl6)
        + bn[3] * (gl2 + gl7 + gl8)
        + bn[4] * (gl3 + gl5)
        + bn[5] * gl4;
    let gfr1 = rr3 * gl0
        + rr5 * (gl1 + gl6)
        + rr7 * (gl2 + gl7 + gl8)
        + rr9 * (gl3 + gl5)
        + rr11 * gl4;
    // dU/d(r²): the gradient on i is +gf1·dx with dx = rk - ri, so the radial
    // derivative carries the opposite sign. The second derivative climbs the same
    // ladder once more, via d(bn_k)/d(r²) = -bn_{k+1}/2.
    out.dperm_dr2 = -0.5 * (gf1 - (1.0 - mscale) * gfr1);

    let gf1p = bn[2] * gl0
        + bn[3] * (gl1 + gl6)
        + bn[4] * (gl2 + gl7 + gl8)
        + bn[5] * (gl3 + gl5)
        + bn[6] * gl4;
    let gfr1p = rr5 * gl0
        + rr7 * (gl1 + gl6)
        + rr9 * (gl2 + gl7 + gl8)
        + rr11 * (gl3 + gl5)
        + rr13 * gl4;
    out.d2perm_dr2 = 0.25 * (gf1p - (1.0 - mscale) * gfr1p);

    let gfi1 = 0.5 * bn[2] * (gli1 + glip1 + gli6 + glip6)
        + 0.5 * bn[2] * scip2
        + 0.5 * bn[3] * (gli2 + glip2 + gli7 + glip7)
        - 0.5 * bn[3] * (sci3 * scip4 + scip3 * sci4)
        + 0.5 * bn[4] * (gli3 + glip3);
    let gfri1 = 0.5 * rr5 * ((gli1 + gli6) * psc3 + (glip1 + glip6) * dsc3 + scip2 * usc3)
        + 0.5 * rr7
            * ((gli2 + gli7) * psc5 + (glip2 + glip7) * dsc5
                - (sci3 * scip4 + scip3 * sci4) * usc5)
        + 0.5 * rr9 * (gli3 * psc7 + glip3 * dsc7);
    out.dpol_dr2 = -0.5 * (gfi1 - gfri1);

    let gfi1p = 0.5 * bn[3] * (gli1 + glip1 + gli6 + glip6)
        + 0.5 * bn[3] * scip2
        + 0.5 * bn[4] * (gli2 + glip2 + gli7 + glip7)
        - 0.5 * bn[4] * (sci3 * scip4 + scip3 * sci4)
        + 0.5 * bn[5] * (gli3 + glip3);
    let gfri1p = 0.5 * rr7 * ((gli1 + gli6) * psc3 + (glip1 + glip6) * dsc3 + scip2 * usc3)
        + 0.5 * rr9
            * ((gli2 + gli7) * psc5 + (glip2 + glip7) * dsc5
                - (sci3 * scip4 + scip3 * sci4) * usc5)
        + 0.5 * rr11 * (gli3 * psc7 + glip3 * dsc7);
    out.d2pol_dr2 = 0.25 * (gfi1p - gfri1p);

    if !gradient {
        return out;
    }

    // ==================== Permanent gradient and torque

    let qidk = mi.qv(&dk);
    let qkdi = mk.qv(&di);
    let qiqkr = mi.qv(&qkv);
    let qkqir = mk.qv(&qiv);

    let dixdk = cross(&di, &dk);
    let dixr = cross(&di, dx);
    let dkxr = cross(&dk, dx);
    let dixqkr = cross(&di, &qkv);
    let dkxqir = cross(&dk, &qiv);
    let rxqir = cross(dx, &qiv);
    let rxqkr = cross(dx, &qkv);
    let rxqikr = cross(dx, &qiqkr);
    let rxqkir = cross(dx, &qkqir);
    let qkrxqir = cross(&qkv, &qiv);
    let rxqidk = cross(dx, &qidk);
    let rxqkdi = cross(dx, &qkdi);
    // The antisymmetric part of Qi·Qk, as a vector.
    let qixqk = {
        let mut m = [[0.0; 3]; 3];
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    m[a][b] += mi.q[a][c] * mk.q[c][b];
                }
            }
        }
        [
            m[1][2] - m[2][1],
            m[2][0] - m[0][2],
            m[0][1] - m[1][0],
        ]
    };

    let gf2 = -ck * bn[1] + sc4 * bn[2] - sc6 * bn[3];
    let gf3 = ci * bn[1] + sc3 * bn[2] + sc5 * bn[3];
    let gf4 = 2.0 * bn[2];
    let gf5 = 2.0 * (-ck * bn[2] + sc4 * bn[3] - sc6 * bn[4]);
    let gf6 = 2.0 * (-ci * bn[2] - sc3 * bn[3] - sc5 * bn[4]);
    let gf7 = 4.0 * bn[3];

    let gfr2 = -ck * rr3 + sc4 * rr5 - sc6 * rr7;
    let gfr3 = ci * rr3 + sc3 * rr5 + sc5 * rr7;
    let gfr4 = 2.0 * rr5;
    let gfr5 = 2.0 * (-ck * rr5 + sc4 * rr7 - sc6 * rr9);
    let gfr6 = 2.0 * (-ci * rr5 - sc3 * rr7 - sc5 * rr9);
    let gfr7 = 4.0 * rr7;

    let m = 1.0 - mscale;
    for j in 0..3 {
        let ftm2 = gf1 * dx[j]
            + gf2 * di[j]
            + gf3 * dk[j]
            + gf4 * (qkdi[j] - qidk[j])
            + gf5 * qiv[j]
            + gf6 * qkv[j]
            + gf7 * (qiqkr[j] + qkqir[j]);
        let ftm2r = gfr1 * dx[j]
            + gfr2 * di[j]
            + gfr3 * dk[j]
            + gfr4 * (qkdi[j] - qidk[j])
            + gfr5 * qiv[j]
            + gfr6 * qkv[j]
            + gfr7 * (qiqkr[j] + qkqir[j]);
        out.frc_perm[j] = ftm2 - m * ftm2r;

        let ttm2 = -bn[1] * dixdk[j] + gf2 * dixr[j]
            + gf4 * (dixqkr[j] + dkxqir[j] + rxqidk[j] - 2.0 * qixqk[j])
            - gf5 * rxqir[j]
            - gf7 * (rxqikr[j] + qkrxqir[j]);
        let ttm2r = -rr3 * dixdk[j] + gfr2 * dixr[j]
            + gfr4 * (dixqkr[j] + dkxqir[j] + rxqidk[j] - 2.0 * qixqk[j])
            - gfr5 * rxqir[j]
            - gfr7 * (rxqikr[j] + qkrxqir[j]);
        out.trq_perm_i[j] = ttm2 - m * ttm2r;

        let ttm3 = bn[1] * dixdk[j] + gf3 * dkxr[j]
            - gf4 * (dixqkr[j] + dkxqir[j] + rxqkdi[j] - 2.0 * qixqk[j])
            - gf6 * rxqkr[j]
            + gf7 * (rxqkir[j] - qkrxqir[j]);
        let ttm3r = rr3 * dixdk[j] + gfr3 * dkxr[j]
            - gfr4 * (dixqkr[j] + dkxqir[j] + rxqkdi[j] - 2.0 * qixqk[j])
            - gfr6 * rxqkr[j]
            + gfr7 * (rxqkir[j] - qkrxqir[j]);
        out.trq_perm_k[j] = ttm3 - m * ttm3r;
    }

    // ==================== Polarization gradient and torque

    let qiuk = mi.qv(uk);
    let qkui = mk.qv(ui);
    let qiukp = mi.qv(ukp);
    let qkuip = mk.qv(uip);

    let dixuk = cross(&di, uk);
    let dixukp = cross(&di, ukp);
    let dkxui = cross(&dk, ui);
    let dkxuip = cross(&dk, uip);
    let ukxqir = cross(uk, &qiv);
    let ukxqirp = cross(ukp, &qiv);
    let uixqkr = cross(ui, &qkv);
    let uixqkrp = cross(uip, &qkv);
    let rxqiuk = cross(dx, &qiuk);
    let rxqiukp = cross(dx, &qiukp);
    let rxqkui = cross(dx, &qkui);
    let rxqkuip = cross(dx, &qkuip);

    let gfi2 = -ck * bn[1] + sc4 * bn[2] - sc6 * bn[3];
    let gfi3 = ci * bn[1] + sc3 * bn[2] + sc5 * bn[3];
    let gfi4 = 2.0 * bn[2];
    let gfi5 = bn[3] * (sci4 + scip4);
    let gfi6 = -bn[3] * (sci3 + scip3);

    let gfri4 = 2.0 * rr5;
    let gfri5 = rr7 * (sci4 * psc7 + scip4 * dsc7);
    let gfri6 = -rr7 * (sci3 * psc7 + scip3 * dsc7);

    let mut frc = [0.0; 3];
    for j in 0..3 {
        let ftm2i = gfi1 * dx[j]
            + 0.5
                * (gfi2 * (ui[j] + uip[j])
                    + bn[2] * (sci4 * uip[j] + scip4 * ui[j])
                    + gfi3 * (uk[j] + ukp[j])
                    + bn[2] * (sci3 * ukp[j] + scip3 * uk[j])
                    + (sci4 + scip4) * bn[2] * di[j]
                    + (sci3 + scip3) * bn[2] * dk[j]
                    + gfi4 * (qkui[j] + qkuip[j] - qiuk[j] - qiukp[j]))
            + gfi5 * qiv[j]
            + gfi6 * qkv[j];

        let ftm2ri = gfri1 * dx[j]
            + 0.5
                * (-rr3 * ck * (ui[j] * psc3 + uip[j] * dsc3)
                    + rr5 * sc4 * (ui[j] * psc5 + uip[j] * dsc5)
                    - rr7 * sc6 * (ui[j] * psc7 + uip[j] * dsc7))
            + 0.5
                * (rr3 * ci * (uk[j] * psc3 + ukp[j] * dsc3)
                    + rr5 * sc3 * (uk[j] * psc5 + ukp[j] * dsc5)
                    + rr7 * sc5 * (uk[j] * psc7 + ukp[j] * dsc7))
            + 0.5 * rr5 * usc5
                * (sci4 * uip[j] + scip4 * ui[j] + sci3 * ukp[j] + scip3 * uk[j])
            + 0.5 * (sci4 * psc5 + scip4 * dsc5) * rr5 * di[j]
            + 0.5 * (sci3 * psc5 + scip3 * dsc5) * rr5 * dk[j]
            + 0.5 * gfri4
                * ((qkui[j] - qiuk[j]) * psc5 + (qkuip[j] - qiukp[j]) * dsc5)
            + gfri5 * qiv[j]
            + gfri6 * qkv[j];

        // Gradient of the Thole damping functions.
        let fridmp = 0.5
            * (rr3 * ((gli1 + gli6) * pscale + (glip1 + glip6) * dscale) * thole.ddsc3[j]
                + rr5 * ((gli2 + gli7) * pscale + (glip2 + glip7) * dscale)
                    * thole.ddsc5[j]
                + rr7 * (gli3 * pscale + glip3 * dscale) * thole.ddsc7[j]);
        let findmp = 0.5
            * (scip2 * rr3 * thole.ddsc3[j]
                - rr5 * thole.ddsc5[j] * (sci3 * scip4 + scip3 * sci4));

        frc[j] = ftm2i - ftm2ri - fridmp - findmp;
    }

    // Direct polarization has no mutual coupling: take back the induced-induced
    // force terms the formulation above double-counts.
    if polarization == PolarizationMode::Direct {
        let gfd = 0.5 * (bn[2] * scip2 - bn[3] * (scip3 * sci4 + sci3 * scip4));
        let gfdr = 0.5 * (rr5 * scip2 * usc3 - rr7 * (scip3 * sci4 + sci3 * scip4) * usc5);
        for j in 0..3 {
            let fdir = gfd * dx[j]
                + 0.5 * bn[2]
                    * (sci4 * uip[j] + scip4 * ui[j] + sci3 * ukp[j] + scip3 * uk[j]);
            let fdirr = gfdr * dx[j]
                + 0.5 * rr5 * usc5
                    * (sci4 * uip[j] + scip4 * ui[j] + sci3 * ukp[j] + scip3 * uk[j]);
            let findmp = 0.5
                * (scip2 * rr3 * thole.ddsc3[j]
                    - rr5 * thole.ddsc5[j] * (sci3 * scip4 + scip3 * sci4));
            frc[j] += -fdir + fdirr + findmp;
        }
    }
    out.frc_pol = frc;

    let gti2 = 0.5 * bn[2] * (sci4 + scip4);
    let gti3 = 0.5 * bn[2] * (sci3 + scip3);
    let gtri2 = 0.5 * rr5 * (sci4 * psc5 + scip4 * dsc5);
    let gtri3 = 0.5 * rr5 * (sci3 * psc5 + scip3 * dsc5);

    for j in 0..3 {
        let ttm2i = -bn[1] * (dixuk[j] + dixukp[j]) * 0.5
            + gti2 * dixr[j]
            + gfi4 * ((ukxqir[j] + rxqiuk[j]) + (ukxqirp[j] + rxqiukp[j])) * 0.5
            - gfi5 * rxqir[j];
        let ttm2ri = -rr3 * (dixuk[j] * psc3 + dixukp[j] * dsc3) * 0.5
            + gtri2 * dixr[j]
            + gfri4
                * ((ukxqir[j] + rxqiuk[j]) * psc5 + (ukxqirp[j] + rxqiukp[j]) * dsc5)
                * 0.5
            - gfri5 * rxqir[j];
        out.trq_pol_i[j] = ttm2i - ttm2ri;

        let ttm3i = -bn[1] * (dkxui[j] + dkxuip[j]) * 0.5
            + gti3 * dkxr[j]
            - gfi6 * rxqkr[j]
            - gfi4 * ((uixqkr[j] + rxqkui[j]) + (uixqkrp[j] + rxqkuip[j])) * 0.5;
        let ttm3ri = -rr3 * (dkxui[j] * psc3 + dkxuip[j] * dsc3) * 0.5
            + gtri3 * dkxr[j]
            - gfri6 * rxqkr[j]
            - gfri4
                * ((uixqkr[j] + rxqkui[j]) * psc5 + (uixqkrp[j] + rxqkuip[j]) * dsc5)
                * 0.5;
        out.trq_pol_k[j] = ttm3i - ttm3ri;
    }

    out
}

fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ewald::EwaldParameters;

    fn charge(c: f64) -> LoadedMultipole {
        let mut m = [0.0; 10];
        m[0] = c;
        LoadedMultipole::load(&m)
    }

    #[test]
    fn test_charge_pair_energy_is_coulomb() {
        let ewald = EwaldParameters::new(0.0, 50.0);
        let dx = [3.0, 0.0, 0.0];
        let bn: [f64; 7] = ewald.bn(3.0, 9.0);
        let zero = [0.0; 3];

        let pair = pair_interaction(
            &charge(1.0),
            &charge(-1.0),
            &dx,
            3.0,
            9.0,
            &zero,
            &zero,
            &zero,
            &zero,
            &bn,
            &TholeScales::UNDAMPED,
            1.0,
            1.0,
            1.0,
            PolarizationMode::Mutual,
            true,
        );

        assert!((pair.e_perm + 1.0 / 3.0).abs() < 1e-14);
        assert_eq!(pair.e_pol, 0.0);
        // Attractive pair: the energy falls as i moves toward k, so the gradient on i
        // points down the separation axis.
        assert!((pair.frc_perm[0] + 1.0 / 9.0).abs() < 1e-14);
    }

    #[test]
    fn test_fully_masked_pair_has_no_energy() {
        let ewald = EwaldParameters::new(0.0, 50.0);
        let dx = [2.0, 0.0, 0.0];
        let bn: [f64; 7] = ewald.bn(2.0, 4.0);
        let zero = [0.0; 3];

        let pair = pair_interaction(
            &charge(1.0),
            &charge(1.0),
            &dx,
            2.0,
            4.0,
            &zero,
            &zero,
            &zero,
            &zero,
            &bn,
            &TholeScales::UNDAMPED,
            0.0,
            1.0,
            1.0,
            PolarizationMode::Mutual,
            true,
        );

        assert!(pair.e_perm.abs() < 1e-15);
        assert!(pair.frc_perm[0].abs() < 1e-15);
    }

    #[test]
    fn test_pair_energy_is_label_symmetric() {
        // Swapping atom labels flips dx and exchanges the multipoles; the energy must
        // not change.
        let ewald = EwaldParameters::new(0.45, 50.0);
        let mut ma = [0.0; 10];
        ma[0] = 0.3;
        ma[1] = 0.1;
        ma[4] = 0.2;
        ma[5] = -0.15;
        ma[6] = -0.05;
        let mut mb = [0.0; 10];
        mb[0] = -0.4;
        mb[3] = -0.2;
        mb[4] = -0.1;
        mb[5] = 0.1;
        let (la, lb) = (LoadedMultipole::load(&ma), LoadedMultipole::load(&mb));

        let dx = [1.1, -0.7, 2.3];
        let r2 = dot(&dx, &dx);
        let r = r2.sqrt();
        let bn: [f64; 7] = ewald.bn(r, r2);
        let zero = [0.0; 3];

        let fwd = pair_interaction(
            &la,
            &lb,
            &dx,
            r,
            r2,
            &zero,
            &zero,
            &zero,
            &zero,
            &bn,
            &TholeScales::UNDAMPED,
            0.6,
            1.0,
            1.0,
            PolarizationMode::Mutual,
            false,
        );
        let back = pair_interaction(
            &lb,
            &la,
            &[-dx[0], -dx[1], -dx[2]],
            r,
            r2,
            &zero,
            &zero,
            &zero,
            &zero,
            &bn,
            &TholeScales::UNDAMPED,
            0.6,
            1.0,
            1.0,
            PolarizationMode::Mutual,
            false,
        );

        assert!((fwd.e_perm - back.e_perm).abs() < 1e-13);
    }
}
