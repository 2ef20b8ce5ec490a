use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::Array2;

use config::Keywords;
use crystal::{SpaceGroup, UnitCell};
use multipole::tensor::{T001, T010, T100};
use multipole::{Multipole, MultipoleSite, project_torque, rotate_site};

use crate::energy::{EnergyInputs, real_space_energy};
use crate::ewald::EwaldParameters;
use crate::field::{RealSpaceInputs, permanent_field};
use crate::lambda::{LambdaFactors, LambdaParameters};
use crate::math::ewald_coefficient;
use crate::mutual::induced_field;
use crate::options::{EvaluationConfig, MaskRules, PolarizationMode, ScfOptions};
use crate::recip::{
    GeneralizedKirkwood, NullReciprocal, ReciprocalSpace, induced_self_energy,
    multipole_phi_energy, multipole_phi_gradient, multipole_phi_torque,
    permanent_self_energy,
};
use crate::scf::{ScfOutcome, ScfStatus, SorSolver};
use crate::{NeighborLists, PhiTensor, PmeError, Result};

/// Result of one energy evaluation, in kcal/mol and kcal/mol/Å.
#[derive(Debug)]
#[non_exhaustive]
pub struct EnergyReport {
    pub permanent: f64,
    pub polarization: f64,
    pub total: f64,
    /// Real-space pair interactions evaluated.
    pub interactions: usize,
    pub scf: ScfOutcome,
    pub dudl: f64,
    pub d2udl2: f64,
    /// Cartesian energy gradient, one row per asymmetric-unit atom.
    pub gradient: Array2<f64>,
    /// Multipole torques before projection, kept for diagnostics.
    pub torque: Array2<f64>,
    /// Lambda derivative of the gradient. Carries the smoothstep window terms only;
    /// the softcore radial cross term is outside this output's contract.
    pub dudl_gradient: Array2<f64>,
}

/// The particle-mesh Ewald engine for polarizable multipole electrostatics.
///
/// Constructed once per simulation; every [`Pme::energy`] call resets the per-call
/// scratch, expands coordinates over the symmetry images, rotates multipoles into the
/// global frame, converges the induced dipoles and assembles energies, gradients and
/// torques.
pub struct Pme {
    sites: Vec<MultipoleSite>,
    cell: UnitCell,
    space_group: SpaceGroup,
    lists: NeighborLists,
    ewald: EwaldParameters,
    masks: MaskRules,
    polarization: PolarizationMode,
    scf_options: ScfOptions,
    lambda_params: LambdaParameters,
    recip: Box<dyn ReciprocalSpace>,
    gk: Option<Box<dyn GeneralizedKirkwood>>,
    terminate: Arc<AtomicBool>,

    // Per-evaluation scratch, reset at the top of every energy call.
    coords: Vec<Vec<[f64; 3]>>,
    multipoles: Vec<Vec<Multipole>>,
    field: Vec<[f64; 3]>,
    field_cr: Vec<[f64; 3]>,
    induced: Vec<[f64; 3]>,
    induced_cr: Vec<[f64; 3]>,
    induced_exp: Vec<Vec<[f64; 3]>>,
    induced_exp_cr: Vec<Vec<[f64; 3]>>,
    phi: Vec<PhiTensor>,
    phi_ind: Vec<PhiTensor>,
    phi_ind_cr: Vec<PhiTensor>,
}

impl Pme {
    /// Builds the engine from its collaborators. Fatal on inconsistent inputs.
    pub fn new(
        sites: Vec<MultipoleSite>,
        cell: UnitCell,
        space_group: SpaceGroup,
        lists: NeighborLists,
        keywords: &Keywords,
        recip: Box<dyn ReciprocalSpace>,
    ) -> Result<Self> {
        if sites.is_empty() {
            return Err(PmeError::NoSites);
        }
        for site in &sites {
            site.validate()?;
        }
        let images = space_group.num_images();
        if lists.num_atoms() != sites.len() || lists.num_images() != images {
            return Err(PmeError::ListMismatch {
                lists: lists.num_atoms(),
                images: lists.num_images(),
                atoms: sites.len(),
                expected_images: images,
            });
        }

        let aewald = if cell.is_periodic() {
            ewald_coefficient(keywords.ewald_cutoff, keywords.ewald_precision)
        } else {
            0.0
        };
        let n = sites.len();

        Ok(Self {
            ewald: EwaldParameters::new(aewald, keywords.ewald_cutoff),
            masks: MaskRules::from(keywords),
            polarization: PolarizationMode::from_keyword(&keywords.polarization)?,
            scf_options: ScfOptions::from(keywords),
            lambda_params: LambdaParameters::from_keywords(keywords),
            recip,
            gk: None,
            terminate: Arc::new(AtomicBool::new(false)),
            coords: vec![vec![[0.0; 3]; n]; images],
            multipoles: vec![vec![[0.0; 10]; n]; images],
            field: vec![[0.0; 3]; n],
            field_cr: vec![[0.0; 3]; n],
            induced: vec![[0.0; 3]; n],
            induced_cr: vec![[0.0; 3]; n],
            induced_exp: vec![vec![[0.0; 3]; n]; images],
            induced_exp_cr: vec![vec![[0.0; 3]; n]; images],
            phi: vec![[0.0; 20]; n],
            phi_ind: vec![[0.0; 20]; n],
            phi_ind_cr: vec![[0.0; 20]; n],
            sites,
            cell,
            space_group,
            lists,
        })
    }

    /// Convenience constructor for an isolated (aperiodic) system: single image, zero
    /// Ewald coefficient, all-pairs lists, no reciprocal contribution.
    pub fn aperiodic(
        sites: Vec<MultipoleSite>,
        coords: &[[f64; 3]],
        keywords: &Keywords,
    ) -> Result<Self> {
        let cell = UnitCell::aperiodic();
        let group = SpaceGroup::p1();
        let lists = NeighborLists::build(&cell, &group, coords, keywords.ewald_cutoff);
        let n = sites.len();
        Self::new(
            sites,
            cell,
            group,
            lists,
            keywords,
            Box::new(NullReciprocal::new(n)),
        )
    }

    /// Overrides the Ewald splitting, e.g. to probe coefficient independence.
    pub fn set_ewald(&mut self, aewald: f64, cutoff: f64) {
        self.ewald = EwaldParameters::new(aewald, cutoff);
    }

    pub fn ewald_coefficient(&self) -> f64 {
        self.ewald.aewald
    }

    /// Installs the optional implicit-solvent collaborator.
    pub fn set_generalized_kirkwood(&mut self, gk: Box<dyn GeneralizedKirkwood>) {
        self.gk = Some(gk);
    }

    /// A flag polled between SCF iterations; raising it finishes the current
    /// iteration and returns the best-effort result.
    pub fn terminate_handle(&self) -> Arc<AtomicBool> {
        self.terminate.clone()
    }

    pub fn num_atoms(&self) -> usize {
        self.sites.len()
    }

    /// The converged induced dipoles of the last evaluation, in e·Å.
    pub fn induced_dipoles(&self) -> &[[f64; 3]] {
        &self.induced
    }

    /// Evaluates the total electrostatic energy at the given asymmetric-unit
    /// coordinates.
    pub fn energy(
        &mut self,
        coords: &[[f64; 3]],
        config: &EvaluationConfig,
    ) -> Result<EnergyReport> {
        let n = self.sites.len();
        let images = if config.use_symmetry {
            self.space_group.num_images()
        } else {
            1
        };
        let lambda = match config.lambda {
            Some(l) => LambdaFactors::new(l, &self.lambda_params)?,
            None => LambdaFactors::UNITY,
        };

        self.expand(coords, images);
        self.rotate(images);

        // Permanent field: real space and the reciprocal convolution, optionally as
        // two concurrent sections.
        let (real, recip_result) = if config.concurrent_sections {
            let inputs = RealSpaceInputs {
                sites: &self.sites,
                cell: &self.cell,
                space_group: &self.space_group,
                lists: &self.lists,
                coords: &self.coords,
                multipoles: &self.multipoles,
                ewald: self.ewald,
                masks: self.masks,
                num_images: images,
            };
            let recip = &mut self.recip;
            let coords_ref = &self.coords;
            let multipoles_ref = &self.multipoles;
            let phi = &mut self.phi;
            rayon::join(
                || permanent_field(&inputs),
                move || -> Result<()> {
                    recip.compute_bsplines(coords_ref)?;
                    recip.spline_permanent_multipoles(multipoles_ref)?;
                    recip.permanent_multipole_convolution()?;
                    recip.permanent_phi(phi);
                    Ok(())
                },
            )
        } else {
            self.recip.compute_bsplines(&self.coords)?;
            self.recip.spline_permanent_multipoles(&self.multipoles)?;
            self.recip.permanent_multipole_convolution()?;
            self.recip.permanent_phi(&mut self.phi);
            let inputs = self.real_inputs(images);
            (permanent_field(&inputs), Ok(()))
        };
        recip_result?;
        self.field = real.0;
        self.field_cr = real.1;

        // Ewald self and reciprocal contributions to the permanent field.
        let self_term = self.dipole_self_term();
        for i in 0..n {
            let m = &self.multipoles[0][i];
            let d = [m[T100], m[T010], m[T001]];
            let p = &self.phi[i];
            for j in 0..3 {
                let e = self_term * d[j] - p[1 + j];
                self.field[i][j] += e;
                self.field_cr[i][j] += e;
            }
        }
        if let Some(gk) = self.gk.as_mut() {
            gk.compute_born_radii(&self.coords[0])?;
            gk.permanent_field(&self.multipoles[0], &mut self.field, &mut self.field_cr)?;
        }

        let scf = self.converge_induced_dipoles(images, config.concurrent_sections)?;
        self.expand_induced(images);

        // Real-space pair sum and the reciprocal/self assembly.
        let energy_inputs = EnergyInputs {
            real: self.real_inputs(images),
            induced: &self.induced_exp,
            induced_cr: &self.induced_exp_cr,
            polarization: self.polarization,
            gradient: config.gradient,
            lambda,
        };
        let mut out = real_space_energy(&energy_inputs);

        let f = config::ELECTRIC;
        let mut e_perm = out.e_permanent;
        let mut e_pol = out.e_polarization;

        e_perm += permanent_self_energy(&self.ewald, &self.multipoles[0], f);
        e_pol += induced_self_energy(
            &self.ewald,
            &self.multipoles[0],
            &self.induced,
            &self.induced_cr,
            f,
            config.gradient.then_some(&mut out.torque),
        );

        // Soft atoms' self energy follows the permanent window.
        if config.lambda.is_some() {
            let soft: Vec<Multipole> = self
                .sites
                .iter()
                .filter(|s| s.soft)
                .map(|s| self.multipoles[0][s.index])
                .collect();
            if !soft.is_empty() {
                let e_soft = permanent_self_energy(&self.ewald, &soft, f);
                e_perm -= (1.0 - lambda.lpow_perm) * e_soft;
                out.dudl += lambda.dlpow_perm * e_soft;
                out.d2udl2 += lambda.d2lpow_perm * e_soft;
            }
        }

        // Reciprocal energies from the phi tensors.
        self.recip
            .spline_induced_dipoles(&self.induced_exp, &self.induced_exp_cr)?;
        self.recip.induced_dipole_convolution()?;
        self.recip
            .induced_phi(&mut self.phi_ind, &mut self.phi_ind_cr);

        for i in 0..n {
            let m = &self.multipoles[0][i];
            e_perm += 0.5 * f * multipole_phi_energy(m, &self.phi[i]);

            let u = self.induced[i];
            let p = &self.phi[i];
            e_pol += 0.5 * f * (u[0] * p[T100] + u[1] * p[T010] + u[2] * p[T001]);

            if config.gradient {
                let (uavg, phi_ind) = self.induced_recip_sources(i);
                let g = multipole_phi_gradient(m, &self.phi[i]);
                let gi = multipole_phi_gradient(m, &phi_ind);
                let mut udip = [0.0; 10];
                udip[T100] = uavg[0];
                udip[T010] = uavg[1];
                udip[T001] = uavg[2];
                let gu = multipole_phi_gradient(&udip, &self.phi[i]);
                let t = multipole_phi_torque(m, &self.phi[i]);
                let ti = multipole_phi_torque(m, &phi_ind);
                for j in 0..3 {
                    out.grad[i][j] += f * (g[j] + gi[j] + gu[j]);
                    out.torque[i][j] += f * (t[j] + ti[j]);
                }
            }
        }

        // Project multipole torques onto the frame atoms.
        if config.gradient {
            for site in &self.sites {
                let torque = out.torque[site.index];
                project_torque(site, &self.coords[0], &torque, &mut out.grad);
            }
        }

        Ok(EnergyReport {
            permanent: e_perm,
            polarization: e_pol,
            total: e_perm + e_pol,
            interactions: out.interactions,
            scf,
            dudl: out.dudl,
            d2udl2: out.d2udl2,
            gradient: to_array(&out.grad),
            torque: to_array(&out.torque),
            dudl_gradient: to_array(&out.dudl_grad),
        })
    }

    /// `(4/3)·α³/√π`, the self-field a dipole's own screening Gaussian exerts.
    fn dipole_self_term(&self) -> f64 {
        let a = self.ewald.aewald;
        (4.0 / 3.0) * a * a * a / std::f64::consts::PI.sqrt()
    }

    fn real_inputs(&self, images: usize) -> RealSpaceInputs<'_> {
        RealSpaceInputs {
            sites: &self.sites,
            cell: &self.cell,
            space_group: &self.space_group,
            lists: &self.lists,
            coords: &self.coords,
            multipoles: &self.multipoles,
            ewald: self.ewald,
            masks: self.masks,
            num_images: images,
        }
    }

    /// Applies every symmetry operator to the asymmetric-unit coordinates and zeroes
    /// the per-evaluation scratch.
    fn expand(&mut self, coords: &[[f64; 3]], images: usize) {
        debug_assert_eq!(coords.len(), self.sites.len());
        for (dst, src) in self.coords[0].iter_mut().zip(coords) {
            *dst = *src;
        }
        for s in 1..images {
            let op = *self.space_group.op(s);
            for i in 0..coords.len() {
                self.coords[s][i] = op.apply(&coords[i]);
            }
        }
        self.field.fill([0.0; 3]);
        self.field_cr.fill([0.0; 3]);
        self.induced.fill([0.0; 3]);
        self.induced_cr.fill([0.0; 3]);
        self.phi.fill([0.0; 20]);
        self.phi_ind.fill([0.0; 20]);
        self.phi_ind_cr.fill([0.0; 20]);
    }

    /// Rotates every site's local multipole into the global frame of each image.
    fn rotate(&mut self, images: usize) {
        use rayon::prelude::*;
        for s in 0..images {
            let coords = &self.coords[s];
            let sites = &self.sites;
            self.multipoles[s] = sites
                .par_iter()
                .map(|site| rotate_site(site, coords))
                .collect();
        }
    }

    /// Expands the asymmetric-unit induced dipoles onto every image by the symmetry
    /// rotations.
    fn expand_induced(&mut self, images: usize) {
        for s in 0..images {
            let op = *self.space_group.op(s);
            for i in 0..self.induced.len() {
                self.induced_exp[s][i] = if s == 0 {
                    self.induced[i]
                } else {
                    op.rotate(&self.induced[i])
                };
                self.induced_exp_cr[s][i] = if s == 0 {
                    self.induced_cr[i]
                } else {
                    op.rotate(&self.induced_cr[i])
                };
            }
        }
    }

    /// Seeds the induced dipoles from the direct field and, in mutual mode, iterates
    /// them to self-consistency with SOR updates.
    fn converge_induced_dipoles(&mut self, images: usize, concurrent: bool) -> Result<ScfOutcome> {
        let n = self.sites.len();
        if self.polarization == PolarizationMode::None {
            return Ok(ScfOutcome::new(ScfStatus::Unpolarized));
        }

        let mut seed = vec![[0.0; 3]; n];
        let mut seed_cr = vec![[0.0; 3]; n];
        for (i, site) in self.sites.iter().enumerate() {
            for j in 0..3 {
                seed[i][j] = site.polarizability * self.field[i][j];
                seed_cr[i][j] = site.polarizability * self.field_cr[i][j];
            }
        }
        self.induced.copy_from_slice(&seed);
        self.induced_cr.copy_from_slice(&seed_cr);

        if self.polarization == PolarizationMode::Direct {
            return Ok(ScfOutcome::new(ScfStatus::DirectOnly));
        }

        let mut solver = SorSolver::new(self.scf_options, n);
        let self_term = self.dipole_self_term();
        let mut outcome = ScfOutcome::new(ScfStatus::Converged);

        for iteration in 1..=self.scf_options.max_iterations {
            self.expand_induced(images);

            // Real-space and reciprocal induced fields as two sibling sections.
            let ((mut mutual, mut mutual_cr), recip_result) = if concurrent {
                let inputs = RealSpaceInputs {
                    sites: &self.sites,
                    cell: &self.cell,
                    space_group: &self.space_group,
                    lists: &self.lists,
                    coords: &self.coords,
                    multipoles: &self.multipoles,
                    ewald: self.ewald,
                    masks: self.masks,
                    num_images: images,
                };
                let recip = &mut self.recip;
                let phi_ind = &mut self.phi_ind;
                let phi_ind_cr = &mut self.phi_ind_cr;
                let induced = &self.induced_exp;
                let induced_cr = &self.induced_exp_cr;
                rayon::join(
                    || induced_field(&inputs, induced, induced_cr),
                    move || -> Result<()> {
                        recip.spline_induced_dipoles(induced, induced_cr)?;
                        recip.induced_dipole_convolution()?;
                        recip.induced_phi(phi_ind, phi_ind_cr);
                        Ok(())
                    },
                )
            } else {
                let fields = {
                    let inputs = self.real_inputs(images);
                    induced_field(&inputs, &self.induced_exp, &self.induced_exp_cr)
                };
                self.recip
                    .spline_induced_dipoles(&self.induced_exp, &self.induced_exp_cr)?;
                self.recip.induced_dipole_convolution()?;
                self.recip
                    .induced_phi(&mut self.phi_ind, &mut self.phi_ind_cr);
                (fields, Ok(()))
            };
            recip_result?;

            for i in 0..n {
                for j in 0..3 {
                    mutual[i][j] += self_term * self.induced[i][j] - self.phi_ind[i][1 + j];
                    mutual_cr[i][j] +=
                        self_term * self.induced_cr[i][j] - self.phi_ind_cr[i][1 + j];
                }
            }
            if let Some(gk) = self.gk.as_mut() {
                gk.induced_field(
                    &self.induced,
                    &self.induced_cr,
                    &mut mutual,
                    &mut mutual_cr,
                )?;
            }

            let eps = solver.apply(
                &self.sites,
                &seed,
                &seed_cr,
                &mutual,
                &mutual_cr,
                &mut self.induced,
                &mut self.induced_cr,
            );
            outcome.iterations = iteration;
            outcome.eps = eps;

            if solver.check(eps, iteration)? {
                return Ok(outcome);
            }
            if self.terminate.load(Ordering::Relaxed) {
                outcome.status = ScfStatus::Canceled;
                return Ok(outcome);
            }
        }
        Err(PmeError::ScfUnconverged {
            iterations: outcome.iterations,
            eps: outcome.eps,
        })
    }

    /// The induced sources entering the reciprocal gradient, by polarization mode.
    fn induced_recip_sources(&self, i: usize) -> ([f64; 3], PhiTensor) {
        match self.polarization {
            PolarizationMode::Mutual | PolarizationMode::None => {
                let u = self.induced[i];
                let up = self.induced_cr[i];
                let mut phi = [0.0; 20];
                for t in 0..20 {
                    phi[t] = 0.5 * (self.phi_ind[i][t] + self.phi_ind_cr[i][t]);
                }
                (
                    [
                        0.5 * (u[0] + up[0]),
                        0.5 * (u[1] + up[1]),
                        0.5 * (u[2] + up[2]),
                    ],
                    phi,
                )
            }
            PolarizationMode::Direct => (self.induced[i], self.phi_ind[i]),
        }
    }
}

fn to_array(v: &[[f64; 3]]) -> Array2<f64> {
    let mut out = Array2::zeros((v.len(), 3));
    for (i, row) in v.iter().enumerate() {
        for j in 0..3 {
            out[[i, j]] = row[j];
        }
    }
    out
}
