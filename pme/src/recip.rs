use multipole::Multipole;
use multipole::tensor::*;

use crate::ewald::EwaldParameters;
use crate::{PhiTensor, Result};

/// The reciprocal-space collaborator: splines sources onto an FFT grid, convolves with
/// the Ewald Green's function and hands back phi tensors.
///
/// The convolution implementation is external; the engine only drives this interface.
/// Implementations must tolerate being called once per energy evaluation in the order
/// `compute_bsplines` → permanent spline/convolution/phi → (per SCF iteration) induced
/// spline/convolution/phi.
pub trait ReciprocalSpace: Send + Sync {
    /// Recomputes the B-spline coefficients from the current coordinates.
    fn compute_bsplines(&mut self, coords: &[Vec<[f64; 3]>]) -> Result<()>;

    fn spline_permanent_multipoles(&mut self, multipoles: &[Vec<Multipole>]) -> Result<()>;
    fn permanent_multipole_convolution(&mut self) -> Result<()>;
    /// Writes the permanent phi tensor of every asymmetric-unit atom.
    fn permanent_phi(&self, phi: &mut [PhiTensor]);

    fn spline_induced_dipoles(
        &mut self,
        induced: &[Vec<[f64; 3]>],
        induced_cr: &[Vec<[f64; 3]>],
    ) -> Result<()>;
    fn induced_dipole_convolution(&mut self) -> Result<()>;
    /// Writes the induced phi tensors for both masking conventions.
    fn induced_phi(&self, phi: &mut [PhiTensor], phi_cr: &mut [PhiTensor]);

    /// The multipoles in fractional (grid) units, as last splined.
    fn fractional_multipoles(&self) -> &[Multipole];
    /// The induced dipoles in fractional (grid) units, as last splined.
    fn fractional_induced_dipoles(&self) -> &[[f64; 3]];
    /// FFT grid dimensions.
    fn grid_dimensions(&self) -> (usize, usize, usize);
}

/// The degenerate collaborator for aperiodic systems (Ewald α = 0): every phi tensor
/// is zero and reciprocal space contributes nothing.
#[derive(Default)]
pub struct NullReciprocal {
    fractional_multipoles: Vec<Multipole>,
    fractional_induced: Vec<[f64; 3]>,
}

impl NullReciprocal {
    pub fn new(num_atoms: usize) -> Self {
        Self {
            fractional_multipoles: vec![[0.0; 10]; num_atoms],
            fractional_induced: vec![[0.0; 3]; num_atoms],
        }
    }
}

impl ReciprocalSpace for NullReciprocal {
    fn compute_bsplines(&mut self, _coords: &[Vec<[f64; 3]>]) -> Result<()> {
        Ok(())
    }

    fn spline_permanent_multipoles(&mut self, _multipoles: &[Vec<Multipole>]) -> Result<()> {
        Ok(())
    }

    fn permanent_multipole_convolution(&mut self) -> Result<()> {
        Ok(())
    }

    fn permanent_phi(&self, phi: &mut [PhiTensor]) {
        phi.fill([0.0; 20]);
    }

    fn spline_induced_dipoles(
        &mut self,
        _induced: &[Vec<[f64; 3]>],
        _induced_cr: &[Vec<[f64; 3]>],
    ) -> Result<()> {
        Ok(())
    }

    fn induced_dipole_convolution(&mut self) -> Result<()> {
        Ok(())
    }

    fn induced_phi(&self, phi: &mut [PhiTensor], phi_cr: &mut [PhiTensor]) {
        phi.fill([0.0; 20]);
        phi_cr.fill([0.0; 20]);
    }

    fn fractional_multipoles(&self) -> &[Multipole] {
        &self.fractional_multipoles
    }

    fn fractional_induced_dipoles(&self) -> &[[f64; 3]] {
        &self.fractional_induced
    }

    fn grid_dimensions(&self) -> (usize, usize, usize) {
        (0, 0, 0)
    }
}

/// Optional implicit-solvent collaborator contributing a reaction field to the SCF.
pub trait GeneralizedKirkwood: Send + Sync {
    fn compute_born_radii(&mut self, coords: &[[f64; 3]]) -> Result<()>;
    /// Adds the permanent reaction field at every site into the accumulators.
    fn permanent_field(
        &mut self,
        multipoles: &[Multipole],
        field: &mut [[f64; 3]],
        field_cr: &mut [[f64; 3]],
    ) -> Result<()>;
    /// Adds the reaction field of the current induced dipoles.
    fn induced_field(
        &mut self,
        induced: &[[f64; 3]],
        induced_cr: &[[f64; 3]],
        field: &mut [[f64; 3]],
        field_cr: &mut [[f64; 3]],
    ) -> Result<()>;
}

const THIRD: f64 = 1.0 / 3.0;

/// Permanent Ewald self-energy, in kcal/mol: the interaction of each multipole with
/// its own screening Gaussian that the reciprocal sum over-counts.
pub(crate) fn permanent_self_energy(ewald: &EwaldParameters, multipoles: &[Multipole], f: f64) -> f64 {
    if ewald.aewald == 0.0 {
        return 0.0;
    }
    let fterm = -f * ewald.aewald / std::f64::consts::PI.sqrt();
    let term = 2.0 * ewald.aewald * ewald.aewald;

    let mut e = 0.0;
    for m in multipoles {
        let cii = m[T000] * m[T000];
        let dii = m[T100] * m[T100] + m[T010] * m[T010] + m[T001] * m[T001];
        // Quadrupole norm with the one-third convention folded in.
        let qii = (m[T200] * m[T200]
            + m[T020] * m[T020]
            + m[T002] * m[T002]
            + 2.0 * (m[T110] * m[T110] + m[T101] * m[T101] + m[T011] * m[T011]))
            / 9.0;
        e += fterm * (cii + term * (dii / 3.0 + 2.0 * term * qii / 5.0));
    }
    e
}

/// Induced-dipole Ewald self-energy and, when requested, the matching torque on the
/// permanent dipoles.
pub(crate) fn induced_self_energy(
    ewald: &EwaldParameters,
    multipoles: &[Multipole],
    induced: &[[f64; 3]],
    induced_cr: &[[f64; 3]],
    f: f64,
    mut torque: Option<&mut Vec<[f64; 3]>>,
) -> f64 {
    if ewald.aewald == 0.0 {
        return 0.0;
    }
    let term = 2.0 * ewald.aewald * ewald.aewald;
    let fterm = -f * ewald.aewald / std::f64::consts::PI.sqrt();

    let mut e = 0.0;
    for (i, m) in multipoles.iter().enumerate() {
        let d = [m[T100], m[T010], m[T001]];
        let u = induced[i];
        let uii = d[0] * u[0] + d[1] * u[1] + d[2] * u[2];
        e += fterm * term * uii / 3.0;

        if let Some(torque) = torque.as_deref_mut() {
            let up = induced_cr[i];
            let avg = [
                0.5 * (u[0] + up[0]),
                0.5 * (u[1] + up[1]),
                0.5 * (u[2] + up[2]),
            ];
            // τ = (4α³/3√π)·f·(d × μ̄), the screening Gaussian acting back on d.
            let c = -2.0 * fterm * term / 3.0;
            torque[i][0] += c * (d[1] * avg[2] - d[2] * avg[1]);
            torque[i][1] += c * (d[2] * avg[0] - d[0] * avg[2]);
            torque[i][2] += c * (d[0] * avg[1] - d[1] * avg[0]);
        }
    }
    e
}

/// Contracts one multipole with a phi tensor: `c·φ + d·∇φ + (1/3)Q:∇∇φ`.
pub(crate) fn multipole_phi_energy(m: &Multipole, phi: &PhiTensor) -> f64 {
    m[T000] * phi[T000]
        + m[T100] * phi[T100]
        + m[T010] * phi[T010]
        + m[T001] * phi[T001]
        + THIRD
            * (m[T200] * phi[T200]
                + m[T020] * phi[T020]
                + m[T002] * phi[T002]
                + 2.0 * (m[T110] * phi[T110] + m[T101] * phi[T101] + m[T011] * phi[T011]))
}

/// The Cartesian gradient of [`multipole_phi_energy`] with respect to the atom
/// position, using the third-order phi entries.
pub(crate) fn multipole_phi_gradient(m: &Multipole, phi: &PhiTensor) -> [f64; 3] {
    let gx = m[T000] * phi[T100]
        + m[T100] * phi[T200]
        + m[T010] * phi[T110]
        + m[T001] * phi[T101]
        + THIRD
            * (m[T200] * phi[T300]
                + m[T020] * phi[T120]
                + m[T002] * phi[T102]
                + 2.0 * (m[T110] * phi[T210] + m[T101] * phi[T201] + m[T011] * phi[T111]));
    let gy = m[T000] * phi[T010]
        + m[T100] * phi[T110]
        + m[T010] * phi[T020]
        + m[T001] * phi[T011]
        + THIRD
            * (m[T200] * phi[T210]
                + m[T020] * phi[T030]
                + m[T002] * phi[T012]
                + 2.0 * (m[T110] * phi[T120] + m[T101] * phi[T111] + m[T011] * phi[T021]));
    let gz = m[T000] * phi[T001]
        + m[T100] * phi[T101]
        + m[T010] * phi[T011]
        + m[T001] * phi[T002]
        + THIRD
            * (m[T200] * phi[T201]
                + m[T020] * phi[T021]
                + m[T002] * phi[T003]
                + 2.0 * (m[T110] * phi[T111] + m[T101] * phi[T102] + m[T011] * phi[T012]));
    [gx, gy, gz]
}

/// The torque a phi tensor exerts on a multipole: `d × E` plus the quadrupole
/// analog `(2/3)(Q·∇∇φ)×`.
pub(crate) fn multipole_phi_torque(m: &Multipole, phi: &PhiTensor) -> [f64; 3] {
    let two_thirds = 2.0 * THIRD;
    [
        m[T001] * phi[T010] - m[T010] * phi[T001]
            + two_thirds
                * (m[T101] * phi[T110] - m[T110] * phi[T101]
                    + m[T011] * (phi[T020] - phi[T002])
                    + (m[T002] - m[T020]) * phi[T011]),
        m[T100] * phi[T001] - m[T001] * phi[T100]
            + two_thirds
                * (m[T110] * phi[T011] - m[T011] * phi[T110]
                    + m[T101] * (phi[T002] - phi[T200])
                    + (m[T200] - m[T002]) * phi[T101]),
        m[T010] * phi[T100] - m[T100] * phi[T010]
            + two_thirds
                * (m[T011] * phi[T101] - m[T101] * phi[T011]
                    + m[T110] * (phi[T200] - phi[T020])
                    + (m[T020] - m[T200]) * phi[T110]),
    ]
}
