use derive_is_enum_variant::is_enum_variant;

use multipole::MultipoleSite;

use crate::options::ScfOptions;
use crate::{PmeError, Result};

/// How the induced-dipole determination ended.
#[derive(Debug, Clone, Copy, PartialEq, is_enum_variant)]
pub enum ScfStatus {
    /// The mutual iteration reached the convergence target.
    Converged,
    /// Direct polarization only; no iteration was requested.
    DirectOnly,
    /// Polarization disabled, all induced dipoles zero.
    Unpolarized,
    /// A termination request stopped the iteration; dipoles hold the last update.
    Canceled,
}

/// Outcome of the induced-dipole determination.
#[derive(Debug, Clone, Copy)]
pub struct ScfOutcome {
    pub status: ScfStatus,
    pub iterations: usize,
    /// The final RMS dipole change, in Debye.
    pub eps: f64,
}

impl ScfOutcome {
    pub(crate) fn new(status: ScfStatus) -> Self {
        Self {
            status,
            iterations: 0,
            eps: 0.0,
        }
    }
}

/// The successive over-relaxation update of the mutual iteration.
///
/// Owns the previous-iterate buffers so a single barrier between "compute field" and
/// "apply update" suffices; divergence tracking lives here as well.
pub(crate) struct SorSolver {
    options: ScfOptions,
    previous_eps: f64,
    previous: Vec<[f64; 3]>,
    previous_cr: Vec<[f64; 3]>,
}

impl SorSolver {
    pub fn new(options: ScfOptions, num_atoms: usize) -> Self {
        Self {
            options,
            previous_eps: f64::INFINITY,
            previous: vec![[0.0; 3]; num_atoms],
            previous_cr: vec![[0.0; 3]; num_atoms],
        }
    }

    /// Applies one damped fixed-point update `μ ← μ_prev + ω·(μ_seed + α·M - μ_prev)`
    /// and returns the RMS change in Debye.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &mut self,
        sites: &[MultipoleSite],
        seed: &[[f64; 3]],
        seed_cr: &[[f64; 3]],
        mutual_field: &[[f64; 3]],
        mutual_field_cr: &[[f64; 3]],
        induced: &mut [[f64; 3]],
        induced_cr: &mut [[f64; 3]],
    ) -> f64 {
        let sor = self.options.sor;
        let mut sum = 0.0;

        for (i, site) in sites.iter().enumerate() {
            let alpha = site.polarizability;
            self.previous[i] = induced[i];
            self.previous_cr[i] = induced_cr[i];
            for j in 0..3 {
                let new = seed[i][j] + alpha * mutual_field[i][j];
                let new_cr = seed_cr[i][j] + alpha * mutual_field_cr[i][j];
                induced[i][j] = self.previous[i][j] + sor * (new - self.previous[i][j]);
                induced_cr[i][j] =
                    self.previous_cr[i][j] + sor * (new_cr - self.previous_cr[i][j]);
                let delta = induced[i][j] - self.previous[i][j];
                sum += delta * delta;
            }
        }
        config::DEBYE * (sum / sites.len() as f64).sqrt()
    }

    /// Checks one iteration's residual: `Ok(true)` when converged, fatal on
    /// divergence or iteration exhaustion.
    pub fn check(&mut self, eps: f64, iterations: usize) -> Result<bool> {
        if eps < self.options.eps {
            return Ok(true);
        }
        if iterations > 1 && eps > self.previous_eps {
            return Err(PmeError::ScfDiverged {
                iterations,
                eps,
                previous: self.previous_eps,
            });
        }
        if iterations >= self.options.max_iterations {
            return Err(PmeError::ScfUnconverged { iterations, eps });
        }
        self.previous_eps = eps;
        Ok(false)
    }
}
