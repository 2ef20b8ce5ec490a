use config::Keywords;

use crate::{PmeError, Result};

/// How induced dipoles respond to the permanent field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolarizationMode {
    /// Full self-consistent coupling between induced dipoles.
    #[default]
    Mutual,
    /// Induced dipoles respond to the permanent field only.
    Direct,
    /// No polarization at all.
    None,
}

impl PolarizationMode {
    pub fn from_keyword(word: &str) -> Result<Self> {
        match word.to_ascii_lowercase().as_str() {
            "mutual" => Ok(Self::Mutual),
            "direct" => Ok(Self::Direct),
            "none" => Ok(Self::None),
            other => Err(PmeError::UnknownPolarization(other.into())),
        }
    }
}

/// Covalent and polarization-group mask factors (defaults: m14 0.4, m15 0.8, all
/// others 0).
#[derive(Debug, Clone, Copy)]
pub struct MaskRules {
    pub m12: f64,
    pub m13: f64,
    pub m14: f64,
    pub m15: f64,
    pub p12: f64,
    pub p13: f64,
    pub d11: f64,
}

impl From<&Keywords> for MaskRules {
    fn from(keywords: &Keywords) -> Self {
        Self {
            m12: keywords.m12_mask,
            m13: keywords.m13_mask,
            m14: keywords.m14_mask,
            m15: keywords.m15_mask,
            p12: keywords.p12_mask,
            p13: keywords.p13_mask,
            d11: keywords.d11_mask,
        }
    }
}

/// Convergence controls of the induced-dipole iteration.
#[derive(Debug, Clone, Copy)]
pub struct ScfOptions {
    /// Convergence threshold on the RMS induced-dipole change, in Debye.
    pub eps: f64,
    /// Successive over-relaxation factor, in (0, 1].
    pub sor: f64,
    pub max_iterations: usize,
}

impl From<&Keywords> for ScfOptions {
    fn from(keywords: &Keywords) -> Self {
        Self {
            eps: keywords.polar_eps,
            sor: keywords.polar_sor,
            max_iterations: keywords.max_scf_iterations,
        }
    }
}

/// Per-call evaluation switches, passed down the call tree instead of mutating
/// engine state.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationConfig {
    /// Compute gradients and torques in addition to the energy.
    pub gradient: bool,
    /// Expand over symmetry images; `false` restricts every loop to the asymmetric
    /// unit. The Ewald coefficient is honored either way.
    pub use_symmetry: bool,
    /// Run the real-space and reciprocal-space sections as two concurrent subteams.
    pub concurrent_sections: bool,
    /// Alchemical state; `None` evaluates full electrostatics.
    pub lambda: Option<f64>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            gradient: true,
            use_symmetry: true,
            concurrent_sections: false,
            lambda: None,
        }
    }
}

impl EvaluationConfig {
    /// Energy-only evaluation.
    pub fn energy_only() -> Self {
        Self {
            gradient: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_polarization_keyword() {
        assert_eq!(
            PolarizationMode::from_keyword("MUTUAL").unwrap(),
            PolarizationMode::Mutual
        );
        assert_eq!(
            PolarizationMode::from_keyword("direct").unwrap(),
            PolarizationMode::Direct
        );
        PolarizationMode::from_keyword("sor").unwrap_err();
    }

    #[test]
    fn test_mask_defaults() {
        let masks = MaskRules::from(&Keywords::default());
        assert_eq!(masks.m14, 0.4);
        assert_eq!(masks.m15, 0.8);
        assert_eq!(masks.p12, 0.0);
        assert_eq!(masks.d11, 0.0);
    }
}
