//! Reads keyword parameters from a specified location, or returns a default set if none is
//! found.

use std::path::PathBuf;

use config_file::FromConfigFile;
use serde::Deserialize;

/// Make it discoverable for both tests and binaries, even if they are run from a deeper
/// directory.
const PATH: [&str; 3] = ["./keywords.toml", "../keywords.toml", "../../keywords.toml"];

/// Force-field keyword set controlling the electrostatics evaluation.
///
/// See `keywords.toml` for descriptions.
#[derive(Deserialize, Debug, Clone)]
pub struct Keywords {
    pub ewald_cutoff: f64,
    pub ewald_precision: f64,
    pub polar_eps: f64,
    pub polar_sor: f64,
    pub max_scf_iterations: usize,
    /// One of `"mutual"`, `"direct"`, `"none"`.
    pub polarization: String,
    pub m12_mask: f64,
    pub m13_mask: f64,
    pub m14_mask: f64,
    pub m15_mask: f64,
    pub p12_mask: f64,
    pub p13_mask: f64,
    pub d11_mask: f64,
    pub perm_lambda_alpha: f64,
    pub perm_lambda_exponent: f64,
    pub polar_lambda_exponent: f64,
}

/// Default keywords if no file is found.
impl Default for Keywords {
    fn default() -> Self {
        Self {
            ewald_cutoff: crate::DEFAULT_EWALD_CUTOFF,
            ewald_precision: crate::DEFAULT_EWALD_PRECISION,
            polar_eps: crate::DEFAULT_POLAR_EPS,
            polar_sor: crate::DEFAULT_POLAR_SOR,
            max_scf_iterations: crate::MAX_SCF_ITERATIONS,
            polarization: "mutual".into(),
            m12_mask: crate::DEFAULT_M12_MASK,
            m13_mask: crate::DEFAULT_M13_MASK,
            m14_mask: crate::DEFAULT_M14_MASK,
            m15_mask: crate::DEFAULT_M15_MASK,
            p12_mask: crate::DEFAULT_P12_MASK,
            p13_mask: crate::DEFAULT_P13_MASK,
            d11_mask: crate::DEFAULT_D11_MASK,
            perm_lambda_alpha: crate::DEFAULT_PERM_LAMBDA_ALPHA,
            perm_lambda_exponent: crate::DEFAULT_PERM_LAMBDA_EXPONENT,
            polar_lambda_exponent: crate::DEFAULT_POLAR_LAMBDA_EXPONENT,
        }
    }
}

pub fn get_keywords() -> Keywords {
    for path_str in PATH {
        let path = PathBuf::from(path_str).canonicalize().unwrap_or_default();

        if path.exists() {
            match Keywords::from_config_file(&path) {
                Ok(file) => return file,
                Err(err) => {
                    eprintln!("Ignoring invalid keyword file '{}': {}", path.display(), err);
                }
            }
        }
    }
    Keywords::default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_keywords() {
        let keywords = Keywords::default();

        assert_eq!(keywords.polarization, "mutual");
        assert_eq!(keywords.m14_mask, 0.4);
        assert_eq!(keywords.max_scf_iterations, 1000);
    }
}
