use config::Keywords;

use crate::{PmeError, Result};

/// Alchemical window parameters, sanitized from the keyword set.
#[derive(Debug, Clone, Copy)]
pub struct LambdaParameters {
    /// Softcore buffering strength for the permanent path.
    pub alpha: f64,
    /// Smoothstep exponent of the permanent window; values below 1 are replaced by
    /// the default with a warning.
    pub perm_exponent: f64,
    /// Smoothstep exponent of the polarization window.
    pub polar_exponent: f64,
}

impl LambdaParameters {
    pub fn from_keywords(keywords: &Keywords) -> Self {
        let perm_exponent = if keywords.perm_lambda_exponent < 1.0 {
            eprintln!(
                "Permanent lambda exponent {} below 1.0, using {}",
                keywords.perm_lambda_exponent,
                config::DEFAULT_PERM_LAMBDA_EXPONENT
            );
            config::DEFAULT_PERM_LAMBDA_EXPONENT
        } else {
            keywords.perm_lambda_exponent
        };
        Self {
            alpha: keywords.perm_lambda_alpha,
            perm_exponent,
            polar_exponent: keywords.polar_lambda_exponent.max(1.0),
        }
    }
}

/// The per-evaluation lambda state: smoothstep powers, the softcore buffer and their
/// first two lambda derivatives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LambdaFactors {
    pub lpow_perm: f64,
    pub dlpow_perm: f64,
    pub d2lpow_perm: f64,
    pub lpow_pol: f64,
    pub dlpow_pol: f64,
    pub d2lpow_pol: f64,
    /// Softcore distance buffer `α·(1-λ)²`, added to r² of soft pairs.
    pub lalpha: f64,
    pub dlalpha: f64,
    pub d2lalpha: f64,
}

impl LambdaFactors {
    /// Full electrostatics: unit windows, no buffering.
    pub const UNITY: LambdaFactors = LambdaFactors {
        lpow_perm: 1.0,
        dlpow_perm: 0.0,
        d2lpow_perm: 0.0,
        lpow_pol: 1.0,
        dlpow_pol: 0.0,
        d2lpow_pol: 0.0,
        lalpha: 0.0,
        dlalpha: 0.0,
        d2lalpha: 0.0,
    };

    pub fn new(lambda: f64, params: &LambdaParameters) -> Result<Self> {
        if !(0.0..=1.0).contains(&lambda) {
            return Err(PmeError::BadLambda(lambda));
        }
        let (lpow_perm, dlpow_perm, d2lpow_perm) = power_window(lambda, params.perm_exponent);
        let (lpow_pol, dlpow_pol, d2lpow_pol) = power_window(lambda, params.polar_exponent);
        let one_minus = 1.0 - lambda;
        Ok(Self {
            lpow_perm,
            dlpow_perm,
            d2lpow_perm,
            lpow_pol,
            dlpow_pol,
            d2lpow_pol,
            lalpha: params.alpha * one_minus * one_minus,
            dlalpha: -2.0 * params.alpha * one_minus,
            d2lalpha: 2.0 * params.alpha,
        })
    }
}

/// `λ^e` and its first two derivatives, with the λ → 0 limits handled explicitly.
fn power_window(lambda: f64, exponent: f64) -> (f64, f64, f64) {
    let value = lambda.powf(exponent);
    let first = if lambda > 0.0 || exponent >= 1.0 {
        exponent * lambda.powf(exponent - 1.0)
    } else {
        0.0
    };
    let second = if lambda > 0.0 || exponent >= 2.0 {
        exponent * (exponent - 1.0) * lambda.powf(exponent - 2.0)
    } else {
        0.0
    };
    (value, first, second)
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> LambdaParameters {
        LambdaParameters {
            alpha: 2.0,
            perm_exponent: 2.0,
            polar_exponent: 3.0,
        }
    }

    #[test]
    fn test_endpoints() {
        let start = LambdaFactors::new(0.0, &params()).unwrap();
        assert_eq!(start.lpow_perm, 0.0);
        assert_eq!(start.lpow_pol, 0.0);
        assert_eq!(start.lalpha, 2.0);

        let end = LambdaFactors::new(1.0, &params()).unwrap();
        assert_eq!(end.lpow_perm, 1.0);
        assert_eq!(end.lpow_pol, 1.0);
        assert_eq!(end.lalpha, 0.0);
        assert_eq!(end.dlalpha, 0.0);
    }

    #[test]
    fn test_out_of_range_rejected() {
        LambdaFactors::new(-0.1, &params()).unwrap_err();
        LambdaFactors::new(1.1, &params()).unwrap_err();
    }

    #[test]
    fn test_smoothstep_derivative_consistency() {
        let p = params();
        let h = 1e-6;
        for &l in &[0.2, 0.5, 0.8] {
            let lo = LambdaFactors::new(l - h, &p).unwrap();
            let hi = LambdaFactors::new(l + h, &p).unwrap();
            let mid = LambdaFactors::new(l, &p).unwrap();
            let numeric = (hi.lpow_perm - lo.lpow_perm) / (2.0 * h);
            assert!((numeric - mid.dlpow_perm).abs() < 1e-6);
            let numeric = (hi.lalpha - lo.lalpha) / (2.0 * h);
            assert!((numeric - mid.dlalpha).abs() < 1e-6);
        }
    }

    #[test]
    fn test_low_exponent_sanitized() {
        let mut keywords = Keywords::default();
        keywords.perm_lambda_exponent = 0.5;
        let p = LambdaParameters::from_keywords(&keywords);
        assert_eq!(p.perm_exponent, config::DEFAULT_PERM_LAMBDA_EXPONENT);
    }
}
