//! Error-function special values and the Ewald coefficient selector.
//!
//! `erfc` follows W. J. Cody's rational Chebyshev approximation, accurate to full
//! double precision over the whole real line. The A&S polynomial used elsewhere in the
//! ecosystem tops out near 1e-7, which is not enough for the coefficient search below.

/// Coefficients for |x| ≤ 0.46875.
const A: [f64; 5] = [
    3.16112374387056560e0,
    1.13864154151050156e2,
    3.77485237685302021e2,
    3.20937758913846947e3,
    1.85777706184603153e-1,
];
const B: [f64; 4] = [
    2.36012909523441209e1,
    2.44024637934444173e2,
    1.28261652607737228e3,
    2.84423683343917062e3,
];

/// Coefficients for 0.46875 < |x| ≤ 4.0.
const C: [f64; 9] = [
    5.64188496988670089e-1,
    8.88314979438837594e0,
    6.61191906371416295e1,
    2.98635138197400131e2,
    8.81952221241769090e2,
    1.71204761263407058e3,
    2.05107837782607147e3,
    1.23033935479799725e3,
    2.15311535474403846e-8,
];
const D: [f64; 8] = [
    1.57449261107098347e1,
    1.17693950891312499e2,
    5.37181101862009858e2,
    1.62138957456669019e3,
    3.29079923573345963e3,
    4.36261909014324716e3,
    3.43936767414372164e3,
    1.23033935480374942e3,
];

/// Coefficients for |x| > 4.0.
const P: [f64; 6] = [
    3.05326634961232344e-1,
    3.60344899949804439e-1,
    1.25781726111229246e-1,
    1.60837851487422766e-2,
    6.58749161529837803e-4,
    1.63153871373020978e-2,
];
const Q: [f64; 5] = [
    2.56852019228982242e0,
    1.87295284992346047e0,
    5.27905102951428412e-1,
    6.05183413124413191e-2,
    2.33520497626869185e-3,
];

const SQRT_PI_INV: f64 = 5.6418958354775628695e-1;

/// The complementary error function.
pub fn erfc(x: f64) -> f64 {
    let y = x.abs();

    if y <= 0.46875 {
        return 1.0 - erf_small(x);
    }

    let result = if y <= 4.0 {
        let mut num = C[8] * y;
        let mut den = y;
        for i in 0..7 {
            num = (num + C[i]) * y;
            den = (den + D[i]) * y;
        }
        let ratio = (num + C[7]) / (den + D[7]);
        scaled_by_gaussian(y, ratio)
    } else {
        let y2inv = 1.0 / (y * y);
        let mut num = P[5] * y2inv;
        let mut den = y2inv;
        for i in 0..4 {
            num = (num + P[i]) * y2inv;
            den = (den + Q[i]) * y2inv;
        }
        let ratio = y2inv * (num + P[4]) / (den + Q[4]);
        scaled_by_gaussian(y, (SQRT_PI_INV - ratio) / y)
    };

    if x < 0.0 { 2.0 - result } else { result }
}

/// The error function.
pub fn erf(x: f64) -> f64 {
    if x.abs() <= 0.46875 {
        erf_small(x)
    } else {
        1.0 - erfc(x)
    }
}

fn erf_small(x: f64) -> f64 {
    let z = x * x;
    let mut num = A[4] * z;
    let mut den = z;
    for i in 0..3 {
        num = (num + A[i]) * z;
        den = (den + B[i]) * z;
    }
    x * (num + A[3]) / (den + B[3])
}

/// Evaluates `exp(-y²)·ratio` splitting y² to avoid cancellation, per Cody.
fn scaled_by_gaussian(y: f64, ratio: f64) -> f64 {
    let ysq = (y * 16.0).trunc() / 16.0;
    let del = (y - ysq) * (y + ysq);
    (-ysq * ysq).exp() * (-del).exp() * ratio
}

/// Selects the Ewald coefficient, in Å⁻¹, so that the real-space sum truncated at
/// `cutoff` drops below `precision`: the smallest α with `erfc(α·cutoff)/cutoff <
/// precision`, found by bisection.
pub fn ewald_coefficient(cutoff: f64, precision: f64) -> f64 {
    let target = precision * cutoff;

    let mut hi = 1.0;
    while erfc(hi * cutoff) >= target {
        hi *= 2.0;
    }
    let mut lo = 0.0;
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if erfc(mid * cutoff) >= target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_erfc_reference_values() {
        // Reference values from Abramowitz & Stegun tables.
        assert!((erfc(0.0) - 1.0).abs() < 1e-15);
        assert!((erfc(0.5) - 0.4795001221869535).abs() < 1e-14);
        assert!((erfc(1.0) - 0.15729920705028513).abs() < 1e-14);
        assert!((erfc(2.0) - 0.004677734981063127).abs() < 1e-14);
        assert!((erfc(-1.0) - (2.0 - 0.15729920705028513)).abs() < 1e-14);
    }

    #[test]
    fn test_erf_complements_erfc() {
        for &x in &[0.1, 0.3, 0.7, 1.5, 3.0, 4.5, 6.0] {
            assert!((erf(x) + erfc(x) - 1.0).abs() < 1e-14);
            assert!((erf(-x) + erf(x)).abs() < 1e-14);
        }
    }

    #[test]
    fn test_erfc_decays() {
        assert!(erfc(6.0) < 1e-16);
        assert!(erfc(6.0) > 0.0);
    }

    #[test]
    fn test_ewald_coefficient_meets_precision() {
        let off = 9.0;
        let alpha = ewald_coefficient(off, 1e-8);

        assert!(erfc(alpha * off) / off < 1e-8);
        // Just below the selected coefficient the bound must fail.
        assert!(erfc((alpha - 1e-3) * off) / off > 1e-8);
        // The conventional value for an 9 Å cutoff sits near 0.54 Å⁻¹.
        assert!(alpha > 0.4 && alpha < 0.7);
    }
}
