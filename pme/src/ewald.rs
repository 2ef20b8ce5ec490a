use crate::math::erfc;

/// Ewald splitting parameters and the damped-kernel scalar recursion.
///
/// An `aewald` of zero disables reciprocal space entirely: the `bn` scalars then
/// collapse to the bare Coulomb family `(2k-1)!!/r^(2k+1)` and the engine degrades to
/// direct-space electrostatics, which is how aperiodic systems are handled.
#[derive(Clone, Copy, Debug)]
pub struct EwaldParameters {
    /// The Ewald screening coefficient α, in Å⁻¹.
    pub aewald: f64,
    /// Real-space cutoff, in Å.
    pub off: f64,
    /// Squared cutoff.
    pub off2: f64,
    /// Recursion coefficients `a_k = (2α²)^k / (√π·α)`.
    an: [f64; 6],
}

impl EwaldParameters {
    pub fn new(aewald: f64, off: f64) -> Self {
        let mut an = [0.0; 6];
        if aewald > 0.0 {
            let alsq2 = 2.0 * aewald * aewald;
            let mut seed = 1.0 / (std::f64::consts::PI.sqrt() * aewald);
            for a in an.iter_mut() {
                seed *= alsq2;
                *a = seed;
            }
        }
        Self {
            aewald,
            off,
            off2: off * off,
            an,
        }
    }

    /// The damped interaction scalars `bn0..bn[N-1]`.
    ///
    /// `bn0 = erfc(αr)/r`, `bn_{k+1} = ((2k+1)·bn_k + a_k·exp(-α²r²))/r²`.
    pub fn bn<const N: usize>(&self, r: f64, r2: f64) -> [f64; N] {
        let mut bn = [0.0; N];
        let ralpha = self.aewald * r;
        bn[0] = erfc(ralpha) / r;
        let exp2a = (-ralpha * ralpha).exp();
        for k in 1..N {
            bn[k] = ((2 * k - 1) as f64 * bn[k - 1] + self.an[k - 1] * exp2a) / r2;
        }
        bn
    }
}

/// Thole damping scales and their spatial derivatives for one pair.
///
/// `scale_n = 1` means fully undamped; the derivative vectors vanish in that case.
#[derive(Clone, Copy, Debug)]
pub struct TholeScales {
    pub scale3: f64,
    pub scale5: f64,
    pub scale7: f64,
    pub ddsc3: [f64; 3],
    pub ddsc5: [f64; 3],
    pub ddsc7: [f64; 3],
}

impl TholeScales {
    pub const UNDAMPED: TholeScales = TholeScales {
        scale3: 1.0,
        scale5: 1.0,
        scale7: 1.0,
        ddsc3: [0.0; 3],
        ddsc5: [0.0; 3],
        ddsc7: [0.0; 3],
    };

    /// Evaluates the damping of the pair `(i, k)` at displacement `(xr, yr, zr)`.
    ///
    /// `width` is `pdamp_i·pdamp_k` and `pgamma` is `min(thole_i, thole_k)`. Below the
    /// numerical floor (`damp < -50`) the exponential underflows and the scales are
    /// exactly one.
    pub fn evaluate(r: f64, r2: f64, dx: &[f64; 3], width: f64, pgamma: f64) -> Self {
        if width == 0.0 {
            return Self::UNDAMPED;
        }
        let damp = -pgamma * (r / width).powi(3);
        if damp <= -50.0 {
            return Self::UNDAMPED;
        }

        let expdamp = damp.exp();
        let scale3 = 1.0 - expdamp;
        let scale5 = 1.0 - (1.0 - damp) * expdamp;
        let scale7 = 1.0 - (1.0 - damp + 0.6 * damp * damp) * expdamp;

        let temp3 = -3.0 * damp * expdamp / r2;
        let temp5 = -damp;
        let temp7 = -0.2 - 0.6 * damp;
        let ddsc3 = [temp3 * dx[0], temp3 * dx[1], temp3 * dx[2]];
        let ddsc5 = [temp5 * ddsc3[0], temp5 * ddsc3[1], temp5 * ddsc3[2]];
        let ddsc7 = [temp7 * ddsc5[0], temp7 * ddsc5[1], temp7 * ddsc5[2]];

        Self {
            scale3,
            scale5,
            scale7,
            ddsc3,
            ddsc5,
            ddsc7,
        }
    }
}
