//! Numeric constants and keyword configuration shared by every crate.

mod keywords;

pub use keywords::{Keywords, get_keywords};

// ==================== Units

/// Conversion factor from electrostatic units (e²/Å) to kcal/mol.
pub const ELECTRIC: f64 = 332.063713;

/// Conversion factor from e·Å to Debye. Used for the SCF convergence norm.
pub const DEBYE: f64 = 4.80321;

// ==================== Ewald

/// Default real-space cutoff for the Ewald pair sum, in Å.
pub const DEFAULT_EWALD_CUTOFF: f64 = 9.0;

/// The targeted value of `erfc(α·off)/off` when selecting the Ewald coefficient.
pub const DEFAULT_EWALD_PRECISION: f64 = 1e-8;

// ==================== SCF

/// Convergence threshold for the induced dipole RMS change, in Debye.
pub const DEFAULT_POLAR_EPS: f64 = 1e-6;

/// Successive over-relaxation factor for the induced dipole iteration.
pub const DEFAULT_POLAR_SOR: f64 = 0.70;

/// The maximum amount of SCF iterations before the evaluation is abandoned.
pub const MAX_SCF_ITERATIONS: usize = 1000;

// ==================== Masking

/// Permanent multipole masks for 1-2, 1-3, 1-4 and 1-5 covalent partners.
pub const DEFAULT_M12_MASK: f64 = 0.0;
pub const DEFAULT_M13_MASK: f64 = 0.0;
pub const DEFAULT_M14_MASK: f64 = 0.4;
pub const DEFAULT_M15_MASK: f64 = 0.8;

/// Polarization masks for 1-2 and 1-3 covalent partners.
pub const DEFAULT_P12_MASK: f64 = 0.0;
pub const DEFAULT_P13_MASK: f64 = 0.0;

/// Polarization mask for 1-4 partners inside the same polarization group.
pub const INTRA14_MASK: f64 = 0.5;

/// Direct-field mask for members of the same polarization group.
pub const DEFAULT_D11_MASK: f64 = 0.0;

// ==================== Alchemistry

/// Softcore buffering strength for the permanent lambda path.
pub const DEFAULT_PERM_LAMBDA_ALPHA: f64 = 2.0;

/// Smoothstep exponent of the permanent lambda window. Values below 1.0 are
/// rejected and replaced by this default.
pub const DEFAULT_PERM_LAMBDA_EXPONENT: f64 = 2.0;

/// Smoothstep exponent of the polarization lambda window.
pub const DEFAULT_POLAR_LAMBDA_EXPONENT: f64 = 3.0;

// ==================== Misc

/// Style template used by the demo binaries' progress bars.
pub const PBAR_STYLE: &str =
    "[{elapsed_precise}] {wide_bar:.cyan/blue} {spinner} {pos:>4}/{len:4} {msg}";
