//! Particle-mesh Ewald electrostatics for polarizable atomic multipoles.
//!
//! The engine splits the Coulomb sum into a damped real-space pair sum, a reciprocal
//! convolution handled by an external [`ReciprocalSpace`] collaborator, and analytic
//! self terms. Induced dipoles are converged by successive over-relaxation against
//! the total field. All real-space regions are data-parallel over the asymmetric
//! unit with per-thread accumulators.

mod energy;
mod engine;
mod error;
mod ewald;
mod field;
mod lambda;
mod mutual;
mod neighbor;
mod options;
mod recip;
mod scf;

pub mod math;

pub use engine::{EnergyReport, Pme};
pub use error::PmeError;
pub use ewald::EwaldParameters;
pub use lambda::LambdaParameters;
pub use neighbor::NeighborLists;
pub use options::{EvaluationConfig, MaskRules, PolarizationMode, ScfOptions};
pub use recip::{GeneralizedKirkwood, NullReciprocal, ReciprocalSpace};
pub use scf::{ScfOutcome, ScfStatus};

pub type Result<T> = std::result::Result<T, PmeError>;

/// Truncated Taylor expansion of the potential at an atom, indexed by monomial powers
/// up to third order (see [`multipole::tensor`]).
pub type PhiTensor = [f64; 20];

pub use crystal::Angstrom;

/// Energy, in kcal/mol.
#[doc(alias = "f64")]
pub type KcalPerMol = f64;
