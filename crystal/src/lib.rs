//! Periodic-boundary geometry: the unit cell, its reciprocal lattice, minimum-image
//! displacements and space-group symmetry operators.
//!
//! An aperiodic system is the degenerate case of a [`UnitCell`] with a single identity
//! symmetry operator and an `image` that leaves displacements untouched.

mod cell;
mod error;
mod symmetry;

pub use cell::UnitCell;
pub use error::CrystalError;
pub use symmetry::{SpaceGroup, SymOp};

pub type Result<T> = std::result::Result<T, CrystalError>;

/// Length, in Å.
#[doc(alias = "f64")]
pub type Angstrom = f64;
