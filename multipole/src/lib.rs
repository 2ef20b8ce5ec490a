//! Per-site permanent multipoles and their local frames.
//!
//! A [`MultipoleSite`] carries the local-frame multipole tuple, the frame descriptor and
//! axis atoms that orient it, the Thole polarization parameters, and the covalent and
//! polarization-group topology that drives pair masking. [`rotate_site`] produces the
//! global-frame tensor per symmetry image; [`project_torque`] pushes a site torque back
//! onto the frame-defining atoms as forces.

mod error;
mod rotate;
mod site;
mod torque;

pub mod tensor;

pub use error::MultipoleError;
pub use rotate::{frame_rotation, rotate_site};
pub use site::{FrameStyle, MultipoleSite};
pub use torque::project_torque;

pub type Result<T> = std::result::Result<T, MultipoleError>;

/// A length-10 multipole tuple `{c, dx, dy, dz, Qxx, Qyy, Qzz, Qxy, Qxz, Qyz}`.
pub type Multipole = [f64; 10];

/// Polarizability, in Å³.
#[doc(alias = "f64")]
pub type Polarizability = f64;
