use derive_is_enum_variant::is_enum_variant;
use serde::Deserialize;

use crate::tensor::quadrupole_trace;
use crate::{Multipole, MultipoleError, Polarizability, Result};

const TRACE_TOL: f64 = 1e-10;

/// Rule for constructing the local orthonormal frame of a site from its axis atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, is_enum_variant)]
pub enum FrameStyle {
    /// z along the first axis atom, x toward the second, Gram-Schmidt orthogonalized.
    ZThenX,
    /// z along the bisector of the two axis atoms.
    Bisector,
    /// z along the first axis atom, x toward the bisector of the other two.
    ZThenBisector,
    /// z along the mean of three unit vectors (e.g. ammonium nitrogen).
    ThreeFold,
    /// No orientation: only the charge survives (monatomic ions).
    #[default]
    None,
}

impl FrameStyle {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            FrameStyle::ZThenX => "Z-then-X",
            FrameStyle::Bisector => "Bisector",
            FrameStyle::ZThenBisector => "Z-then-Bisector",
            FrameStyle::ThreeFold => "3-Fold",
            FrameStyle::None => "None",
        }
    }
}

/// A single multipole site of the asymmetric unit.
///
/// All topology lists hold asymmetric-unit atom indices. The local multipole follows
/// the `{c, d, Q}` packing of [`crate::tensor`], with the quadrupole stored full and
/// traceless; the implicit factor of one third is folded in by the energy kernels.
#[derive(Debug, Clone)]
pub struct MultipoleSite {
    /// Index of the site in the asymmetric unit.
    pub index: usize,
    /// The local-frame permanent multipole.
    pub multipole: Multipole,
    /// The frame construction rule.
    pub frame: FrameStyle,
    /// Axis atom indices defining the frame: z, x, and optionally a third.
    pub axis: Vec<usize>,

    /// Dipole polarizability, in Å³.
    pub polarizability: Polarizability,
    /// Thole damping width, conventionally `polarizability^(1/6)`.
    pub pdamp: f64,
    /// Thole damping strength.
    pub thole: f64,

    /// Polarization group members, including the site itself.
    pub ip11: Vec<usize>,
    /// Atoms 1-2 to the site's polarization group.
    pub ip12: Vec<usize>,
    /// Atoms 1-3 to the site's polarization group.
    pub ip13: Vec<usize>,

    /// Covalent partners by bond separation.
    pub bonded12: Vec<usize>,
    pub bonded13: Vec<usize>,
    pub bonded14: Vec<usize>,
    pub bonded15: Vec<usize>,

    /// Alchemical softcore flag.
    pub soft: bool,
}

impl MultipoleSite {
    /// Creates a site with no polarization and no covalent topology.
    pub fn new(index: usize, multipole: Multipole, frame: FrameStyle, axis: &[usize]) -> Self {
        Self {
            index,
            multipole,
            frame,
            axis: axis.to_vec(),
            polarizability: 0.0,
            pdamp: 0.0,
            thole: 0.0,
            ip11: vec![index],
            ip12: Vec::new(),
            ip13: Vec::new(),
            bonded12: Vec::new(),
            bonded13: Vec::new(),
            bonded14: Vec::new(),
            bonded15: Vec::new(),
            soft: false,
        }
    }

    /// Sets the Thole polarization parameters, deriving the conventional damping width.
    pub fn polarize(mut self, polarizability: f64, thole: f64) -> Self {
        self.polarizability = polarizability;
        self.pdamp = polarizability.powf(1.0 / 6.0);
        self.thole = thole;
        self
    }

    /// Checks the axis-atom list against the frame style and the local quadrupole
    /// trace. Fatal at engine construction.
    pub fn validate(&self) -> Result<()> {
        let found = self.axis.len();
        let ok = match self.frame {
            FrameStyle::ZThenX => found == 2 || found == 3,
            FrameStyle::Bisector => found == 2,
            FrameStyle::ZThenBisector | FrameStyle::ThreeFold => found == 3,
            FrameStyle::None => found <= 1,
        };
        if !ok {
            return Err(MultipoleError::BadAxisCount {
                site: self.index,
                frame: self.frame.name(),
                expected: match self.frame {
                    FrameStyle::ZThenX => "2 or 3",
                    FrameStyle::Bisector => "2",
                    FrameStyle::ZThenBisector | FrameStyle::ThreeFold => "3",
                    FrameStyle::None => "0 or 1",
                },
                found,
            });
        }
        if self.axis.contains(&self.index) {
            return Err(MultipoleError::SelfReference { site: self.index });
        }

        let trace = quadrupole_trace(&self.multipole);
        if trace.abs() > TRACE_TOL {
            return Err(MultipoleError::TracedQuadrupole {
                site: self.index,
                trace,
            });
        }

        if self.polarizability > 0.0 && self.pdamp <= 0.0 {
            return Err(MultipoleError::BadTholeWidth {
                site: self.index,
                alpha: self.polarizability,
            });
        }
        Ok(())
    }
}
