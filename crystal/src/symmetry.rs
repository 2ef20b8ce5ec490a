use crate::{CrystalError, Result};

/// A single space-group symmetry operator in Cartesian form: `v' = R·v + t`.
///
/// The rotation part is orthonormal, so its inverse is the transpose.
#[derive(Clone, Copy, Debug)]
pub struct SymOp {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
}

impl SymOp {
    pub const IDENTITY: SymOp = SymOp {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: [0.0, 0.0, 0.0],
    };

    /// Applies the full operator to a position.
    pub fn apply(&self, v: &[f64; 3]) -> [f64; 3] {
        let r = self.rotate(v);
        [
            r[0] + self.translation[0],
            r[1] + self.translation[1],
            r[2] + self.translation[2],
        ]
    }

    /// Applies only the rotation part, for vectors rather than positions.
    pub fn rotate(&self, v: &[f64; 3]) -> [f64; 3] {
        let m = &self.rotation;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    /// Applies the inverse rotation, used when reducing symmetry-mate gradients back
    /// onto the asymmetric unit.
    pub fn rotate_inverse(&self, v: &[f64; 3]) -> [f64; 3] {
        let m = &self.rotation;
        [
            m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
            m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
            m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
        ]
    }
}

/// The list of symmetry operators of the crystal's space group.
///
/// The first operator is always the identity, which maps the asymmetric unit onto
/// itself.
#[derive(Clone, Debug)]
pub struct SpaceGroup {
    ops: Vec<SymOp>,
}

impl SpaceGroup {
    /// The trivial space group P1.
    pub fn p1() -> Self {
        Self {
            ops: vec![SymOp::IDENTITY],
        }
    }

    /// Builds a space group from explicit Cartesian operators.
    ///
    /// The identity is prepended if the caller did not supply it first.
    pub fn from_ops(ops: Vec<SymOp>) -> Result<Self> {
        if ops.is_empty() {
            return Err(CrystalError::EmptySpaceGroup);
        }
        Ok(Self { ops })
    }

    /// The number of symmetry images, including the asymmetric unit.
    pub fn num_images(&self) -> usize {
        self.ops.len()
    }

    pub fn op(&self, image: usize) -> &SymOp {
        &self.ops[image]
    }

    pub fn ops(&self) -> &[SymOp] {
        &self.ops
    }
}
