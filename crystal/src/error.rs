#[derive(thiserror::Error, Debug)]
pub enum CrystalError {
    /// The lattice vectors do not span a positive volume.
    #[error("Singular lattice: the cell vectors span a volume of {volume}")]
    SingularLattice { volume: f64 },

    /// Cell angles must lie strictly between 0° and 180°.
    #[error("Invalid cell angle: {angle}°")]
    InvalidAngle { angle: f64 },

    /// A space group must contain at least the identity operator.
    #[error("Space group contains no symmetry operators")]
    EmptySpaceGroup,
}
