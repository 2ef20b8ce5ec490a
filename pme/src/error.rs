#[derive(thiserror::Error, Debug)]
pub enum PmeError {
    /// Error from [`crystal`].
    #[error("Crystal error: {0}")]
    CrystalError(#[from] crystal::CrystalError),

    /// Error from [`multipole`].
    #[error("Multipole error: {0}")]
    MultipoleError(#[from] multipole::MultipoleError),

    /// The engine needs at least one site.
    #[error("Cannot build an engine over an empty site list")]
    NoSites,

    /// Site list and neighbor lists disagree on the system size.
    #[error("Neighbor lists cover {lists} atoms over {images} images, expected {atoms} atoms over {expected_images}")]
    ListMismatch {
        lists: usize,
        images: usize,
        atoms: usize,
        expected_images: usize,
    },

    /// An unrecognized polarization keyword.
    #[error("Unknown polarization mode '{0}'")]
    UnknownPolarization(Box<str>),

    /// Lambda must lie inside [0, 1].
    #[error("Lambda {0} outside [0, 1]")]
    BadLambda(f64),

    /// The SCF residual grew between iterations.
    #[error("Induced dipoles diverged: eps {eps:.3e} after {iterations} iterations (previous {previous:.3e})")]
    ScfDiverged {
        iterations: usize,
        eps: f64,
        previous: f64,
    },

    /// The SCF failed to reach the convergence target.
    #[error("Induced dipoles unconverged: eps {eps:.3e} after {iterations} iterations")]
    ScfUnconverged { iterations: usize, eps: f64 },

    /// Failure inside the reciprocal-space collaborator.
    #[error("Reciprocal space error: {0}")]
    ReciprocalError(Box<str>),
}
