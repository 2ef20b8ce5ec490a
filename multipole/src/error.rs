#[derive(thiserror::Error, Debug)]
pub enum MultipoleError {
    /// The axis-atom list does not match what the frame style requires.
    #[error("Site {site}: frame {frame} requires {expected} axis atoms, found {found}")]
    BadAxisCount {
        site: usize,
        frame: &'static str,
        expected: &'static str,
        found: usize,
    },

    /// An axis atom may not reference the site itself.
    #[error("Site {site}: axis atom list references the site itself")]
    SelfReference { site: usize },

    /// The local quadrupole must be traceless.
    #[error("Site {site}: local quadrupole trace is {trace:e}")]
    TracedQuadrupole { site: usize, trace: f64 },

    /// Polarizable sites need a positive Thole width.
    #[error("Site {site}: polarizability {alpha} with non-positive damping width")]
    BadTholeWidth { site: usize, alpha: f64 },
}
