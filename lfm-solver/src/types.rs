mod program;
pub use program::*;

mod pricing;
pub use pricing::*;

mod wdp;
pub use wdp::*;

mod outcome;
pub use outcome::*;

/// The LpSolver trait defines the interface for linear-programming backends.
///
/// The auction layer formulates winner determination as a sparse linear
/// program; a backend lowers that program into whatever matrix form its
/// solver expects, runs it, and hands back the primal point. Implementations
/// may use different algorithms with varying performance and precision
/// characteristics.
pub trait LpSolver {
    /// The configuration type for this backend
    type Settings;

    /// Create a new instance with the provided settings
    fn new(settings: Self::Settings) -> Self;

    /// Solve the program, returning the optimal point or the reason there
    /// is none
    fn solve(&self, program: &LinearProgram) -> Result<LpSolution, SolverFailure>;
}
