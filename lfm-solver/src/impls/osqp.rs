use crate::{LinearProgram, LpSolution, LpSolver, Relation, Sense, SolverFailure};
use core::f64;
use osqp::{CscMatrix, Problem, Settings, Status};

/// A backend that uses the OSQP (Operator Splitting Quadratic Program) solver
/// to clear the market.
///
/// OSQP uses the Alternating Direction Method of Multipliers (ADMM) approach,
/// which can be faster than interior point methods for large-scale problems,
/// though sometimes with lower precision.
pub struct OsqpSolver(Settings);

impl Default for OsqpSolver {
    fn default() -> Self {
        Self(Settings::default().verbose(false).polish(true))
    }
}

impl LpSolver for OsqpSolver {
    type Settings = Settings;

    fn new(settings: Self::Settings) -> Self {
        Self(settings)
    }

    fn solve(&self, program: &LinearProgram) -> Result<LpSolution, SolverFailure> {
        if program.variables.is_empty() {
            return Ok(LpSolution {
                values: Vec::new(),
                objective: 0.0,
            });
        }

        let n = program.variables.len();

        // OSQP handles constraints via a box specification, e.g. lb <= Ax <= ub,
        // where equality is handled via setting lb[i] = ub[i].
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut lb = Vec::new();
        let mut ub = Vec::new();

        for constraint in &program.constraints {
            let row = lb.len();
            match constraint.relation {
                Relation::Equal => {
                    lb.push(constraint.rhs);
                    ub.push(constraint.rhs);
                }
                Relation::LessEq => {
                    lb.push(f64::NEG_INFINITY);
                    ub.push(constraint.rhs);
                }
                Relation::GreaterEq => {
                    lb.push(constraint.rhs);
                    ub.push(f64::INFINITY);
                }
            }
            for &(var, coeff) in &constraint.terms {
                columns[var].push((row, coeff));
            }
        }

        // OSQP minimizes, so a maximization flips the linear term.
        let sign = match program.sense {
            Sense::Maximize => -1.0,
            Sense::Minimize => 1.0,
        };

        // OSQP's matrix input is in the form of CSC, so we handle the memory
        // representation carefully: per column, the general rows and then the
        // variable's own box row. Infinite bounds pass straight through.
        let mut q = Vec::with_capacity(n);
        let mut a_nzval = Vec::new();
        let mut a_rowval = Vec::new();
        let mut a_colptr = Vec::with_capacity(n + 1);

        for (variable, entries) in program.variables.iter().zip(columns) {
            q.push(sign * variable.objective);
            a_colptr.push(a_nzval.len());

            for (row, coeff) in entries {
                a_nzval.push(coeff);
                a_rowval.push(row);
            }

            a_nzval.push(1.0);
            a_rowval.push(lb.len());
            lb.push(variable.lower);
            ub.push(variable.upper);
        }

        // We need to polish off the CSC matrix
        a_colptr.push(a_nzval.len());

        let a_matrix = CscMatrix {
            nrows: lb.len(),
            ncols: n,
            indptr: a_colptr.into(),
            indices: a_rowval.into(),
            data: a_nzval.into(),
        };

        // The objective has no quadratic part
        let p_matrix = CscMatrix {
            nrows: n,
            ncols: n,
            indptr: vec![0; n + 1].into(),
            indices: Vec::new().into(),
            data: Vec::new().into(),
        };

        // Now we can solve!
        let mut solver = Problem::new(&p_matrix, &q, &a_matrix, &lb, &ub, &self.0)
            .expect("unable to setup problem");
        solver.warm_start_x(&vec![0.0; n]);

        match solver.solve() {
            Status::Solved(solution) => {
                let values = solution.x().to_vec();
                let objective = program.objective_value(&values);
                Ok(LpSolution { values, objective })
            }
            // An inaccurate infeasibility certificate is still a verdict; an
            // inaccurate solution is not.
            Status::PrimalInfeasible(_) | Status::PrimalInfeasibleInaccurate(_) => {
                Err(SolverFailure::Infeasible)
            }
            Status::DualInfeasible(_) | Status::DualInfeasibleInaccurate(_) => {
                Err(SolverFailure::Unbounded)
            }
            Status::SolvedInaccurate(_) => Err(SolverFailure::Abnormal("SolvedInaccurate".into())),
            Status::MaxIterationsReached(_) => {
                Err(SolverFailure::Abnormal("MaxIterationsReached".into()))
            }
            Status::TimeLimitReached(_) => Err(SolverFailure::Abnormal("TimeLimitReached".into())),
            Status::NonConvex(_) => Err(SolverFailure::Abnormal("NonConvex".into())),
            _ => Err(SolverFailure::Abnormal("osqp terminated without a solution".into())),
        }
    }
}
