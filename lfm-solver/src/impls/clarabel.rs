use crate::{LinearProgram, LpSolution, LpSolver, Relation, Sense, SolverFailure};
use clarabel::{algebra::*, solver::*};

pub struct ClarabelSolver(DefaultSettings<f64>);

impl Default for ClarabelSolver {
    fn default() -> Self {
        let mut settings = DefaultSettings::default();
        settings.verbose = false;
        Self(settings)
    }
}

impl LpSolver for ClarabelSolver {
    type Settings = DefaultSettings<f64>;

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

        // Clarabel handles constraints via a cone specification, e.g. Ax + s = b,
        // where s is a cone. Equalities go first so the zero cone is one
        // contiguous block; inequalities follow as s >= 0, with >= rows negated
        // into <= form.
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut b = Vec::new();

        for constraint in &program.constraints {
            if constraint.relation != Relation::Equal {
                continue;
            }
            let row = b.len();
            b.push(constraint.rhs);
            for &(var, coeff) in &constraint.terms {
                columns[var].push((row, coeff));
            }
        }
        let nzero = b.len();

        for constraint in &program.constraints {
            let flip = match constraint.relation {
                Relation::Equal => continue,
                Relation::LessEq => 1.0,
                Relation::GreaterEq => -1.0,
            };
            let row = b.len();
            b.push(flip * constraint.rhs);
            for &(var, coeff) in &constraint.terms {
                columns[var].push((row, flip * coeff));
            }
        }

        // Clarabel minimizes, so a maximization flips the linear term.
        let sign = match program.sense {
            Sense::Maximize => -1.0,
            Sense::Minimize => 1.0,
        };

        // Clarabel's matrix input is in the form of CSC, so we handle the memory
        // representation carefully: per column, the general rows (already in
        // ascending order) and then the variable's own bounds. The signs on the
        // lower bounds are wonky because we have to use s >= 0 as the cone
        // specification.
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
            if variable.lower.is_finite() {
                a_nzval.push(-1.0);
                a_rowval.push(b.len());
                b.push(-variable.lower);
            }
            if variable.upper.is_finite() {
                a_nzval.push(1.0);
                a_rowval.push(b.len());
                b.push(variable.upper);
            }
        }

        // We need to polish off the CSC matrix
        a_colptr.push(a_nzval.len());

        let a_matrix = CscMatrix {
            m: b.len(),
            n,
            colptr: a_colptr,
            rowval: a_rowval,
            nzval: a_nzval,
        };

        // The objective has no quadratic part
        let p_matrix = CscMatrix {
            m: n,
            n,
            colptr: vec![0; n + 1],
            rowval: Vec::new(),
            nzval: Vec::new(),
        };

        let cones = [ZeroConeT(nzero), NonnegativeConeT(b.len() - nzero)];

        // Now we can solve!
        let mut solver = DefaultSolver::new(&p_matrix, &q, &a_matrix, &b, &cones, self.0.clone());
        solver.solve();

        match &solver.solution.status {
            SolverStatus::Solved => {
                let values = solver.solution.x.clone();
                // Recompute the objective in the program's own sense; the
                // solver's report is sign-flipped for maximizations.
                let objective = program.objective_value(&values);
                Ok(LpSolution { values, objective })
            }
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                Err(SolverFailure::Infeasible)
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                Err(SolverFailure::Unbounded)
            }
            status => Err(SolverFailure::Abnormal(format!("{status:?}"))),
        }
    }
}
