/// Optimization direction of a [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Larger objective values are better.
    Maximize,
    /// Smaller objective values are better.
    Minimize,
}

/// How a constraint's weighted sum relates to its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The weighted sum must equal the right-hand side.
    Equal,
    /// The weighted sum may not exceed the right-hand side.
    LessEq,
    /// The weighted sum must reach at least the right-hand side.
    GreaterEq,
}

/// A decision variable: a box and an objective coefficient.
#[derive(Debug, Clone, Copy)]
pub struct Variable {
    /// Lower bound; negative infinity leaves the variable open below.
    pub lower: f64,
    /// Upper bound; positive infinity leaves the variable open above.
    pub upper: f64,
    /// Weight in the objective.
    pub objective: f64,
}

/// A linear constraint over a sparse subset of the variables.
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    /// `(variable index, coefficient)` pairs; a variable appears at most once.
    pub terms: Vec<(usize, f64)>,
    /// The comparison joining the weighted sum to the right-hand side.
    pub relation: Relation,
    /// The right-hand side.
    pub rhs: f64,
}

/// A sparse linear program in natural form: box-bounded variables, a linear
/// objective over them, and a list of relational constraints.
///
/// This is the seam between the auction formulation and the numerical
/// backends. The formulation side only ever appends variables and
/// constraints; the backend side lowers the finished program into its
/// solver's matrix layout.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    /// The decision variables, addressed by position.
    pub variables: Vec<Variable>,
    /// The constraints tying them together.
    pub constraints: Vec<LinearConstraint>,
    /// The optimization direction.
    pub sense: Sense,
}

impl LinearProgram {
    /// Creates an empty program with the given direction.
    pub fn new(sense: Sense) -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            sense,
        }
    }

    /// Appends a variable and returns its index.
    pub fn add_variable(&mut self, lower: f64, upper: f64, objective: f64) -> usize {
        self.variables.push(Variable {
            lower,
            upper,
            objective,
        });
        self.variables.len() - 1
    }

    /// Appends a constraint over previously created variables.
    pub fn add_constraint(&mut self, terms: Vec<(usize, f64)>, relation: Relation, rhs: f64) {
        self.constraints.push(LinearConstraint {
            terms,
            relation,
            rhs,
        });
    }

    /// Evaluates the objective at a point, regardless of direction.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(variable, x)| variable.objective * x)
            .sum()
    }
}

/// A primal solution to a [`LinearProgram`].
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// One value per variable, in the program's variable order.
    pub values: Vec<f64>,
    /// The objective evaluated at `values`.
    pub objective: f64,
}

/// Reasons a backend can fail to produce a solution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverFailure {
    /// The constraints admit no feasible point.
    #[error("the program is infeasible")]
    Infeasible,
    /// The objective improves without limit over the feasible set.
    #[error("the program is unbounded")]
    Unbounded,
    /// The backend stopped without a definitive answer.
    #[error("the backend terminated abnormally: {0}")]
    Abnormal(String),
}
