#![allow(unused_macros)]
use rstest_reuse::template;

// This creates a testing "template" to allow for the injection of each solver
// backend. The OSQP backend links a C library, so it keeps out of the default
// test build and is exercised behind its feature flag instead.

#[template]
#[rstest]
#[case::clarabel(lfm_solver::clarabel::ClarabelSolver::default())]
pub fn all_backends(#[case] backend: impl lfm_solver::LpSolver) -> () {}
