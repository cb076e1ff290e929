//! Position solvers: closed-form trilateration for the 1/2/3-anchor cases
//! and the 4-reference multilateration pipeline

pub mod closed_form;
pub mod multilateration;

pub use closed_form::{solve_one_anchor, solve_three_anchor, solve_two_anchor, ClosedFormError};
pub use multilateration::{gauss_newton, gauss_newton_refine, linear_least_squares, SolveError};
