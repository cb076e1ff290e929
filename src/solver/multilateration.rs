//! Multilateration against exactly four reference points
//!
//! Stage A linearizes the four sphere equations by pairwise subtraction into
//! a 4x4 linear system and solves it exactly; Stage B refines that estimate
//! with undamped Gauss-Newton iteration on the range residuals. Both are
//! pure functions of (reference coordinates, measured distances).

use crate::core::Coordinate;
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use std::fmt;

/// Iteration cap for the Gauss-Newton refinement
const MAX_ITERATIONS: usize = 10;
/// Convergence threshold on the step norm, meters
const STEP_TOLERANCE: f64 = 1e-6;
/// Below this determinant magnitude the normal equations are singular
const SINGULARITY_GUARD: f64 = 1e-12;
/// Below this distance an estimate coincides with a reference point
const COINCIDENCE_GUARD: f64 = 1e-12;

/// Failure of the linear stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    /// The linearized system has no unique solution (degenerate geometry)
    SingularSystem,
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::SingularSystem => write!(f, "linearized system is singular"),
        }
    }
}

impl std::error::Error for SolveError {}

/// Stage A: closed-form position from four ranges via sphere-subtraction
/// linearization.
///
/// Each reference i contributes the row `[1, -2xi, -2yi, -2zi]` and the
/// right-hand side `si^2 - xi^2 - yi^2 - zi^2`; the unknowns are an
/// auxiliary scalar c = |p|^2 - followed by x, y, z. Exactly four references
/// are required: fewer under-determine the system, more would need a
/// least-squares solve. The system is solved with partial-pivot LU.
pub fn linear_least_squares(
    references: &[Coordinate; 4],
    distances: &[f64; 4],
) -> Result<Coordinate, SolveError> {
    let mut a = Matrix4::zeros();
    let mut b = Vector4::zeros();
    for (i, (r, &s)) in references.iter().zip(distances.iter()).enumerate() {
        a[(i, 0)] = 1.0;
        a[(i, 1)] = -2.0 * r.x;
        a[(i, 2)] = -2.0 * r.y;
        a[(i, 3)] = -2.0 * r.z;
        b[i] = s * s - r.x * r.x - r.y * r.y - r.z * r.z;
    }

    // X = [c; x; y; z]; the auxiliary c is discarded without a
    // consistency check against x^2 + y^2 + z^2
    let x = a.lu().solve(&b).ok_or(SolveError::SingularSystem)?;
    let estimate = Coordinate::new(x[1], x[2], x[3]);
    if !estimate.is_finite() {
        return Err(SolveError::SingularSystem);
    }
    Ok(estimate)
}

/// Stage B: Gauss-Newton refinement seeded from Stage A, with the centroid
/// of the references as fallback seed. Never fails: singular normal
/// equations or the iteration cap simply stop the refinement and the best
/// estimate so far is returned.
pub fn gauss_newton(references: &[Coordinate; 4], distances: &[f64; 4]) -> Coordinate {
    let seed = match linear_least_squares(references, distances) {
        Ok(est) if est.is_finite() => est,
        _ => Coordinate::centroid(references),
    };
    gauss_newton_refine(seed, references, distances).0
}

/// Refinement loop, exposed with its iteration count for convergence checks
pub fn gauss_newton_refine(
    seed: Coordinate,
    references: &[Coordinate; 4],
    distances: &[f64; 4],
) -> (Coordinate, usize) {
    let mut estimate = Vector3::new(seed.x, seed.y, seed.z);
    let mut iterations = 0;

    for _ in 0..MAX_ITERATIONS {
        iterations += 1;

        let mut jtj = Matrix3::zeros();
        let mut jtr = Vector3::zeros();
        for (r, &s) in references.iter().zip(distances.iter()) {
            let diff = estimate - Vector3::new(r.x, r.y, r.z);
            let range = diff.norm();
            let residual = range - s;
            // Zero Jacobian row when the estimate sits on a reference,
            // avoiding the division by zero
            let row = if range < COINCIDENCE_GUARD {
                Vector3::zeros()
            } else {
                diff / range
            };
            jtj += row * row.transpose();
            jtr += row * residual;
        }

        if jtj.determinant().abs() < SINGULARITY_GUARD {
            break;
        }
        let inv = match jtj.try_inverse() {
            Some(inv) => inv,
            None => break,
        };

        let delta = -(inv * jtr);
        estimate += delta;

        if delta.norm() < STEP_TOLERANCE {
            break;
        }
    }

    (Coordinate::new(estimate.x, estimate.y, estimate.z), iterations)
}
