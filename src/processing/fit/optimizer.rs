// src/processing/fit/optimizer.rs
//! Nelder-Mead minimisation of a negative log-likelihood.
//!
//! Wraps `argmin` so the distribution families only have to supply the
//! objective and a starting point in unconstrained coordinates.

use argmin::core::{CostFunction, Executor, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;

use super::FitError;

/// Iteration cap of a single Nelder-Mead run.
const MAX_ITERS: u64 = 5000;
/// Runs restarted from the best vertex before giving up.
const MAX_RUNS: u32 = 4;
/// Simplex cost spread at termination, relative to the starting cost.
const REL_SD_TOLERANCE: f64 = 1e-9;
const INITIAL_STEP: f64 = 0.25;

/// Cost reported for parameters where the likelihood is not finite. Kept well
/// below `f64::MAX` so simplex statistics do not overflow.
const PENALTY: f64 = 1e300;

/// Objective in unconstrained parameter space.
pub(crate) trait NegLogLikelihood: Sync {
    fn nll(&self, theta: &[f64]) -> f64;
}

struct Objective<'a, F: NegLogLikelihood> {
    inner: &'a F,
}

impl<F: NegLogLikelihood> CostFunction for Objective<'_, F> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let value = self.inner.nll(theta);
        Ok(if value.is_finite() { value } else { PENALTY })
    }
}

/// Minimises `objective` starting from `start`, returning the best parameter
/// vector found.
///
/// A run stops once the spread of the simplex costs drops below
/// `REL_SD_TOLERANCE` times the magnitude of the starting cost. A run that
/// hits the iteration cap is restarted from its best vertex with a fresh
/// simplex.
pub(crate) fn minimize<F: NegLogLikelihood>(
    objective: &F,
    start: &[f64],
) -> Result<Vec<f64>, FitError> {
    let start_cost = objective.nll(start);
    let cost_scale = if start_cost.is_finite() {
        start_cost.abs().max(1.0)
    } else {
        1.0
    };
    let tolerance = REL_SD_TOLERANCE * cost_scale;

    let mut best = start.to_vec();
    for _ in 0..MAX_RUNS {
        match run_once(objective, &best, tolerance)? {
            RunOutcome::Converged(theta) => return Ok(theta),
            RunOutcome::Capped(theta) => best = theta,
        }
    }
    Err(FitError::NotConverged { iterations: MAX_ITERS * u64::from(MAX_RUNS) })
}

enum RunOutcome {
    Converged(Vec<f64>),
    Capped(Vec<f64>),
}

fn initial_simplex(start: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(start.len() + 1);
    simplex.push(start.to_vec());
    for i in 0..start.len() {
        let mut vertex = start.to_vec();
        vertex[i] += INITIAL_STEP;
        simplex.push(vertex);
    }
    simplex
}

fn run_once<F: NegLogLikelihood>(
    objective: &F,
    start: &[f64],
    tolerance: f64,
) -> Result<RunOutcome, FitError> {
    let solver = NelderMead::new(initial_simplex(start))
        .with_sd_tolerance(tolerance)
        .map_err(|e| FitError::Optimizer(e.to_string()))?;
    let result = Executor::new(Objective { inner: objective }, solver)
        .configure(|state| state.max_iters(MAX_ITERS))
        .run()
        .map_err(|e| FitError::Optimizer(e.to_string()))?;

    let state = result.state();
    if !state.best_cost.is_finite() || state.best_cost >= PENALTY {
        return Err(FitError::NonFinite);
    }
    let best = state.best_param.clone().ok_or(FitError::NonFinite)?;

    let capped = matches!(
        state.termination_status,
        TerminationStatus::Terminated(TerminationReason::MaxItersReached)
    );
    Ok(if capped { RunOutcome::Capped(best) } else { RunOutcome::Converged(best) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Bowl;

    impl NegLogLikelihood for Bowl {
        fn nll(&self, theta: &[f64]) -> f64 {
            (theta[0] - 1.5).powi(2) + 2.0 * (theta[1] + 0.5).powi(2)
        }
    }

    struct Nowhere;

    impl NegLogLikelihood for Nowhere {
        fn nll(&self, _theta: &[f64]) -> f64 {
            f64::NAN
        }
    }

    #[test]
    fn finds_quadratic_minimum() {
        let best = minimize(&Bowl, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(best[0], 1.5, epsilon = 1e-3);
        assert_relative_eq!(best[1], -0.5, epsilon = 1e-3);
    }

    /// Quadratic valley sitting on a large constant, where cost differences
    /// near the minimum fall below the resolution of an absolute tolerance.
    struct RaisedBowl;

    impl NegLogLikelihood for RaisedBowl {
        fn nll(&self, theta: &[f64]) -> f64 {
            1.0e6 + (theta[0] - 1.5).powi(2) + 2.0 * (theta[1] + 0.5).powi(2)
        }
    }

    /// Rosenbrock's narrow curved valley.
    struct LongValley;

    impl NegLogLikelihood for LongValley {
        fn nll(&self, theta: &[f64]) -> f64 {
            let (x, y) = (theta[0], theta[1]);
            (1.0 - x).powi(2) + 100.0 * (y - x * x).powi(2)
        }
    }

    #[test]
    fn tolerance_scales_with_cost() {
        let best = minimize(&RaisedBowl, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(best[0], 1.5, epsilon = 0.1);
        assert_relative_eq!(best[1], -0.5, epsilon = 0.1);
    }

    #[test]
    fn follows_curved_valley() {
        let best = minimize(&LongValley, &[-1.2, 1.0]).unwrap();
        assert_relative_eq!(best[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(best[1], 1.0, epsilon = 2e-2);
    }

    #[test]
    fn non_finite_objective_fails() {
        assert!(minimize(&Nowhere, &[0.0, 0.0]).is_err());
    }
}
