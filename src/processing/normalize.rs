// src/processing/normalize.rs
use statrs::distribution::{ContinuousCDF, Normal};

use super::fit::FittedModel;

/// Probabilities are kept this far from 0 and 1 so the inverse normal stays finite.
pub const PROB_EPS: f64 = 1e-12;

/// Standard-normal quantile of a cumulative probability.
pub fn probit(normal: &Normal, p: f64) -> f64 {
    normal.inverse_cdf(p.clamp(PROB_EPS, 1.0 - PROB_EPS))
}

/// Maps every finite value of `series` through the fitted CDF and the inverse
/// standard normal, writing into `out`. NaN inputs stay NaN.
pub fn standardize_into(model: &FittedModel, series: &[f64], out: &mut [f32]) {
    let normal = Normal::standard();
    for (dst, &x) in out.iter_mut().zip(series) {
        *dst = if x.is_nan() {
            f32::NAN
        } else {
            probit(&normal, model.cdf(x)) as f32
        };
    }
}
