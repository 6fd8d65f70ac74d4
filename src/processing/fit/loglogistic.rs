// src/processing/fit/loglogistic.rs
use std::f64::consts::PI;

use super::optimizer::{minimize, NegLogLikelihood};
use super::{neg_log_likelihood, softplus, FitError, Standardizer};

const MAX_LOG_PARAM: f64 = 20.0;

/// Three-parameter log-logistic distribution.
///
/// `F(x) = 1 / (1 + (scale / (x - loc))^shape)` for `x > loc`, zero below.
/// The fit keeps `shape > 1` so the likelihood stays bounded as `loc`
/// approaches the sample minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLogistic {
    shape: f64,
    loc: f64,
    scale: f64,
}

impl LogLogistic {
    pub fn new(shape: f64, loc: f64, scale: f64) -> Option<Self> {
        let valid = shape.is_finite()
            && shape > 0.0
            && loc.is_finite()
            && scale.is_finite()
            && scale > 0.0;
        valid.then_some(Self { shape, loc, scale })
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    pub fn loc(&self) -> f64 {
        self.loc
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x <= self.loc {
            return 0.0;
        }
        let t = self.shape * ((x - self.loc) / self.scale).ln();
        (-softplus(-t)).exp()
    }

    pub fn log_pdf(&self, x: f64) -> f64 {
        if x <= self.loc {
            return f64::NEG_INFINITY;
        }
        let y = x - self.loc;
        let t = self.shape * (y / self.scale).ln();
        self.shape.ln() - y.ln() + t - 2.0 * softplus(t)
    }

    /// Maximum-likelihood fit on a standardized sample.
    ///
    /// Optimizes over `(ln(shape - 1), ln(min - loc), ln scale)`.
    pub(super) fn fit_standardized(
        z: &[f64],
        standardizer: Standardizer,
    ) -> Result<Self, FitError> {
        let min = z.iter().copied().fold(f64::INFINITY, f64::min);
        let objective = Likelihood { z, min };

        // Start one standard deviation below the minimum and match the
        // spread of the log-shifted sample.
        let log_y: Vec<f64> = z.iter().map(|&x| (x - min + 1.0).ln()).collect();
        let n = log_y.len() as f64;
        let mean = log_y.iter().sum::<f64>() / n;
        let sd = (log_y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let shape0 = if sd > 0.0 { PI / (3f64.sqrt() * sd) } else { 2.0 };
        let start = [(shape0 - 1.0).max(0.1).ln(), 0.0, mean];

        let theta = minimize(&objective, &start)?;
        let (shape, loc, scale) = objective.natural(&theta);

        Self::new(
            shape,
            standardizer.mean + standardizer.sd * loc,
            standardizer.sd * scale,
        )
        .ok_or(FitError::NonFinite)
    }
}

struct Likelihood<'a> {
    z: &'a [f64],
    min: f64,
}

impl Likelihood<'_> {
    /// Maps unconstrained coordinates to `(shape, loc, scale)`.
    fn natural(&self, theta: &[f64]) -> (f64, f64, f64) {
        (1.0 + theta[0].exp(), self.min - theta[1].exp(), theta[2].exp())
    }
}

impl NegLogLikelihood for Likelihood<'_> {
    fn nll(&self, theta: &[f64]) -> f64 {
        if theta.iter().any(|t| t.abs() > MAX_LOG_PARAM) {
            return f64::INFINITY;
        }
        let (shape, loc, scale) = self.natural(theta);
        let d = LogLogistic { shape, loc, scale };
        neg_log_likelihood(self.z, |x| d.log_pdf(x))
    }
}
