// src/processing/pixel.rs
//! SPEI for a single pixel: gate, accumulate, fit, normalize.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::accumulate::{accumulate_into, count_missing};
use super::fit::{fit, Family, FitError};
use super::normalize::standardize_into;
use crate::timescale::Timescale;

/// Default number of missing months a pixel may have and still be evaluated.
pub const DEFAULT_MAX_MISSING: usize = 12;

/// How accumulated windows that touch a missing month are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GapPolicy {
    /// Any incomplete window leaves the whole pixel/timescale missing.
    #[default]
    SkipSeries,
    /// Fit on complete windows only and leave just the incomplete ones missing.
    MaskWindows,
}

/// Why a pixel/timescale carries no index values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("{missing} missing months exceed the limit of {limit}")]
    InsufficientData { missing: usize, limit: usize },

    #[error("accumulated series has incomplete windows")]
    WindowGap,

    #[error("fit failed: {0}")]
    FitFailure(#[from] FitError),
}

/// Parameters shared by every pixel of a run.
#[derive(Debug, Clone)]
pub struct IndexParams {
    pub scales: Vec<Timescale>,
    pub max_missing: usize,
    pub family: Family,
    pub gap_policy: GapPolicy,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            scales: Timescale::ALL.to_vec(),
            max_missing: DEFAULT_MAX_MISSING,
            family: Family::default(),
            gap_policy: GapPolicy::default(),
        }
    }
}

/// Per-worker buffers reused across pixels.
#[derive(Debug, Default)]
pub struct Scratch {
    accumulated: Vec<f64>,
    complete: Vec<f64>,
}

/// Outcome of one pixel, one entry per configured timescale.
pub type PixelOutcome = Vec<Result<(), SkipReason>>;

/// Computes every configured timescale for one pixel.
///
/// `out` holds one `series.len()`-long block per entry of `params.scales`,
/// in the same order, and must be pre-filled with NaN. Values for timescale
/// `w` are written at absolute month indices `w - 1..`; anything that is not
/// computed stays NaN.
pub fn compute_pixel_into(
    series: &[f64],
    params: &IndexParams,
    scratch: &mut Scratch,
    out: &mut [f32],
) -> PixelOutcome {
    let months = series.len();
    debug_assert_eq!(out.len(), months * params.scales.len());

    let missing = count_missing(series);
    if missing > params.max_missing {
        let reason = SkipReason::InsufficientData { missing, limit: params.max_missing };
        return vec![Err(reason); params.scales.len()];
    }

    params
        .scales
        .iter()
        .zip(out.chunks_mut(months.max(1)))
        .map(|(&scale, block)| {
            let window = scale.window();
            accumulate_into(series, window, &mut scratch.accumulated);
            let first = window.min(months + 1) - 1;
            normalize_scale(
                &scratch.accumulated,
                params,
                &mut scratch.complete,
                &mut block[first..],
            )
        })
        .collect()
}

fn normalize_scale(
    accumulated: &[f64],
    params: &IndexParams,
    complete: &mut Vec<f64>,
    out: &mut [f32],
) -> Result<(), SkipReason> {
    complete.clear();
    complete.extend(accumulated.iter().copied().filter(|v| !v.is_nan()));
    if complete.len() < accumulated.len() && params.gap_policy == GapPolicy::SkipSeries {
        return Err(SkipReason::WindowGap);
    }

    let model = fit(params.family, complete)?;
    standardize_into(&model, accumulated, out);
    Ok(())
}

/// Index values for one pixel, one full-length series per configured timescale.
#[derive(Debug, Clone)]
pub struct PixelIndices {
    pub values: Vec<Vec<f32>>,
    pub outcomes: PixelOutcome,
}

impl PixelIndices {
    /// Values for `scale`, if it was configured.
    pub fn get(&self, scale: Timescale, params: &IndexParams) -> Option<&[f32]> {
        let pos = params.scales.iter().position(|&s| s == scale)?;
        Some(&self.values[pos])
    }
}

/// Allocating convenience wrapper around [`compute_pixel_into`].
pub fn compute_indices(series: &[f64], params: &IndexParams) -> PixelIndices {
    let months = series.len();
    let mut out = vec![f32::NAN; months * params.scales.len()];
    let outcomes = compute_pixel_into(series, params, &mut Scratch::default(), &mut out);
    let values = if months == 0 {
        vec![Vec::new(); params.scales.len()]
    } else {
        out.chunks(months).map(<[f32]>::to_vec).collect()
    };
    PixelIndices { values, outcomes }
}
