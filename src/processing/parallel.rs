// src/processing/parallel.rs
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, trace};

use super::pixel::{compute_pixel_into, IndexParams, PixelOutcome, Scratch, SkipReason};
use crate::error::{Result, SpeiError};
use crate::io::RasterStack;
use crate::progress;
use crate::timescale::Timescale;

/// Pixel counts for one timescale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleTally {
    pub timescale: Timescale,
    pub fitted: usize,
    pub window_gap: usize,
    pub fit_failure: usize,
}

/// How every pixel of a run ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    pub pixels: usize,
    pub insufficient_data: usize,
    pub scales: Vec<ScaleTally>,
}

impl OutcomeTally {
    pub fn new(scales: &[Timescale]) -> Self {
        Self {
            pixels: 0,
            insufficient_data: 0,
            scales: scales
                .iter()
                .map(|&timescale| ScaleTally {
                    timescale,
                    fitted: 0,
                    window_gap: 0,
                    fit_failure: 0,
                })
                .collect(),
        }
    }

    pub fn record(&mut self, outcome: &PixelOutcome) {
        self.pixels += 1;
        if matches!(outcome.first(), Some(Err(SkipReason::InsufficientData { .. }))) {
            self.insufficient_data += 1;
            return;
        }
        for (tally, result) in self.scales.iter_mut().zip(outcome) {
            match result {
                Ok(()) => tally.fitted += 1,
                Err(SkipReason::WindowGap) => tally.window_gap += 1,
                Err(SkipReason::FitFailure(_)) => tally.fit_failure += 1,
                Err(SkipReason::InsufficientData { .. }) => {}
            }
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.pixels += other.pixels;
        self.insufficient_data += other.insufficient_data;
        for (a, b) in self.scales.iter_mut().zip(other.scales) {
            a.fitted += b.fitted;
            a.window_gap += b.window_gap;
            a.fit_failure += b.fit_failure;
        }
        self
    }
}

/// SPEI values for every pixel, month and configured timescale.
///
/// Stored pixel-major, `[pixel][timescale][month]`, so each worker fills one
/// contiguous block.
#[derive(Debug, Clone)]
pub struct IndexCube {
    data: Vec<f32>,
    scales: Vec<Timescale>,
    months: usize,
    width: usize,
    height: usize,
    tally: OutcomeTally,
}

impl IndexCube {
    pub fn scales(&self) -> &[Timescale] {
        &self.scales
    }

    pub fn months(&self) -> usize {
        self.months
    }

    pub fn tally(&self) -> &OutcomeTally {
        &self.tally
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn block(&self) -> usize {
        self.months * self.scales.len()
    }

    /// Series of one pixel for `scale`, full length with NaN where absent.
    pub fn series(&self, scale: Timescale, row: usize, col: usize) -> Option<&[f32]> {
        let pos = self.scales.iter().position(|&s| s == scale)?;
        let start = (row * self.width + col) * self.block() + pos * self.months;
        Some(&self.data[start..start + self.months])
    }

    /// Row-major grid of `scale` at month `t`.
    pub fn grid(&self, scale: Timescale, t: usize) -> Option<Vec<f32>> {
        let pos = self.scales.iter().position(|&s| s == scale)?;
        if t >= self.months {
            return None;
        }
        let offset = pos * self.months + t;
        Some(self.data.chunks(self.block()).map(|pixel| pixel[offset]).collect())
    }
}

/// Runs the per-pixel computation over a whole stack on a rayon pool.
pub struct SpeiProcessor {
    threads: Option<usize>,
    show_progress: bool,
}

impl SpeiProcessor {
    /// `None` uses rayon's global pool.
    pub fn new(threads: Option<usize>) -> Self {
        Self {
            threads,
            show_progress: false,
        }
    }

    /// Draws a progress bar over the pixels while computing.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(rayon::current_num_threads)
    }

    pub fn compute(&self, stack: &RasterStack, params: &IndexParams) -> Result<IndexCube> {
        if params.scales.is_empty() {
            return Err(SpeiError::InvalidConfig {
                reason: "no timescales requested".to_string(),
            });
        }

        match self.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| SpeiError::InvalidConfig {
                    reason: format!("cannot build thread pool: {e}"),
                })?
                .install(|| Ok(compute_cube(stack, params, self.show_progress))),
            None => Ok(compute_cube(stack, params, self.show_progress)),
        }
    }
}

fn compute_cube(stack: &RasterStack, params: &IndexParams, show_progress: bool) -> IndexCube {
    let months = stack.months();
    let block = months * params.scales.len();
    let mut data = vec![f32::NAN; stack.pixels() * block];

    info!(
        pixels = stack.pixels(),
        months,
        scales = ?params.scales,
        family = ?params.family,
        "computing SPEI"
    );

    let pb = progress::bar(stack.pixels(), "Processing pixels", show_progress);
    let tally = data
        .par_chunks_mut(block)
        .enumerate()
        .progress_with(pb.clone())
        .map_init(
            || (Vec::with_capacity(months), Scratch::default()),
            |(series, scratch), (pixel, out)| {
                series.clear();
                series.extend((0..months).map(|t| stack.value(t, pixel) as f64));
                let outcome = compute_pixel_into(series, params, scratch, out);
                for (scale, result) in params.scales.iter().zip(&outcome) {
                    if let Err(reason) = result {
                        trace!(pixel, %scale, %reason, "pixel skipped");
                    }
                }
                outcome
            },
        )
        .fold(
            || OutcomeTally::new(&params.scales),
            |mut tally, outcome| {
                tally.record(&outcome);
                tally
            },
        )
        .reduce(|| OutcomeTally::new(&params.scales), OutcomeTally::merge);
    pb.finish();

    info!(
        insufficient = tally.insufficient_data,
        fitted = ?tally.scales.iter().map(|s| s.fitted).collect::<Vec<_>>(),
        "SPEI computed"
    );

    IndexCube {
        data,
        scales: params.scales.clone(),
        months,
        width: stack.width(),
        height: stack.height(),
        tally,
    }
}
