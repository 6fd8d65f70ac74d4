// src/pipeline.rs
//! One SPEI job: discover inputs, load, compute, write.

use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::calendar::YearMonth;
use crate::config::Settings;
use crate::error::{Result, SpeiError};
use crate::io::{load_stack, write_raster, GeoInfo, WriteOptions};
use crate::processing::{IndexCube, OutcomeTally, SpeiProcessor};
use crate::timescale::Timescale;

pub const MANIFEST_NAME: &str = "manifest.json";

/// Inputs (already in chronological order), destination and settings.
#[derive(Debug, Clone)]
pub struct Job {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord {
    pub timescale: Timescale,
    pub index: usize,
    pub month: Option<YearMonth>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedOutput {
    pub timescale: Timescale,
    pub index: usize,
    pub path: PathBuf,
    pub error: String,
}

/// What a job did; also the manifest content.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub months: usize,
    pub width: usize,
    pub height: usize,
    pub start: Option<YearMonth>,
    pub tally: OutcomeTally,
    pub written: Vec<OutputRecord>,
    pub failed: Vec<FailedOutput>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reads the month encoded in each file name.
///
/// Returns the first month when every file is dated, checking that the
/// months follow each other without gaps or repeats. Returns `None` as soon
/// as one name carries no date.
pub fn infer_timeline(paths: &[PathBuf]) -> Result<Option<YearMonth>> {
    let mut dates = Vec::with_capacity(paths.len());
    for path in paths {
        match YearMonth::from_file_name(path) {
            Some(ym) => dates.push(ym),
            None => return Ok(None),
        }
    }
    let Some(&first) = dates.first() else {
        return Ok(None);
    };
    for (i, (path, &found)) in paths.iter().zip(&dates).enumerate() {
        let expected = first.add_months(i);
        if found != expected {
            return Err(SpeiError::NonContiguousTimeline {
                path: path.clone(),
                expected,
                found,
            });
        }
    }
    Ok(Some(first))
}

/// Picks the calendar month of index 0: the configured one wins over the
/// one read from file names.
pub fn resolve_start(paths: &[PathBuf], settings: &Settings) -> Result<Option<YearMonth>> {
    let inferred = infer_timeline(paths)?;
    let start = match (settings.start, inferred) {
        (Some(configured), Some(named)) if configured != named => {
            warn!(
                %configured,
                %named,
                "configured start month differs from file names, using configured"
            );
            Some(configured)
        }
        (configured, named) => configured.or(named),
    };

    if start.is_none() {
        if let Some(scale) = settings.scales.iter().find(|s| s.needs_calendar()) {
            return Err(SpeiError::UndatedInput { label: scale.label() });
        }
        warn!("input file names carry no dates, scale 1 outputs use running indices");
    }
    Ok(start)
}

/// Runs a whole job.
///
/// Structural problems (no inputs, mismatched rasters, broken timeline)
/// abort before anything is written. Individual write failures are logged,
/// collected in the summary and do not stop the remaining writes.
pub fn run_job(job: &Job) -> Result<RunSummary> {
    let settings = job.settings.clone().validate()?;
    if job.inputs.is_empty() {
        return Err(SpeiError::EmptyInput);
    }
    let start = resolve_start(&job.inputs, &settings)?;

    let stack = load_stack(&job.inputs, settings.progress)?;
    let processor = SpeiProcessor::new(settings.threads).with_progress(settings.progress);
    info!(threads = processor.threads(), "processing {} months", stack.months());
    let cube = processor.compute(&stack, &settings.index_params())?;

    fs::create_dir_all(&job.output_dir).map_err(|source| SpeiError::OutputDir {
        path: job.output_dir.clone(),
        source,
    })?;
    let (written, failed) =
        write_outputs(&cube, stack.geo(), start, &job.output_dir, &settings.write);

    let summary = RunSummary {
        months: stack.months(),
        width: stack.width(),
        height: stack.height(),
        start,
        tally: cube.tally().clone(),
        written,
        failed,
    };

    if settings.manifest {
        write_manifest(&job.output_dir.join(MANIFEST_NAME), &summary)?;
    }

    info!(
        written = summary.written.len(),
        failed = summary.failed.len(),
        output = %job.output_dir.display(),
        "job finished"
    );
    Ok(summary)
}

/// Writes every selected (timescale, month) grid of `cube` into `dir`.
pub fn write_outputs(
    cube: &IndexCube,
    geo: &GeoInfo,
    start: Option<YearMonth>,
    dir: &Path,
    options: &WriteOptions,
) -> (Vec<OutputRecord>, Vec<FailedOutput>) {
    let tasks: Vec<(Timescale, usize)> = cube
        .scales()
        .iter()
        .flat_map(|&scale| {
            scale
                .selected_indices(cube.months(), start)
                .into_iter()
                .map(move |t| (scale, t))
        })
        .collect();

    let results: Vec<std::result::Result<OutputRecord, FailedOutput>> = tasks
        .par_iter()
        .map(|&(scale, t)| {
            let path = dir.join(scale.file_name(t, start));
            let month = start.map(|s| s.add_months(t));
            let description = match month {
                Some(ym) => format!("{scale} {ym}"),
                None => format!("{scale} #{}", t + 1),
            };
            let grid = cube.grid(scale, t).unwrap_or_default();

            match write_raster(&path, geo, grid, &description, options) {
                Ok(()) => Ok(OutputRecord { timescale: scale, index: t, month, path }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "output not written");
                    Err(FailedOutput {
                        timescale: scale,
                        index: t,
                        path,
                        error: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let mut written = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(record) => written.push(record),
            Err(failure) => failed.push(failure),
        }
    }
    (written, failed)
}

fn write_manifest(path: &Path, summary: &RunSummary) -> Result<()> {
    let manifest_err = |message: String| SpeiError::Manifest { path: path.to_path_buf(), message };
    let file = File::create(path).map_err(|e| manifest_err(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary).map_err(|e| manifest_err(e.to_string()))?;
    writer.flush().map_err(|e| manifest_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monthly_paths(start: YearMonth, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| {
                let ym = start.add_months(i);
                PathBuf::from(format!("WB12_MP_{}_{:02}.tif", ym.year(), ym.month()))
            })
            .collect()
    }

    #[test]
    fn infers_start_from_names() {
        let start = YearMonth::new(2004, 1).unwrap();
        let paths = monthly_paths(start, 26);
        assert_eq!(infer_timeline(&paths).unwrap(), Some(start));
    }

    #[test]
    fn detects_missing_month() {
        let start = YearMonth::new(2004, 1).unwrap();
        let mut paths = monthly_paths(start, 6);
        paths.remove(3);
        match infer_timeline(&paths) {
            Err(SpeiError::NonContiguousTimeline { expected, found, .. }) => {
                assert_eq!(expected, YearMonth::new(2004, 4).unwrap());
                assert_eq!(found, YearMonth::new(2004, 5).unwrap());
            }
            other => panic!("expected timeline error, got {other:?}"),
        }
    }

    #[test]
    fn undated_names_need_configured_start_for_quarters() {
        let paths = vec![PathBuf::from("a.tif"), PathBuf::from("b.tif")];
        assert_eq!(infer_timeline(&paths).unwrap(), None);

        let settings = Settings::default();
        assert!(matches!(
            resolve_start(&paths, &settings),
            Err(SpeiError::UndatedInput { label: "SPEI3" })
        ));

        let scale_one = Settings {
            scales: vec![Timescale::One],
            ..Settings::default()
        };
        assert_eq!(resolve_start(&paths, &scale_one).unwrap(), None);

        let configured = Settings {
            start: YearMonth::new(1990, 6),
            ..Settings::default()
        };
        assert_eq!(resolve_start(&paths, &configured).unwrap(), YearMonth::new(1990, 6));
    }
}
