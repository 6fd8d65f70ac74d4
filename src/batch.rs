// src/batch.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::calendar::YearMonth;
use crate::config::Settings;
use crate::io::collect_inputs;
use crate::pipeline::{run_job, Job, RunSummary};
use crate::processing::{Family, GapPolicy};
use crate::timescale::Timescale;

#[derive(Deserialize, Serialize, Debug)]
pub struct BatchConfig {
    #[serde(default)]
    pub global: Settings,
    pub jobs: Vec<JobSpec>,
}

/// One job of a batch; unset fields fall back to `global`.
#[derive(Deserialize, Serialize, Debug)]
pub struct JobSpec {
    /// Files or directories of monthly water-balance rasters.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub scales: Option<Vec<Timescale>>,
    pub max_missing: Option<usize>,
    pub family: Option<Family>,
    pub gap_policy: Option<GapPolicy>,
    pub start: Option<YearMonth>,
    pub threads: Option<usize>,
    pub compress: Option<String>,
    pub compress_level: Option<u8>,
    pub tiled: Option<bool>,
    pub manifest: Option<bool>,
}

impl JobSpec {
    pub fn settings(&self, global: &Settings) -> Settings {
        let mut settings = global.clone();
        if let Some(scales) = &self.scales {
            settings.scales = scales.clone();
        }
        settings.max_missing = self.max_missing.unwrap_or(global.max_missing);
        settings.family = self.family.unwrap_or(global.family);
        settings.gap_policy = self.gap_policy.unwrap_or(global.gap_policy);
        settings.start = self.start.or(global.start);
        settings.threads = self.threads.or(global.threads);
        if let Some(compress) = &self.compress {
            settings.write.compress = compress.clone();
        }
        settings.write.compress_level = self.compress_level.unwrap_or(global.write.compress_level);
        settings.write.tiled = self.tiled.unwrap_or(global.write.tiled);
        settings.manifest = self.manifest.unwrap_or(global.manifest);
        settings
    }
}

pub fn load_batch(config_path: &Path) -> Result<BatchConfig> {
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("reading batch file {}", config_path.display()))?;
    let config: BatchConfig = serde_json::from_str(&config_content)
        .with_context(|| format!("parsing batch file {}", config_path.display()))?;
    Ok(config)
}

/// Runs every job of a batch file in order.
///
/// A job that fails is logged and the batch moves on; the result lists the
/// summary of each job, or its error. `show_progress` turns progress bars on
/// for every job.
pub fn process_batch(
    config_path: &Path,
    show_progress: bool,
) -> Result<Vec<Result<RunSummary>>> {
    let config = load_batch(config_path)?;
    let total = config.jobs.len();
    info!("starting batch processing with {total} jobs");

    let mut results = Vec::with_capacity(total);
    for (i, spec) in config.jobs.iter().enumerate() {
        info!(
            "[{}/{}] {} -> {}",
            i + 1,
            total,
            describe_inputs(&spec.inputs),
            spec.output.display()
        );

        let result = collect_inputs(&spec.inputs)
            .map_err(anyhow::Error::from)
            .and_then(|inputs| {
                let mut settings = spec.settings(&config.global);
                settings.progress |= show_progress;
                let job = Job {
                    inputs,
                    output_dir: spec.output.clone(),
                    settings,
                };
                run_job(&job).map_err(anyhow::Error::from)
            })
            .with_context(|| format!("job {} ({})", i + 1, spec.output.display()));

        if let Err(e) = &result {
            error!("{e:#}");
        }
        results.push(result);
    }

    info!("batch processing complete");
    Ok(results)
}

fn describe_inputs(inputs: &[PathBuf]) -> String {
    match inputs {
        [single] => single.display().to_string(),
        _ => format!("{} inputs", inputs.len()),
    }
}
