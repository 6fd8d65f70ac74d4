// src/config.rs
//! Run settings, loadable from JSON and overridable from the command line.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::calendar::YearMonth;
use crate::error::SpeiError;
use crate::io::WriteOptions;
use crate::processing::pixel::DEFAULT_MAX_MISSING;
use crate::processing::{Family, GapPolicy, IndexParams};
use crate::timescale::Timescale;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_scales")]
    pub scales: Vec<Timescale>,
    /// Pixels with more missing months than this are skipped at every timescale.
    #[serde(default = "default_max_missing")]
    pub max_missing: usize,
    #[serde(default)]
    pub family: Family,
    #[serde(default)]
    pub gap_policy: GapPolicy,
    /// Calendar month of the first raster; inferred from file names when unset.
    #[serde(default)]
    pub start: Option<YearMonth>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(flatten)]
    pub write: WriteOptions,
    #[serde(default = "default_true")]
    pub manifest: bool,
    /// Draw progress bars while reading and computing.
    #[serde(default)]
    pub progress: bool,
}

fn default_scales() -> Vec<Timescale> {
    Timescale::ALL.to_vec()
}

fn default_max_missing() -> usize {
    DEFAULT_MAX_MISSING
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scales: default_scales(),
            max_missing: default_max_missing(),
            family: Family::default(),
            gap_policy: GapPolicy::default(),
            start: None,
            threads: None,
            write: WriteOptions::default(),
            manifest: true,
            progress: false,
        }
    }
}

impl Settings {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Checks values serde cannot, and drops repeated timescales.
    pub fn validate(mut self) -> std::result::Result<Self, SpeiError> {
        if self.scales.is_empty() {
            return Err(SpeiError::InvalidConfig {
                reason: "at least one timescale is required".to_string(),
            });
        }
        if self.threads == Some(0) {
            return Err(SpeiError::InvalidConfig {
                reason: "threads must be at least 1".to_string(),
            });
        }
        let mut seen = Vec::with_capacity(self.scales.len());
        self.scales.retain(|s| {
            let fresh = !seen.contains(s);
            seen.push(*s);
            fresh
        });
        Ok(self)
    }

    pub fn index_params(&self) -> IndexParams {
        IndexParams {
            scales: self.scales.clone(),
            max_missing: self.max_missing,
            family: self.family,
            gap_policy: self.gap_policy,
        }
    }
}
