use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::calendar::YearMonth;
use crate::config::Settings;
use crate::processing::{Family, GapPolicy};
use crate::timescale::Timescale;

#[derive(Parser)]
#[command(name = "spei-calc")]
#[command(about = "SPEI drought index calculator for monthly water-balance rasters")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute SPEI-1/3/12 for one stack of monthly P-PET rasters
    Run(RunArgs),

    /// Run every job listed in a JSON batch file
    Batch {
        /// Batch configuration file
        config: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Monthly rasters or directories containing them (sorted by name)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: PathBuf,

    /// JSON settings file; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Timescales in months
    #[arg(short, long, value_delimiter = ',')]
    pub scales: Option<Vec<Timescale>>,

    /// Calendar month of the first raster (YYYY-MM)
    #[arg(long)]
    pub start: Option<YearMonth>,

    /// Skip pixels with more missing months than this
    #[arg(long)]
    pub max_missing: Option<usize>,

    /// Distribution fitted to accumulated water balance
    #[arg(long, value_enum)]
    pub family: Option<Family>,

    /// Handling of windows that include a missing month
    #[arg(long, value_enum)]
    pub gap_policy: Option<GapPolicy>,

    /// Worker threads (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Compression: DEFLATE, ZSTD, LZW or NONE
    #[arg(long)]
    pub compress: Option<String>,

    /// Compression level (DEFLATE 1-9, ZSTD 1-22)
    #[arg(long)]
    pub compress_level: Option<u8>,

    /// Write stripped instead of tiled GeoTIFFs
    #[arg(long)]
    pub no_tiled: bool,

    /// Do not write manifest.json
    #[arg(long)]
    pub no_manifest: bool,
}

impl RunArgs {
    /// Applies command-line overrides on top of `base`.
    pub fn apply(&self, mut base: Settings) -> Settings {
        if let Some(scales) = &self.scales {
            base.scales = scales.clone();
        }
        if self.start.is_some() {
            base.start = self.start;
        }
        if let Some(max_missing) = self.max_missing {
            base.max_missing = max_missing;
        }
        if let Some(family) = self.family {
            base.family = family;
        }
        if let Some(gap_policy) = self.gap_policy {
            base.gap_policy = gap_policy;
        }
        if self.threads.is_some() {
            base.threads = self.threads;
        }
        if let Some(compress) = &self.compress {
            base.write.compress = compress.clone();
        }
        if let Some(level) = self.compress_level {
            base.write.compress_level = level;
        }
        if self.no_tiled {
            base.write.tiled = false;
        }
        if self.no_manifest {
            base.manifest = false;
        }
        base
    }
}
