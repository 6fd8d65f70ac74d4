// src/main.rs
use anyhow::{bail, Context, Result};
use clap::Parser;

use spei_calc::batch::process_batch;
use spei_calc::cli::{Cli, Commands, RunArgs};
use spei_calc::config::Settings;
use spei_calc::io::collect_inputs;
use spei_calc::logging;
use spei_calc::pipeline::{run_job, Job};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match &cli.command {
        Commands::Run(args) => run(args, cli.verbose > 0),
        Commands::Batch { config } => {
            let results = process_batch(config, cli.verbose > 0)?;
            let failed_jobs = results.iter().filter(|r| r.is_err()).count();
            let incomplete = results
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .filter(|summary| !summary.is_complete())
                .count();
            println!(
                "Batch complete: {} jobs, {failed_jobs} failed, {incomplete} with unwritten outputs",
                results.len()
            );
            if failed_jobs + incomplete > 0 {
                bail!("batch finished with errors");
            }
            Ok(())
        }
    }
}

fn run(args: &RunArgs, show_progress: bool) -> Result<()> {
    let base = match &args.config {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    };
    let mut job = Job {
        inputs: collect_inputs(&args.inputs)?,
        output_dir: args.output.clone(),
        settings: args.apply(base),
    };
    job.settings.progress |= show_progress;

    let summary = run_job(&job).context("SPEI run failed")?;

    println!(
        "Processing complete: {} rasters written to {}",
        summary.written.len(),
        job.output_dir.display()
    );
    if !summary.is_complete() {
        for failure in &summary.failed {
            eprintln!("not written: {} ({})", failure.path.display(), failure.error);
        }
        bail!("{} outputs could not be written", summary.failed.len());
    }
    Ok(())
}
