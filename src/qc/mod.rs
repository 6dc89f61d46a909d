//! Implementation of the `qc` subcommands.

use crate::common;
use crate::db;

pub mod bam_stats;
pub mod picard;

/// Command line arguments for the `qc collect` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "run Picard metric collectors on a BAM file", long_about = None)]
pub struct CollectArgs {
    /// Path to the input BAM file.
    #[clap(long)]
    pub path_in: String,
    /// Path to the output target; Picard writes `<out>.<metrics class>` files.
    #[clap(long)]
    pub path_out: String,
    /// Path to the reference genome FASTA file.
    #[clap(long)]
    pub path_genome: String,
    /// Also run `CollectGcBiasMetrics`.
    #[clap(long, default_value_t = false)]
    pub gc_bias: bool,
    /// Subprocess parameters as JSON, or @ with path to a JSON file.
    #[clap(long)]
    pub params: Option<String>,
}

/// Command line arguments shared by the `qc load-*-stats` subcommands.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "load QC metric files into the pipeline database", long_about = None)]
pub struct LoadArgs {
    /// Path to the pipeline SQLite database.
    #[clap(long)]
    pub path_db: String,
    /// Prefix (or full name) of the tables to create.
    #[clap(long)]
    pub table: String,
    /// Per-sample input targets (file name without the metrics class suffix).
    #[clap(long, required = true)]
    pub infiles: Vec<String>,
}

/// Load subprocess parameters from a JSON string or an `@file` reference.
fn load_collect_config(params: &Option<String>) -> Result<picard::CollectConfig, anyhow::Error> {
    let Some(params) = params else {
        return Ok(picard::CollectConfig::default());
    };
    let text = if let Some(path) = params.strip_prefix('@') {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read params file {}: {}", path, e))?
    } else {
        params.clone()
    };
    serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("failed to parse params: {}", e))
}

/// Main entry point for the `qc collect` subcommand.
pub fn run_collect(args_common: &common::Args, args: &CollectArgs) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let config = load_collect_config(&args.params)?;
    picard::collect_multiple_metrics(&args.path_in, &args.path_out, &args.path_genome, &config)?;
    if args.gc_bias {
        picard::collect_gc_bias_metrics(
            &args.path_in,
            &format!("{}.gcstats", args.path_out),
            &args.path_genome,
            &config,
        )?;
    }
    Ok(())
}

/// Main entry point for the `qc load-alignment-stats` subcommand.
pub fn run_load_alignment_stats(
    args_common: &common::Args,
    args: &LoadArgs,
) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let conn = db::open(&args.path_db)?;
    picard::load_alignment_stats(&conn, &args.infiles, &args.table)
}

/// Main entry point for the `qc load-duplicate-stats` subcommand.
pub fn run_load_duplicate_stats(
    args_common: &common::Args,
    args: &LoadArgs,
) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let conn = db::open(&args.path_db)?;
    picard::load_duplicate_stats(&conn, &args.infiles, &args.table)
}

/// Main entry point for the `qc load-bam-stats` subcommand.
pub fn run_load_bam_stats(
    args_common: &common::Args,
    args: &LoadArgs,
) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let conn = db::open(&args.path_db)?;
    bam_stats::load_bam_stats(&conn, &args.infiles, &args.table)
}
