//! Exome pipeline report/QC worker main executable

pub mod common;
pub mod db;
pub mod qc;
pub mod report;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Exome pipeline report and QC worker",
    long_about = "This tool runs report queries on the pipeline database and loads QC metrics into it"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Report-related commands.
    Report(Report),
    /// QC-related commands.
    Qc(Qc),
}

/// Parsing of "report *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Report {
    /// The sub command to run
    #[command(subcommand)]
    command: ReportCommands,
}

/// Enum supporting the parsing of "report *" sub commands.
#[derive(Debug, Subcommand)]
enum ReportCommands {
    Snps(report::QueryArgs),
    Indels(report::QueryArgs),
    FilterSummary(report::QueryArgs),
    BindingPatterns(report::QueryArgs),
    BindingSummary(report::QueryArgs),
    BindingFullSummary(report::QueryArgs),
}

/// Parsing of "qc *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Qc {
    /// The sub command to run
    #[command(subcommand)]
    command: QcCommands,
}

/// Enum supporting the parsing of "qc *" sub commands.
#[derive(Debug, Subcommand)]
enum QcCommands {
    Collect(qc::CollectArgs),
    LoadAlignmentStats(qc::LoadArgs),
    LoadDuplicateStats(qc::LoadArgs),
    LoadBamStats(qc::LoadArgs),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Report(report) => match &report.command {
                ReportCommands::Snps(args) => {
                    report::run_snps(&cli.common, args)?;
                }
                ReportCommands::Indels(args) => {
                    report::run_indels(&cli.common, args)?;
                }
                ReportCommands::FilterSummary(args) => {
                    report::run_filter_summary(&cli.common, args)?;
                }
                ReportCommands::BindingPatterns(args) => {
                    report::binding::run_patterns(&cli.common, args)?;
                }
                ReportCommands::BindingSummary(args) => {
                    report::binding::run_summary(&cli.common, args)?;
                }
                ReportCommands::BindingFullSummary(args) => {
                    report::binding::run_full_summary(&cli.common, args)?;
                }
            },
            Commands::Qc(qc) => match &qc.command {
                QcCommands::Collect(args) => {
                    qc::run_collect(&cli.common, args)?;
                }
                QcCommands::LoadAlignmentStats(args) => {
                    qc::run_load_alignment_stats(&cli.common, args)?;
                }
                QcCommands::LoadDuplicateStats(args) => {
                    qc::run_load_duplicate_stats(&cli.common, args)?;
                }
                QcCommands::LoadBamStats(args) => {
                    qc::run_load_bam_stats(&cli.common, args)?;
                }
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
