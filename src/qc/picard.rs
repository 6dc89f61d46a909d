//! Running Picard metric collectors and loading their output.
//!
//! Picard writes one file per metrics class next to the BAM file, each
//! containing marker-delimited sections: `## METRICS CLASS` introduces a
//! small table (header row plus data rows up to the first blank line) and
//! `## HISTOGRAM` a two-column series.  The loaders below combine the
//! per-sample sections into track-labelled tables and hand them to the
//! database layer.

use std::path::Path;
use std::process::{Command, Stdio};

use rusqlite::Connection;

use crate::common::table::{merge_series, TextTable};
use crate::common::{basename, read_lines, snip};
use crate::db;

/// Marker line introducing a metrics section.
pub const METRICS_MARKER: &str = "## METRICS CLASS";
/// Marker line introducing a histogram section.
pub const HISTOGRAM_MARKER: &str = "## HISTOGRAM";

/// Default pipeline suffix of Picard output targets.
pub const DEFAULT_PIPELINE_SUFFIX: &str = "alignstats";

/// Problems with a marker-delimited section; all of them are reported as
/// warnings and skip the affected file rather than aborting the batch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    #[error("no `{0}` marker line found")]
    MissingMarker(String),
    #[error("section under `{0}` has no data rows")]
    Empty(String),
}

/// Subprocess configuration for the Picard collectors.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CollectConfig {
    /// Value for Picard's `VALIDATION_STRINGENCY=`.
    #[serde(default = "default_validation_stringency")]
    pub validation_stringency: String,
    /// Value for Picard's `ASSUME_SORTED=`.
    #[serde(default = "default_assume_sorted")]
    pub assume_sorted: bool,
}

fn default_validation_stringency() -> String {
    "SILENT".to_string()
}

fn default_assume_sorted() -> bool {
    true
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            validation_stringency: default_validation_stringency(),
            assume_sorted: default_assume_sorted(),
        }
    }
}

/// Run an external collector with Picard-style `KEY=value` arguments,
/// redirecting its stdout into `path_out`.
fn run_tool(tool: &str, args: &[String], path_out: &str) -> Result<(), anyhow::Error> {
    tracing::info!("running {} {}", tool, args.join(" "));
    let stdout = std::fs::File::create(path_out)
        .map_err(|e| anyhow::anyhow!("failed to create {}: {}", path_out, e))?;
    let status = Command::new(tool)
        .args(args)
        .stdout(Stdio::from(stdout))
        .status()
        .map_err(|e| anyhow::anyhow!("failed to run {}: {}", tool, e))?;
    if !status.success() {
        anyhow::bail!("{} exited with {}", tool, status);
    }
    Ok(())
}

/// Gather BAM file alignment statistics with `CollectMultipleMetrics`.
pub fn collect_multiple_metrics(
    path_in: &str,
    path_out: &str,
    path_genome: &str,
    config: &CollectConfig,
) -> Result<(), anyhow::Error> {
    let args = vec![
        format!("INPUT={}", path_in),
        format!("REFERENCE_SEQUENCE={}", path_genome),
        format!("ASSUME_SORTED={}", config.assume_sorted),
        format!("OUTPUT={}", path_out),
        format!("VALIDATION_STRINGENCY={}", config.validation_stringency),
    ];
    run_tool("CollectMultipleMetrics", &args, path_out)
}

/// Gather BAM file GC bias statistics with `CollectGcBiasMetrics`.
pub fn collect_gc_bias_metrics(
    path_in: &str,
    path_out: &str,
    path_genome: &str,
    config: &CollectConfig,
) -> Result<(), anyhow::Error> {
    let args = vec![
        format!("INPUT={}", path_in),
        format!("REFERENCE_SEQUENCE={}", path_genome),
        format!("OUTPUT={}", path_out),
        format!("VALIDATION_STRINGENCY={}", config.validation_stringency),
        format!("CHART_OUTPUT={}.pdf", path_out),
        format!("SUMMARY_OUTPUT={}.summary", path_out),
    ];
    run_tool("CollectGcBiasMetrics", &args, path_out)
}

/// Extract the table under the first line containing `marker`: the next
/// line is the header, data rows follow up to the first blank line.
pub fn extract_section(lines: &[String], marker: &str) -> Result<TextTable, SectionError> {
    let start = lines
        .iter()
        .position(|line| line.contains(marker))
        .ok_or_else(|| SectionError::MissingMarker(marker.to_string()))?;

    let body: Vec<String> = lines[start + 1..]
        .iter()
        .take_while(|line| !line.trim().is_empty())
        .cloned()
        .collect();

    let table = TextTable::from_tsv_lines(&body)
        .ok_or_else(|| SectionError::Empty(marker.to_string()))?;
    if table.rows.is_empty() {
        return Err(SectionError::Empty(marker.to_string()));
    }
    Ok(table)
}

/// Read the section under `marker` from `<infile>.<suffix>`, or `None` with
/// a warning if the file is missing or the section unusable.
fn read_section(
    infile: &str,
    suffix: &str,
    marker: &str,
) -> Result<Option<TextTable>, anyhow::Error> {
    let filename = format!("{}.{}", infile, suffix);
    if !Path::new(&filename).exists() {
        tracing::warn!("file {} missing", &filename);
        return Ok(None);
    }
    let lines = read_lines(&filename)?;
    match extract_section(&lines, marker) {
        Ok(table) => Ok(Some(table)),
        Err(e) => {
            tracing::warn!("skipping {}: {}", &filename, e);
            Ok(None)
        }
    }
}

/// Track name of a Picard output target: the base name with the pipeline
/// suffix stripped.
fn track_of(infile: &str, pipeline_suffix: &str) -> String {
    snip(&basename(infile), &format!(".{}", pipeline_suffix))
}

/// Load one metrics class from all per-sample files into the table
/// `<prefix>_<suffix>`, indexed by track.
///
/// The header is taken from the first readable file; every data row is
/// prefixed with its track.  Missing files and empty sections are skipped
/// with a warning, so a batch with an absent sample loads exactly what the
/// same batch without that sample would.
pub fn load_metrics(
    conn: &Connection,
    infiles: &[String],
    prefix: &str,
    suffix: &str,
    pipeline_suffix: &str,
) -> Result<(), anyhow::Error> {
    let mut combined: Option<TextTable> = None;

    for infile in infiles {
        let track = track_of(infile, pipeline_suffix);
        let Some(section) = read_section(infile, suffix, METRICS_MARKER)? else {
            continue;
        };

        let combined = combined.get_or_insert_with(|| {
            let mut header = vec!["track".to_string()];
            header.extend(section.header.iter().cloned());
            TextTable::new(header)
        });
        for row in &section.rows {
            let mut out_row = Vec::with_capacity(row.len() + 1);
            out_row.push(track.clone());
            out_row.extend(row.iter().cloned());
            combined.push_row(out_row);
        }
    }

    match combined {
        Some(table) => db::load_table(conn, &format!("{}_{}", prefix, suffix), &table, &["track"]),
        None => {
            tracing::warn!("no {} sections found, not loading {}_{}", suffix, prefix, suffix);
            Ok(())
        }
    }
}

/// Name of the histogram table for a metrics class.
fn histogram_table_name(prefix: &str, suffix: &str) -> String {
    format!("{}_histogram", snip(&format!("{}_{}", prefix, suffix), "_metrics"))
}

/// Load one histogram section from all per-sample files into a wide table,
/// one column per track, zero-filling bins a track does not cover.
pub fn load_histogram(
    conn: &Connection,
    infiles: &[String],
    prefix: &str,
    suffix: &str,
    column: &str,
    pipeline_suffix: &str,
) -> Result<(), anyhow::Error> {
    let mut series = Vec::new();
    for infile in infiles {
        let Some(section) = read_section(infile, suffix, HISTOGRAM_MARKER)? else {
            continue;
        };
        series.push((track_of(infile, pipeline_suffix), section));
    }

    let name = histogram_table_name(prefix, suffix);
    if series.is_empty() {
        tracing::warn!("no {} histograms found, not loading {}", suffix, &name);
        return Ok(());
    }

    let merged = merge_series(&series, column, "0");
    db::load_table(conn, &name, &merged, &[column])
}

/// Load all output of Picard's `CollectMultipleMetrics`.
pub fn load_alignment_stats(
    conn: &Connection,
    infiles: &[String],
    prefix: &str,
) -> Result<(), anyhow::Error> {
    load_metrics(
        conn,
        infiles,
        prefix,
        "alignment_summary_metrics",
        DEFAULT_PIPELINE_SUFFIX,
    )?;
    load_metrics(
        conn,
        infiles,
        prefix,
        "insert_size_metrics",
        DEFAULT_PIPELINE_SUFFIX,
    )?;

    for (suffix, column) in [
        ("quality_by_cycle_metrics", "cycle"),
        ("quality_distribution_metrics", "quality"),
        ("insert_size_metrics", "insert_size"),
    ] {
        load_histogram(conn, infiles, prefix, suffix, column, DEFAULT_PIPELINE_SUFFIX)?;
    }

    Ok(())
}

/// Load Picard duplicate filtering statistics.
pub fn load_duplicate_stats(
    conn: &Connection,
    infiles: &[String],
    prefix: &str,
) -> Result<(), anyhow::Error> {
    load_metrics(conn, infiles, prefix, "duplicate_metrics", "bam")?;
    load_histogram(conn, infiles, prefix, "duplicate_metrics", "duplicates", "bam")
}
