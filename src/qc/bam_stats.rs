//! Loading per-sample read statistics into one per-track table.
//!
//! Each input is a two-column file (category, count).  The per-sample
//! series are merged into one wide table, transposed so that each row is a
//! track, and loaded.

use rusqlite::Connection;

use crate::common::table::{merge_series, TextTable};
use crate::common::{basename, read_lines, snip};
use crate::db;

/// Suffix of read statistics files.
pub const READSTATS_SUFFIX: &str = "readstats";

/// Load per-sample read statistics files into table `name`, one row per
/// track, zero-filling categories a sample does not report.
pub fn load_bam_stats(
    conn: &Connection,
    infiles: &[String],
    name: &str,
) -> Result<(), anyhow::Error> {
    let mut series = Vec::new();
    for infile in infiles {
        if !std::path::Path::new(infile).exists() {
            tracing::warn!("file {} missing", infile);
            continue;
        }
        let lines = read_lines(infile)?;
        let Some(table) = TextTable::from_tsv_lines(&lines) else {
            tracing::warn!("skipping empty file {}", infile);
            continue;
        };
        let track = snip(&basename(infile), &format!(".{}", READSTATS_SUFFIX));
        series.push((track, table));
    }

    if series.is_empty() {
        tracing::warn!("no read statistics found, not loading {}", name);
        return Ok(());
    }

    // Wide merge keyed by category, then transpose to one row per track.
    let merged = merge_series(&series, "track", "0");
    let per_track = merged.transpose("0");
    db::load_table(conn, name, &per_track, &["track"])
}
