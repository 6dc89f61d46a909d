//! Implementation of the `report` subcommands.
//!
//! Each subcommand builds one statement per track with the typed query
//! builder in `query`, executes it against the pipeline database, and emits
//! the rows as TSV, prefixed with a `track` column.  Tracks are either given
//! explicitly or discovered from the database by table-name pattern.

use std::io::Write;

use crate::common;
use crate::common::table::TextTable;
use crate::db;

pub mod binding;
pub mod query;

/// Command line arguments shared by the `report snps`, `report indels`, and
/// `report filter-summary` subcommands.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "run report queries on the pipeline database", long_about = None)]
pub struct QueryArgs {
    /// Path to the pipeline SQLite database.
    #[clap(long)]
    pub path_db: String,
    /// Track to report on; all matching tracks when absent.
    #[clap(long)]
    pub track: Option<String>,
    /// Path to output TSV file; stdout when absent.
    #[clap(long)]
    pub path_out: Option<String>,
}

/// Open the output stream for a report.
fn open_output(path_out: &Option<String>) -> Result<Box<dyn Write>, anyhow::Error> {
    Ok(match path_out {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .map_err(|e| anyhow::anyhow!("failed to create {}: {}", path, e))?,
        ),
        None => Box::new(std::io::stdout()),
    })
}

/// Resolve the tracks to run: the explicit one, or all tables matching the
/// query kind's naming pattern.
fn resolve_tracks(
    tables: &[String],
    track: Option<&str>,
    pattern: &str,
) -> Result<Vec<String>, anyhow::Error> {
    match track {
        Some(track) => Ok(vec![track.to_string()]),
        None => {
            let tracks = query::discover_tracks(tables, pattern)?;
            if tracks.is_empty() {
                tracing::warn!("no tables match track pattern {}", pattern);
            }
            Ok(tracks)
        }
    }
}

/// Run one query kind over all resolved tracks and write the combined TSV.
///
/// A failing discovered track is logged and skipped so the remaining tracks
/// still report; an explicitly requested track propagates its error.
fn run_query_kind<F>(
    args: &QueryArgs,
    pattern: &str,
    build: F,
) -> Result<(), anyhow::Error>
where
    F: Fn(&str, &[String]) -> query::ReportQuery,
{
    let conn = db::open_read_only(&args.path_db)?;
    let tables = db::list_tables(&conn)?;
    let tracks = resolve_tracks(&tables, args.track.as_deref(), pattern)?;

    let mut output: Option<TextTable> = None;
    for track in &tracks {
        let sql = build(track, &tables).render();
        tracing::debug!("track {}: {}", track, &sql);
        let records = match db::fetch_all(&conn, &sql) {
            Ok(records) => records,
            Err(e) if args.track.is_none() => {
                tracing::warn!("skipping track {}: {}", track, e);
                continue;
            }
            Err(e) => return Err(e),
        };
        tracing::info!("track {}: {} rows", track, records.len());

        for record in &records {
            let table = output.get_or_insert_with(|| {
                let mut header = vec!["track".to_string()];
                header.extend(record.keys().cloned());
                TextTable::new(header)
            });
            let mut row = vec![track.clone()];
            row.extend(record.values().map(db::value_to_string));
            table.push_row(row);
        }
    }

    if let Some(table) = output {
        table.write_tsv(open_output(&args.path_out)?)?;
    } else {
        tracing::warn!("no rows to report");
    }
    Ok(())
}

/// Main entry point for the `report snps` subcommand.
pub fn run_snps(args_common: &common::Args, args: &QueryArgs) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);
    run_query_kind(args, query::SNP_PATTERN, query::snp_query)
}

/// Main entry point for the `report indels` subcommand.
pub fn run_indels(args_common: &common::Args, args: &QueryArgs) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);
    run_query_kind(args, query::INDEL_PATTERN, query::indel_query)
}

/// Main entry point for the `report filter-summary` subcommand.
pub fn run_filter_summary(
    args_common: &common::Args,
    args: &QueryArgs,
) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);
    run_query_kind(args, query::FILTER_SUMMARY_PATTERN, |track, _| {
        query::filter_summary_query(track)
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::common::table::TextTable;
    use crate::db;

    fn summary_table() -> TextTable {
        TextTable {
            header: vec!["stage".into(), "variants".into()],
            rows: vec![
                vec!["raw".into(), "1000".into()],
                vec!["filtered".into(), "42".into()],
            ],
        }
    }

    #[test]
    fn filter_summary_roundtrip() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_db = tmp_dir.join("csvdb");
        let path_out = tmp_dir.join("out.tsv");

        {
            let conn = db::open(&path_db)?;
            db::load_table(
                &conn,
                "patient1_mutect_filtering_summary",
                &summary_table(),
                &[],
            )?;
        }

        let args = super::QueryArgs {
            path_db: path_db.to_str().unwrap().to_string(),
            track: None,
            path_out: Some(path_out.to_str().unwrap().to_string()),
        };
        super::run_filter_summary(&crate::common::Args::default(), &args)?;

        let written = std::fs::read_to_string(&path_out)?;
        assert_eq!(
            written,
            "track\tstage\tvariants\npatient1\traw\t1000\npatient1\tfiltered\t42\n"
        );

        Ok(())
    }

    #[test]
    fn discovered_track_with_missing_side_table_is_skipped() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_db = tmp_dir.join("csvdb");
        let path_out = tmp_dir.join("out.tsv");

        {
            let conn = db::open(&path_db)?;
            // SNP table present but call stats and reference tables missing,
            // so the assembled statement fails to prepare.
            let table = TextTable {
                header: vec!["CHROM".into(), "POS".into()],
                rows: vec![],
            };
            db::load_table(&conn, "patient1_mutect_snp_annotated_tsv", &table, &[])?;
        }

        let args = super::QueryArgs {
            path_db: path_db.to_str().unwrap().to_string(),
            track: None,
            path_out: Some(path_out.to_str().unwrap().to_string()),
        };
        // Discovered tracks must not abort the batch.
        super::run_snps(&crate::common::Args::default(), &args)?;
        assert!(!path_out.exists());

        Ok(())
    }

    #[test]
    fn explicit_track_with_missing_table_fails() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_db = tmp_dir.join("csvdb");

        {
            // Force creation of an empty database file.
            let conn = db::open(&path_db)?;
            conn.execute_batch("CREATE TABLE placeholder (x TEXT)")?;
        }

        let args = super::QueryArgs {
            path_db: path_db.to_str().unwrap().to_string(),
            track: Some("patient1".to_string()),
            path_out: None,
        };
        assert!(super::run_filter_summary(&crate::common::Args::default(), &args).is_err());

        Ok(())
    }
}
