//! Summaries of interval binding tables (`<track>_binding`).
//!
//! These reports do not join anything; they either aggregate the `pattern`
//! column or introspect the binding table's `*_overlap` columns and count
//! bound intervals per genomic section.

use rusqlite::Connection;

use crate::common;
use crate::common::table::TextTable;
use crate::db;
use crate::report::{open_output, resolve_tracks, QueryArgs};

/// Table-name pattern of tracks that have a binding table.
pub const BINDING_PATTERN: &str = r"^(.*)_binding$";

/// Genomic sections, 5' to 3', used to order overlap columns.
const SECTIONS: &[&str] = &[
    "flank5",
    "utr5",
    "cds",
    "first_exon",
    "first_intron",
    "intron",
    "utr3",
    "flank3",
];

/// Sections reported by the condensed full summary (one fixed column each).
const FULL_SUMMARY_SECTIONS: &[&str] = &[
    "flank5",
    "utr5",
    "cds",
    "first_intron",
    "intron",
    "utr3",
    "flank3",
];

/// Order a binding table's `*_overlap` columns by genomic section, with the
/// 5' sections running outside-in (reversed column order).
pub fn order_overlap_columns(columns: &[String]) -> Vec<String> {
    let overlap: Vec<&String> = columns
        .iter()
        .filter(|col| col.ends_with("_overlap"))
        .collect();

    let mut result = Vec::new();
    for section in SECTIONS {
        let mut matching: Vec<String> = overlap
            .iter()
            .filter(|col| col.starts_with(section))
            .map(|col| col.to_string())
            .collect();
        matching.sort();
        if section.ends_with('5') {
            matching.reverse();
        }
        result.extend(matching);
    }
    result
}

/// Count the rows of `table` with a positive value in `column`.
fn count_positive(conn: &Connection, table: &str, column: &str) -> Result<i64, anyhow::Error> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} > 0",
        db::quote_ident(table),
        db::quote_ident(column)
    );
    let count = conn.query_row(&sql, [], |row| row.get::<_, i64>(0))?;
    Ok(count)
}

/// Per-track body of `report binding-patterns`.
fn patterns_for_track(conn: &Connection, track: &str) -> Result<Vec<Vec<String>>, anyhow::Error> {
    // The empty (all-zero) pattern is excluded.
    let sql = format!(
        "SELECT pattern, COUNT(*) AS counts FROM {}_binding \
         WHERE CAST(pattern AS INT) != 0 GROUP BY pattern",
        track
    );
    let records = db::fetch_all(conn, &sql)?;
    Ok(records
        .iter()
        .map(|record| {
            let mut row = vec![track.to_string()];
            row.extend(record.values().map(db::value_to_string));
            row
        })
        .collect())
}

/// Per-track body of `report binding-summary`.
fn summary_for_track(conn: &Connection, track: &str) -> Result<Vec<Vec<String>>, anyhow::Error> {
    let table = format!("{}_binding", track);
    let columns = db::table_columns(conn, &table)?;
    let mut rows = Vec::new();
    for column in order_overlap_columns(&columns) {
        let count = count_positive(conn, &table, &column)?;
        rows.push(vec![track.to_string(), column, count.to_string()]);
    }
    Ok(rows)
}

/// Per-track body of `report binding-full-summary`.
fn full_summary_for_track(
    conn: &Connection,
    track: &str,
) -> Result<Vec<Vec<String>>, anyhow::Error> {
    let table = format!("{}_binding", track);
    let mut rows = Vec::new();
    for section in FULL_SUMMARY_SECTIONS {
        let column = format!("{}_overlap", section);
        let count = count_positive(conn, &table, &column)?;
        rows.push(vec![track.to_string(), section.to_string(), count.to_string()]);
    }
    Ok(rows)
}

/// Shared driver for the binding subcommands.
fn run_binding<F>(args: &QueryArgs, header: &[&str], body: F) -> Result<(), anyhow::Error>
where
    F: Fn(&Connection, &str) -> Result<Vec<Vec<String>>, anyhow::Error>,
{
    let conn = db::open_read_only(&args.path_db)?;
    let tables = db::list_tables(&conn)?;
    let tracks = resolve_tracks(&tables, args.track.as_deref(), BINDING_PATTERN)?;

    let mut output = TextTable::new(header.iter().map(|s| s.to_string()).collect());
    for track in &tracks {
        let rows = match body(&conn, track) {
            Ok(rows) => rows,
            Err(e) if args.track.is_none() => {
                tracing::warn!("skipping track {}: {}", track, e);
                continue;
            }
            Err(e) => return Err(e),
        };
        tracing::info!("track {}: {} rows", track, rows.len());
        for row in rows {
            output.push_row(row);
        }
    }

    output.write_tsv(open_output(&args.path_out)?)?;
    Ok(())
}

/// Main entry point for the `report binding-patterns` subcommand.
pub fn run_patterns(args_common: &common::Args, args: &QueryArgs) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);
    run_binding(args, &["track", "pattern", "counts"], patterns_for_track)
}

/// Main entry point for the `report binding-summary` subcommand.
pub fn run_summary(args_common: &common::Args, args: &QueryArgs) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);
    run_binding(args, &["track", "column", "counts"], summary_for_track)
}

/// Main entry point for the `report binding-full-summary` subcommand.
pub fn run_full_summary(args_common: &common::Args, args: &QueryArgs) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);
    run_binding(args, &["track", "section", "counts"], full_summary_for_track)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::common::table::TextTable;
    use crate::db;

    #[test]
    fn order_overlap_columns() {
        let columns: Vec<String> = [
            "pattern",
            "intron_overlap",
            "cds_overlap",
            "flank5_a_overlap",
            "flank5_b_overlap",
            "utr3_overlap",
            "nexons",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let ordered = super::order_overlap_columns(&columns);
        assert_eq!(
            ordered,
            vec![
                // 5' section in reversed column order.
                "flank5_b_overlap",
                "flank5_a_overlap",
                "cds_overlap",
                "intron_overlap",
                "utr3_overlap",
            ]
        );
    }

    #[test]
    fn patterns_excludes_zero_pattern() -> Result<(), anyhow::Error> {
        let conn = rusqlite::Connection::open_in_memory()?;
        let table = TextTable {
            header: vec!["pattern".into(), "cds_overlap".into()],
            rows: vec![
                vec!["0".into(), "0".into()],
                vec!["101".into(), "1".into()],
                vec!["101".into(), "2".into()],
            ],
        };
        db::load_table(&conn, "exp1_binding", &table, &[])?;

        let rows = super::patterns_for_track(&conn, "exp1")?;
        assert_eq!(rows, vec![vec!["exp1", "101", "2"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()]);

        Ok(())
    }

    #[test]
    fn summary_counts_positive_overlap() -> Result<(), anyhow::Error> {
        let conn = rusqlite::Connection::open_in_memory()?;
        let table = TextTable {
            header: vec!["pattern".into(), "cds_overlap".into(), "intron_overlap".into()],
            rows: vec![
                vec!["1".into(), "2".into(), "0".into()],
                vec!["1".into(), "1".into(), "0".into()],
                vec!["0".into(), "0".into(), "3".into()],
            ],
        };
        db::load_table(&conn, "exp1_binding", &table, &[])?;

        let rows = super::summary_for_track(&conn, "exp1")?;
        assert_eq!(
            rows,
            vec![
                vec!["exp1".to_string(), "cds_overlap".to_string(), "2".to_string()],
                vec!["exp1".to_string(), "intron_overlap".to_string(), "1".to_string()],
            ]
        );

        Ok(())
    }
}
