//! Small in-memory text tables and generic reshaping operations.
//!
//! The QC loaders all funnel through these helpers: marker-delimited tool
//! output becomes a `TextTable`, gets relabelled/merged/transposed, and is
//! then handed to the database layer for bulk loading.

use indexmap::IndexMap;

/// A rectangular (possibly ragged) table of text cells with a header row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextTable {
    /// Column names.
    pub header: Vec<String>,
    /// Data rows.
    pub rows: Vec<Vec<String>>,
}

impl TextTable {
    /// Construct an empty table with the given header.
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Parse a tab-separated slice of lines; the first line is the header.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_tsv_lines(lines: &[String]) -> Option<Self> {
        let (first, rest) = lines.split_first()?;
        Some(Self {
            header: split_tsv(first),
            rows: rest.iter().map(|line| split_tsv(line)).collect(),
        })
    }

    /// Append one data row.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Number of columns in the widest row (header included).
    pub fn width(&self) -> usize {
        std::iter::once(self.header.len())
            .chain(self.rows.iter().map(|row| row.len()))
            .max()
            .unwrap_or(0)
    }

    /// Swap rows and columns, the header being row zero.
    ///
    /// Ragged rows are padded with `fill` so the result is rectangular.
    pub fn transpose(&self, fill: &str) -> TextTable {
        let width = self.width();
        let cell = |row: &[String], i: usize| -> String {
            row.get(i).cloned().unwrap_or_else(|| fill.to_string())
        };

        let mut out_rows = Vec::with_capacity(width);
        for i in 0..width {
            let mut out_row = Vec::with_capacity(self.rows.len() + 1);
            out_row.push(cell(&self.header, i));
            for row in &self.rows {
                out_row.push(cell(row, i));
            }
            out_rows.push(out_row);
        }

        let mut iter = out_rows.into_iter();
        TextTable {
            header: iter.next().unwrap_or_default(),
            rows: iter.collect(),
        }
    }

    /// Write the table as TSV.
    pub fn write_tsv<W>(&self, out: W) -> Result<(), anyhow::Error>
    where
        W: std::io::Write,
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_writer(out);
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Merge per-track single-column series into one wide table.
///
/// Each input table contributes its first column as the shared key and its
/// second column as the track's series.  The output has one row per key (in
/// first-seen order), one column per track, and `fill` where a track has no
/// value for a key.
pub fn merge_series(inputs: &[(String, TextTable)], key_name: &str, fill: &str) -> TextTable {
    let mut values: IndexMap<String, Vec<String>> = IndexMap::new();

    for (i, (_, table)) in inputs.iter().enumerate() {
        for row in &table.rows {
            let Some(key) = row.first() else {
                continue;
            };
            let series = values
                .entry(key.clone())
                .or_insert_with(|| vec![fill.to_string(); inputs.len()]);
            series[i] = row.get(1).cloned().unwrap_or_else(|| fill.to_string());
        }
    }

    let mut header = Vec::with_capacity(inputs.len() + 1);
    header.push(key_name.to_string());
    header.extend(inputs.iter().map(|(track, _)| track.clone()));

    let rows = values
        .into_iter()
        .map(|(key, series)| {
            let mut row = Vec::with_capacity(series.len() + 1);
            row.push(key);
            row.extend(series);
            row
        })
        .collect();

    TextTable { header, rows }
}

fn split_tsv(line: &str) -> Vec<String> {
    line.split('\t').map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{merge_series, TextTable};

    fn table(header: &[&str], rows: &[&[&str]]) -> TextTable {
        TextTable {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn from_tsv_lines() {
        let lines: Vec<String> = vec!["a\tb".into(), "1\t2".into(), "3\t4".into()];
        let parsed = TextTable::from_tsv_lines(&lines).unwrap();
        assert_eq!(parsed, table(&["a", "b"], &[&["1", "2"], &["3", "4"]]));

        assert_eq!(TextTable::from_tsv_lines(&[]), None);
    }

    #[test]
    fn merge_series_differing_lengths() {
        let inputs = vec![
            (
                "sample1".to_string(),
                table(&["insert_size", "count"], &[&["10", "5"], &["20", "7"]]),
            ),
            (
                "sample2".to_string(),
                table(
                    &["insert_size", "count"],
                    &[&["10", "2"], &["20", "3"], &["30", "9"]],
                ),
            ),
        ];

        let merged = merge_series(&inputs, "insert_size", "0");

        assert_eq!(
            merged,
            table(
                &["insert_size", "sample1", "sample2"],
                &[
                    &["10", "5", "2"],
                    &["20", "7", "3"],
                    &["30", "0", "9"],
                ]
            )
        );
    }

    #[test]
    fn merge_series_preserves_first_seen_key_order() {
        let inputs = vec![
            (
                "sample1".to_string(),
                table(&["bin", "count"], &[&["5", "1"], &["2", "1"]]),
            ),
            (
                "sample2".to_string(),
                table(&["bin", "count"], &[&["9", "4"], &["5", "4"]]),
            ),
        ];

        let merged = merge_series(&inputs, "bin", "0");
        let keys: Vec<&str> = merged.rows.iter().map(|row| row[0].as_str()).collect();
        assert_eq!(keys, vec!["5", "2", "9"]);
    }

    #[test]
    fn transpose_rectangular() {
        let input = table(&["track", "a", "b"], &[&["sample1", "1", "2"]]);
        let transposed = input.transpose("0");
        assert_eq!(
            transposed,
            table(
                &["track", "sample1"],
                &[&["a", "1"], &["b", "2"]]
            )
        );
    }

    #[test]
    fn transpose_pads_ragged_rows() {
        let input = table(&["track", "a", "b"], &[&["sample1", "1"]]);
        let transposed = input.transpose("0");
        assert_eq!(
            transposed,
            table(
                &["track", "sample1"],
                &[&["a", "1"], &["b", "0"]]
            )
        );
    }

    #[test]
    fn write_tsv() -> Result<(), anyhow::Error> {
        let input = table(&["track", "count"], &[&["sample1", "42"]]);
        let mut buf = Vec::new();
        input.write_tsv(&mut buf)?;
        assert_eq!(String::from_utf8(buf)?, "track\tcount\nsample1\t42\n");
        Ok(())
    }
}
