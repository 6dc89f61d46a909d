//! Typed assembly of the report SELECT statements.
//!
//! The queries join a track's primary variant table against side tables that
//! are only known at run time (any table named `*_annotations`), so the
//! statement cannot be written down statically.  Instead of interpolating
//! raw SQL fragments, a query is described by a small value type and
//! rendered by a single function; an empty join list renders a statement
//! without any stray keywords or dangling commas.

use regex::Regex;

/// Table-name pattern of tracks that have a MuTect SNP report table.
pub const SNP_PATTERN: &str = r"^(\S*)_mutect_snp_annotated_tsv$";
/// Table-name pattern of tracks that have a Strelka indel report table.
pub const INDEL_PATTERN: &str = r"^(\S*)_indels_annotated_tsv$";
/// Table-name pattern of tracks that have a MuTect filtering summary.
pub const FILTER_SUMMARY_PATTERN: &str = r"^(\S*)_mutect_filtering_summary$";

/// Suffix that marks a dynamically discovered annotation table.
const ANNOTATIONS_SUFFIX: &str = "_annotations";

/// The kind of a single JOIN clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Plain inner `JOIN`.
    Inner,
    /// `LEFT JOIN` (used for annotation tables).
    Left,
    /// `LEFT OUTER JOIN` (used for the fixed reference tables).
    LeftOuter,
}

impl JoinKind {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// One JOIN clause of a report query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// Join kind.
    pub kind: JoinKind,
    /// Joined table, including any `AS` alias.
    pub table: String,
    /// The ON condition.
    pub on: String,
}

/// A SELECT statement described as data: base columns, FROM table, joins,
/// and AND-combined filter predicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportQuery {
    /// Select-list entries, in output order.
    pub columns: Vec<String>,
    /// The primary table, including any `AS` alias.
    pub from: String,
    /// JOIN clauses, in order.
    pub joins: Vec<JoinSpec>,
    /// Filter predicates, combined with AND.
    pub filters: Vec<String>,
}

impl ReportQuery {
    /// Render the query to a single SQL statement.
    pub fn render(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.from);
        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} ON {}",
                join.kind.as_sql(),
                join.table,
                join.on
            ));
        }
        if !self.filters.is_empty() {
            sql.push_str(&format!(" WHERE {}", self.filters.join(" AND ")));
        }
        sql
    }
}

/// Select columns and join clauses for the annotation tables found in
/// `tables`.
///
/// For each table `<stem>_annotations` the lookup column is `<stem>` and the
/// join matches the report's gene name against the table's `gene_id`.
pub fn annotation_joins(tables: &[String]) -> (Vec<String>, Vec<JoinSpec>) {
    let mut columns = Vec::new();
    let mut joins = Vec::new();
    for table in tables {
        let Some(stem) = table.strip_suffix(ANNOTATIONS_SUFFIX) else {
            continue;
        };
        if stem.is_empty() {
            continue;
        }
        columns.push(format!("{}.{}", table, stem));
        joins.push(JoinSpec {
            kind: JoinKind::Left,
            table: table.clone(),
            on: format!("A.SNPEFF_GENE_NAME = {}.gene_id", table),
        });
    }
    (columns, joins)
}

/// Build the SNP report query for one track.
///
/// Joins the annotated MuTect SNP table against the caller stats table, the
/// cancer gene reference and per-gene study frequencies, plus whatever
/// annotation tables exist, and applies the fixed somatic quality filters.
pub fn snp_query(track: &str, tables: &[String]) -> ReportQuery {
    let (annotation_columns, annotation_joins) = annotation_joins(tables);

    let mut columns = vec![
        "A.CHROM AS Chr".to_string(),
        "A.POS AS Pos".to_string(),
        "A.SNPEFF_GENE_NAME AS Gene".to_string(),
        "A.SNPEFF_EXON_ID AS Exon".to_string(),
        "A.REF".to_string(),
        "A.ALT".to_string(),
        "A.SNPEFF_IMPACT AS Impact".to_string(),
        "A.SNPEFF_GENE_BIOTYPE AS Biotype".to_string(),
        "A.SNPEFF_AMINO_ACID_CHANGE AS AA_change".to_string(),
        "A.SNPEFF_CODON_CHANGE AS Codon_change".to_string(),
    ];
    columns.extend(annotation_columns);
    columns.extend([
        "C.type AS NCG".to_string(),
        "C.cancer_type".to_string(),
        "D.*".to_string(),
        "B.n_ref_count AS Normal_Ref".to_string(),
        "B.n_alt_count AS Normal_Alt".to_string(),
        "B.t_ref_count AS Tumor_Ref".to_string(),
        "B.t_alt_count AS Tumor_Alt".to_string(),
    ]);

    let mut joins = vec![
        JoinSpec {
            kind: JoinKind::Inner,
            table: format!("{}_call_stats_out AS B", track),
            on: "A.CHROM = B.contig AND A.POS = B.position".to_string(),
        },
        JoinSpec {
            kind: JoinKind::LeftOuter,
            table: "cancergenes AS C".to_string(),
            on: "A.SNPEFF_GENE_NAME = C.symbol".to_string(),
        },
        JoinSpec {
            kind: JoinKind::LeftOuter,
            table: "eBio_studies_gene_frequencies AS D".to_string(),
            on: "A.SNPEFF_GENE_NAME = D.gene".to_string(),
        },
    ];
    joins.extend(annotation_joins);

    ReportQuery {
        columns,
        from: format!("{}_mutect_snp_annotated_tsv AS A", track),
        joins,
        filters: vec![
            "A.FILTER != 'REJECT'".to_string(),
            "B.t_alt_count > 3".to_string(),
            "(1.0 * B.n_alt_count) / (B.n_ref_count + B.n_alt_count) < 0.03".to_string(),
            "(1.0 * B.t_alt_count) / (B.t_ref_count + B.t_alt_count) > 0.06".to_string(),
            "(B.n_ref_count + B.n_alt_count) > 19".to_string(),
        ],
    }
}

/// Build the indel report query for one track.
///
/// Unlike the SNP report there is no separate caller stats table; depth and
/// tier counts come from the annotated indel table itself.
pub fn indel_query(track: &str, tables: &[String]) -> ReportQuery {
    let (annotation_columns, annotation_joins) = annotation_joins(tables);

    let mut columns = vec![
        "A.CHROM AS Chr".to_string(),
        "A.POS AS Pos".to_string(),
        "A.SNPEFF_GENE_NAME AS Gene".to_string(),
        "A.SNPEFF_EXON_ID AS Exon".to_string(),
        "A.REF".to_string(),
        "A.ALT".to_string(),
        "A.SNPEFF_IMPACT AS Impact".to_string(),
        "A.SNPEFF_GENE_BIOTYPE AS Biotype".to_string(),
        "A.SNPEFF_AMINO_ACID_CHANGE AS AA_change".to_string(),
        "A.SNPEFF_CODON_CHANGE AS Codon_change".to_string(),
    ];
    columns.extend(annotation_columns);
    columns.extend([
        "B.type AS NCG".to_string(),
        "B.cancer_types".to_string(),
        "C.*".to_string(),
        "A.NORMAL_DP AS Normal_depth".to_string(),
        "A.TUMOR_DP AS Tumor_depth".to_string(),
        "A.NORMAL_TAR AS Normal_Ref".to_string(),
        "A.NORMAL_TIR AS Normal_Alt".to_string(),
        "A.TUMOR_TAR AS Tumor_Ref".to_string(),
        "A.TUMOR_TIR AS Tumor_Alt".to_string(),
    ]);

    let mut joins = vec![
        JoinSpec {
            kind: JoinKind::LeftOuter,
            table: "cancergenes AS B".to_string(),
            on: "A.SNPEFF_GENE_NAME = B.symbol".to_string(),
        },
        JoinSpec {
            kind: JoinKind::LeftOuter,
            table: "eBio_studies_gene_frequencies AS C".to_string(),
            on: "A.SNPEFF_GENE_NAME = C.gene".to_string(),
        },
    ];
    joins.extend(annotation_joins);

    ReportQuery {
        columns,
        from: format!("{}_indels_annotated_tsv AS A", track),
        joins,
        filters: vec![
            "A.QSI_NT > 20".to_string(),
            "A.IHP < 12".to_string(),
            "A.RC < 12".to_string(),
            "A.IC < 12".to_string(),
        ],
    }
}

/// Build the filtering summary query for one track: all rows, verbatim.
pub fn filter_summary_query(track: &str) -> ReportQuery {
    ReportQuery {
        columns: vec!["*".to_string()],
        from: format!("{}_mutect_filtering_summary", track),
        joins: Vec::new(),
        filters: Vec::new(),
    }
}

/// Extract all track names whose report table matches `pattern`.
pub fn discover_tracks(tables: &[String], pattern: &str) -> Result<Vec<String>, anyhow::Error> {
    let re = Regex::new(pattern)
        .map_err(|e| anyhow::anyhow!("invalid track pattern {}: {}", pattern, e))?;
    Ok(tables
        .iter()
        .filter_map(|table| {
            re.captures(table)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .collect())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{JoinKind, ReportQuery};

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn render_without_joins_or_filters() {
        let query = ReportQuery {
            columns: vec!["*".to_string()],
            from: "t".to_string(),
            joins: Vec::new(),
            filters: Vec::new(),
        };
        assert_eq!(query.render(), "SELECT * FROM t");
    }

    #[test]
    fn snp_query_without_annotation_tables() {
        let query = super::snp_query("patient1", &tables(&["patient1_mutect_snp_annotated_tsv"]));
        let sql = query.render();

        // No dangling comma or stray JOIN keyword.
        assert!(!sql.contains(", FROM"));
        assert!(!sql.contains(",,"));
        assert!(!sql.contains("JOIN  "));
        assert!(sql.starts_with("SELECT A.CHROM AS Chr, A.POS AS Pos,"));
        assert!(sql.contains("FROM patient1_mutect_snp_annotated_tsv AS A"));
        assert!(sql.contains("JOIN patient1_call_stats_out AS B ON A.CHROM = B.contig AND A.POS = B.position"));
        assert!(sql.contains("WHERE A.FILTER != 'REJECT' AND B.t_alt_count > 3"));
        assert_eq!(query.joins.len(), 3);
    }

    #[test]
    fn snp_query_with_annotation_tables() {
        let table_names = tables(&[
            "patient1_mutect_snp_annotated_tsv",
            "cosmic_annotations",
            "dbsnp_annotations",
        ]);
        let query = super::snp_query("patient1", &table_names);
        let sql = query.render();

        // Two annotation joins beyond caller stats and the two reference joins.
        assert_eq!(query.joins.len(), 5);
        let annotation_joins: Vec<_> = query
            .joins
            .iter()
            .filter(|join| join.kind == JoinKind::Left)
            .collect();
        assert_eq!(annotation_joins.len(), 2);
        for join in &annotation_joins {
            assert!(join.on.starts_with("A.SNPEFF_GENE_NAME = "));
            assert!(join.on.ends_with(".gene_id"));
        }

        assert!(sql.contains("cosmic_annotations.cosmic"));
        assert!(sql.contains(
            "LEFT JOIN dbsnp_annotations ON A.SNPEFF_GENE_NAME = dbsnp_annotations.gene_id"
        ));
    }

    #[test]
    fn indel_query_applies_annotation_joins_once() {
        let table_names = tables(&["patient1_indels_annotated_tsv", "cosmic_annotations"]);
        let query = super::indel_query("patient1", &table_names);
        let sql = query.render();

        assert_eq!(sql.matches("LEFT JOIN cosmic_annotations").count(), 1);
        assert_eq!(sql.matches("cosmic_annotations.cosmic").count(), 1);
        assert!(sql.contains("WHERE A.QSI_NT > 20 AND A.IHP < 12 AND A.RC < 12 AND A.IC < 12"));
    }

    #[test]
    fn filter_summary_query() {
        assert_eq!(
            super::filter_summary_query("patient1").render(),
            "SELECT * FROM patient1_mutect_filtering_summary"
        );
    }

    #[test]
    fn annotation_joins_ignores_other_tables() {
        let (columns, joins) = super::annotation_joins(&tables(&[
            "patient1_mutect_snp_annotated_tsv",
            "cancergenes",
            "cosmic_annotations",
        ]));
        assert_eq!(columns, vec!["cosmic_annotations.cosmic"]);
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].table, "cosmic_annotations");
    }

    #[rstest::rstest]
    #[case(crate::report::query::SNP_PATTERN, "patient1_mutect_snp_annotated_tsv", "patient1")]
    #[case(crate::report::query::INDEL_PATTERN, "patient1_indels_annotated_tsv", "patient1")]
    #[case(
        crate::report::query::FILTER_SUMMARY_PATTERN,
        "patient1_mutect_filtering_summary",
        "patient1"
    )]
    fn discover_tracks(#[case] pattern: &str, #[case] table: &str, #[case] expected: &str) {
        let found =
            super::discover_tracks(&tables(&[table, "cancergenes"]), pattern).unwrap();
        assert_eq!(found, vec![expected.to_string()]);
    }
}
