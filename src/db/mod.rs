//! SQLite access layer shared by the report and QC subcommands.
//!
//! The pipeline database only ever sees two kinds of operations from this
//! worker: SELECTs (with table/column discovery through `sqlite_master` and
//! `PRAGMA table_info`) and whole-table loads of text tables produced by the
//! QC stages.  Schema migration is out of scope.

use std::path::Path;

use indexmap::IndexMap;
use itertools::Itertools;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};

use crate::common::table::TextTable;

/// One result row, column name to value, in SELECT column order.
pub type Record = IndexMap<String, Value>;

/// Open a database for reading and writing, creating it if necessary.
pub fn open<P>(path: P) -> Result<Connection, anyhow::Error>
where
    P: AsRef<Path>,
{
    Connection::open(path.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to open database {:?}: {}", path.as_ref(), e))
}

/// Open a database read-only; report queries never write.
pub fn open_read_only<P>(path: P) -> Result<Connection, anyhow::Error>
where
    P: AsRef<Path>,
{
    Connection::open_with_flags(path.as_ref(), OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| anyhow::anyhow!("failed to open database {:?}: {}", path.as_ref(), e))
}

/// List the names of all tables in the database.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, anyhow::Error> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// List the column names of a table, in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, anyhow::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Execute a SELECT statement and fetch all rows as ordered records.
pub fn fetch_all(conn: &Connection, sql: &str) -> Result<Vec<Record>, anyhow::Error> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| anyhow::anyhow!("failed to prepare statement: {}: {}", sql, e))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut result = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut record = Record::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            record.insert(name.clone(), row.get::<_, Value>(i)?);
        }
        result.push(record);
    }
    Ok(result)
}

/// Column types guessed from the text cells, as the delimited-text loader
/// in the original pipeline does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Guess the type of column `i`: INTEGER if every non-empty cell parses as
/// an integer, REAL if every non-empty cell parses as a float, else TEXT.
fn guess_column_type(table: &TextTable, i: usize) -> ColumnType {
    let mut result = ColumnType::Integer;
    for row in &table.rows {
        let Some(cell) = row.get(i).filter(|cell| !cell.is_empty()) else {
            continue;
        };
        if result == ColumnType::Integer && cell.parse::<i64>().is_err() {
            result = ColumnType::Real;
        }
        if result == ColumnType::Real && cell.parse::<f64>().is_err() {
            return ColumnType::Text;
        }
    }
    result
}

/// Convert a text cell to a value of the column's guessed type (empty cells
/// become NULL).
fn cell_to_value(cell: Option<&String>, column_type: ColumnType) -> Value {
    match cell {
        None => Value::Null,
        Some(cell) if cell.is_empty() => Value::Null,
        Some(cell) => match column_type {
            ColumnType::Integer => cell
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(cell.clone())),
            ColumnType::Real => cell
                .parse::<f64>()
                .map(Value::Real)
                .unwrap_or_else(|_| Value::Text(cell.clone())),
            ColumnType::Text => Value::Text(cell.clone()),
        },
    }
}

/// Load a `TextTable` into the database, replacing any previous incarnation
/// of the table and indexing it on the given columns.
///
/// Column types are guessed from the cell contents so that downstream
/// report queries can use numeric comparisons on metric columns.
pub fn load_table(
    conn: &Connection,
    name: &str,
    table: &TextTable,
    index: &[&str],
) -> Result<(), anyhow::Error> {
    if table.header.is_empty() {
        anyhow::bail!("refusing to load table {} without columns", name);
    }

    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)))?;

    let column_types: Vec<ColumnType> = (0..table.header.len())
        .map(|i| guess_column_type(table, i))
        .collect();
    let columns = table
        .header
        .iter()
        .zip(column_types.iter())
        .map(|(col, column_type)| format!("{} {}", quote_ident(col), column_type.as_sql()))
        .join(", ");
    conn.execute_batch(&format!("CREATE TABLE {} ({})", quote_ident(name), columns))?;

    let placeholders = vec!["?"; table.header.len()].join(", ");
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(name),
            placeholders
        ))?;
        for row in &table.rows {
            // Pad short rows with NULL and ignore excess cells.
            let values = (0..table.header.len())
                .map(|i| cell_to_value(row.get(i), column_types[i]));
            stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }
    tx.commit()?;

    for col in index {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(&format!("{}_{}", name, col)),
            quote_ident(name),
            quote_ident(col)
        ))?;
    }

    tracing::debug!("loaded {} rows into table {}", table.rows.len(), name);
    Ok(())
}

/// Quote an identifier for interpolation into a statement.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a single value for TSV output (NULL becomes the empty string).
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => String::from_utf8_lossy(b).to_string(),
    }
}
