//! Row-by-row insertion of the source file into the destination table.
//!
//! Values are spliced into the statement as text literals and left to the
//! column's declared type to coerce. Each row is its own statement with no
//! surrounding transaction, so a failed row never takes earlier rows with it.

use std::path::Path;

use clap::ValueEnum;
use encoding_rs::Encoding;
use itertools::Itertools;
use log::{info, warn};

use crate::{
    database::Database,
    error::{LoadError, LoadResult},
    identifier::quote_identifier,
    io_utils,
    schema::Schema,
};

pub const NULL_LITERAL: &str = "NULL";

/// What to do when a single row is rejected by the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum RowErrorPolicy {
    /// Log the failure and keep inserting the remaining rows.
    #[default]
    Continue,
    /// Stop the load at the first rejected row.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// 1-based line of the record in the source file (the header is line 1).
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: usize,
    pub failures: Vec<RowFailure>,
}

impl LoadReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Renders one raw field as a SQL literal.
///
/// Blank input becomes `NULL`. Anything else is trimmed, has inner whitespace
/// runs squeezed to a single space, and is single-quoted with embedded quotes
/// doubled.
pub fn format_for_insert(value: Option<&str>) -> String {
    match value {
        Some(raw) if !raw.trim().is_empty() => {
            let squeezed = raw.split_whitespace().join(" ");
            format!("'{}'", squeezed.replace('\'', "''"))
        }
        _ => NULL_LITERAL.to_string(),
    }
}

pub fn insert_statement<S: AsRef<str>>(table: &str, row: &[S]) -> String {
    let values = row
        .iter()
        .map(|value| format_for_insert(Some(value.as_ref())))
        .join(",");
    format!("INSERT INTO {} VALUES ({values})", quote_identifier(table))
}

/// Re-reads `path` from the top, skipping the header, and inserts every record.
///
/// Unreadable input is fatal. Rows the database rejects are collected in the
/// report, or end the load under [`RowErrorPolicy::Abort`].
pub fn bulk_load(
    db: &dyn Database,
    table: &str,
    schema: &Schema,
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    policy: RowErrorPolicy,
) -> LoadResult<LoadReport> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)
        .map_err(|err| LoadError::input(path, err))?;
    let mut report = LoadReport::default();

    let mut record = csv::ByteRecord::new();
    loop {
        let has_row = reader
            .read_byte_record(&mut record)
            .map_err(|err| LoadError::input(path, err))?;
        if !has_row {
            break;
        }
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let values =
            io_utils::decode_record(&record, encoding).map_err(|err| LoadError::input(path, err))?;
        if values.len() != schema.len() {
            warn!(
                "Line {line} has {} field(s), table '{table}' has {}",
                values.len(),
                schema.len()
            );
        }

        match db.execute(&insert_statement(table, &values)) {
            Ok(()) => report.inserted += 1,
            Err(source) => {
                if policy == RowErrorPolicy::Abort {
                    return Err(LoadError::RowAborted {
                        table: table.to_string(),
                        line,
                        source,
                    });
                }
                warn!("Skipping line {line}: {source}");
                report.failures.push(RowFailure {
                    line,
                    message: source.to_string(),
                });
            }
        }
    }

    info!(
        "Inserted {} row(s) into '{table}' ({} failed)",
        report.inserted,
        report.failed()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_format_as_null() {
        assert_eq!(format_for_insert(None), "NULL");
        assert_eq!(format_for_insert(Some("")), "NULL");
        assert_eq!(format_for_insert(Some(" \t ")), "NULL");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(format_for_insert(Some("O'Brien")), "'O''Brien'");
    }

    #[test]
    fn whitespace_is_trimmed_and_squeezed() {
        assert_eq!(format_for_insert(Some("  a   b  ")), "'a b'");
        assert_eq!(format_for_insert(Some("x\t\ty")), "'x y'");
    }

    #[test]
    fn insert_statement_joins_values_positionally() {
        assert_eq!(
            insert_statement("people", &["1", "", "Ann"]),
            "INSERT INTO \"people\" VALUES ('1',NULL,'Ann')"
        );
    }
}
