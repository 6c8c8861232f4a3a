//! Collapsing exact-duplicate rows in both the table and its source file.
//!
//! The table is rebuilt from `SELECT DISTINCT` over a sorted copy of itself,
//! then the file is rewritten from the rebuilt table in the same order, so the
//! two end up with identical rows, row order and column order. Column order
//! comes from the database's metadata, not from the inferred schema.
//!
//! Materializing the copy, dropping the original and recreating it run in one
//! transaction. If any of those fail the transaction is rolled back and the
//! original table survives; the file is only replaced after the commit, and
//! only once the whole rewrite has succeeded.
//!
//! The store normalizes numbers in decimal columns (`2.0` comes back as `2`),
//! so whole values in those columns are written with a `.0` fraction and the
//! rewritten file infers the same schema as the original.

use std::path::Path;

use encoding_rs::Encoding;
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    database::{ColumnInfo, Database},
    error::{DedupStep, LoadError, LoadResult},
    identifier::quote_identifier,
    io_utils::EncodedCsvWriter,
    schema::{TypeTag, is_integer_literal},
    table_builder::drop_table_if_present,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupReport {
    /// Column names in the order the database reported them.
    pub columns: Vec<String>,
    pub rows_written: usize,
}

pub fn temp_table_name(table: &str) -> String {
    format!("temp_{table}")
}

pub fn order_by_clause(columns: &[String]) -> String {
    format!(
        "ORDER BY {}",
        columns.iter().map(|c| quote_identifier(c)).join(", ")
    )
}

pub fn deduplicate(
    db: &dyn Database,
    table: &str,
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> LoadResult<DedupReport> {
    info!("Removing duplicates from both '{table}' and {path:?}");
    let temp_table = temp_table_name(table);
    if drop_table_if_present(db, &temp_table) {
        debug!("Dropped leftover temporary table '{temp_table}'");
    }

    let described = db
        .columns(table)
        .map_err(|err| LoadError::dedup(table, DedupStep::ReadColumns, err))?;
    let columns: Vec<String> = described.iter().map(|c| c.name.clone()).collect();
    let order_by = order_by_clause(&columns);

    rebuild_distinct(db, table, &temp_table, &order_by)?;

    let rows_written = rewrite_source(db, table, &described, &order_by, path, delimiter, encoding)
        .map_err(|err| LoadError::dedup(table, DedupStep::RewriteFile, err))?;

    db.execute(&format!("DROP TABLE {}", quote_identifier(&temp_table)))
        .map_err(|err| LoadError::dedup(table, DedupStep::DropTemporary, err))?;

    info!("Duplicates removed for '{table}': {rows_written} distinct row(s) remain");
    Ok(DedupReport {
        columns,
        rows_written,
    })
}

fn rebuild_distinct(
    db: &dyn Database,
    table: &str,
    temp_table: &str,
    order_by: &str,
) -> LoadResult<()> {
    let quoted_table = quote_identifier(table);
    let quoted_temp = quote_identifier(temp_table);
    let steps = [
        (
            DedupStep::MaterializeSorted,
            format!("CREATE TABLE {quoted_temp} AS SELECT * FROM {quoted_table} {order_by}"),
        ),
        (DedupStep::DropOriginal, format!("DROP TABLE {quoted_table}")),
        (
            DedupStep::RecreateDistinct,
            format!("CREATE TABLE {quoted_table} AS SELECT DISTINCT * FROM {quoted_temp}"),
        ),
    ];

    db.begin()
        .map_err(|err| LoadError::dedup(table, DedupStep::BeginTransaction, err))?;
    for (step, sql) in &steps {
        if let Err(err) = db.execute(sql) {
            if let Err(rollback_err) = db.rollback() {
                warn!("Rolling back dedup of '{table}' failed: {rollback_err}");
            }
            return Err(LoadError::dedup(table, *step, err));
        }
    }
    if let Err(err) = db.commit() {
        if let Err(rollback_err) = db.rollback() {
            warn!("Rolling back dedup of '{table}' failed: {rollback_err}");
        }
        return Err(LoadError::dedup(table, DedupStep::Commit, err));
    }
    Ok(())
}

/// Renders a value read back from the table as a field of the rewritten file.
pub fn rewrite_field(value: Option<&str>, column_type: TypeTag) -> String {
    match value {
        None => String::new(),
        Some(text) if column_type == TypeTag::Decimal && is_integer_literal(text) => {
            format!("{text}.0")
        }
        Some(text) => text.to_string(),
    }
}

fn rewrite_source(
    db: &dyn Database,
    table: &str,
    columns: &[ColumnInfo],
    order_by: &str,
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> anyhow::Result<usize> {
    let types: Vec<TypeTag> = columns.iter().map(ColumnInfo::type_tag).collect();
    let mut writer = EncodedCsvWriter::create(path, delimiter, encoding)?;
    writer.write_record(columns.iter().map(|c| c.name.as_str()))?;

    let projection = columns.iter().map(|c| quote_identifier(&c.name)).join(", ");
    let select = format!(
        "SELECT {projection} FROM {} {order_by}",
        quote_identifier(table)
    );
    let mut rows = 0usize;
    db.for_each_row(&select, &mut |row| {
        writer.write_record(
            row.iter()
                .zip(&types)
                .map(|(value, tag)| rewrite_field(value.as_deref(), *tag)),
        )?;
        rows += 1;
        Ok(())
    })?;
    writer.finish()?;
    Ok(rows)
}
