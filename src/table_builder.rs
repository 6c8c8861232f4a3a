use itertools::Itertools;
use log::{debug, info};

use crate::{
    database::Database,
    error::{LoadError, LoadResult},
    identifier::quote_identifier,
    schema::{Column, Schema, TypeTag},
};

/// Drops `table`, treating any failure as "nothing to drop".
///
/// Returns whether a table was actually dropped.
pub fn drop_table_if_present(db: &dyn Database, table: &str) -> bool {
    match db.execute(&format!("DROP TABLE {}", quote_identifier(table))) {
        Ok(()) => {
            debug!("Dropped existing table '{table}'");
            true
        }
        Err(err) => {
            debug!("No existing table '{table}' to drop ({err})");
            false
        }
    }
}

/// One column definition. Numeric columns carry a storage-class check so a
/// value the store cannot coerce to the declared type is rejected instead of
/// being kept as text.
pub fn column_definition(column: &Column) -> String {
    let name = quote_identifier(column.normalized_name());
    let sql_type = column.inferred_type.sql_type();
    let allowed = match column.inferred_type.resolved() {
        TypeTag::BigInt => "'integer','null'",
        TypeTag::Decimal => "'integer','real','null'",
        TypeTag::Unset | TypeTag::Text => return format!("{name} {sql_type}"),
    };
    format!("{name} {sql_type} CHECK (typeof({name}) IN ({allowed}))")
}

pub fn create_table_sql(table: &str, schema: &Schema) -> String {
    let columns = schema.columns.iter().map(column_definition).join(", ");
    format!("CREATE TABLE {} ({columns})", quote_identifier(table))
}

/// Replaces `table` with an empty table shaped like `schema`.
///
/// A failed create is fatal and the previous table, if there was one, is
/// already gone by then.
pub fn build_table(db: &dyn Database, table: &str, schema: &Schema) -> LoadResult<()> {
    drop_table_if_present(db, table);
    db.execute(&create_table_sql(table, schema))
        .map_err(|source| LoadError::CreateTable {
            table: table.to_string(),
            source,
        })?;
    info!(
        "Created table '{table}' with {} column(s): {}",
        schema.len(),
        schema
            .columns
            .iter()
            .map(|c| format!("{} {}", c.normalized_name(), c.inferred_type.sql_type()))
            .join(", ")
    );
    Ok(())
}
