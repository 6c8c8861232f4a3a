//! Relational store abstraction and its SQLite implementation.
//!
//! The loader only needs a narrow surface from the database: run a statement,
//! list a table's columns and declared types in the store's own order, stream
//! rows back as text,
//! and open/close a transaction around the dedup window. [`Database`] captures
//! that surface so the pipeline stays independent of the backend;
//! [`SqliteDatabase`] implements it over `rusqlite`.

use std::{path::Path, time::Duration};

use log::debug;
use rusqlite::{Connection, ErrorCode, types::ValueRef};
use thiserror::Error;

use crate::{identifier::quote_identifier, schema::TypeTag};

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("table '{0}' does not exist")]
    MissingTable(String),
    /// A statement violated a table constraint, such as a column type check.
    #[error("rejected by table constraint: {0}")]
    Rejected(String),
}

impl DatabaseError {
    fn from_sqlite(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                DatabaseError::Rejected(message.unwrap_or_else(|| failure.to_string()))
            }
            other => DatabaseError::Sqlite(other),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DatabaseError>;

/// A column as the store describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared SQL type; empty when the store recorded none.
    pub declared_type: String,
}

impl ColumnInfo {
    /// Maps the declared type back onto a [`TypeTag`] by SQLite's affinity
    /// rules, so `DECIMAL` and the `NUM` that `CREATE TABLE ... AS` records
    /// both come back as [`TypeTag::Decimal`].
    pub fn type_tag(&self) -> TypeTag {
        let declared = self.declared_type.to_ascii_uppercase();
        if declared.contains("INT") {
            TypeTag::BigInt
        } else if ["CHAR", "CLOB", "TEXT", "BLOB"]
            .iter()
            .any(|marker| declared.contains(marker))
            || declared.is_empty()
        {
            TypeTag::Text
        } else {
            TypeTag::Decimal
        }
    }
}

/// One result row with every value rendered as text; `None` is SQL NULL.
pub type TextRow = Vec<Option<String>>;

pub trait Database {
    /// Executes a single DDL or DML statement.
    fn execute(&self, sql: &str) -> DbResult<()>;

    /// Columns of `table` in the order the store reports them.
    fn columns(&self, table: &str) -> DbResult<Vec<ColumnInfo>>;

    fn column_names(&self, table: &str) -> DbResult<Vec<String>> {
        Ok(self
            .columns(table)?
            .into_iter()
            .map(|column| column.name)
            .collect())
    }

    /// Runs `sql` and hands every result row to `visit`, stopping at the first error.
    fn for_each_row(
        &self,
        sql: &str,
        visit: &mut dyn FnMut(TextRow) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>;

    fn begin(&self) -> DbResult<()> {
        self.execute("BEGIN")
    }

    fn commit(&self) -> DbResult<()> {
        self.execute("COMMIT")
    }

    fn rollback(&self) -> DbResult<()> {
        self.execute("ROLLBACK")
    }
}

pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> DbResult<Self> {
        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        Ok(Self { conn })
    }
}

impl Database for SqliteDatabase {
    fn execute(&self, sql: &str) -> DbResult<()> {
        debug!("sqlite: {sql}");
        self.conn
            .execute_batch(sql)
            .map_err(DatabaseError::from_sqlite)
    }

    fn columns(&self, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let pragma = format!("PRAGMA table_info({})", quote_identifier(table));
        let mut stmt = self.conn.prepare(&pragma)?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get("name")?,
                    declared_type: row.get("type")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(DatabaseError::MissingTable(table.to_string()));
        }
        Ok(columns)
    }

    fn for_each_row(
        &self,
        sql: &str,
        visit: &mut dyn FnMut(TextRow) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        debug!("sqlite: {sql}");
        let mut stmt = self.conn.prepare(sql)?;
        let width = stmt.column_count();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(render_value(row.get_ref(idx)?));
            }
            visit(values)?;
        }
        Ok(())
    }
}

/// Reals use `Debug` formatting so they always keep a fraction or exponent.
fn render_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(format!("{f:?}")),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
