//! Sequential orchestration of one load run.
//!
//! Infer (first read of the file) -> build table -> bulk load (second read)
//! -> optional dedup. Each phase finishes before the next starts.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use encoding_rs::{Encoding, UTF_8};
use log::info;

use crate::{
    database::Database,
    dedupe::{self, DedupReport},
    error::{LoadError, LoadResult},
    identifier::{table_name_from_path, validate_table_name},
    io_utils,
    loader::{self, LoadReport, RowErrorPolicy},
    schema::{self, Schema},
    table_builder,
};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub input: PathBuf,
    /// Destination table; defaults to the input file's base name.
    pub table: Option<String>,
    pub dedupe: bool,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub row_errors: RowErrorPolicy,
}

impl LoadOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        let input = input.into();
        let delimiter = io_utils::resolve_input_delimiter(&input, None);
        Self {
            input,
            table: None,
            dedupe: false,
            delimiter,
            encoding: UTF_8,
            row_errors: RowErrorPolicy::default(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn row_errors(mut self, policy: RowErrorPolicy) -> Self {
        self.row_errors = policy;
        self
    }

    pub fn resolve_table_name(&self) -> LoadResult<String> {
        let name = match &self.table {
            Some(name) => name.trim().to_string(),
            None => table_name_from_path(&self.input)?,
        };
        validate_table_name(&name)?;
        Ok(name)
    }
}

#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub table: String,
    pub schema: Schema,
    pub report: LoadReport,
    pub dedup: Option<DedupReport>,
    /// Time spent inferring, building and loading; dedup is not included.
    pub elapsed: Duration,
}

pub fn run(db: &dyn Database, options: &LoadOptions) -> LoadResult<LoadSummary> {
    let started = Instant::now();
    let table = options.resolve_table_name()?;
    let input = options.input.as_path();

    let schema = infer(input, options)?;
    table_builder::build_table(db, &table, &schema)?;
    let report = loader::bulk_load(
        db,
        &table,
        &schema,
        input,
        options.delimiter,
        options.encoding,
        options.row_errors,
    )?;
    let elapsed = started.elapsed();

    let dedup = if options.dedupe {
        Some(dedupe::deduplicate(
            db,
            &table,
            input,
            options.delimiter,
            options.encoding,
        )?)
    } else {
        None
    };

    info!(
        "{table} has been created using {} in {:.3}s",
        input.display(),
        elapsed.as_secs_f64()
    );
    Ok(LoadSummary {
        table,
        schema,
        report,
        dedup,
        elapsed,
    })
}

fn infer(input: &Path, options: &LoadOptions) -> LoadResult<Schema> {
    let (schema, stats) = schema::infer_schema(input, options.delimiter, options.encoding)
        .map_err(|err| LoadError::input(input, err))?;
    info!(
        "Inferred {} column(s) from {} data row(s) in {}",
        schema.len(),
        stats.rows_scanned,
        input.display()
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_defaults_to_file_stem() {
        let options = LoadOptions::new("exports/customers.csv");
        assert_eq!(options.resolve_table_name().unwrap(), "customers");
    }

    #[test]
    fn explicit_table_name_is_validated() {
        let options = LoadOptions::new("customers.csv").table("bad-name");
        assert!(matches!(
            options.resolve_table_name(),
            Err(LoadError::InvalidTableName(name)) if name == "bad-name"
        ));
    }

    #[test]
    fn tsv_input_defaults_to_tab_delimiter() {
        assert_eq!(LoadOptions::new("data.tsv").delimiter, b'\t');
        assert_eq!(LoadOptions::new("data.csv").delimiter, b',');
    }
}
