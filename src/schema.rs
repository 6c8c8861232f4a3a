//! Column type inference.
//!
//! This module owns the [`Schema`] (ordered columns as they appear in the
//! header), the [`TypeTag`] lattice used while scanning, and the streaming
//! inference pass.
//!
//! ## Promotion
//!
//! Every non-blank value is classified as an integer literal, a decimal literal
//! or plain text, and the column's tag is promoted accordingly. Tags only move
//! up the order `Unset < BigInt < Decimal < Text`:
//!
//! - text pins the column at `Text`;
//! - a decimal lifts `Unset` or `BigInt` to `Decimal`;
//! - an integer only decides a column that is still `Unset`.
//!
//! Columns that never saw a value resolve to `Text`.

use std::{fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::{identifier::normalize_identifier, io_utils};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Unset,
    BigInt,
    Decimal,
    Text,
}

impl TypeTag {
    /// Applies one observed value class, never moving down the order.
    pub fn promote(self, observed: ValueClass) -> TypeTag {
        match observed {
            ValueClass::Empty => self,
            ValueClass::Text => TypeTag::Text,
            ValueClass::Decimal => self.max(TypeTag::Decimal),
            ValueClass::Integer => {
                if self == TypeTag::Unset {
                    TypeTag::BigInt
                } else {
                    self
                }
            }
        }
    }

    /// Final tag once scanning is over.
    pub fn resolved(self) -> TypeTag {
        match self {
            TypeTag::Unset => TypeTag::Text,
            other => other,
        }
    }

    pub fn sql_type(self) -> &'static str {
        match self.resolved() {
            TypeTag::BigInt => "BIGINT",
            TypeTag::Decimal => "DECIMAL",
            _ => "TEXT",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TypeTag::Unset => "unset",
            TypeTag::BigInt => "bigint",
            TypeTag::Decimal => "decimal",
            TypeTag::Text => "text",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    Empty,
    Integer,
    Decimal,
    Text,
}

pub fn classify_value(value: &str) -> ValueClass {
    if value.trim().is_empty() {
        ValueClass::Empty
    } else if is_integer_literal(value) {
        ValueClass::Integer
    } else if is_decimal_literal(value) {
        ValueClass::Decimal
    } else {
        ValueClass::Text
    }
}

/// True only when the parsed integer prints back as the exact same text.
pub fn is_integer_literal(value: &str) -> bool {
    value
        .parse::<i64>()
        .map(|parsed| parsed.to_string() == value)
        .unwrap_or(false)
}

pub fn is_decimal_literal(value: &str) -> bool {
    let numeric_chars = value
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    let has_digit = value.bytes().any(|b| b.is_ascii_digit());
    let has_fraction_or_exponent = value.bytes().any(|b| matches!(b, b'.' | b'e' | b'E'));
    if !(numeric_chars && has_digit && has_fraction_or_exponent) {
        return false;
    }
    value
        .parse::<f64>()
        .map(|parsed| parsed.is_finite())
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub raw_name: String,
    normalized_name: String,
    pub inferred_type: TypeTag,
}

impl Column {
    pub fn new(raw_name: &str) -> Self {
        Self {
            raw_name: raw_name.to_string(),
            normalized_name: normalize_identifier(raw_name),
            inferred_type: TypeTag::Unset,
        }
    }

    pub fn with_type(raw_name: &str, inferred_type: TypeTag) -> Self {
        Self {
            inferred_type,
            ..Self::new(raw_name)
        }
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    pub fn observe(&mut self, value: &str) {
        self.inferred_type = self.inferred_type.promote(classify_value(value));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let columns = headers.iter().map(|h| Column::new(h.as_ref())).collect();
        Schema { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Folds one data row into the column tags. Missing trailing fields count
    /// as blank; extra fields are ignored.
    pub fn observe_row<S: AsRef<str>>(&mut self, row: &[S]) {
        for (column, value) in self.columns.iter_mut().zip(row.iter()) {
            column.observe(value.as_ref());
        }
    }

    pub fn finalize(&mut self) {
        for column in &mut self.columns {
            column.inferred_type = column.inferred_type.resolved();
        }
    }

    pub fn normalized_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::normalized_name).collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing schema JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema = serde_json::from_reader(reader).context("Parsing schema JSON")?;
        Ok(schema)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceStats {
    pub rows_scanned: usize,
}

/// Runs inference over rows already in memory. The first row is the header.
pub fn infer_from_rows<I, R, S>(rows: I) -> (Schema, InferenceStats)
where
    I: IntoIterator<Item = R>,
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut rows = rows.into_iter();
    let mut schema = match rows.next() {
        Some(header) => Schema::from_headers(header.as_ref()),
        None => Schema { columns: Vec::new() },
    };
    let mut stats = InferenceStats::default();
    for row in rows {
        schema.observe_row(row.as_ref());
        stats.rows_scanned += 1;
    }
    schema.finalize();
    (schema, stats)
}

/// Streams `path` once, record by record, and returns the inferred schema.
pub fn infer_schema(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<(Schema, InferenceStats)> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading header row of {path:?}"))?;
    let mut schema = Schema::from_headers(&headers);
    let mut stats = InferenceStats::default();

    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Reading row {} of {path:?}", stats.rows_scanned + 2))?
    {
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", stats.rows_scanned + 2))?;
        schema.observe_row(&decoded);
        stats.rows_scanned += 1;
    }
    schema.finalize();
    Ok((schema, stats))
}
