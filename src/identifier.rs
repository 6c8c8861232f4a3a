//! Column and table identifier handling.
//!
//! [`normalize_identifier`] turns a raw header label into the lowercase,
//! underscore-separated name used for the destination column.
//! [`quote_identifier`] makes any name safe to splice into generated SQL.

use std::{path::Path, sync::OnceLock};

use regex::Regex;

use crate::error::{LoadError, LoadResult};

static ACRONYM_BOUNDARY: OnceLock<Regex> = OnceLock::new();
static CAMEL_BOUNDARY: OnceLock<Regex> = OnceLock::new();
static TABLE_NAME: OnceLock<Regex> = OnceLock::new();

fn acronym_boundary() -> &'static Regex {
    ACRONYM_BOUNDARY
        .get_or_init(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("valid acronym pattern"))
}

fn camel_boundary() -> &'static Regex {
    CAMEL_BOUNDARY.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid camel pattern"))
}

fn table_name_pattern() -> &'static Regex {
    TABLE_NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table pattern"))
}

/// Converts a raw header label to snake case.
///
/// `HTTPServer` becomes `http_server` and `userId` becomes `user_id`. Anything
/// other than case boundaries (spaces, punctuation) is left in place and
/// handled by quoting at the SQL layer.
pub fn normalize_identifier(raw: &str) -> String {
    let split_acronyms = acronym_boundary().replace_all(raw, "${1}_${2}");
    let split_camel = camel_boundary().replace_all(&split_acronyms, "${1}_${2}");
    split_camel.to_lowercase()
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn validate_table_name(name: &str) -> LoadResult<()> {
    if table_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(LoadError::InvalidTableName(name.to_string()))
    }
}

/// Base name of the input file without its extension.
pub fn table_name_from_path(path: &Path) -> LoadResult<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LoadError::UnnamedInput(path.to_path_buf()))
}
