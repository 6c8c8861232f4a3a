use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::loader::RowErrorPolicy;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load delimited files into SQL tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer column types, (re)create the table and insert every row
    Load(LoadArgs),
    /// Print the column types that a load would create
    Infer(InferArgs),
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Input file to load
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// SQLite database file (created if missing)
    #[arg(short = 'd', long = "database")]
    pub database: PathBuf,
    /// Destination table (defaults to the input file name without extension)
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    /// Remove duplicate rows from both the table and the input file after loading
    #[arg(long = "dedupe")]
    pub dedupe: bool,
    /// Field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// What to do when the database rejects a row
    #[arg(long = "on-row-error", value_enum, default_value = "continue")]
    pub on_row_error: RowErrorPolicy,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    /// Input file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Also write the inferred schema as JSON to this path
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
