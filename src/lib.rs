pub mod cli;
pub mod database;
pub mod dedupe;
pub mod error;
pub mod identifier;
pub mod io_utils;
pub mod loader;
pub mod pipeline;
pub mod schema;
pub mod table;
pub mod table_builder;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    cli::{Cli, Commands},
    database::SqliteDatabase,
    pipeline::LoadOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_loader", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => handle_load(&args),
        Commands::Infer(args) => handle_infer(&args),
    }
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Loading '{}' into {:?} with delimiter '{}'",
        args.input.display(),
        args.database,
        printable_delimiter(delimiter)
    );

    let mut options = LoadOptions::new(&args.input)
        .dedupe(args.dedupe)
        .delimiter(delimiter)
        .encoding(encoding)
        .row_errors(args.on_row_error);
    if let Some(table) = &args.table {
        options = options.table(table.as_str());
    }

    let db = SqliteDatabase::open(&args.database)
        .with_context(|| format!("Opening database {:?}", args.database))?;
    let summary = pipeline::run(&db, &options)
        .with_context(|| format!("Loading {:?}", args.input))?;

    if summary.report.failed() > 0 {
        warn!(
            "{} row(s) were rejected while loading '{}'",
            summary.report.failed(),
            summary.table
        );
    }
    Ok(())
}

fn handle_infer(args: &cli::InferArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Inferring column types for '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let (schema, stats) = schema::infer_schema(&args.input, delimiter, encoding)
        .with_context(|| format!("Inferring schema from {:?}", args.input))?;

    if schema.is_empty() {
        println!("No columns inferred.");
    } else {
        print!("{}", table::render_schema(&schema));
    }
    if let Some(output) = &args.output {
        schema
            .save(output)
            .with_context(|| format!("Writing schema to {output:?}"))?;
        info!(
            "Schema for {} column(s) from {} row(s) written to {:?}",
            schema.len(),
            stats.rows_scanned,
            output
        );
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
