//! Delimited-file reading and writing.
//!
//! Both passes over the source file and the dedup rewrite go through here:
//!
//! - **Delimiter resolution**: `.tsv` defaults to tab, everything else to comma,
//!   with a manual override.
//! - **Encoding**: fields are decoded with `encoding_rs` (UTF-8 unless told
//!   otherwise) and the rewrite is encoded back to the same label.
//! - **Readers** are flexible about field counts; short or long rows are the
//!   loader's problem, not the parser's.
//! - **Rewrites** are staged in a sibling file and only replace the target once
//!   every record has been written.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use tempfile::NamedTempFile;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

/// Writes delimited records that replace a file, encoding each finished record.
///
/// Records are rendered by `csv` into an in-memory UTF-8 buffer first so the
/// encoder never sees a partial multi-byte sequence. Output goes to a staging
/// file next to the target; [`EncodedCsvWriter::finish`] renames it over the
/// target, and dropping the writer unfinished leaves the target untouched.
pub struct EncodedCsvWriter {
    builder: csv::WriterBuilder,
    sink: BufWriter<NamedTempFile>,
    target: PathBuf,
    encoding: &'static Encoding,
}

impl EncodedCsvWriter {
    pub fn create(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("Creating staging file for {path:?}"))?;
        if let Ok(metadata) = fs::metadata(path) {
            staged
                .as_file()
                .set_permissions(metadata.permissions())
                .with_context(|| format!("Copying permissions of {path:?}"))?;
        }
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(delimiter)
            .quote_style(QuoteStyle::Necessary)
            .double_quote(true);
        Ok(Self {
            builder,
            sink: BufWriter::new(staged),
            target: path.to_path_buf(),
            encoding,
        })
    }

    pub fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut staging = self.builder.from_writer(Vec::new());
        staging.write_record(record)?;
        let rendered = staging
            .into_inner()
            .map_err(|err| anyhow!("Rendering output record: {}", err.error()))?;
        if self.encoding == UTF_8 {
            self.sink.write_all(&rendered)?;
            return Ok(());
        }
        let text = String::from_utf8(rendered).context("Output record is not valid UTF-8")?;
        let (encoded, _, had_errors) = self.encoding.encode(&text);
        if had_errors {
            return Err(anyhow!(
                "Failed to encode text using {}",
                self.encoding.name()
            ));
        }
        self.sink.write_all(encoded.as_ref())?;
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        let staged = self
            .sink
            .into_inner()
            .map_err(|err| anyhow!("Flushing output writer: {}", err.error()))?;
        staged
            .persist(&self.target)
            .map_err(|err| err.error)
            .with_context(|| format!("Replacing {:?}", self.target))?;
        Ok(())
    }
}
