//! # Source Extraction
//!
//! Reads the delimited retail export into [`Record`]s. Bytes are decoded as
//! Latin-1 by default, so any byte sequence is accepted. Typed fields are
//! coerced here and missing `Description`/`CustomerID` values get their
//! sentinels; a row that cannot be coerced aborts the whole extraction.

use crate::constants::{
    loader::DEFAULT_DELIMITER, MISSING_VALUE_TOKENS, NO_DESCRIPTION, SOURCE_COLUMNS,
    SOURCE_TIMESTAMP_FORMATS, UNKNOWN_CUSTOMER_ID,
};
use crate::error::{PipelineError, Result};
use crate::models::Record;
use chrono::NaiveDateTime;
use csv::{ByteRecord, ReaderBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Character encoding of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceEncoding {
    /// ISO-8859-1; every byte maps to one character
    #[default]
    #[serde(alias = "iso-8859-1", alias = "latin-1")]
    Latin1,
    /// UTF-8, falling back to Latin-1 for fields that are not valid UTF-8
    #[serde(alias = "utf-8")]
    Utf8,
}

impl SourceEncoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => latin1(bytes),
            Self::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => text.to_string(),
                Err(_) => latin1(bytes),
            },
        }
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn is_missing(value: &str) -> bool {
    MISSING_VALUE_TOKENS.contains(&value.trim())
}

/// Positions of the source columns within the file's header
#[derive(Debug, Clone, Copy)]
struct ColumnIndex([usize; SOURCE_COLUMNS.len()]);

impl ColumnIndex {
    fn from_header(header: &[String]) -> Result<Self> {
        let mut positions = [0usize; SOURCE_COLUMNS.len()];
        for (slot, column) in positions.iter_mut().zip(SOURCE_COLUMNS) {
            *slot = header
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}') == column)
                .ok_or_else(|| {
                    PipelineError::record_parse(1, column, header.join(","), "column missing from header")
                })?;
        }
        Ok(Self(positions))
    }
}

#[derive(Debug, Clone)]
pub struct SourceReader {
    encoding: SourceEncoding,
    delimiter: u8,
}

impl Default for SourceReader {
    fn default() -> Self {
        Self {
            encoding: SourceEncoding::default(),
            delimiter: DEFAULT_DELIMITER as u8,
        }
    }
}

impl SourceReader {
    pub fn new(encoding: SourceEncoding, delimiter: u8) -> Self {
        Self {
            encoding,
            delimiter,
        }
    }

    /// Extract every record of the file at `path` on the blocking pool
    pub async fn extract(&self, path: &Path) -> Result<Vec<Record>> {
        let reader = self.clone();
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || reader.read_path(&path)).await?
    }

    pub fn read_path(&self, path: &Path) -> Result<Vec<Record>> {
        info!("Reading source file from {}", path.display());
        let file = File::open(path).map_err(|e| PipelineError::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let records = self.read_from(file)?;
        info!("Loaded {} rows from {}", records.len(), path.display());
        Ok(records)
    }

    /// Extract records from any reader positioned at the header row
    pub fn read_from<R: Read>(&self, source: R) -> Result<Vec<Record>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(source);

        let header: Vec<String> = reader
            .byte_headers()
            .map_err(|e| csv_error(&e, 1))?
            .iter()
            .map(|field| self.encoding.decode(field))
            .collect();
        let columns = ColumnIndex::from_header(&header)?;

        let mut records = Vec::new();
        let mut row = ByteRecord::new();
        loop {
            let line = reader.position().line();
            match reader.read_byte_record(&mut row) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(csv_error(&e, line)),
            }
            let line = row.position().map_or(line, |p| p.line());
            records.push(self.coerce(&row, columns, line)?);
        }

        debug!(rows = records.len(), encoding = ?self.encoding, "Source extraction complete");
        Ok(records)
    }

    fn coerce(&self, row: &ByteRecord, columns: ColumnIndex, line: u64) -> Result<Record> {
        let field = |position: usize| -> String {
            row.get(columns.0[position])
                .map(|bytes| self.encoding.decode(bytes))
                .unwrap_or_default()
        };

        let quantity_text = field(3);
        let timestamp_text = field(4);
        let price_text = field(5);

        Ok(Record {
            invoice_id: field(0),
            stock_code: field(1),
            description: or_sentinel(field(2), NO_DESCRIPTION),
            quantity: parse_quantity(&quantity_text, line)?,
            invoice_timestamp: parse_timestamp(&timestamp_text, line)?,
            unit_price: parse_price(&price_text, line)?,
            customer_id: or_sentinel(field(6), UNKNOWN_CUSTOMER_ID),
            country: field(7),
        })
    }
}

fn or_sentinel(value: String, sentinel: &str) -> String {
    if is_missing(&value) {
        sentinel.to_string()
    } else {
        value
    }
}

fn parse_quantity(text: &str, line: u64) -> Result<i64> {
    if is_missing(text) {
        return Err(PipelineError::record_parse(line, SOURCE_COLUMNS[3], text, "missing value"));
    }
    text.trim()
        .parse::<i64>()
        .map_err(|e| PipelineError::record_parse(line, SOURCE_COLUMNS[3], text, e.to_string()))
}

fn parse_timestamp(text: &str, line: u64) -> Result<NaiveDateTime> {
    if is_missing(text) {
        return Err(PipelineError::record_parse(line, SOURCE_COLUMNS[4], text, "missing value"));
    }
    let trimmed = text.trim();
    SOURCE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| {
            PipelineError::record_parse(line, SOURCE_COLUMNS[4], text, "unrecognized timestamp layout")
        })
}

fn parse_price(text: &str, line: u64) -> Result<Decimal> {
    if is_missing(text) {
        return Err(PipelineError::record_parse(line, SOURCE_COLUMNS[5], text, "missing value"));
    }
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| PipelineError::record_parse(line, SOURCE_COLUMNS[5], text, e.to_string()))
}

fn csv_error(err: &csv::Error, line: u64) -> PipelineError {
    let line = err.position().map_or(line, |p| p.line());
    PipelineError::record_parse(line, "record", "", err.to_string())
}
