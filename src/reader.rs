//! Batched reader for pipe-delimited vehicle-test files.
//!
//! The text encoding is chosen once, before the first batch, by sniffing a
//! prefix of the source. Every field of every row is then decoded with that
//! one encoding; a field it cannot decode makes the row malformed.

use anyhow::{Context, Result, bail};
use csv::{ByteRecord, ReaderBuilder};
use encoding_rs::{DecoderResult, Encoding};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::record::RawRecord;

pub const DELIMITER: u8 = b'|';

/// Bytes inspected when choosing the source encoding.
pub const SNIFF_BYTES: u64 = 64 * 1024;

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "vehicle_id",
    "postcode_area",
    "test_mileage",
    "first_use_date",
    "test_date",
    "test_class_id",
    "fuel_type",
];

/// Opens `path` for reading, decompressing `*.gz` sources on the fly.
pub fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        debug!(path = %path.display(), "Reading gzip-compressed source");
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Resolves an encoding label such as `utf-8` or `latin1`.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    match Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) => Ok(encoding),
        None => bail!("Unknown text encoding '{label}'"),
    }
}

/// The encoding chosen for a source, and whether the fallback was needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceEncoding {
    pub encoding: &'static Encoding,
    pub used_fallback: bool,
}

/// Picks `primary` if it decodes the source prefix, otherwise `fallback`.
///
/// Fails if neither encoding can decode the prefix.
pub fn detect_encoding(
    path: &Path,
    primary: &'static Encoding,
    fallback: &'static Encoding,
) -> Result<SourceEncoding> {
    let mut prefix = Vec::new();
    open_source(path)?
        .take(SNIFF_BYTES)
        .read_to_end(&mut prefix)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if decodes_cleanly(primary, &prefix) {
        return Ok(SourceEncoding {
            encoding: primary,
            used_fallback: false,
        });
    }

    warn!(
        primary = primary.name(),
        fallback = fallback.name(),
        "Primary encoding failed, trying fallback"
    );

    if decodes_cleanly(fallback, &prefix) {
        return Ok(SourceEncoding {
            encoding: fallback,
            used_fallback: true,
        });
    }

    bail!(
        "{} cannot be decoded as {} or {}",
        path.display(),
        primary.name(),
        fallback.name()
    )
}

/// A sequence cut off at the end of the prefix does not count as malformed.
fn decodes_cleanly(encoding: &'static Encoding, bytes: &[u8]) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let Some(capacity) = decoder.max_utf8_buffer_length_without_replacement(bytes.len()) else {
        return false;
    };
    let mut decoded = String::with_capacity(capacity);
    let (result, _) = decoder.decode_to_string_without_replacement(bytes, &mut decoded, false);

    !matches!(result, DecoderResult::Malformed(_, _))
}

fn decode_field<'a>(
    encoding: &'static Encoding,
    bytes: &'a [u8],
) -> Option<std::borrow::Cow<'a, str>> {
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

/// Positions of the required columns within the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    vehicle_id: usize,
    postcode_area: usize,
    test_mileage: usize,
    first_use_date: usize,
    test_date: usize,
    test_class_id: usize,
    fuel_type: usize,
}

impl ColumnIndex {
    pub fn from_headers(headers: &[String]) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| position(name).is_none())
            .collect();
        if !missing.is_empty() {
            bail!("Source is missing required columns: {}", missing.join(", "));
        }

        let at = |name: &str| position(name).unwrap_or_default();
        Ok(Self {
            vehicle_id: at("vehicle_id"),
            postcode_area: at("postcode_area"),
            test_mileage: at("test_mileage"),
            first_use_date: at("first_use_date"),
            test_date: at("test_date"),
            test_class_id: at("test_class_id"),
            fuel_type: at("fuel_type"),
        })
    }
}

/// A row read from the source: either a raw record or structurally malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRow {
    Record(RawRecord),
    Malformed,
}

/// Reads vehicle-test rows from a pipe-delimited source in batches.
pub struct MileageReader {
    csv: csv::Reader<Box<dyn Read>>,
    encoding: &'static Encoding,
    headers: Vec<String>,
    columns: ColumnIndex,
    record: ByteRecord,
}

impl MileageReader {
    pub fn open(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let mut csv = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(open_source(path)?);

        let header_record = csv
            .byte_headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?
            .clone();
        let headers: Vec<String> = header_record
            .iter()
            .map(|h| {
                let (decoded, _) = encoding.decode_without_bom_handling(h);
                decoded.trim_start_matches('\u{feff}').trim().to_string()
            })
            .collect();

        let columns = ColumnIndex::from_headers(&headers)
            .with_context(|| format!("Unusable header in {}", path.display()))?;

        Ok(Self {
            csv,
            encoding,
            headers,
            columns,
            record: ByteRecord::new(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Reads up to `batch_size` rows. An empty batch means the source is exhausted.
    pub fn read_batch(&mut self, batch_size: usize) -> Result<Vec<ParsedRow>> {
        let mut batch = Vec::with_capacity(batch_size);

        while batch.len() < batch_size {
            let more = self
                .csv
                .read_byte_record(&mut self.record)
                .context("Failed to read source row")?;
            if !more {
                break;
            }
            batch.push(self.parse_row());
        }

        Ok(batch)
    }

    fn parse_row(&self) -> ParsedRow {
        match self.raw_record() {
            Some(raw) => ParsedRow::Record(raw),
            None => ParsedRow::Malformed,
        }
    }

    fn raw_record(&self) -> Option<RawRecord> {
        let field = |idx: usize| -> Option<String> {
            let bytes = self.record.get(idx)?;
            Some(decode_field(self.encoding, bytes)?.trim().to_string())
        };

        let vehicle_id = field(self.columns.vehicle_id)?.parse::<u64>().ok()?;
        let postcode_area = field(self.columns.postcode_area)?;
        if postcode_area.is_empty() {
            return None;
        }

        Some(RawRecord {
            vehicle_id,
            postcode_area,
            test_mileage: field(self.columns.test_mileage)?,
            first_use_date: field(self.columns.first_use_date)?,
            test_date: field(self.columns.test_date)?,
            test_class_id: field(self.columns.test_class_id)?,
            fuel_type: field(self.columns.fuel_type)?,
        })
    }
}
