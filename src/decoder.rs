//! Fixed-width microdata decoding.
//!
//! Each record is sliced positionally into the dictionary's columns, one
//! width after the other, then coerced: text columns stay strings, numeric
//! columns become `f64`. The missing markers `""`, `"NA"` and `"."` become
//! [`FieldValue::Missing`] for every column type.

use crate::constants::{ARCHIVE_EXTENSION, MISSING_MARKERS};
use crate::error::{PnadcError, Result};
use crate::schema::{ColumnType, SchemaDictionary, decode_text_line};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// One decoded field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Numeric(f64),
    Missing,
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Decoded record, one value per dictionary column in order
pub type DecodedRow = Vec<FieldValue>;

fn is_missing_marker(value: &str) -> bool {
    MISSING_MARKERS.contains(&value)
}

/// Decoder bound to one dictionary
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthDecoder<'a> {
    dictionary: &'a SchemaDictionary,
}

impl<'a> FixedWidthDecoder<'a> {
    pub fn new(dictionary: &'a SchemaDictionary) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &SchemaDictionary {
        self.dictionary
    }

    /// Decode one record; `record` is the 1-based record number used in errors
    pub fn decode_line(&self, line: &str, record: usize) -> Result<DecodedRow> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut chars = line.chars();
        let mut row = Vec::with_capacity(self.dictionary.len());

        for spec in self.dictionary.columns() {
            // Records shorter than the dictionary leave trailing columns empty
            let raw: String = chars.by_ref().take(spec.width).collect();
            let value = raw.trim();

            if is_missing_marker(value) {
                row.push(FieldValue::Missing);
                continue;
            }

            let field = match spec.column_type {
                ColumnType::Text => FieldValue::Text(value.to_string()),
                ColumnType::Numeric => {
                    let number = value.parse::<f64>().map_err(|_| PnadcError::Decode {
                        record,
                        column: spec.name.clone(),
                        value: value.to_string(),
                    })?;
                    FieldValue::Numeric(number)
                }
            };
            row.push(field);
        }

        Ok(row)
    }

    /// Iterate decoded records of a line source
    pub fn rows<R: BufRead>(&self, reader: R) -> DecodedRows<'a, R> {
        DecodedRows {
            decoder: *self,
            reader,
            record: 0,
            buffer: Vec::new(),
        }
    }
}

/// Iterator over the records of a fixed-width source
///
/// A decode error is yielded for its record only; rows already produced are
/// unaffected and iteration may continue.
pub struct DecodedRows<'a, R> {
    decoder: FixedWidthDecoder<'a>,
    reader: R,
    record: usize,
    buffer: Vec<u8>,
}

impl<R: BufRead> Iterator for DecodedRows<'_, R> {
    type Item = Result<DecodedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }

            let line = decode_text_line(std::mem::take(&mut self.buffer));
            if line.trim().is_empty() {
                continue;
            }

            self.record += 1;
            return Some(self.decoder.decode_line(&line, self.record));
        }
    }
}

/// Open a microdata file, transparently reading the first member of a zip
/// archive, and hand its lines to `f`
pub fn with_record_source<T>(
    path: &Path,
    f: impl FnOnce(&mut dyn BufRead) -> Result<T>,
) -> Result<T> {
    let file = File::open(path)?;
    let is_archive = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION));

    if !is_archive {
        let mut reader = BufReader::new(file);
        return f(&mut reader);
    }

    let mut archive = zip::ZipArchive::new(file)?;
    if archive.len() == 0 {
        return Err(PnadcError::EmptyArchive {
            path: path.to_path_buf(),
        });
    }
    let member = archive.by_index(0)?;
    debug!("Reading {} from {}", member.name(), path.display());
    let mut reader = BufReader::new(member);
    f(&mut reader)
}
