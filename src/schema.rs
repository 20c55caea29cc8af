//! SAS input dictionary parsing.
//!
//! IBGE documents the fixed-width layout of the microdata with a SAS
//! `INPUT` statement where each column is one line:
//!
//! ```text
//! @0001   Ano        $4.    /* Ano de referência */
//! @0005   Trimestre  $1.    /* Trimestre de referência */
//! @0028   V1028      15.    /* Peso do domicílio e das pessoas */
//! ```
//!
//! Only lines starting with `@` are considered. A malformed column line is
//! reported and excluded so the rest of the dictionary still builds.

use crate::constants::{COLUMN_MARKER, TEXT_TYPE_MARKER};
use crate::error::{PnadcError, Result};
use polars::prelude::{DataType, Field, Schema};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::sync::LazyLock;
use tracing::{debug, warn};

static COMMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*.*?\*/").expect("comment pattern is a valid regex"));

/// Value type of a dictionary column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Numeric,
}

impl ColumnType {
    pub fn to_polars(self) -> DataType {
        match self {
            ColumnType::Text => DataType::String,
            ColumnType::Numeric => DataType::Float64,
        }
    }
}

/// One column of a fixed-width record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// 1-based start offset
    pub start: usize,
    /// Width in characters
    pub width: usize,
    pub name: String,
    pub column_type: ColumnType,
    pub description: String,
}

/// A rejected `@` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLineError {
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

impl From<SchemaLineError> for PnadcError {
    fn from(error: SchemaLineError) -> Self {
        PnadcError::SchemaLine {
            line_number: error.line_number,
            reason: error.reason,
        }
    }
}

/// Parse a single `@` column line into a column specification
pub fn parse_schema_line(line: &str) -> std::result::Result<ColumnSpec, String> {
    let comment = COMMENT_PATTERN
        .find(line)
        .ok_or_else(|| "missing /* description */ comment".to_string())?;
    let description = comment
        .as_str()
        .trim_matches(|c| c == '*' || c == '/' || c == ' ')
        .to_string();

    // Only the first comment is the description; later ones are extra tokens
    let definition = COMMENT_PATTERN.replacen(line, 1, "");
    let parts: Vec<&str> = definition.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(format!(
            "expected offset, name and width, found {} fields",
            parts.len()
        ));
    }

    let start = parts[0]
        .trim_start_matches(COLUMN_MARKER)
        .parse::<usize>()
        .map_err(|e| format!("invalid start offset {:?}: {}", parts[0], e))?;

    let name = parts[1].to_string();

    let width_token = parts[2];
    let column_type = if width_token.starts_with(TEXT_TYPE_MARKER) {
        ColumnType::Text
    } else {
        ColumnType::Numeric
    };
    let width = width_token
        .trim_matches(|c| c == '.' || c == TEXT_TYPE_MARKER)
        .parse::<usize>()
        .map_err(|e| format!("invalid width {:?}: {}", width_token, e))?;

    Ok(ColumnSpec {
        start,
        width,
        name,
        column_type,
        description,
    })
}

/// Decode one raw line. SAS input files ship in Latin-1, so bytes that are
/// not valid UTF-8 are mapped one-to-one onto code points.
pub(crate) fn decode_text_line(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

/// Ordered column dictionary of one documentation release
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDictionary {
    columns: Vec<ColumnSpec>,
}

impl SchemaDictionary {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Build a dictionary from SAS input text, returning rejected lines
    /// alongside it
    pub fn parse<R: BufRead>(mut reader: R) -> Result<(Self, Vec<SchemaLineError>)> {
        let mut columns = Vec::new();
        let mut rejected = Vec::new();
        let mut buffer = Vec::new();
        let mut line_number = 0;

        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            line_number += 1;

            let line = decode_text_line(std::mem::take(&mut buffer));
            if !line.starts_with(COLUMN_MARKER) {
                continue;
            }

            match parse_schema_line(&line) {
                Ok(spec) => columns.push(spec),
                Err(reason) => {
                    warn!("Skipping malformed dictionary line {}: {}", line_number, reason);
                    rejected.push(SchemaLineError {
                        line_number,
                        line: line.trim_end().to_string(),
                        reason,
                    });
                }
            }
        }

        debug!(
            "Parsed dictionary with {} columns ({} rejected lines)",
            columns.len(),
            rejected.len()
        );
        Ok((Self { columns }, rejected))
    }

    /// Parse a dictionary held in a string
    pub fn parse_str(text: &str) -> (Self, Vec<SchemaLineError>) {
        // Reading from a byte slice cannot fail
        Self::parse(text.as_bytes()).unwrap_or_default()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Total record width in characters
    pub fn record_width(&self) -> usize {
        self.columns.iter().map(|c| c.width).sum()
    }

    /// Whether start offsets never decrease in file order
    pub fn offsets_are_ordered(&self) -> bool {
        self.columns.windows(2).all(|w| w[0].start <= w[1].start)
    }

    /// Polars schema with one field per column in dictionary order
    pub fn to_polars_schema(&self) -> Schema {
        Schema::from_iter(
            self.columns
                .iter()
                .map(|c| Field::new(c.name.as_str().into(), c.column_type.to_polars())),
        )
    }
}
