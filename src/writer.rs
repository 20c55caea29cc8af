//! Parquet output for decoded microdata.
//!
//! Collects decoded rows into typed column buffers following the dictionary
//! order, builds a polars `DataFrame` and writes it to Parquet through a
//! temporary file that is renamed into place once complete.

use crate::config::CompressionAlgorithm;
use crate::decoder::{DecodedRow, FieldValue};
use crate::error::{PnadcError, Result};
use crate::schema::{ColumnType, SchemaDictionary};
use polars::prelude::{Column, DataFrame, ParquetWriter as PolarsParquetWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

enum ColumnBuffer {
    Text(Vec<Option<String>>),
    Numeric(Vec<Option<f64>>),
}

impl ColumnBuffer {
    fn push(&mut self, value: FieldValue) {
        match (self, value) {
            (ColumnBuffer::Text(values), FieldValue::Text(s)) => values.push(Some(s)),
            (ColumnBuffer::Numeric(values), FieldValue::Numeric(v)) => values.push(Some(v)),
            (ColumnBuffer::Text(values), _) => values.push(None),
            (ColumnBuffer::Numeric(values), _) => values.push(None),
        }
    }
}

/// Accumulates rows of one dictionary into a columnar frame
pub struct FrameBuilder<'a> {
    dictionary: &'a SchemaDictionary,
    buffers: Vec<ColumnBuffer>,
    rows: usize,
}

impl<'a> FrameBuilder<'a> {
    pub fn new(dictionary: &'a SchemaDictionary) -> Self {
        let buffers = dictionary
            .columns()
            .iter()
            .map(|spec| match spec.column_type {
                ColumnType::Text => ColumnBuffer::Text(Vec::new()),
                ColumnType::Numeric => ColumnBuffer::Numeric(Vec::new()),
            })
            .collect();
        Self {
            dictionary,
            buffers,
            rows: 0,
        }
    }

    pub fn push_row(&mut self, row: DecodedRow) {
        for (buffer, value) in self.buffers.iter_mut().zip(row) {
            buffer.push(value);
        }
        self.rows += 1;
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> Result<DataFrame> {
        let columns = self
            .dictionary
            .columns()
            .iter()
            .zip(self.buffers)
            .map(|(spec, buffer)| match buffer {
                ColumnBuffer::Text(values) => Column::new(spec.name.as_str().into(), values),
                ColumnBuffer::Numeric(values) => Column::new(spec.name.as_str().into(), values),
            })
            .collect::<Vec<_>>();

        Ok(DataFrame::new(columns)?)
    }
}

/// Parquet writer for decoded frames
#[derive(Debug, Clone)]
pub struct ParquetSink {
    compression: CompressionAlgorithm,
}

impl ParquetSink {
    pub fn new(compression: CompressionAlgorithm) -> Self {
        Self { compression }
    }

    /// Write `df` to `output_path`; nothing appears at the path unless the
    /// write completes
    pub fn write(&self, df: &mut DataFrame, output_path: &Path) -> Result<PathBuf> {
        let parent = output_path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        PolarsParquetWriter::new(temp.as_file_mut())
            .with_compression(self.compression.to_polars_compression())
            .finish(df)
            .map_err(|e| PnadcError::ProcessingFailed {
                path: output_path.to_path_buf(),
                reason: format!("Failed to write parquet: {}", e),
            })?;

        temp.persist(output_path)
            .map_err(|e| PnadcError::Io(e.error))?;

        debug!(
            "Wrote {} rows x {} columns to {}",
            df.height(),
            df.width(),
            output_path.display()
        );
        Ok(output_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::FixedWidthDecoder;
    use polars::prelude::{DataType, ParquetReader, SerReader};
    use tempfile::TempDir;

    fn dictionary() -> SchemaDictionary {
        SchemaDictionary::parse_str("@1 UF $2. /* UF */\n@3 Renda 6. /* Renda */\n").0
    }

    #[test]
    fn test_frame_builder_types_and_nulls() {
        let dict = dictionary();
        let decoder = FixedWidthDecoder::new(&dict);
        let mut builder = FrameBuilder::new(&dict);
        for row in decoder.rows("35  1500\n41    NA\n".as_bytes()) {
            builder.push_row(row.unwrap());
        }
        assert_eq!(builder.row_count(), 2);

        let df = builder.finish().unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.column("UF").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("Renda").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("Renda").unwrap().null_count(), 1);
    }

    #[test]
    fn test_parquet_sink_writes_readable_file() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("nested").join("pnadc_201201_20200101.parquet");

        let dict = dictionary();
        let decoder = FixedWidthDecoder::new(&dict);
        let mut builder = FrameBuilder::new(&dict);
        for row in decoder.rows("35  1500\n".as_bytes()) {
            builder.push_row(row.unwrap());
        }
        let mut df = builder.finish().unwrap();

        let written = ParquetSink::new(CompressionAlgorithm::Snappy)
            .write(&mut df, &output)
            .unwrap();
        assert_eq!(written, output);

        let file = std::fs::File::open(&output).unwrap();
        let read_back = ParquetReader::new(file).finish().unwrap();
        assert_eq!(read_back.shape(), (1, 2));
        let names: Vec<&str> = read_back
            .get_column_names()
            .iter()
            .map(|name| name.as_str())
            .collect();
        assert_eq!(names, vec!["UF", "Renda"]);
    }
}
