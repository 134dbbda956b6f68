use super::BatchSource;
use crate::value::{parse_date, parse_number, parse_timestamp};
use crate::{Batch, BatchSchema, DataValue, SourceError};
use quality_core::{ColumnInfo, ColumnType, DEFAULT_BATCH_SIZE, SourceMetadata, SourceSpec};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Reader options for delimited files.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    /// Field delimiter
    pub delimiter: u8,
    /// Declared column types; other columns are read as strings
    pub columns: BTreeMap<String, ColumnType>,
    /// Rows per batch
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            columns: BTreeMap::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl CsvOptions {
    /// Creates default options (comma separated, all strings).
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives options from a suite source definition.
    ///
    /// An explicit delimiter wins over the format, which wins over the file
    /// extension.
    pub fn from_spec(spec: &SourceSpec, batch_size: usize) -> Self {
        let format = spec.format.or_else(|| {
            Path::new(&spec.path)
                .extension()
                .and_then(|e| e.to_str())
                .and_then(quality_core::DataFormat::from_extension)
        });
        let delimiter = match (spec.delimiter, format) {
            (Some(c), _) if c.is_ascii() => c as u8,
            (_, Some(format)) => format.delimiter(),
            _ => b',',
        };
        Self {
            delimiter,
            columns: spec.columns.clone(),
            batch_size: batch_size.max(1),
        }
    }

    /// Sets the delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Declares the type of a column.
    pub fn with_column(mut self, name: impl Into<String>, data_type: ColumnType) -> Self {
        self.columns.insert(name.into(), data_type);
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Delimited text file read in batches.
///
/// The header row names the columns. Empty cells are null. Cells of declared
/// columns that do not parse as the declared type are kept as strings so the
/// rules can report them.
pub struct CsvSource {
    name: String,
    path: PathBuf,
    options: CsvOptions,
    reader: csv::Reader<File>,
    schema: Arc<BatchSchema>,
    offset: u64,
}

impl CsvSource {
    /// Opens a file and reads its header.
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        options: CsvOptions,
    ) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let mut reader = open_reader(&path, options.delimiter)?;

        let columns = reader
            .headers()?
            .iter()
            .map(|h| {
                let data_type = options.columns.get(h).copied().unwrap_or_default();
                ColumnInfo::new(h, data_type)
            })
            .collect();

        Ok(Self {
            name: name.into(),
            path,
            options,
            reader,
            schema: Arc::new(BatchSchema::new(columns)),
            offset: 0,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<File>, SourceError> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)?)
}

fn parse_cell(raw: &str, data_type: ColumnType) -> DataValue {
    if raw.is_empty() {
        return DataValue::Null;
    }

    let typed = match data_type {
        ColumnType::String => None,
        ColumnType::Integer => raw.trim().parse::<i64>().ok().map(DataValue::Int),
        ColumnType::Float => parse_number(raw).map(DataValue::Float),
        ColumnType::Boolean => match raw.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Some(DataValue::Bool(true)),
            "false" | "f" | "no" | "0" => Some(DataValue::Bool(false)),
            _ => None,
        },
        ColumnType::Date => parse_date(raw).map(DataValue::Date),
        ColumnType::Timestamp => parse_timestamp(raw).map(DataValue::Timestamp),
    };

    typed.unwrap_or_else(|| DataValue::String(raw.to_string()))
}

impl BatchSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        let types: Vec<ColumnType> = self.schema.columns().iter().map(|c| c.data_type).collect();
        let mut columns: Vec<Vec<DataValue>> = types
            .iter()
            .map(|_| Vec::with_capacity(self.options.batch_size))
            .collect();
        let mut record = csv::StringRecord::new();
        let mut rows = 0;

        while rows < self.options.batch_size && self.reader.read_record(&mut record)? {
            for ((column, data_type), raw) in columns.iter_mut().zip(&types).zip(record.iter()) {
                column.push(parse_cell(raw, *data_type));
            }
            rows += 1;
        }

        if rows == 0 {
            return Ok(None);
        }

        let batch = Batch::try_new(Arc::clone(&self.schema), columns, self.offset)?;
        self.offset += rows as u64;
        Ok(Some(batch))
    }

    fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            row_count: None,
            columns: self.schema.columns().to_vec(),
        }
    }

    fn can_reset(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), SourceError> {
        debug!("Reopening '{}' for another pass", self.path.display());
        self.reader = open_reader(&self.path, self.options.delimiter)?;
        self.reader.headers()?;
        self.offset = 0;
        Ok(())
    }
}
