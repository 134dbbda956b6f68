//! Columnar batches, row projections and row masks.

use crate::{DataValue, EvaluationError, SourceError};
use quality_core::{ColumnInfo, ColumnType};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered column list with a name index.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSchema {
    columns: Vec<ColumnInfo>,
    index: HashMap<String, usize>,
}

impl BatchSchema {
    /// Creates a schema from an ordered column list.
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self { columns, index }
    }

    /// Creates a schema of string columns.
    pub fn of_strings(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|n| ColumnInfo::new(*n, ColumnType::String))
                .collect(),
        )
    }

    /// Returns the columns in order.
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Returns the position of a column.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns true if the column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A rectangular, columnar slice of a data source.
///
/// `offset` is the absolute index of the first row across all batches, so
/// failure samples can reference rows independently of batch boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    schema: Arc<BatchSchema>,
    columns: Vec<Vec<DataValue>>,
    num_rows: usize,
    offset: u64,
}

impl Batch {
    /// Creates a batch from columns, checking it is rectangular.
    pub fn try_new(
        schema: Arc<BatchSchema>,
        columns: Vec<Vec<DataValue>>,
        offset: u64,
    ) -> Result<Self, SourceError> {
        if columns.len() != schema.len() {
            return Err(SourceError::malformed(format!(
                "expected {} columns, got {}",
                schema.len(),
                columns.len()
            )));
        }
        let num_rows = columns.first().map(Vec::len).unwrap_or(0);
        if let Some((i, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != num_rows) {
            return Err(SourceError::malformed(format!(
                "column '{}' has {} rows, expected {}",
                schema.columns()[i].name,
                col.len(),
                num_rows
            )));
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
            offset,
        })
    }

    /// Creates a batch from row-major values.
    pub fn from_rows(
        schema: Arc<BatchSchema>,
        rows: Vec<Vec<DataValue>>,
        offset: u64,
    ) -> Result<Self, SourceError> {
        let width = schema.len();
        let mut columns: Vec<Vec<DataValue>> = (0..width)
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(SourceError::malformed(format!(
                    "row {} has {} values, expected {}",
                    offset + i as u64,
                    row.len(),
                    width
                )));
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        Self::try_new(schema, columns, offset)
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Arc<BatchSchema> {
        &self.schema
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Returns true if the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Absolute index of the first row.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns a column by name.
    pub fn column(&self, name: &str) -> Option<&[DataValue]> {
        self.schema
            .index_of(name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Returns a column by name or a `FieldNotFound` error.
    pub fn require_column(&self, name: &str) -> Result<&[DataValue], EvaluationError> {
        self.column(name)
            .ok_or_else(|| EvaluationError::field_not_found(name))
    }

    /// Returns a column by position.
    pub fn column_at(&self, index: usize) -> &[DataValue] {
        &self.columns[index]
    }

    /// Returns the first field of `fields` missing from this batch, if any.
    pub fn missing_field<'a>(&self, fields: &'a [String]) -> Option<&'a str> {
        fields
            .iter()
            .find(|f| !self.schema.contains(f))
            .map(String::as_str)
    }

    /// Returns a row projection.
    pub fn row(&self, row: usize) -> RowContext<'_> {
        RowContext { batch: self, row }
    }
}

/// Read-only view of one row of a batch.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    batch: &'a Batch,
    row: usize,
}

impl<'a> RowContext<'a> {
    /// Value of a field in this row.
    pub fn get(&self, field: &str) -> Result<&'a DataValue, EvaluationError> {
        self.batch.require_column(field).map(|col| &col[self.row])
    }

    /// Index of the row within its batch.
    pub fn index(&self) -> usize {
        self.row
    }

    /// Absolute index of the row across all batches.
    pub fn absolute_index(&self) -> u64 {
        self.batch.offset + self.row as u64
    }
}

/// Per-row inclusion mask over one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMask {
    bits: Vec<bool>,
}

impl RowMask {
    /// Mask selecting every row.
    pub fn all(len: usize) -> Self {
        Self {
            bits: vec![true; len],
        }
    }

    /// Mask selecting no row.
    pub fn none(len: usize) -> Self {
        Self {
            bits: vec![false; len],
        }
    }

    /// Mask from explicit bits.
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// Number of rows covered.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns true if the mask covers no rows.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Whether a row is selected.
    pub fn get(&self, row: usize) -> bool {
        self.bits.get(row).copied().unwrap_or(false)
    }

    /// Rows selected in both masks.
    pub fn and(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a && b)
    }

    /// Rows selected in either mask.
    pub fn or(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a || b)
    }

    /// Rows selected here but not in `other`.
    pub fn and_not(&self, other: &RowMask) -> RowMask {
        self.zip_with(other, |a, b| a && !b)
    }

    /// Inverted mask.
    pub fn not(&self) -> RowMask {
        RowMask {
            bits: self.bits.iter().map(|b| !b).collect(),
        }
    }

    /// Number of selected rows.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Indices of selected rows, ascending.
    pub fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(|(i, _)| i)
    }

    fn zip_with(&self, other: &RowMask, op: impl Fn(bool, bool) -> bool) -> RowMask {
        RowMask {
            bits: self
                .bits
                .iter()
                .zip(&other.bits)
                .map(|(a, b)| op(*a, *b))
                .collect(),
        }
    }
}
