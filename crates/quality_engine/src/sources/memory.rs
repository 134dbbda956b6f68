use super::BatchSource;
use crate::{Batch, BatchSchema, DataValue, SourceError};
use quality_core::{ColumnInfo, ColumnType, DEFAULT_BATCH_SIZE, SourceMetadata};
use std::sync::Arc;

/// In-memory rows served in fixed-size batches.
///
/// # Example
///
/// ```rust
/// use quality_engine::{BatchSource, DataValue, MemorySource};
///
/// let mut source = MemorySource::from_rows(
///     "numbers",
///     &["n"],
///     vec![vec![DataValue::Int(1)], vec![DataValue::Int(2)], vec![DataValue::Int(3)]],
/// )
/// .with_batch_size(2);
///
/// assert_eq!(source.next_batch().unwrap().unwrap().num_rows(), 2);
/// assert_eq!(source.next_batch().unwrap().unwrap().num_rows(), 1);
/// assert!(source.next_batch().unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    schema: Arc<BatchSchema>,
    rows: Vec<Vec<DataValue>>,
    batch_size: usize,
    cursor: usize,
    resettable: bool,
}

impl MemorySource {
    /// Creates a source with an explicit schema.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnInfo>,
        rows: Vec<Vec<DataValue>>,
    ) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(BatchSchema::new(columns)),
            rows,
            batch_size: DEFAULT_BATCH_SIZE,
            cursor: 0,
            resettable: true,
        }
    }

    /// Creates a source, inferring each column type from its first non-null value.
    pub fn from_rows(name: impl Into<String>, names: &[&str], rows: Vec<Vec<DataValue>>) -> Self {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let data_type = rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .find(|v| !v.is_null())
                    .map(column_type_of)
                    .unwrap_or(ColumnType::String);
                ColumnInfo::new(*n, data_type)
            })
            .collect();
        Self::new(name, columns, rows)
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Makes the source forward-only: `reset` is refused.
    pub fn one_shot(mut self) -> Self {
        self.resettable = false;
        self
    }
}

fn column_type_of(value: &DataValue) -> ColumnType {
    match value {
        DataValue::Int(_) => ColumnType::Integer,
        DataValue::Float(_) => ColumnType::Float,
        DataValue::Bool(_) => ColumnType::Boolean,
        DataValue::Date(_) => ColumnType::Date,
        DataValue::Timestamp(_) => ColumnType::Timestamp,
        DataValue::Null | DataValue::String(_) => ColumnType::String,
    }
}

impl BatchSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let end = (self.cursor + self.batch_size).min(self.rows.len());
        let rows = self.rows[self.cursor..end].to_vec();
        let batch = Batch::from_rows(Arc::clone(&self.schema), rows, self.cursor as u64)?;
        self.cursor = end;
        Ok(Some(batch))
    }

    fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            row_count: Some(self.rows.len() as u64),
            columns: self.schema.columns().to_vec(),
        }
    }

    fn can_reset(&self) -> bool {
        self.resettable
    }

    fn reset(&mut self) -> Result<(), SourceError> {
        if !self.resettable {
            return Err(SourceError::ResetUnsupported(self.name.clone()));
        }
        self.cursor = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(n: i64) -> Vec<Vec<DataValue>> {
        (0..n).map(|i| vec![DataValue::Int(i)]).collect()
    }

    #[test]
    fn test_batches_carry_offsets() {
        let mut source = MemorySource::from_rows("s", &["n"], rows(5)).with_batch_size(2);
        let offsets: Vec<u64> = std::iter::from_fn(|| source.next_batch().unwrap())
            .map(|b| b.offset())
            .collect();
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[test]
    fn test_reset_rewinds() {
        let mut source = MemorySource::from_rows("s", &["n"], rows(3));
        assert!(source.can_reset());
        source.next_batch().unwrap();
        source.reset().unwrap();
        assert_eq!(source.next_batch().unwrap().unwrap().offset(), 0);
    }

    #[test]
    fn test_one_shot_refuses_reset() {
        let mut source = MemorySource::from_rows("s", &["n"], rows(3)).one_shot();
        assert!(!source.can_reset());
        assert!(matches!(source.reset(), Err(SourceError::ResetUnsupported(_))));
    }

    #[test]
    fn test_metadata_infers_types() {
        let source = MemorySource::from_rows(
            "s",
            &["a", "b"],
            vec![vec![DataValue::Null, "x".into()], vec![DataValue::Float(1.5), "y".into()]],
        );
        let metadata = source.metadata();
        assert_eq!(metadata.row_count, Some(2));
        assert_eq!(metadata.columns[0].data_type, ColumnType::Float);
        assert_eq!(metadata.columns[1].data_type, ColumnType::String);
    }

    #[test]
    fn test_ragged_row_is_source_error() {
        let mut source = MemorySource::from_rows(
            "s",
            &["a", "b"],
            vec![vec![DataValue::Int(1)]],
        );
        assert!(matches!(source.next_batch(), Err(SourceError::Malformed(_))));
    }
}
