use super::BatchSource;
use crate::{Batch, BatchSchema, DataValue, SourceError};
use arrow_array::RecordBatch;
use arrow_array::array::*;
use arrow_schema::{DataType, SchemaRef, TimeUnit};
use quality_core::{ColumnInfo, ColumnType, DEFAULT_BATCH_SIZE, SourceMetadata};
use std::sync::Arc;
use tracing::warn;

/// Arrow record batches re-sliced to the engine batch size.
pub struct ArrowSource {
    name: String,
    arrow_schema: SchemaRef,
    schema: Arc<BatchSchema>,
    batches: Vec<RecordBatch>,
    batch_size: usize,
    current: usize,
    position: usize,
    offset: u64,
}

impl ArrowSource {
    /// Creates a source over record batches sharing `schema`.
    pub fn new(
        name: impl Into<String>,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<Self, SourceError> {
        if let Some(mismatch) = batches.iter().find(|b| b.schema() != schema) {
            return Err(SourceError::malformed(format!(
                "record batch schema {:?} differs from source schema",
                mismatch.schema()
            )));
        }

        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnInfo::new(f.name().clone(), column_type_of(f.data_type())))
            .collect();

        Ok(Self {
            name: name.into(),
            schema: Arc::new(BatchSchema::new(columns)),
            arrow_schema: schema,
            batches,
            batch_size: DEFAULT_BATCH_SIZE,
            current: 0,
            position: 0,
            offset: 0,
        })
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The Arrow schema of the source.
    pub fn arrow_schema(&self) -> &SchemaRef {
        &self.arrow_schema
    }
}

fn column_type_of(data_type: &DataType) -> ColumnType {
    match data_type {
        DataType::Boolean => ColumnType::Boolean,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => ColumnType::Integer,
        DataType::Float32 | DataType::Float64 => ColumnType::Float,
        DataType::Date32 | DataType::Date64 => ColumnType::Date,
        DataType::Timestamp(_, _) => ColumnType::Timestamp,
        _ => ColumnType::String,
    }
}

fn downcast<'a, T: 'static>(array: &'a dyn Array, type_name: &str) -> Result<&'a T, SourceError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| SourceError::malformed(format!("failed to downcast to {}", type_name)))
}

fn collect<F>(array: &dyn Array, value_at: F) -> Vec<DataValue>
where
    F: Fn(usize) -> DataValue,
{
    (0..array.len())
        .map(|i| {
            if array.is_null(i) {
                DataValue::Null
            } else {
                value_at(i)
            }
        })
        .collect()
}

/// Converts an Arrow array into engine values.
pub(crate) fn convert_array(array: &dyn Array) -> Result<Vec<DataValue>, SourceError> {
    macro_rules! ints {
        ($ty:ty) => {{
            let a = downcast::<$ty>(array, stringify!($ty))?;
            collect(array, |i| DataValue::Int(a.value(i) as i64))
        }};
    }

    let values = match array.data_type() {
        DataType::Boolean => {
            let a = downcast::<BooleanArray>(array, "BooleanArray")?;
            collect(array, |i| DataValue::Bool(a.value(i)))
        }
        DataType::Int8 => ints!(Int8Array),
        DataType::Int16 => ints!(Int16Array),
        DataType::Int32 => ints!(Int32Array),
        DataType::Int64 => ints!(Int64Array),
        DataType::UInt8 => ints!(UInt8Array),
        DataType::UInt16 => ints!(UInt16Array),
        DataType::UInt32 => ints!(UInt32Array),
        DataType::UInt64 => {
            let a = downcast::<UInt64Array>(array, "UInt64Array")?;
            collect(array, |i| {
                let v = a.value(i);
                i64::try_from(v)
                    .map(DataValue::Int)
                    .unwrap_or(DataValue::Float(v as f64))
            })
        }
        DataType::Float32 => {
            let a = downcast::<Float32Array>(array, "Float32Array")?;
            collect(array, |i| DataValue::Float(a.value(i) as f64))
        }
        DataType::Float64 => {
            let a = downcast::<Float64Array>(array, "Float64Array")?;
            collect(array, |i| DataValue::Float(a.value(i)))
        }
        DataType::Utf8 => {
            let a = downcast::<StringArray>(array, "StringArray")?;
            collect(array, |i| DataValue::String(a.value(i).to_string()))
        }
        DataType::LargeUtf8 => {
            let a = downcast::<LargeStringArray>(array, "LargeStringArray")?;
            collect(array, |i| DataValue::String(a.value(i).to_string()))
        }
        DataType::Date32 => {
            let a = downcast::<Date32Array>(array, "Date32Array")?;
            collect(array, |i| a.value_as_date(i).map(DataValue::Date).into())
        }
        DataType::Date64 => {
            let a = downcast::<Date64Array>(array, "Date64Array")?;
            collect(array, |i| a.value_as_date(i).map(DataValue::Date).into())
        }
        DataType::Timestamp(unit, _) => {
            macro_rules! timestamps {
                ($ty:ty) => {{
                    let a = downcast::<$ty>(array, stringify!($ty))?;
                    collect(array, |i| {
                        a.value_as_datetime(i).map(DataValue::Timestamp).into()
                    })
                }};
            }
            match unit {
                TimeUnit::Second => timestamps!(TimestampSecondArray),
                TimeUnit::Millisecond => timestamps!(TimestampMillisecondArray),
                TimeUnit::Microsecond => timestamps!(TimestampMicrosecondArray),
                TimeUnit::Nanosecond => timestamps!(TimestampNanosecondArray),
            }
        }
        DataType::Null => vec![DataValue::Null; array.len()],
        other => {
            warn!("Unsupported Arrow type for conversion: {:?}", other);
            vec![DataValue::Null; array.len()]
        }
    };

    Ok(values)
}

impl BatchSource for ArrowSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        while let Some(record_batch) = self.batches.get(self.current) {
            let remaining = record_batch.num_rows() - self.position;
            if remaining == 0 {
                self.current += 1;
                self.position = 0;
                continue;
            }

            let len = remaining.min(self.batch_size);
            let slice = record_batch.slice(self.position, len);
            let columns = slice
                .columns()
                .iter()
                .map(|c| convert_array(c.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;

            let batch = Batch::try_new(Arc::clone(&self.schema), columns, self.offset)?;
            self.position += len;
            self.offset += len as u64;
            return Ok(Some(batch));
        }
        Ok(None)
    }

    fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            row_count: Some(self.batches.iter().map(|b| b.num_rows() as u64).sum()),
            columns: self.schema.columns().to_vec(),
        }
    }

    fn can_reset(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), SourceError> {
        self.current = 0;
        self.position = 0;
        self.offset = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::{Field, Schema};
    use pretty_assertions::assert_eq;

    fn source() -> ArrowSource {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        let first = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])) as ArrayRef,
            ],
        )
        .unwrap();
        let second = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![4])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("d")])) as ArrayRef,
            ],
        )
        .unwrap();
        ArrowSource::new("arrow", schema, vec![first, second]).unwrap()
    }

    #[test]
    fn test_reslices_record_batches() {
        let mut source = source().with_batch_size(2);
        let sizes: Vec<(u64, usize)> = std::iter::from_fn(|| source.next_batch().unwrap())
            .map(|b| (b.offset(), b.num_rows()))
            .collect();
        assert_eq!(sizes, vec![(0, 2), (2, 1), (3, 1)]);
    }

    #[test]
    fn test_converts_nulls_and_strings() {
        let mut source = source();
        let batch = source.next_batch().unwrap().unwrap();
        assert_eq!(
            batch.column("name").unwrap(),
            &["a".into(), DataValue::Null, "c".into()][..]
        );
        assert_eq!(source.metadata().row_count, Some(4));
        assert_eq!(source.metadata().columns[0].data_type, ColumnType::Integer);
    }

    #[test]
    fn test_convert_dates_and_booleans() {
        let dates = Date32Array::from(vec![Some(19_723), None]);
        let values = convert_array(&dates).unwrap();
        assert_eq!(values[0].to_string(), "2024-01-01");
        assert_eq!(values[1], DataValue::Null);

        let flags = BooleanArray::from(vec![true, false]);
        assert_eq!(
            convert_array(&flags).unwrap(),
            vec![DataValue::Bool(true), DataValue::Bool(false)]
        );
    }

    #[test]
    fn test_convert_timestamps() {
        let ts = TimestampMicrosecondArray::from(vec![1_704_067_200_000_000]);
        let values = convert_array(&ts).unwrap();
        assert_eq!(values[0].to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_reset() {
        let mut source = source();
        while source.next_batch().unwrap().is_some() {}
        source.reset().unwrap();
        assert_eq!(source.next_batch().unwrap().unwrap().offset(), 0);
    }
}
