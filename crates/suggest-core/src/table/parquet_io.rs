//! Apache Parquet import/export for suggestion tables
//!
//! Arrow types are widened onto the four table column types: every string
//! flavour becomes utf8, unsigned ints uint64, signed ints int64 and floats
//! float64. Null values and other types are rejected.

use arrow::array::{new_empty_array, Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::compute::{cast, concat};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, UInt64Type};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;

use super::{persistence, tmp_path, Column, ColumnData, SuggestionTable};
use crate::error::{Result, SuggestError};

impl SuggestionTable {
    /// Load a Parquet file, keeping every column
    pub fn load_parquet(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SuggestError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| SuggestError::corrupt(e.to_string()))?;
        let schema = builder.schema().clone();
        let reader = builder
            .build()
            .map_err(|e| SuggestError::corrupt(e.to_string()))?;
        let batches = reader
            .collect::<std::result::Result<Vec<RecordBatch>, ArrowError>>()
            .map_err(|e| SuggestError::corrupt(e.to_string()))?;

        let table = Self::from_record_batches(&schema, &batches)?;
        tracing::info!(
            "Loaded parquet table {:?} ({} rows, {} columns)",
            path,
            table.num_rows,
            table.columns.len()
        );
        Ok(table)
    }

    /// Write the table as a single-row-group Parquet file
    pub fn save_parquet(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let batch = self.to_record_batch()?;
        let parquet_err = |e: parquet::errors::ParquetError| persistence(path, io::Error::other(e));

        let tmp = tmp_path(path);
        let written = (|| {
            let file = File::create(&tmp).map_err(|source| persistence(path, source))?;
            let mut writer = ArrowWriter::try_new(file, batch.schema(), None).map_err(parquet_err)?;
            writer.write(&batch).map_err(parquet_err)?;
            writer.close().map_err(parquet_err)?;
            fs::rename(&tmp, path).map_err(|source| persistence(path, source))
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        tracing::info!(
            "Saved parquet table {:?} ({} rows, {} columns)",
            path,
            self.num_rows,
            self.columns.len()
        );
        Ok(())
    }

    /// Build a table from Arrow record batches sharing `schema`
    pub fn from_record_batches(schema: &Schema, batches: &[RecordBatch]) -> Result<Self> {
        let mut columns = Vec::with_capacity(schema.fields().len());
        for (i, field) in schema.fields().iter().enumerate() {
            let parts: Vec<&dyn Array> = batches.iter().map(|b| b.column(i).as_ref()).collect();
            let array: ArrayRef = if parts.is_empty() {
                new_empty_array(field.data_type())
            } else {
                concat(&parts).map_err(|e| SuggestError::corrupt(e.to_string()))?
            };
            columns.push(Column::new(field.name().clone(), column_from_array(field.name(), &array)?));
        }

        let mut table = Self::new(columns)?;
        table.num_rows = batches.iter().map(|b| b.num_rows()).sum();
        Ok(table)
    }

    /// Convert the table into one Arrow record batch
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let (data_type, array): (DataType, ArrayRef) = match &column.data {
                ColumnData::Utf8(v) => (DataType::Utf8, Arc::new(StringArray::from(v.clone()))),
                ColumnData::UInt64(v) => (DataType::UInt64, Arc::new(UInt64Array::from(v.clone()))),
                ColumnData::Int64(v) => (DataType::Int64, Arc::new(Int64Array::from(v.clone()))),
                ColumnData::Float64(v) => (DataType::Float64, Arc::new(Float64Array::from(v.clone()))),
            };
            fields.push(Field::new(column.name.as_str(), data_type, false));
            arrays.push(array);
        }

        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
            .map_err(|e| SuggestError::schema(e.to_string()))
    }
}

fn column_from_array(name: &str, array: &ArrayRef) -> Result<ColumnData> {
    if array.null_count() > 0 {
        return Err(SuggestError::schema(format!(
            "column '{}' contains {} null values",
            name,
            array.null_count()
        )));
    }

    let target = match array.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => DataType::Utf8,
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => DataType::UInt64,
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => DataType::Int64,
        DataType::Float16 | DataType::Float32 | DataType::Float64 => DataType::Float64,
        other => {
            return Err(SuggestError::schema(format!(
                "column '{}' has unsupported type {}",
                name, other
            )))
        }
    };
    let array = cast(array, &target).map_err(|e| SuggestError::schema(e.to_string()))?;

    let data = match target {
        DataType::Utf8 => ColumnData::Utf8(
            array
                .as_string::<i32>()
                .iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect(),
        ),
        DataType::UInt64 => ColumnData::UInt64(array.as_primitive::<UInt64Type>().values().to_vec()),
        DataType::Int64 => ColumnData::Int64(array.as_primitive::<Int64Type>().values().to_vec()),
        _ => ColumnData::Float64(array.as_primitive::<Float64Type>().values().to_vec()),
    };
    Ok(data)
}
