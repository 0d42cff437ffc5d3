//! Arrow and Parquet export of [`Frame`]s.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;

use ::arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder, TimestampNanosecondArray,
};
use ::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use ::arrow::record_batch::RecordBatch;
use anyhow::{bail, Result};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use super::{Column, Frame, Value};

/// Name of the timestamp column in exported batches.
pub const TIME_COLUMN: &str = "time";

/// Arrow schema for `frame`: a UTC nanosecond `time` column followed by one
/// nullable column per frame column.
pub fn schema_for(frame: &Frame) -> SchemaRef {
    let mut fields = Vec::with_capacity(frame.columns().len() + 1);
    fields.push(Field::new(TIME_COLUMN, time_type(), false));
    for column in frame.columns() {
        fields.push(Field::new(column.name(), column_type(column), true));
    }
    Arc::new(Schema::new(fields))
}

pub fn to_record_batch(frame: &Frame) -> Result<RecordBatch> {
    let schema = schema_for(frame);
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    arrays.push(Arc::new(
        TimestampNanosecondArray::from(frame.index().to_vec()).with_timezone("UTC"),
    ));
    for column in frame.columns() {
        arrays.push(build_array(column)?);
    }
    Ok(RecordBatch::try_new(schema, arrays)?)
}

fn time_type() -> DataType {
    DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
}

/// Narrowest Arrow type holding every present cell.
fn column_type(column: &Column) -> DataType {
    let mut kind: Option<DataType> = None;
    for value in column.values() {
        let cell = match value {
            Value::Missing => continue,
            Value::Float(_) => DataType::Float64,
            Value::Int(_) => DataType::Int64,
            Value::Bool(_) => DataType::Boolean,
            Value::Text(_) => DataType::Utf8,
        };
        kind = Some(match (kind, cell) {
            (None, cell) => cell,
            (Some(a), b) if a == b => a,
            (Some(DataType::Int64), DataType::Float64) | (Some(DataType::Float64), DataType::Int64) => {
                DataType::Float64
            }
            _ => DataType::Utf8,
        });
    }
    kind.unwrap_or(DataType::Float64)
}

fn build_array(column: &Column) -> Result<ArrayRef> {
    let len = column.values().len();
    let array: ArrayRef = match column_type(column) {
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(len);
            for value in column.values() {
                builder.append_option(value.as_f64());
            }
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(len);
            for value in column.values() {
                builder.append_option(value.as_i64());
            }
            Arc::new(builder.finish())
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(len);
            for value in column.values() {
                builder.append_option(match value {
                    Value::Bool(v) => Some(*v),
                    _ => None,
                });
            }
            Arc::new(builder.finish())
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(len, len * 8);
            for value in column.values() {
                if value.is_missing() {
                    builder.append_null();
                } else {
                    builder.append_value(value.to_string());
                }
            }
            Arc::new(builder.finish())
        }
        other => bail!("unsupported column type: {other:?}"),
    };
    Ok(array)
}

/// Streams frames sharing one schema into a Parquet file.
pub struct ParquetSink<W: Write + Seek + Send> {
    schema: SchemaRef,
    writer: Option<ArrowWriter<W>>,
}

impl ParquetSink<File> {
    pub fn try_new(path: impl AsRef<Path>, schema: SchemaRef) -> Result<Self> {
        let file = File::create(path)?;
        Self::from_writer(file, schema, None)
    }
}

impl<W: Write + Seek + Send> ParquetSink<W> {
    pub fn from_writer(writer: W, schema: SchemaRef, props: Option<WriterProperties>) -> Result<Self> {
        let writer = ArrowWriter::try_new(writer, Arc::clone(&schema), props)?;
        Ok(Self {
            schema,
            writer: Some(writer),
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let batch = to_record_batch(frame)?;
        if batch.schema() != self.schema {
            bail!("frame schema does not match the sink schema");
        }
        let Some(writer) = self.writer.as_mut() else {
            bail!("parquet sink is closed");
        };
        writer.write(&batch)?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}

/// Writes one frame to a Parquet file.
pub fn write_parquet(path: impl AsRef<Path>, frame: &Frame) -> Result<()> {
    let mut sink = ParquetSink::try_new(path, schema_for(frame))?;
    sink.write_frame(frame)?;
    sink.finish()
}
