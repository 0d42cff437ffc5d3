use std::time::Duration;

use thiserror::Error;

/// Failure surfaced by a [`Store`](crate::store::Store) implementation.
///
/// The core never inspects or retries these; they are handed back unchanged.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("query build error: {0}")]
    QueryBuild(#[from] QueryBuildError),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(#[from] SchemaMismatch),
    #[error("alignment error: {0}")]
    Alignment(#[from] AlignmentError),
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    #[error("invalid stride {stride} for {count} packed values")]
    InvalidStride { stride: usize, count: usize },
    #[error("invalid config: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn store(err: impl Into<StoreError>) -> Self {
        Error::Store(err.into())
    }
}

/// Raised by the query builder before any text is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryBuildError {
    #[error("field list is empty")]
    EmptyFields,
    #[error("invalid identifier for {kind}: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(String),
    #[error("index convention {convention} is not supported for topic {topic}")]
    UnsupportedIndexConvention {
        convention: &'static str,
        topic: String,
    },
    #[error("row limit must be positive")]
    InvalidLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaMismatch {
    #[error("malformed unit {unit:?} on field {field}")]
    MalformedUnit { field: String, unit: String },
    #[error("packed groups disagree on sample count: {first}={first_count}, {other}={other_count}")]
    InconsistentCounts {
        first: String,
        first_count: usize,
        other: String,
        other_count: usize,
    },
    #[error("record at {timestamp_ns} has {present} of {expected} values for {field}")]
    IncompleteRecord {
        timestamp_ns: i64,
        field: String,
        present: usize,
        expected: usize,
    },
    #[error("packed field {field} not found in columns")]
    MissingPackedField { field: String },
    #[error("packed field {field} has non-contiguous indices")]
    NonContiguousIndices { field: String },
    #[error("field {field} is not declared as an array")]
    NotAnArray { field: String },
    #[error("timestamp column {column} is missing or not numeric at row {row}")]
    BadTimestampColumn { column: String, row: usize },
    #[error("every record in the batch failed: {0}")]
    BatchFailed(Box<SchemaMismatch>),
    #[error("malformed schema document: {0}")]
    MalformedSchema(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("{series} index is not strictly increasing at position {position}")]
    NonMonotonic { series: &'static str, position: usize },
    #[error("{series} index has duplicate timestamp {timestamp_ns} at position {position}")]
    Duplicate {
        series: &'static str,
        timestamp_ns: i64,
        position: usize,
    },
    #[error("column {column} has {actual} values, index has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("max delta {0:?} does not fit the timestamp range")]
    DeltaOutOfRange(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
