//! In-memory tabular results with a nanosecond UTC timestamp index.

use std::collections::HashMap;
use std::fmt;

use crate::error::{AlignmentError, Result};

#[cfg(feature = "arrow")]
pub mod arrow;

/// One cell of a [`Frame`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Missing,
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Float(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Missing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, row: usize) -> &Value {
        self.values.get(row).unwrap_or(&Value::Missing)
    }

    pub(crate) fn renamed(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    /// Picks rows by position; `None` yields a missing cell.
    pub(crate) fn gather(&self, rows: &[Option<usize>]) -> Column {
        let values = rows
            .iter()
            .map(|row| match row {
                Some(row) => self.get(*row).clone(),
                None => Value::Missing,
            })
            .collect();
        Column::new(self.name.clone(), values)
    }
}

/// Rows keyed by timestamp (ns since the Unix epoch, UTC) with named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    index: Vec<i64>,
    columns: Vec<Column>,
}

impl Frame {
    pub fn new(index: Vec<i64>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Value>) -> Result<Self> {
        self.push_column(name, values)?;
        Ok(self)
    }

    /// Convenience for numeric columns.
    pub fn with_f64_column(self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.with_column(name, values.into_iter().map(Value::Float).collect())
    }

    /// Appends a column, replacing any column with the same name.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(AlignmentError::LengthMismatch {
                column: name,
                expected: self.index.len(),
                actual: values.len(),
            }
            .into());
        }
        let column = Column::new(name, values);
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub(crate) fn from_parts(index: Vec<i64>, columns: Vec<Column>) -> Self {
        debug_assert!(columns.iter().all(|c| c.values.len() == index.len()));
        Self { index, columns }
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Checks that the index is strictly increasing.
    pub fn validate_index(&self, series: &'static str) -> std::result::Result<(), AlignmentError> {
        validate_timestamps(&self.index, series)
    }

    /// Replaces the index, keeping columns. Used when a store hands back
    /// TAI-stamped rows that need shifting to UTC; stops at the first error.
    pub fn try_map_index<E>(
        mut self,
        f: impl Fn(i64) -> std::result::Result<i64, E>,
    ) -> std::result::Result<Self, E> {
        for ts in &mut self.index {
            *ts = f(*ts)?;
        }
        Ok(self)
    }

    /// Merges frames fetched separately (for instance before and after an
    /// index-naming change) into one series ordered by time. Columns are
    /// unioned; cells a frame lacks are missing. Overlapping timestamps are an
    /// error.
    pub fn concat(frames: Vec<Frame>) -> Result<Frame> {
        let mut names: Vec<String> = Vec::new();
        for frame in &frames {
            for column in &frame.columns {
                if !names.iter().any(|n| n == &column.name) {
                    names.push(column.name.clone());
                }
            }
        }

        let mut rows: Vec<(i64, usize, usize)> = Vec::new();
        for (source, frame) in frames.iter().enumerate() {
            for (row, ts) in frame.index.iter().enumerate() {
                rows.push((*ts, source, row));
            }
        }
        rows.sort_by_key(|(ts, source, row)| (*ts, *source, *row));

        let index: Vec<i64> = rows.iter().map(|(ts, _, _)| *ts).collect();
        validate_timestamps(&index, "merged")?;

        let lookups: Vec<HashMap<&str, &Column>> = frames
            .iter()
            .map(|frame| {
                frame
                    .columns
                    .iter()
                    .map(|c| (c.name.as_str(), c))
                    .collect()
            })
            .collect();

        let columns = names
            .into_iter()
            .map(|name| {
                let values = rows
                    .iter()
                    .map(|(_, source, row)| {
                        lookups[*source]
                            .get(name.as_str())
                            .map(|c| c.get(*row).clone())
                            .unwrap_or(Value::Missing)
                    })
                    .collect();
                Column::new(name, values)
            })
            .collect();

        Ok(Frame::from_parts(index, columns))
    }
}

pub(crate) fn validate_timestamps(
    index: &[i64],
    series: &'static str,
) -> std::result::Result<(), AlignmentError> {
    for (position, pair) in index.windows(2).enumerate() {
        if pair[1] == pair[0] {
            return Err(AlignmentError::Duplicate {
                series,
                timestamp_ns: pair[1],
                position: position + 1,
            });
        }
        if pair[1] < pair[0] {
            return Err(AlignmentError::NonMonotonic {
                series,
                position: position + 1,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn rejects_column_length_mismatch() {
        let err = Frame::new(vec![0, 1])
            .with_f64_column("a", vec![1.0])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Alignment(AlignmentError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn validate_index_reports_duplicates_and_reversals() {
        let dup = Frame::new(vec![0, 5, 5]);
        assert!(matches!(
            dup.validate_index("base"),
            Err(AlignmentError::Duplicate { position: 2, timestamp_ns: 5, .. })
        ));
        let reversed = Frame::new(vec![0, 5, 3]);
        assert!(matches!(
            reversed.validate_index("base"),
            Err(AlignmentError::NonMonotonic { position: 2, .. })
        ));
        assert!(Frame::new(vec![1, 2, 3]).validate_index("base").is_ok());
    }

    #[test]
    fn concat_unions_columns_in_time_order() {
        let legacy = Frame::new(vec![0, 10])
            .with_f64_column("a", vec![1.0, 2.0])
            .expect("legacy");
        let current = Frame::new(vec![20])
            .with_f64_column("a", vec![3.0])
            .and_then(|f| f.with_f64_column("b", vec![9.0]))
            .expect("current");

        let merged = Frame::concat(vec![current, legacy]).expect("concat");
        assert_eq!(merged.index(), &[0, 10, 20]);
        assert_eq!(
            merged.column("a").expect("a").values(),
            &[Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)]
        );
        assert_eq!(
            merged.column("b").expect("b").values(),
            &[Value::Missing, Value::Missing, Value::Float(9.0)]
        );
    }

    #[test]
    fn concat_rejects_overlap() {
        let a = Frame::new(vec![0, 10]);
        let b = Frame::new(vec![10]);
        assert!(Frame::concat(vec![a, b]).is_err());
    }
}
