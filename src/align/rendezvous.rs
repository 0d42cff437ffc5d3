use std::time::Duration;

use crate::error::{AlignmentError, Result};
use crate::frame::{validate_timestamps, Column, Frame, Value};

/// Which `other` sample a base timestamp may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Latest sample at or before the base timestamp.
    #[default]
    Past,
    /// Earliest sample at or after the base timestamp.
    Future,
    /// Closest sample either way; ties go to the earlier one.
    Nearest,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Past => "past",
            Direction::Future => "future",
            Direction::Nearest => "nearest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousOptions {
    /// Appended to `other` column names that collide with base columns.
    pub suffix: String,
    /// When set, adds a column holding each matched `other` timestamp.
    pub matched_time_column: Option<String>,
}

impl Default for RendezvousOptions {
    fn default() -> Self {
        Self {
            suffix: "_other".to_string(),
            matched_time_column: None,
        }
    }
}

/// For each `base` timestamp, the position of its match in `other`.
///
/// Matches further than `max_delta` away are `None`.
pub fn match_indices(
    base: &[i64],
    other: &[i64],
    direction: Direction,
    max_delta: Option<Duration>,
) -> std::result::Result<Vec<Option<usize>>, AlignmentError> {
    validate_timestamps(base, "base")?;
    validate_timestamps(other, "other")?;
    let max_delta = max_delta
        .map(|d| u64::try_from(d.as_nanos()).map_err(|_| AlignmentError::DeltaOutOfRange(d)))
        .transpose()?;

    // `after` is the number of `other` samples <= t, `from` the number < t.
    let mut after = 0;
    let mut from = 0;
    let mut matches = Vec::with_capacity(base.len());
    for &t in base {
        while after < other.len() && other[after] <= t {
            after += 1;
        }
        while from < other.len() && other[from] < t {
            from += 1;
        }
        let past = after.checked_sub(1);
        let future = (from < other.len()).then_some(from);

        let candidate = match direction {
            Direction::Past => past,
            Direction::Future => future,
            Direction::Nearest => match (past, future) {
                (Some(p), Some(f)) => {
                    if t.abs_diff(other[p]) <= other[f].abs_diff(t) {
                        Some(p)
                    } else {
                        Some(f)
                    }
                }
                (p, f) => p.or(f),
            },
        };
        matches.push(candidate.filter(|&j| match max_delta {
            Some(limit) => t.abs_diff(other[j]) <= limit,
            None => true,
        }));
    }
    Ok(matches)
}

/// Joins `other` onto `base`'s index by nearest-in-direction timestamp.
///
/// The result keeps `base`'s index and columns, followed by `other`'s
/// columns (renamed with [`RendezvousOptions::suffix`] on collision).
/// Unmatched rows carry missing cells.
pub fn rendezvous(
    base: &Frame,
    other: &Frame,
    direction: Direction,
    max_delta: Option<Duration>,
    options: &RendezvousOptions,
) -> Result<Frame> {
    let matches = match_indices(base.index(), other.index(), direction, max_delta)?;

    let mut columns: Vec<Column> = base.columns().to_vec();
    let mut taken: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
    if let Some(name) = &options.matched_time_column {
        taken.push(name.clone());
    }

    for column in other.columns() {
        let mut name = column.name().to_string();
        while taken.contains(&name) {
            name.push_str(&options.suffix);
        }
        taken.push(name.clone());
        columns.push(column.gather(&matches).renamed(name));
    }

    if let Some(name) = &options.matched_time_column {
        let values = matches
            .iter()
            .map(|m| m.map(|j| Value::Int(other.index()[j])).unwrap_or_default())
            .collect();
        columns.push(Column::new(name.clone(), values));
    }

    log::debug!(
        "rendezvous {} matched {}/{} rows",
        direction.as_str(),
        matches.iter().filter(|m| m.is_some()).count(),
        matches.len()
    );
    Ok(Frame::from_parts(base.index().to_vec(), columns))
}
