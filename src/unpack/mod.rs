//! Expansion of packed records into one row per sub-sample.
//!
//! A packed record stores `k` sub-samples of a field in the columns
//! `base0..base{k-1}` under a single timestamp `T`. Unpacking emits the
//! sub-samples at `T + i * interval`, where the interval is the nominal
//! cadence when given or `(T_next - T) / k` otherwise.

mod groups;

use std::time::Duration;

pub(crate) use groups::count_packed_columns;
pub use groups::{PackedGroup, PackedGroups};

use crate::config::FallbackInterval;
use crate::error::{Error, Result, SchemaMismatch};
use crate::frame::{validate_timestamps, Column, Frame, Value};
use crate::timescale::{duration_ns, Instant, TimeScale};

/// Where per-record timestamps come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimestampSource {
    /// The frame index.
    #[default]
    Index,
    /// A column of unix seconds in the given scale.
    Column { name: String, scale: TimeScale },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackOptions {
    /// Nominal sub-sample spacing; derived per record when `None`.
    pub cadence: Option<Duration>,
    /// Interval policy for the last record.
    pub fallback: FallbackInterval,
    /// Keep every `stride`-th sub-sample.
    pub stride: usize,
    pub timestamps: TimestampSource,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            cadence: None,
            fallback: FallbackInterval::PreviousRow,
            stride: 1,
            timestamps: TimestampSource::Index,
        }
    }
}

impl UnpackOptions {
    pub fn cadence(mut self, cadence: Duration) -> Self {
        self.cadence = Some(cadence);
        self
    }

    pub fn fallback(mut self, fallback: FallbackInterval) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn timestamps(mut self, source: TimestampSource) -> Self {
        self.timestamps = source;
        self
    }
}

/// Non-fatal conditions met while unpacking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackWarning {
    /// No interval could be determined; only the first sub-sample was kept.
    Collapsed { row: usize, timestamp_ns: i64 },
    /// The nominal cadence would have run into the next record.
    CadenceOverrun {
        row: usize,
        timestamp_ns: i64,
        derived_ns: i64,
    },
}

/// A record dropped from the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub row: usize,
    pub error: SchemaMismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnpackOutcome {
    pub frame: Frame,
    pub warnings: Vec<UnpackWarning>,
    pub failures: Vec<RecordFailure>,
}

/// Unpacks every record of `frame` according to `groups`.
///
/// Scalar columns are copied onto each emitted sample. A record whose packed
/// values are incomplete is skipped and reported in
/// [`UnpackOutcome::failures`]; the batch fails only when every record does.
pub fn unpack(frame: &Frame, groups: &PackedGroups, options: &UnpackOptions) -> Result<UnpackOutcome> {
    let Some(count) = groups.common_count()? else {
        return Ok(UnpackOutcome {
            frame: frame.clone(),
            warnings: Vec::new(),
            failures: Vec::new(),
        });
    };
    if count == 0 || options.stride == 0 || count % options.stride != 0 {
        return Err(Error::InvalidStride {
            stride: options.stride,
            count,
        });
    }

    let packed: Vec<Vec<&Column>> = groups
        .groups()
        .iter()
        .map(|group| {
            group
                .column_names()
                .map(|name| {
                    frame
                        .column(&name)
                        .ok_or(SchemaMismatch::MissingPackedField { field: name })
                })
                .collect::<std::result::Result<Vec<_>, _>>()
        })
        .collect::<std::result::Result<_, _>>()?;

    let packed_names = groups.column_names();
    let timestamp_column = match &options.timestamps {
        TimestampSource::Index => None,
        TimestampSource::Column { name, .. } => Some(name.as_str()),
    };
    let scalars: Vec<&Column> = frame
        .columns()
        .iter()
        .filter(|c| !packed_names.iter().any(|n| n == c.name()))
        .filter(|c| Some(c.name()) != timestamp_column)
        .collect();

    // Rows without a usable timestamp fail alone and take no part in
    // interval derivation.
    let mut failures = Vec::new();
    let mut rows = Vec::with_capacity(frame.len());
    let mut times = Vec::with_capacity(frame.len());
    for (row, time) in record_times(frame, &options.timestamps)?.into_iter().enumerate() {
        match time {
            Ok(t) => {
                rows.push(row);
                times.push(t);
            }
            Err(error) => {
                log::warn!("skipping packed record {row}: {error}");
                failures.push(RecordFailure { row, error });
            }
        }
    }
    validate_timestamps(&times, "packed")?;

    let emitted = count / options.stride;
    let mut index = Vec::with_capacity(frame.len() * emitted);
    let mut group_values: Vec<Vec<Value>> = vec![Vec::with_capacity(index.capacity()); packed.len()];
    let mut scalar_values: Vec<Vec<Value>> = vec![Vec::with_capacity(index.capacity()); scalars.len()];
    let mut warnings = Vec::new();

    for (pos, (&row, &t)) in rows.iter().zip(&times).enumerate() {
        if let Err(error) = check_complete(groups, &packed, row, t, count) {
            log::warn!("skipping packed record {row}: {error}");
            failures.push(RecordFailure { row, error });
            continue;
        }

        let interval = if emitted == 1 {
            Some(0)
        } else {
            record_interval(&times, pos, row, count, options, &mut warnings)
        };

        let offsets: Vec<usize> = match interval {
            Some(_) => (0..count).step_by(options.stride).collect(),
            None => {
                log::warn!("packed record {row} at {t} has no usable interval; collapsed");
                warnings.push(UnpackWarning::Collapsed {
                    row,
                    timestamp_ns: t,
                });
                vec![0]
            }
        };
        let interval = interval.unwrap_or(0);

        for i in offsets {
            index.push(t.saturating_add(interval.saturating_mul(i as i64)));
            for (values, columns) in group_values.iter_mut().zip(&packed) {
                values.push(columns[i].get(row).clone());
            }
            for (values, column) in scalar_values.iter_mut().zip(&scalars) {
                values.push(column.get(row).clone());
            }
        }
    }

    failures.sort_by_key(|failure| failure.row);
    if !frame.is_empty() && failures.len() == frame.len() {
        let first = failures.swap_remove(0).error;
        return Err(SchemaMismatch::BatchFailed(Box::new(first)).into());
    }

    let columns = groups
        .groups()
        .iter()
        .zip(group_values)
        .map(|(group, values)| Column::new(group.base(), values))
        .chain(
            scalars
                .iter()
                .zip(scalar_values)
                .map(|(column, values)| Column::new(column.name(), values)),
        )
        .collect();

    Ok(UnpackOutcome {
        frame: Frame::from_parts(index, columns),
        warnings,
        failures,
    })
}

/// Per-record UTC timestamps. A row whose reference reading is missing,
/// non-numeric or out of range gets its own error.
fn record_times(
    frame: &Frame,
    source: &TimestampSource,
) -> Result<Vec<std::result::Result<i64, SchemaMismatch>>> {
    match source {
        TimestampSource::Index => Ok(frame.index().iter().map(|&t| Ok(t)).collect()),
        TimestampSource::Column { name, scale } => {
            let bad = |row: usize| SchemaMismatch::BadTimestampColumn {
                column: name.clone(),
                row,
            };
            let column = frame.column(name).ok_or_else(|| bad(0))?;
            Ok((0..frame.len())
                .map(|row| {
                    column
                        .get(row)
                        .as_f64()
                        .and_then(|seconds| Instant::from_unix_seconds(seconds, *scale))
                        .map(Instant::utc_ns)
                        .ok_or_else(|| bad(row))
                })
                .collect())
        }
    }
}

/// Every group must carry all `count` sub-values.
fn check_complete(
    groups: &PackedGroups,
    packed: &[Vec<&Column>],
    row: usize,
    timestamp_ns: i64,
    count: usize,
) -> std::result::Result<(), SchemaMismatch> {
    for (group, columns) in groups.groups().iter().zip(packed) {
        let present = columns.iter().take_while(|c| !c.get(row).is_missing()).count();
        if present != count {
            return Err(SchemaMismatch::IncompleteRecord {
                timestamp_ns,
                field: group.base().to_string(),
                present,
                expected: count,
            });
        }
    }
    Ok(())
}

/// Sub-sample spacing for the record at `times[pos]` (frame row `row`),
/// `None` when it must collapse.
fn record_interval(
    times: &[i64],
    pos: usize,
    row: usize,
    count: usize,
    options: &UnpackOptions,
    warnings: &mut Vec<UnpackWarning>,
) -> Option<i64> {
    let k = count as i64;
    let t = times[pos];
    let derived = |from: i64, to: i64| Some(to.saturating_sub(from) / k).filter(|step| *step > 0);

    match (times.get(pos + 1), options.cadence) {
        (Some(&next), Some(cadence)) => {
            let nominal = duration_ns(cadence);
            let span = nominal.saturating_mul(k - 1);
            if nominal > 0 && t.saturating_add(span) < next {
                return Some(nominal);
            }
            let fallback = derived(t, next);
            if let Some(derived_ns) = fallback {
                log::warn!(
                    "cadence {cadence:?} overruns next record at row {row}; using {derived_ns}ns"
                );
                warnings.push(UnpackWarning::CadenceOverrun {
                    row,
                    timestamp_ns: t,
                    derived_ns,
                });
            }
            fallback
        }
        (Some(&next), None) => derived(t, next),
        (None, Some(cadence)) => Some(duration_ns(cadence)).filter(|step| *step > 0),
        (None, None) => match options.fallback {
            FallbackInterval::PreviousRow => pos
                .checked_sub(1)
                .and_then(|prev| derived(times[prev], t)),
            FallbackInterval::Fixed { nanos } => {
                Some(i64::try_from(nanos).unwrap_or(i64::MAX)).filter(|step| *step > 0)
            }
            FallbackInterval::None => None,
        },
    }
}
