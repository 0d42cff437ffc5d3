use crate::error::Result;
use crate::frame::{validate_timestamps, Column, Frame, Value};

/// How a target timestamp without an exact source sample is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    /// Last source value at or before the target timestamp.
    #[default]
    Hold,
    /// Only exact timestamp matches; everything else is missing.
    Exact,
    /// Linear interpolation of numeric cells between the bracketing samples.
    /// Non-numeric cells are held.
    Linear,
}

/// Re-expresses `source` on `target_index`.
///
/// The output index is exactly `target_index`. Targets before the first
/// source sample are missing.
pub fn resample(source: &Frame, target_index: &[i64], policy: FillPolicy) -> Result<Frame> {
    source.validate_index("source")?;
    validate_timestamps(target_index, "target")?;
    let times = source.index();

    let held = held_rows(times, target_index);
    let columns = match policy {
        FillPolicy::Hold => source.columns().iter().map(|c| c.gather(&held)).collect(),
        FillPolicy::Exact => {
            let exact: Vec<Option<usize>> = held
                .iter()
                .zip(target_index)
                .map(|(row, t)| row.filter(|&r| times[r] == *t))
                .collect();
            source.columns().iter().map(|c| c.gather(&exact)).collect()
        }
        FillPolicy::Linear => source
            .columns()
            .iter()
            .map(|c| interpolate(c, times, target_index, &held))
            .collect(),
    };
    Ok(Frame::from_parts(target_index.to_vec(), columns))
}

/// Last source row at or before each target, in one merge pass.
fn held_rows(times: &[i64], targets: &[i64]) -> Vec<Option<usize>> {
    let mut next = 0;
    targets
        .iter()
        .map(|&t| {
            while next < times.len() && times[next] <= t {
                next += 1;
            }
            next.checked_sub(1)
        })
        .collect()
}

fn interpolate(column: &Column, times: &[i64], targets: &[i64], held: &[Option<usize>]) -> Column {
    let values = targets
        .iter()
        .zip(held)
        .map(|(&t, row)| {
            let Some(prev) = *row else {
                return Value::Missing;
            };
            let before = column.get(prev);
            if times[prev] == t || prev + 1 >= times.len() {
                return before.clone();
            }
            let after = column.get(prev + 1);
            match (before.as_f64(), after.as_f64()) {
                (Some(a), Some(b)) => {
                    let span = (times[prev + 1] - times[prev]) as f64;
                    let frac = (t - times[prev]) as f64 / span;
                    Value::Float(a + (b - a) * frac)
                }
                _ => before.clone(),
            }
        })
        .collect();
    Column::new(column.name(), values)
}
