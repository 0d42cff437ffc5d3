//! Time scales and instants.
//!
//! Every [`Instant`] is stored as nanoseconds since the Unix epoch in UTC. Readings
//! taken in TAI are converted on construction and rendered back on request, using
//! the IERS leap-second table. Instants before 1972 use the 1972 offset.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::QueryBuildError;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// (UTC Unix seconds at which the offset takes effect, TAI - UTC seconds).
const LEAP_SECONDS: [(i64, i64); 28] = [
    (63_072_000, 10),
    (78_796_800, 11),
    (94_694_400, 12),
    (126_230_400, 13),
    (157_766_400, 14),
    (189_302_400, 15),
    (220_924_800, 16),
    (252_460_800, 17),
    (283_996_800, 18),
    (315_532_800, 19),
    (362_793_600, 20),
    (394_329_600, 21),
    (425_865_600, 22),
    (489_024_000, 23),
    (567_993_600, 24),
    (631_152_000, 25),
    (662_688_000, 26),
    (709_948_800, 27),
    (741_484_800, 28),
    (773_020_800, 29),
    (820_454_400, 30),
    (867_715_200, 31),
    (915_148_800, 32),
    (1_136_073_600, 33),
    (1_230_768_000, 34),
    (1_341_100_800, 35),
    (1_435_708_800, 36),
    (1_483_228_800, 37),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeScale {
    #[default]
    Utc,
    Tai,
}

impl TimeScale {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeScale::Utc => "utc",
            TimeScale::Tai => "tai",
        }
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TAI - UTC in seconds at the given UTC Unix second.
pub fn tai_minus_utc(utc_secs: i64) -> i64 {
    LEAP_SECONDS
        .iter()
        .rev()
        .find(|(start, _)| utc_secs >= *start)
        .map(|(_, offset)| *offset)
        .unwrap_or(LEAP_SECONDS[0].1)
}

/// Converts a TAI reading (ns on the Unix scale) into UTC nanoseconds.
///
/// `None` when the shifted reading leaves the `i64` range.
pub fn utc_ns_from_tai_ns(tai_ns: i64) -> Option<i64> {
    for (start, offset) in LEAP_SECONDS.iter().rev() {
        // An underflow here is below every table entry.
        let Some(candidate) = tai_ns.checked_sub(offset * NANOS_PER_SEC) else {
            continue;
        };
        if candidate >= start * NANOS_PER_SEC {
            return Some(candidate);
        }
    }
    tai_ns.checked_sub(LEAP_SECONDS[0].1 * NANOS_PER_SEC)
}

/// Converts UTC nanoseconds into a TAI reading on the Unix scale.
///
/// `None` when the shifted reading leaves the `i64` range.
pub fn tai_ns_from_utc_ns(utc_ns: i64) -> Option<i64> {
    let offset = tai_minus_utc(utc_ns.div_euclid(NANOS_PER_SEC));
    utc_ns.checked_add(offset * NANOS_PER_SEC)
}

fn reading_to_utc_ns(reading_ns: i64, scale: TimeScale) -> Option<i64> {
    match scale {
        TimeScale::Utc => Some(reading_ns),
        TimeScale::Tai => utc_ns_from_tai_ns(reading_ns),
    }
}

/// An absolute instant, held in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    utc_ns: i64,
}

impl Instant {
    pub const fn from_utc_ns(utc_ns: i64) -> Self {
        Self { utc_ns }
    }

    /// Builds an instant from a nanosecond reading taken in `scale`, or `None`
    /// when the reading has no UTC instant in range.
    pub fn from_ns(reading_ns: i64, scale: TimeScale) -> Option<Self> {
        reading_to_utc_ns(reading_ns, scale).map(Self::from_utc_ns)
    }

    /// Builds an instant from fractional Unix seconds read in `scale`
    /// (`unix_tai` readings when `scale` is TAI).
    ///
    /// `None` for non-finite readings and readings outside the nanosecond range.
    pub fn from_unix_seconds(secs: f64, scale: TimeScale) -> Option<Self> {
        let reading = (secs * NANOS_PER_SEC as f64).round();
        if !reading.is_finite() || reading < i64::MIN as f64 || reading >= i64::MAX as f64 {
            return None;
        }
        Self::from_ns(reading as i64, scale)
    }

    /// Builds an instant from a calendar reading taken in `scale`.
    pub fn from_datetime(dt: OffsetDateTime, scale: TimeScale) -> Result<Self, QueryBuildError> {
        let out_of_range = || QueryBuildError::TimestampOutOfRange(dt.to_string());
        let reading_ns = i64::try_from(dt.unix_timestamp_nanos()).map_err(|_| out_of_range())?;
        Self::from_ns(reading_ns, scale).ok_or_else(out_of_range)
    }

    /// Parses `YYYY-MM-DDTHH:MM:SS[.fff]` (optionally with `Z` or an RFC 3339
    /// offset) as a reading in `scale`.
    pub fn parse_isot(text: &str, scale: TimeScale) -> Result<Self, QueryBuildError> {
        let trimmed = text.trim();
        if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            return Self::from_datetime(dt, scale);
        }
        let format = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        let naive = trimmed.strip_suffix('Z').unwrap_or(trimmed);
        let dt = PrimitiveDateTime::parse(naive, &format)
            .map_err(|_| QueryBuildError::TimestampOutOfRange(text.to_string()))?;
        Self::from_datetime(dt.assume_utc(), scale)
    }

    pub fn utc_ns(self) -> i64 {
        self.utc_ns
    }

    /// Nanosecond reading of this instant in `scale`.
    pub fn reading_ns(self, scale: TimeScale) -> Result<i64, QueryBuildError> {
        match scale {
            TimeScale::Utc => Ok(self.utc_ns),
            TimeScale::Tai => tai_ns_from_utc_ns(self.utc_ns).ok_or_else(|| {
                QueryBuildError::TimestampOutOfRange(format!("{}ns has no TAI reading", self.utc_ns))
            }),
        }
    }

    pub fn to_unix_seconds(self, scale: TimeScale) -> Result<f64, QueryBuildError> {
        Ok(self.reading_ns(scale)? as f64 / NANOS_PER_SEC as f64)
    }

    pub fn to_datetime(self, scale: TimeScale) -> Result<OffsetDateTime, QueryBuildError> {
        OffsetDateTime::from_unix_timestamp_nanos(self.reading_ns(scale)? as i128)
            .map_err(|err| QueryBuildError::TimestampOutOfRange(err.to_string()))
    }

    /// Renders the archive timestamp literal body, e.g. `2023-01-01T00:00:00.000Z`.
    pub fn to_archive_string(self, scale: TimeScale) -> Result<String, QueryBuildError> {
        let dt = self.to_datetime(scale)?;
        let date = dt.date();
        let nanos = dt.nanosecond();
        let fraction = if nanos % 1_000_000 == 0 {
            format!("{:03}", nanos / 1_000_000)
        } else {
            format!("{:09}", nanos)
        };
        Ok(format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{}Z",
            date.year(),
            date.month() as u8,
            date.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            fraction
        ))
    }

    pub fn checked_add(self, delta: Duration) -> Option<Self> {
        let nanos = i64::try_from(delta.as_nanos()).ok()?;
        self.utc_ns.checked_add(nanos).map(Self::from_utc_ns)
    }

    pub fn checked_sub(self, delta: Duration) -> Option<Self> {
        let nanos = i64::try_from(delta.as_nanos()).ok()?;
        self.utc_ns.checked_sub(nanos).map(Self::from_utc_ns)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_archive_string(TimeScale::Utc) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}ns", self.utc_ns),
        }
    }
}

/// Converts a `Duration` into signed nanoseconds, saturating at `i64::MAX`.
pub(crate) fn duration_ns(delta: Duration) -> i64 {
    i64::try_from(delta.as_nanos()).unwrap_or(i64::MAX)
}
