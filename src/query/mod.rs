//! InfluxQL query construction.
//!
//! The builder performs no I/O: it validates its inputs and returns executable
//! query text, failing with [`QueryBuildError`] before any text is produced.
//!
//! ```
//! use efd_client::query::{QueryBuilder, RangeQuery, TimeRange};
//! use efd_client::timescale::{Instant, TimeScale};
//!
//! let start = Instant::parse_isot("2023-01-01T00:00:00", TimeScale::Utc)?;
//! let end = Instant::parse_isot("2023-01-01T01:00:00", TimeScale::Utc)?;
//! let query = RangeQuery::new("lsst.sal.MTMount.azimuth", ["actualPosition"], TimeRange::new(start, end))
//!     .index(1);
//! let text = QueryBuilder::default().build_time_range_query(&query)?;
//! assert!(text.ends_with("AND salIndex = 1"));
//! # Ok::<(), efd_client::QueryBuildError>(())
//! ```

mod ident;

use std::fmt;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::QueryBuildError;
use crate::timescale::{Instant, TimeScale};

use ident::{quote_always, quote_identifier, render_field, validate_identifier};

type Result<T> = std::result::Result<T, QueryBuildError>;

pub const CURRENT_INDEX_FIELD: &str = "salIndex";

/// A dotted topic name such as `lsst.sal.MTM1M3.forceActuatorData`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    name: String,
}

impl Topic {
    pub fn parse(name: &str) -> Result<Self> {
        validate_identifier("topic", name)?;
        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Everything before the last dot, empty for undotted names.
    pub fn namespace(&self) -> &str {
        self.name.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("")
    }

    pub fn short_name(&self) -> &str {
        self.name.rsplit_once('.').map(|(_, n)| n).unwrap_or(&self.name)
    }

    /// The component owning the topic: always the penultimate dotted part.
    pub fn component(&self) -> Option<&str> {
        let mut parts = self.name.rsplit('.');
        parts.next()?;
        parts.next().filter(|part| !part.is_empty())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Naming of the component-index field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexConvention {
    /// `salIndex`
    #[default]
    Current,
    /// `{ComponentName}ID`
    Legacy,
}

impl IndexConvention {
    pub fn from_legacy_flag(use_old_indexing: bool) -> Self {
        if use_old_indexing {
            IndexConvention::Legacy
        } else {
            IndexConvention::Current
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexConvention::Current => "current",
            IndexConvention::Legacy => "legacy",
        }
    }

    pub fn field_name(self, topic: &Topic) -> Result<String> {
        match self {
            IndexConvention::Current => Ok(CURRENT_INDEX_FIELD.to_string()),
            IndexConvention::Legacy => topic
                .component()
                .map(|component| format!("{component}ID"))
                .ok_or_else(|| QueryBuildError::UnsupportedIndexConvention {
                    convention: self.as_str(),
                    topic: topic.to_string(),
                }),
        }
    }
}

/// Time span selected by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Between { start: Instant, end: Instant },
    /// `start` to `start + delta`.
    Offset { start: Instant, delta: Duration },
    /// Centred on `center`, `width` wide.
    Window { center: Instant, width: Duration },
}

impl TimeRange {
    pub fn new(start: Instant, end: Instant) -> Self {
        TimeRange::Between { start, end }
    }

    pub fn from_start(start: Instant, delta: Duration) -> Self {
        TimeRange::Offset { start, delta }
    }

    pub fn window(center: Instant, width: Duration) -> Self {
        TimeRange::Window { center, width }
    }

    pub fn bounds(&self) -> Result<(Instant, Instant)> {
        let (start, end) = match *self {
            TimeRange::Between { start, end } => (start, end),
            TimeRange::Offset { start, delta } => {
                let end = start
                    .checked_add(delta)
                    .ok_or_else(|| out_of_range(start, delta))?;
                (start, end)
            }
            TimeRange::Window { center, width } => {
                let half = width / 2;
                let start = center
                    .checked_sub(half)
                    .ok_or_else(|| out_of_range(center, half))?;
                let end = center
                    .checked_add(half)
                    .ok_or_else(|| out_of_range(center, half))?;
                (start, end)
            }
        };
        if start > end {
            return Err(QueryBuildError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok((start, end))
    }
}

fn out_of_range(at: Instant, delta: Duration) -> QueryBuildError {
    QueryBuildError::TimestampOutOfRange(format!("{at} +/- {delta:?}"))
}

/// Parameters of a time-range selection.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub topic: String,
    pub fields: Vec<String>,
    pub range: TimeRange,
    pub index: Option<i64>,
    pub use_old_indexing: bool,
    /// Most-recent-N cap; switches ordering to descending time.
    pub limit: Option<u64>,
}

impl RangeQuery {
    pub fn new<I, S>(topic: impl Into<String>, fields: I, range: TimeRange) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topic: topic.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            range,
            index: None,
            use_old_indexing: false,
            limit: None,
        }
    }

    pub fn index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn use_old_indexing(mut self, legacy: bool) -> Self {
        self.use_old_indexing = legacy;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Parameters of a most-recent-N selection.
#[derive(Debug, Clone, PartialEq)]
pub struct TopNQuery {
    pub topic: String,
    pub fields: Vec<String>,
    pub num: u64,
    /// Only rows strictly before this instant.
    pub time_cut: Option<Instant>,
    pub index: Option<i64>,
    pub use_old_indexing: bool,
}

impl TopNQuery {
    pub fn new<I, S>(topic: impl Into<String>, fields: I, num: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topic: topic.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            num,
            time_cut: None,
            index: None,
            use_old_indexing: false,
        }
    }

    pub fn time_cut(mut self, cut: Instant) -> Self {
        self.time_cut = Some(cut);
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn use_old_indexing(mut self, legacy: bool) -> Self {
        self.use_old_indexing = legacy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    database: String,
    retention_policy: String,
    index_scale: TimeScale,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            database: "efd".to_string(),
            retention_policy: "autogen".to_string(),
            index_scale: TimeScale::Utc,
        }
    }
}

impl QueryBuilder {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            database: config.database.clone(),
            retention_policy: config.retention_policy.clone(),
            index_scale: config.index_scale,
        }
    }

    pub fn with_retention_policy(mut self, policy: impl Into<String>) -> Self {
        self.retention_policy = policy.into();
        self
    }

    /// Scale the archive stores its time index in. Legacy deployments kept TAI.
    pub fn with_index_scale(mut self, scale: TimeScale) -> Self {
        self.index_scale = scale;
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn index_scale(&self) -> TimeScale {
        self.index_scale
    }

    fn measurement(&self, topic: &Topic) -> Result<String> {
        validate_identifier("database", &self.database)?;
        validate_identifier("retention policy", &self.retention_policy)?;
        Ok(format!(
            "{}.{}.{}",
            quote_always(&self.database),
            quote_always(&self.retention_policy),
            quote_always(topic.as_str())
        ))
    }

    fn timestamp(&self, instant: Instant) -> Result<String> {
        Ok(format!("'{}'", instant.to_archive_string(self.index_scale)?))
    }

    pub fn build_time_range_query(&self, query: &RangeQuery) -> Result<String> {
        let fields = render_fields(&query.fields)?;
        let topic = Topic::parse(&query.topic)?;
        let measurement = self.measurement(&topic)?;
        let (start, end) = query.range.bounds()?;
        let index_clause = index_clause(&topic, query.index, query.use_old_indexing)?;
        if query.limit == Some(0) {
            return Err(QueryBuildError::InvalidLimit);
        }

        let mut text = format!(
            "SELECT {fields} FROM {measurement} WHERE time >= {} AND time <= {}",
            self.timestamp(start)?,
            self.timestamp(end)?
        );
        if let Some(clause) = index_clause {
            text.push_str(" AND ");
            text.push_str(&clause);
        }
        if let Some(limit) = query.limit {
            text.push_str(&format!(" ORDER BY time DESC LIMIT {limit}"));
        }
        log::debug!("built range query: {text}");
        Ok(text)
    }

    pub fn build_select_top_n_query(&self, query: &TopNQuery) -> Result<String> {
        let fields = render_fields(&query.fields)?;
        let topic = Topic::parse(&query.topic)?;
        let measurement = self.measurement(&topic)?;
        if query.num == 0 {
            return Err(QueryBuildError::InvalidLimit);
        }
        let index_clause = index_clause(&topic, query.index, query.use_old_indexing)?;

        let mut conditions = Vec::new();
        if let Some(cut) = query.time_cut {
            conditions.push(format!("time < {}", self.timestamp(cut)?));
        }
        conditions.extend(index_clause);

        let mut text = format!("SELECT {fields} FROM {measurement}");
        if !conditions.is_empty() {
            text.push_str(" WHERE ");
            text.push_str(&conditions.join(" AND "));
        }
        // GROUP BY * keeps tag columns in the result.
        text.push_str(&format!(" GROUP BY * ORDER BY time DESC LIMIT {}", query.num));
        log::debug!("built top-n query: {text}");
        Ok(text)
    }

    pub fn build_show_measurements(&self) -> String {
        "SHOW MEASUREMENTS".to_string()
    }

    pub fn build_show_field_keys(&self, topic: &str) -> Result<String> {
        let topic = Topic::parse(topic)?;
        Ok(format!("SHOW FIELD KEYS FROM {}", self.measurement(&topic)?))
    }
}

fn render_fields(fields: &[String]) -> Result<String> {
    if fields.is_empty() {
        return Err(QueryBuildError::EmptyFields);
    }
    let rendered = fields
        .iter()
        .map(|field| render_field(field))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(", "))
}

fn index_clause(topic: &Topic, index: Option<i64>, legacy: bool) -> Result<Option<String>> {
    let Some(index) = index else {
        return Ok(None);
    };
    let name = IndexConvention::from_legacy_flag(legacy).field_name(topic)?;
    Ok(Some(format!("{} = {index}", quote_identifier(&name))))
}
