//! Client façade wiring a [`Store`], a [`SchemaResolver`] and the transforms.

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::ClientConfig;
use crate::error::{Error, QueryBuildError, Result};
use crate::frame::Frame;
use crate::parallel::{run_jobs, PoolStats};
use crate::query::{QueryBuilder, RangeQuery, TimeRange, TopNQuery};
use crate::schema::{SchemaCache, SchemaResolver, TopicSchema};
use crate::store::Store;
use crate::timescale::{utc_ns_from_tai_ns, TimeScale};
use crate::unpack::{unpack, PackedGroups, TimestampSource, UnpackOptions, UnpackOutcome};

pub struct Client<S, R> {
    store: S,
    resolver: R,
    config: ClientConfig,
    builder: QueryBuilder,
    cache: Arc<SchemaCache>,
    history: Mutex<Vec<String>>,
}

impl<S: Store, R: SchemaResolver> Client<S, R> {
    pub fn new(store: S, resolver: R, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            resolver,
            builder: QueryBuilder::from_config(&config),
            config,
            cache: Arc::new(SchemaCache::new()),
            history: Mutex::new(Vec::new()),
        })
    }

    /// Shares a schema cache with other clients.
    pub fn with_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn topics(&self) -> Result<Vec<String>> {
        self.store.list_topics().map_err(Error::Store)
    }

    pub fn fields(&self, topic: &str) -> Result<Vec<String>> {
        self.store.list_fields(topic).map_err(Error::Store)
    }

    /// Schema for `topic`, with packed sample counts resolved against the
    /// topic's stored columns. Cached after the first call.
    pub fn schema(&self, topic: &str) -> Result<Arc<TopicSchema>> {
        self.schema_with_columns(topic, None)
    }

    /// As [`Client::schema`], reusing `columns` when they were already listed.
    fn schema_with_columns(&self, topic: &str, columns: Option<&[String]>) -> Result<Arc<TopicSchema>> {
        if let Some(schema) = self.cache.get(topic) {
            return Ok(schema);
        }
        let mut schema = self.resolver.get_schema(topic)?;
        if schema.array_fields().any(|f| f.sample_count.is_none()) {
            schema = match columns {
                Some(columns) => schema.with_resolved_counts(columns),
                None => schema.with_resolved_counts(&self.fields(topic)?),
            };
        }
        Ok(self.cache.insert(schema))
    }

    pub fn select_time_series(
        &self,
        topic: &str,
        fields: &[&str],
        range: TimeRange,
        index: Option<i64>,
    ) -> Result<Frame> {
        let mut query = RangeQuery::new(topic, fields.iter().copied(), range)
            .use_old_indexing(self.config.use_old_indexing);
        query.index = index;
        self.select_range(&query)
    }

    pub fn select_range(&self, query: &RangeQuery) -> Result<Frame> {
        let text = self.builder.build_time_range_query(query)?;
        self.run(text)
    }

    pub fn select_top_n(&self, query: &TopNQuery) -> Result<Frame> {
        let text = self.builder.build_select_top_n_query(query)?;
        let frame = self.run(text)?;
        // Rows arrive newest first.
        let mut rows: Vec<usize> = (0..frame.len()).collect();
        rows.sort_by_key(|&row| frame.index()[row]);
        let index = rows.iter().map(|&row| frame.index()[row]).collect();
        let picks: Vec<Option<usize>> = rows.into_iter().map(Some).collect();
        let columns = frame.columns().iter().map(|c| c.gather(&picks)).collect();
        Ok(Frame::from_parts(index, columns))
    }

    /// Options for packed selections, seeded from the config.
    pub fn packed_options(&self) -> UnpackOptions {
        UnpackOptions::default()
            .fallback(self.config.fallback)
            .timestamps(TimestampSource::Column {
                name: self.config.ref_timestamp_column.clone(),
                scale: self.config.ref_timestamp_scale,
            })
    }

    pub fn select_packed_time_series(
        &self,
        topic: &str,
        bases: &[&str],
        range: TimeRange,
        index: Option<i64>,
    ) -> Result<UnpackOutcome> {
        self.select_packed_time_series_with(topic, bases, range, index, &self.packed_options())
    }

    /// Fetches the packed columns of `bases` and unpacks them.
    ///
    /// A reference timestamp column named in `options` is fetched alongside
    /// when the topic stores it; otherwise the archive time is used.
    pub fn select_packed_time_series_with(
        &self,
        topic: &str,
        bases: &[&str],
        range: TimeRange,
        index: Option<i64>,
        options: &UnpackOptions,
    ) -> Result<UnpackOutcome> {
        let columns = self.fields(topic)?;
        let schema = self.schema_with_columns(topic, Some(&columns))?;
        let groups = PackedGroups::resolve(&schema, bases, &columns)?;

        let mut fields = groups.column_names();
        let mut options = options.clone();
        let reference = match &options.timestamps {
            TimestampSource::Column { name, .. } => Some(name.clone()),
            TimestampSource::Index => None,
        };
        if let Some(name) = reference {
            if columns.contains(&name) {
                fields.push(name);
            } else {
                log::debug!("{topic} has no {name} column; unpacking on archive time");
                options.timestamps = TimestampSource::Index;
            }
        }

        let mut query = RangeQuery::new(topic, fields, range)
            .use_old_indexing(self.config.use_old_indexing);
        query.index = index;
        let frame = self.select_range(&query)?;
        unpack(&frame, &groups, &options)
    }

    /// Runs independent range selections on the worker pool.
    ///
    /// Each query succeeds or fails on its own; results keep query order.
    pub fn select_many(&self, queries: Vec<RangeQuery>) -> Result<(Vec<Result<Frame>>, PoolStats)> {
        run_jobs(queries, self.config.workers, |query| self.select_range(&query))
    }

    /// Every query text sent to the store, oldest first.
    pub fn query_history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn run(&self, text: String) -> Result<Frame> {
        let frame = self.store.execute(&text).map_err(Error::Store);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text);
        let frame = frame?;
        Ok(match self.builder.index_scale() {
            TimeScale::Utc => frame,
            TimeScale::Tai => frame.try_map_index(|tai_ns| {
                utc_ns_from_tai_ns(tai_ns).ok_or_else(|| {
                    QueryBuildError::TimestampOutOfRange(format!("{tai_ns}ns TAI has no UTC instant"))
                })
            })?,
        })
    }
}
