//! Client-side core for a telemetry archive (EFD).
//!
//! Builds InfluxQL range queries, expands packed records into one row per
//! sub-sample and aligns independently sampled series. Transport and schema
//! fetching sit behind the [`Store`] and [`SchemaResolver`] traits.

pub mod align;
pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod parallel;
pub mod query;
pub mod schema;
pub mod store;
pub mod timescale;
pub mod unpack;

pub use align::{match_indices, rendezvous, resample, Direction, FillPolicy, RendezvousOptions};
pub use client::Client;
pub use config::{ClientConfig, FallbackInterval};
pub use error::{AlignmentError, Error, QueryBuildError, Result, SchemaMismatch, StoreError};
pub use frame::{Column, Frame, Value};
pub use query::{IndexConvention, QueryBuilder, RangeQuery, TimeRange, TopNQuery, Topic};
pub use schema::{parse_registry_schema, FieldSchema, SchemaCache, SchemaResolver, TopicSchema, Unit};
pub use store::Store;
pub use timescale::{Instant, TimeScale};
pub use unpack::{
    unpack, PackedGroup, PackedGroups, RecordFailure, TimestampSource, UnpackOptions, UnpackOutcome,
    UnpackWarning,
};
