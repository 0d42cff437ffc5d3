//! Archive access seam.
//!
//! A [`Store`] runs query text and lists metadata. Transport, credentials and
//! retry policy all live behind it; errors come back as [`StoreError`] and are
//! surfaced unchanged.

use std::sync::Arc;

use crate::error::StoreError;
use crate::frame::Frame;

pub trait Store: Send + Sync {
    /// Runs one query; rows come back keyed by UTC nanoseconds as stored.
    fn execute(&self, query: &str) -> Result<Frame, StoreError>;

    /// Every topic (measurement) in the archive.
    fn list_topics(&self) -> Result<Vec<String>, StoreError>;

    /// Stored column names of `topic`, packed columns included.
    fn list_fields(&self, topic: &str) -> Result<Vec<String>, StoreError>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn execute(&self, query: &str) -> Result<Frame, StoreError> {
        (**self).execute(query)
    }

    fn list_topics(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_topics()
    }

    fn list_fields(&self, topic: &str) -> Result<Vec<String>, StoreError> {
        (**self).list_fields(topic)
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn execute(&self, query: &str) -> Result<Frame, StoreError> {
        (**self).execute(query)
    }

    fn list_topics(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_topics()
    }

    fn list_fields(&self, topic: &str) -> Result<Vec<String>, StoreError> {
        (**self).list_fields(topic)
    }
}
