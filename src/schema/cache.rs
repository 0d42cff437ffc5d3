use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::{SchemaResolver, TopicSchema};
use crate::error::Result;

type SchemaMap = HashMap<String, Arc<TopicSchema>>;

/// Read-mostly topic schema cache.
///
/// Readers load the current snapshot without locking; writers publish a new
/// map with copy-on-write, so a reader never observes a half-applied update.
#[derive(Debug)]
pub struct SchemaCache {
    snapshot: ArcSwap<SchemaMap>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn get(&self, topic: &str) -> Option<Arc<TopicSchema>> {
        self.snapshot.load().get(topic).cloned()
    }

    /// Publishes `schema`, replacing any previous entry for its topic.
    pub fn insert(&self, schema: TopicSchema) -> Arc<TopicSchema> {
        let schema = Arc::new(schema);
        let topic = schema.topic().to_string();
        self.snapshot.rcu(|current| {
            let mut next = SchemaMap::clone(current);
            next.insert(topic.clone(), Arc::clone(&schema));
            next
        });
        log::debug!("schema cache refreshed for {topic}");
        schema
    }

    /// Returns the cached schema or resolves and publishes it.
    pub fn get_or_resolve<R>(&self, topic: &str, resolver: &R) -> Result<Arc<TopicSchema>>
    where
        R: SchemaResolver + ?Sized,
    {
        if let Some(schema) = self.get(topic) {
            return Ok(schema);
        }
        let schema = resolver.get_schema(topic)?;
        Ok(self.insert(schema))
    }

    pub fn invalidate(&self, topic: &str) -> bool {
        let mut removed = false;
        self.snapshot.rcu(|current| {
            let mut next = SchemaMap::clone(current);
            removed = next.remove(topic).is_some();
            next
        });
        removed
    }

    pub fn clear(&self) {
        self.snapshot.store(Arc::new(HashMap::new()));
    }

    /// Point-in-time view of every cached schema.
    pub fn snapshot(&self) -> Arc<HashMap<String, Arc<TopicSchema>>> {
        self.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }
}
