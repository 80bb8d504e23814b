use crate::Result;
use pgfeatures::CollectionDescriptor;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tokio::{sync::RwLock, time::Instant};

/// The parameters a collection lookup depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    /// The collection id.
    pub id: String,
}

/// A time-to-live cache of collection descriptors.
///
/// Only hits are cached, so a collection created after a miss is seen on the
/// next request.
#[derive(Debug, Clone)]
pub struct CollectionCache {
    ttl: Option<Duration>,
    entries: Arc<RwLock<HashMap<CollectionKey, (Instant, CollectionDescriptor)>>>,
}

impl CollectionCache {
    /// Creates a new cache. `None` turns caching off.
    pub fn new(ttl: Option<Duration>) -> CollectionCache {
        CollectionCache {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the cached descriptor, or fetches and caches it.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CollectionKey,
        fetch: F,
    ) -> Result<Option<CollectionDescriptor>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<CollectionDescriptor>>>,
    {
        let Some(ttl) = self.ttl else {
            return fetch().await;
        };
        if let Some((inserted, collection)) = self.entries.read().await.get(&key) {
            if inserted.elapsed() < ttl {
                tracing::debug!(id = key.id, "collection cache hit");
                return Ok(Some(collection.clone()));
            }
        }
        let collection = fetch().await?;
        let mut entries = self.entries.write().await;
        match &collection {
            Some(collection) => {
                let _ = entries.insert(key, (Instant::now(), collection.clone()));
            }
            None => {
                let _ = entries.remove(&key);
            }
        }
        Ok(collection)
    }
}
