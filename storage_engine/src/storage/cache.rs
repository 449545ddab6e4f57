use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ChunkId;

/// LRU of decoded chunk payloads.
pub struct CacheManager {
    cache: Arc<Mutex<LruCache<ChunkId, Arc<Vec<u8>>>>>,
}

impl CacheManager {
    pub fn new(cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub async fn get(&self, id: &ChunkId) -> Option<Arc<Vec<u8>>> {
        let mut cache = self.cache.lock().await;
        cache.get(id).cloned()
    }

    pub async fn put(&self, id: ChunkId, data: Arc<Vec<u8>>) {
        let mut cache = self.cache.lock().await;
        cache.put(id, data);
    }

    pub async fn invalidate(&self, id: &ChunkId) {
        let mut cache = self.cache.lock().await;
        cache.pop(id);
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let cache = CacheManager::new(2);
        let (a, b, c) = (ChunkId::new(), ChunkId::new(), ChunkId::new());

        cache.put(a, Arc::new(vec![1])).await;
        cache.put(b, Arc::new(vec![2])).await;
        assert!(cache.get(&a).await.is_some());
        cache.put(c, Arc::new(vec![3])).await;

        assert!(cache.get(&b).await.is_none());
        assert_eq!(cache.get(&a).await.as_deref(), Some(&vec![1]));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn zero_capacity_still_holds_one_entry() {
        let cache = CacheManager::new(0);
        let id = ChunkId::new();
        cache.put(id, Arc::new(vec![9])).await;
        cache.invalidate(&id).await;
        assert!(cache.get(&id).await.is_none());
    }
}
