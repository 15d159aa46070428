//! Session-scoped in-memory cache

use super::{Cache, CacheError, CacheKey, Lookup};
use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use tokio::sync::RwLock;

/// HashMap-backed cache living for one run
pub struct MemoryCache<K: ?Sized, V> {
    entries: RwLock<HashMap<String, Option<V>>>,
    _key: PhantomData<fn(&K)>,
}

impl<K: ?Sized, V> MemoryCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            _key: PhantomData,
        }
    }
}

impl<K: ?Sized, V> Default for MemoryCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: CacheKey + ?Sized + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Lookup<V>, CacheError> {
        let key = key.cache_key()?;
        let entries = self.entries.read().await;
        Ok(match entries.get(&key) {
            Some(Some(value)) => Lookup::Hit(value.clone()),
            Some(None) => Lookup::HitAbsent,
            None => Lookup::Miss,
        })
    }

    async fn set(&self, key: &K, value: Option<V>) -> Result<(), CacheError> {
        let key = key.cache_key()?;
        self.entries.write().await.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<bool, CacheError> {
        let key = key.cache_key()?;
        Ok(self.entries.write().await.remove(&key).is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn size(&self) -> Result<usize, CacheError> {
        Ok(self.entries.read().await.len())
    }
}
