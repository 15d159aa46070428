//! Cross-session caches backed by [`CacheStore`]

use super::{Cache, CacheError, CacheKey, CacheStore, Lookup, Namespace};
use crate::content_identity::ContentIdentity;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// One namespace of the store, values stored as JSON
pub struct PersistentCache<K: ?Sized, V> {
    store: CacheStore,
    namespace: Namespace,
    _types: PhantomData<fn(&K) -> V>,
}

impl<K: ?Sized, V> PersistentCache<K, V> {
    pub fn new(store: CacheStore, namespace: Namespace) -> Self {
        Self {
            store,
            namespace,
            _types: PhantomData,
        }
    }
}

impl<K: ?Sized, V> PersistentCache<K, V>
where
    V: Serialize + DeserializeOwned,
{
    async fn get_raw(&self, key: &str) -> Result<Lookup<V>, CacheError> {
        Ok(match self.store.fetch(self.namespace, key).await? {
            Some(Some(json)) => Lookup::Hit(serde_json::from_str(&json)?),
            Some(None) => Lookup::HitAbsent,
            None => Lookup::Miss,
        })
    }

    async fn set_raw(&self, key: &str, value: Option<&V>) -> Result<(), CacheError> {
        let json = value.map(serde_json::to_string).transpose()?;
        self.store.upsert(self.namespace, key, json.as_deref()).await?;
        Ok(())
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for PersistentCache<K, V>
where
    K: CacheKey + ?Sized + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Lookup<V>, CacheError> {
        let key = key.cache_key()?;
        self.get_raw(&key).await
    }

    async fn set(&self, key: &K, value: Option<V>) -> Result<(), CacheError> {
        let key = key.cache_key()?;
        self.set_raw(&key, value.as_ref()).await
    }

    async fn delete(&self, key: &K) -> Result<bool, CacheError> {
        let key = key.cache_key()?;
        Ok(self.store.remove(self.namespace, &key).await?)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(self.store.clear_namespace(self.namespace).await?)
    }

    async fn size(&self) -> Result<usize, CacheError> {
        Ok(self.store.count(self.namespace).await?)
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

/// File-keyed persistent cache.
///
/// Rows are keyed by [`ContentIdentity`] so a renamed or moved file still
/// hits. The path → identity map lives only for this run, so each file is
/// hashed at most once per session.
pub struct PersistentFileCache<V> {
    inner: PersistentCache<str, V>,
    identities: RwLock<HashMap<PathBuf, ContentIdentity>>,
}

impl<V> PersistentFileCache<V> {
    pub fn new(store: CacheStore) -> Self {
        Self {
            inner: PersistentCache::new(store, Namespace::Fingerprint),
            identities: RwLock::new(HashMap::new()),
        }
    }

    /// Paths whose identity is already known this run
    pub async fn known_paths(&self) -> usize {
        self.identities.read().await.len()
    }

    async fn identity_for(&self, path: &Path) -> Result<ContentIdentity, CacheError> {
        let absolute = PathBuf::from(path.cache_key()?);

        if let Some(identity) = self.identities.read().await.get(&absolute) {
            return Ok(identity.clone());
        }

        let identity = ContentIdentity::compute(&absolute).await?;
        self.identities
            .write()
            .await
            .insert(absolute, identity.clone());
        Ok(identity)
    }
}

#[async_trait]
impl<V> Cache<Path, V> for PersistentFileCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &Path) -> Result<Lookup<V>, CacheError> {
        let identity = self.identity_for(key).await?;
        self.inner.get_raw(identity.as_str()).await
    }

    async fn set(&self, key: &Path, value: Option<V>) -> Result<(), CacheError> {
        let identity = self.identity_for(key).await?;
        self.inner.set_raw(identity.as_str(), value.as_ref()).await
    }

    async fn delete(&self, key: &Path) -> Result<bool, CacheError> {
        let identity = self.identity_for(key).await?;
        self.inner.delete(identity.as_str()).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.identities.write().await.clear();
        self.inner.clear().await
    }

    async fn size(&self) -> Result<usize, CacheError> {
        self.inner.size().await
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
