use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Options that identify a loadable model.
pub trait ModelOptions {
    /// Stable identity of the checkpoint, combined with the device in cache keys.
    fn cache_key(&self) -> String;
}

// Entries are weak: a model is freed once every pipeline using it is dropped.
type CacheStorage = HashMap<(TypeId, String), Box<dyn Any + Send + Sync>>;

pub struct ModelCache {
    entries: Mutex<CacheStorage>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheStorage>> {
        self.entries
            .lock()
            .map_err(|_| PipelineError::Unexpected("Model cache lock poisoned".into()))
    }

    fn lookup<M: Send + Sync + 'static>(&self, cache_key: &(TypeId, String)) -> Result<Option<Arc<M>>> {
        let mut entries = self.lock()?;
        let live = entries
            .get(cache_key)
            .and_then(|boxed| boxed.downcast_ref::<Weak<M>>())
            .and_then(Weak::upgrade);
        if live.is_none() {
            entries.remove(cache_key);
        }
        Ok(live)
    }

    /// Returns the live model stored under `key`, or loads and stores a new one.
    ///
    /// The lock is not held while `loader` runs, so two racing callers may both
    /// load; the later one wins the slot.
    pub fn get_or_create<M, F>(&self, key: &str, loader: F) -> Result<Arc<M>>
    where
        M: Send + Sync + 'static,
        F: FnOnce() -> Result<M>,
    {
        let cache_key = (TypeId::of::<M>(), key.to_string());

        if let Some(model) = self.lookup::<M>(&cache_key)? {
            debug!(key, "model cache hit");
            return Ok(model);
        }

        debug!(key, "model cache miss, loading");
        let model = Arc::new(loader()?);
        let weak: Weak<M> = Arc::downgrade(&model);
        self.lock()?.insert(cache_key, Box::new(weak));

        Ok(model)
    }

    #[cfg(test)]
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    #[cfg(test)]
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_MODEL_CACHE: Lazy<ModelCache> = Lazy::new(ModelCache::new);

pub fn global_cache() -> &'static ModelCache {
    &GLOBAL_MODEL_CACHE
}
