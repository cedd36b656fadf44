use crate::access::{DataHandle, HandleFactory};
use crate::cache::{CacheAside, OperationSignature, Ttl};
use crate::core::Result;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Answers reads from the cache or, on a miss, from a replica
#[derive(Clone)]
pub struct ReadPipeline {
    handles: HandleFactory,
    cache: CacheAside,
}

impl ReadPipeline {
    pub fn new(handles: HandleFactory, cache: CacheAside) -> Self {
        Self { handles, cache }
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    /// Run `op` against a read-only handle through the cache.
    ///
    /// `op` only runs on a cache miss. Any mutation it attempts fails with
    /// `ReadscaleError::ReadOnlyViolation`.
    pub async fn execute<T, F>(
        &self,
        signature: &OperationSignature,
        ttl: Option<Ttl>,
        op: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: for<'h> FnOnce(&'h mut dyn DataHandle) -> BoxFuture<'h, Result<T>> + Send,
    {
        let handles = &self.handles;

        self.cache
            .cached(signature, ttl, move || async move {
                // Only a miss takes a replica from the rotation
                let mut handle = handles.read_only();
                let handle: &mut dyn DataHandle = &mut handle;
                op(handle).await
            })
            .await
    }
}
