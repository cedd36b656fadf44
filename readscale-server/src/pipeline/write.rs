use crate::access::{DataHandle, HandleFactory};
use crate::core::Result;
use futures_util::future::BoxFuture;
use tracing::warn;

/// Applies mutations on the primary inside one transaction. Never touches
/// the cache: cached reads stay stale until their TTL lapses.
#[derive(Clone)]
pub struct WritePipeline {
    handles: HandleFactory,
}

impl WritePipeline {
    pub fn new(handles: HandleFactory) -> Self {
        Self { handles }
    }

    /// Run `op` against a write-capable handle, committing on `Ok` and
    /// rolling back on `Err`. Cancelling the returned future aborts the
    /// transaction.
    pub async fn execute<T, F>(&self, op: F) -> Result<T>
    where
        T: Send,
        F: for<'h> FnOnce(&'h mut dyn DataHandle) -> BoxFuture<'h, Result<T>> + Send,
    {
        let mut handle = self.handles.write_capable().await?;

        let outcome = {
            let handle: &mut dyn DataHandle = &mut handle;
            op(handle).await
        };

        match outcome {
            Ok(value) => {
                handle.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = handle.rollback().await {
                    warn!("Rollback after failed write also failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}
