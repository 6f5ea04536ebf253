//! Bounded worker pool for forward jobs.
//!
//! # Responsibilities
//! - Cap concurrent forward+parse+persist jobs via semaphore
//! - Run each job as its own task so it finishes even if the caller goes away

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::BridgeError;

/// Pool of job slots shared by all handlers.
///
/// When every slot is taken, new jobs wait for one to free up.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a slot, then run `job` on a detached task and await it.
    ///
    /// Dropping the returned future does not cancel a job that already
    /// started; its result is discarded.
    pub async fn run<F, T>(&self, job: F) -> Result<T, BridgeError>
    where
        F: Future<Output = Result<T, BridgeError>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BridgeError::Internal("worker pool closed".into()))?;

        let handle = tokio::spawn(async move {
            let _permit = permit;
            job.await
        });

        handle
            .await
            .map_err(|e| BridgeError::Internal(format!("pipeline task failed: {e}")))?
    }
}
