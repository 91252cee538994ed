// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Concurrency limit for batched transport calls

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of transport calls a batch keeps in flight.
#[derive(Clone)]
pub struct CallPool {
    /// Semaphore for controlling concurrent requests
    semaphore: Arc<Semaphore>,

    /// Maximum concurrent requests
    max_concurrent: usize,
}

impl CallPool {
    /// Create a new pool
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Acquire a permit; the returned guard can move into a spawned task.
    ///
    /// Returns `None` only if the pool was closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }

    /// Get max concurrent requests
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for CallPool {
    fn default() -> Self {
        Self::new(10)
    }
}
