//! Bounded admission gate for outbound rewrite calls
//!
//! Wraps a fair [`tokio::sync::Semaphore`]: waiters are admitted in FIFO
//! order and there is no timeout on queued acquisitions.

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::TransformError;

/// Caps the number of simultaneously outstanding external calls.
///
/// Cloning shares the same admission counter.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `capacity` holders (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, TransformError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| TransformError::LimiterClosed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
