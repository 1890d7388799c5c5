use std::{sync::Arc, time::Duration};

use tokio::{sync::Semaphore, time::timeout};
use tracing::warn;

use crate::domain::error::DomainError;

/// Admission control for blocking hash work.
///
/// Each job holds a semaphore permit for as long as its blocking closure
/// runs. The permit lives inside the closure, so a caller that gives up on
/// `job_timeout` does not free memory budget the computation still uses.
#[derive(Clone)]
pub struct HashingPool {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    admission_timeout: Duration,
    job_timeout: Duration,
}

impl HashingPool {
    pub fn new(max_concurrent: usize, admission_timeout: Duration, job_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            admission_timeout,
            job_timeout,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Hold one slot from outside, to drive the pool into saturation
    #[cfg(test)]
    pub async fn occupy(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("hashing pool closed")
    }

    pub async fn run<T, F>(&self, job: F) -> Result<T, DomainError>
    where
        F: FnOnce() -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = match timeout(self.admission_timeout, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => return Err(DomainError::TaskFailed(e.to_string())),
            Err(_) => {
                warn!(
                    max_concurrent = self.max_concurrent,
                    waited_ms = self.admission_timeout.as_millis() as u64,
                    "hashing pool saturated, rejecting job"
                );
                return Err(DomainError::Overloaded);
            }
        };

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        match timeout(self.job_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DomainError::TaskFailed(e.to_string())),
            Err(_) => {
                // the blocking job keeps running and its result is dropped
                warn!(
                    timeout_ms = self.job_timeout.as_millis() as u64,
                    "hashing job timed out"
                );
                Err(DomainError::Timeout)
            }
        }
    }
}
