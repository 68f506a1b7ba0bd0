//! Caller-supplied bounds for external enrichment lookups.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use lineage_types::{LineageError, Result};

/// Bounds every external lookup made during enrichment. The per-lookup
/// timeout applies to each call; the optional deadline stops further fan-out
/// once exceeded while keeping partial results.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub lookup_timeout: Duration,
    pub deadline: Option<Instant>,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(10),
            deadline: None,
        }
    }
}

impl EnrichOptions {
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run one lookup under the per-lookup timeout. A timeout is reported as
    /// `LineageError::LookupTimeout`, treated by callers like any other
    /// per-item failure.
    pub async fn bounded<T, F>(&self, scope: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.lookup_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(LineageError::LookupTimeout {
                scope: scope.to_string(),
                timeout_ms: self.lookup_timeout.as_millis() as u64,
            }),
        }
    }
}
