//! Asynchronous instance lookup
//!
//! Containers mount in arbitrary order; a copy nested in a repeating list
//! appears only once the list data arrives. External callers therefore
//! poll the registry with exponential backoff instead of assuming an
//! instance is already there.

use crate::registry::{InstanceRegistry, InstanceSnapshot};
use crate::{ContainerError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default cumulative wait budget for [`LookupService::get`]
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(5000);

/// Retry pacing for lookups
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Growth factor applied after every attempt
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            multiplier: 1.5,
        }
    }
}

impl BackoffPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier)
    }
}

/// Instance selector: a logical container id, or an arbitrary predicate
/// over instance snapshots
#[derive(Clone)]
pub enum LookupFilter<E> {
    /// All instances sharing a logical id, regardless of row scope
    Id(String),
    /// Instances satisfying a caller-supplied predicate
    Predicate(Arc<dyn Fn(&InstanceSnapshot<E>) -> bool + Send + Sync>),
}

impl<E> LookupFilter<E> {
    pub fn id(container_id: impl Into<String>) -> Self {
        Self::Id(container_id.into())
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&InstanceSnapshot<E>) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    pub(crate) fn matches(&self, snapshot: &InstanceSnapshot<E>) -> bool {
        match self {
            LookupFilter::Id(id) => snapshot.identity.container_id == *id,
            LookupFilter::Predicate(predicate) => predicate(snapshot),
        }
    }
}

impl<E> fmt::Debug for LookupFilter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupFilter::Id(id) => f.debug_tuple("Id").field(id).finish(),
            LookupFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// External-facing accessor over the instance registry
pub struct LookupService<E> {
    registry: Arc<InstanceRegistry<E>>,
    backoff: BackoffPolicy,
}

impl<E: Clone + Send + Sync + 'static> LookupService<E> {
    pub fn new(registry: Arc<InstanceRegistry<E>>) -> Self {
        Self {
            registry,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Override the retry pacing (tests, unusually slow hosts)
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Resolve the first instance matching `filter`, waiting for instances
    /// that have not registered yet.
    ///
    /// Retries with exponential backoff until the cumulative elapsed time
    /// exceeds `max_wait`, then fails with
    /// [`ContainerError::LookupTimeout`] carrying the elapsed time.
    pub async fn get(
        &self,
        filter: &LookupFilter<E>,
        max_wait: Duration,
    ) -> Result<InstanceSnapshot<E>> {
        let started = Instant::now();
        let mut delay = self.backoff.initial_delay;

        loop {
            if let Some(hit) = self.registry.find(filter).into_iter().next() {
                return Ok(hit);
            }
            if started.elapsed() >= max_wait {
                return Err(ContainerError::LookupTimeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(delay).await;
            delay = self.backoff.next_delay(delay);
        }
    }

    /// All currently registered instances matching `filter`; never waits.
    /// An empty result is a valid answer for a page that renders no copy of
    /// the container.
    pub fn get_all(&self, filter: &LookupFilter<E>) -> Vec<InstanceSnapshot<E>> {
        self.registry.find(filter)
    }
}
