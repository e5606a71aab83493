//! Rate-limited mapping reads.
//!
//! Every chain read funnels through one dispatch gate honoring the
//! gateway's rate ceiling: at most `max_concurrent_reads` in flight and a
//! minimum spacing between dispatches. Identical concurrent reads of one
//! `(program, mapping, key)` coalesce onto a single network call. Mapping
//! reads degrade softly — timeouts, transport failures, and absent keys all
//! surface as `None`, because an absent mapping key is an expected outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OnceCell, Semaphore};
use tokio::time::Instant;

use crate::chain::{ChainReader, ChainTransaction};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MappingKey {
    program: String,
    mapping: String,
    key: String,
}

impl std::fmt::Display for MappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}[{}]", self.program, self.mapping, self.key)
    }
}

struct Inner {
    reader: Arc<dyn ChainReader>,
    permits: Semaphore,
    /// Earliest instant the next dispatch may leave. Held (and slept on)
    /// across the wait so dispatches stay strictly spaced.
    next_dispatch: AsyncMutex<Instant>,
    min_interval: Duration,
    read_timeout: Duration,
    in_flight: Mutex<HashMap<MappingKey, Arc<OnceCell<Option<String>>>>>,
}

/// Throttled, coalescing reader for on-chain scalar mappings.
///
/// Cheap to clone; clones share the dispatch gate and in-flight table.
#[derive(Clone)]
pub struct MappingClient {
    inner: Arc<Inner>,
}

impl MappingClient {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        max_concurrent: usize,
        min_interval: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                reader,
                permits: Semaphore::new(max_concurrent.max(1)),
                next_dispatch: AsyncMutex::new(Instant::now()),
                min_interval,
                read_timeout,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn from_config(reader: Arc<dyn ChainReader>, config: &ClientConfig) -> Self {
        Self::new(
            reader,
            config.max_concurrent_reads,
            config.min_dispatch_interval,
            config.read_timeout,
        )
    }

    /// Read one mapping value. Soft failure: `None` covers absent keys,
    /// timeouts, and transport errors alike.
    pub async fn value(&self, program: &str, mapping: &str, key: &str) -> Option<String> {
        let map_key = MappingKey {
            program: program.to_string(),
            mapping: mapping.to_string(),
            key: key.to_string(),
        };

        let cell = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            in_flight
                .entry(map_key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell.get_or_init(|| self.fetch(&map_key)).await.clone();

        // Retire the slot so a later read hits the chain again. Only remove
        // the cell we joined; a fresh read may already have replaced it.
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(current) = in_flight.get(&map_key)
            && Arc::ptr_eq(current, &cell)
        {
            in_flight.remove(&map_key);
        }

        result
    }

    async fn fetch(&self, key: &MappingKey) -> Option<String> {
        let _permit = self.pace().await;
        let read = self
            .inner
            .reader
            .mapping_value(&key.program, &key.mapping, &key.key);
        match tokio::time::timeout(self.inner.read_timeout, read).await {
            Err(_) => {
                log::warn!(
                    "mapping read {key} timed out after {:?}; treating as absent",
                    self.inner.read_timeout
                );
                None
            }
            Ok(Err(e)) => {
                log::warn!("mapping read {key} failed ({e}); treating as absent");
                None
            }
            Ok(Ok(value)) => value,
        }
    }

    /// Paged transition-log read through the same dispatch gate.
    ///
    /// Unlike mapping reads this propagates failure: the discovery fallback
    /// retries with backoff instead of treating errors as empty pages.
    pub async fn transitions_page(
        &self,
        program: &str,
        function: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ChainTransaction>> {
        let _permit = self.pace().await;
        let read = self
            .inner
            .reader
            .program_transitions(program, function, page, page_size);
        match tokio::time::timeout(self.inner.read_timeout, read).await {
            Err(_) => Err(Error::NetworkTimeout(self.inner.read_timeout)),
            Ok(result) => result,
        }
    }

    /// Fetch one transaction through the dispatch gate.
    pub async fn transaction(&self, id: &str) -> Result<Option<ChainTransaction>> {
        let _permit = self.pace().await;
        let read = self.inner.reader.transaction(id);
        match tokio::time::timeout(self.inner.read_timeout, read).await {
            Err(_) => Err(Error::NetworkTimeout(self.inner.read_timeout)),
            Ok(result) => result,
        }
    }

    /// Wait for a dispatch slot: a concurrency permit, then the minimum
    /// spacing since the previous dispatch. The returned permit must stay
    /// alive for the duration of the read so in-flight reads stay bounded.
    async fn pace(&self) -> tokio::sync::SemaphorePermit<'_> {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = self
            .inner
            .permits
            .acquire()
            .await
            .expect("dispatch semaphore closed");

        let mut next = self.inner.next_dispatch.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep_until(*next).await;
        }
        *next = Instant::now() + self.inner.min_interval;

        permit
    }
}
