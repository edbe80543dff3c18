use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use attest_core::Did;
use backoff::ExponentialBackoffBuilder;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{AbortRegistration, Abortable, BoxFuture, FutureExt, Shared, WeakShared};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::cache::DocumentCache;
use crate::document::DidDocument;
use crate::error::ResolveError;
use crate::method::{MethodHandler, MethodRegistry};

type Resolution = BoxFuture<'static, Result<Arc<DidDocument>, ResolveError>>;

/// A resolution in progress. The map only holds a weak handle: when the last
/// waiter goes away the fetch is dropped along with its permit.
struct Flight {
    id: u64,
    handle: WeakShared<Resolution>,
}

/// Bounded exponential backoff for transient backend failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(1),
            max_elapsed: Duration::from_secs(5),
        }
    }
}

/// Cache, concurrency and retry settings for [`DidResolver`].
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub cache_ttl: Duration,
    /// How often expired cache entries are swept. Zero disables the sweeper.
    pub purge_interval: Duration,
    /// Concurrent uncached resolutions across all DIDs.
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            purge_interval: Duration::from_secs(60),
            max_in_flight: 64,
            retry: RetryPolicy::default(),
        }
    }
}

/// Counters since the resolver was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    /// Method handler invocations, retries included.
    pub fetches: u64,
    pub cache_hits: u64,
    /// Callers that joined a resolution already in flight.
    pub coalesced: u64,
}

/// Anything that turns a DID into its current document.
#[async_trait]
pub trait DocumentResolver: Send + Sync {
    async fn resolve(&self, did: &Did) -> Result<Arc<DidDocument>, ResolveError>;
}

struct Inner {
    methods: MethodRegistry,
    cache: DocumentCache,
    in_flight: DashMap<Did, Flight>,
    next_flight: AtomicU64,
    permits: Semaphore,
    options: ResolverOptions,
    fetches: AtomicU64,
    cache_hits: AtomicU64,
    coalesced: AtomicU64,
}

impl Inner {
    async fn fetch_and_cache(self: Arc<Self>, did: Did) -> Result<Arc<DidDocument>, ResolveError> {
        // A flight for this DID may have completed between our cache miss and
        // claiming the slot.
        if let Some(document) = self.cache.get(&did) {
            return Ok(document);
        }
        let handler = self.methods.handler(&did.method())?;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ResolveError::Internal("resolver shut down".into()))?;

        let retry = &self.options.retry;
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(retry.initial_interval)
            .with_max_interval(retry.max_interval)
            .with_max_elapsed_time(Some(retry.max_elapsed))
            .build();
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0u32;
        let inner = Arc::clone(&self);
        let document = backoff::future::retry(policy, move || {
            attempt += 1;
            let current = attempt;
            let handler: Arc<dyn MethodHandler> = Arc::clone(&handler);
            let inner = Arc::clone(&inner);
            let did = did.clone();
            async move {
                inner.fetches.fetch_add(1, Ordering::Relaxed);
                match handler.resolve(&did).await {
                    Ok(document) => Ok(document),
                    Err(e) if e.is_transient() && current < max_attempts => {
                        tracing::debug!(did = %did, attempt = current, error = %e, "transient resolution failure, retrying");
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await?;

        tracing::debug!(did = %document.id, version = document.version, "resolved DID document");
        Ok(self.cache.insert(document))
    }
}

/// One caller's interest in a flight. Dropping it, finished or not, releases
/// the caller's strong handle and clears the map slot once nobody is left.
struct Waiter<'a> {
    in_flight: &'a DashMap<Did, Flight>,
    did: &'a Did,
    id: u64,
    flight: Option<Shared<Resolution>>,
    finished: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.flight.take();
        let (id, finished) = (self.id, self.finished);
        self.in_flight.remove_if(self.did, |_, current| {
            current.id == id && (finished || current.handle.upgrade().is_none())
        });
    }
}

/// Resolves DIDs through the method registry, with caching and single-flight.
#[derive(Clone)]
pub struct DidResolver {
    inner: Arc<Inner>,
}

impl DidResolver {
    /// Inside a tokio runtime this also starts the cache sweeper, which stops
    /// once the last clone of the resolver is dropped.
    pub fn new(methods: MethodRegistry, options: ResolverOptions) -> Self {
        let permits = Semaphore::new(options.max_in_flight.max(1));
        let purge_interval = options.purge_interval;
        let resolver = Self {
            inner: Arc::new(Inner {
                methods,
                cache: DocumentCache::new(options.cache_ttl),
                in_flight: DashMap::new(),
                next_flight: AtomicU64::new(0),
                permits,
                options,
                fetches: AtomicU64::new(0),
                cache_hits: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
            }),
        };
        if !purge_interval.is_zero() && tokio::runtime::Handle::try_current().is_ok() {
            resolver.spawn_purge(purge_interval);
        }
        resolver
    }

    /// Periodically evict expired cache entries.
    pub fn spawn_purge(&self, every: Duration) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let purged = inner.cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "evicted expired DID documents");
                }
            }
        })
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.inner.methods
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.inner.cache
    }

    /// Current document of `did`. Concurrent callers for the same DID share one fetch.
    pub async fn resolve(&self, did: &Did) -> Result<Arc<DidDocument>, ResolveError> {
        if let Some(document) = self.inner.cache.get(did) {
            self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(document);
        }

        let (id, flight) = self.join_or_start(did);
        let mut waiter = Waiter {
            in_flight: &self.inner.in_flight,
            did,
            id,
            flight: Some(flight),
            finished: false,
        };
        let result = match waiter.flight.as_mut() {
            Some(flight) => flight.await,
            None => Err(ResolveError::Internal("resolution lost its flight".into())),
        };
        waiter.finished = true;
        drop(waiter);

        if let Err(e) = &result {
            tracing::debug!(did = %did, error = %e, "resolution failed");
        }
        result
    }

    /// Join the live flight for `did`, or start one if none is left.
    fn join_or_start(&self, did: &Did) -> (u64, Shared<Resolution>) {
        match self.inner.in_flight.entry(did.clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(flight) = entry.get().handle.upgrade() {
                    self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                    return (entry.get().id, flight);
                }
                let (id, flight, handle) = self.start(did);
                if let Some(handle) = handle {
                    entry.insert(Flight { id, handle });
                }
                (id, flight)
            }
            Entry::Vacant(entry) => {
                let (id, flight, handle) = self.start(did);
                if let Some(handle) = handle {
                    entry.insert(Flight { id, handle });
                }
                (id, flight)
            }
        }
    }

    fn start(&self, did: &Did) -> (u64, Shared<Resolution>, Option<WeakShared<Resolution>>) {
        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let flight = Arc::clone(&self.inner)
            .fetch_and_cache(did.clone())
            .boxed()
            .shared();
        let handle = flight.downgrade();
        (id, flight, handle)
    }

    /// Resolve, failing with `Timeout` once `timeout` passes.
    pub async fn resolve_with_timeout(
        &self,
        did: &Did,
        timeout: Duration,
    ) -> Result<Arc<DidDocument>, ResolveError> {
        tokio::time::timeout(timeout, self.resolve(did))
            .await
            .map_err(|_| ResolveError::Timeout)?
    }

    /// Resolve until the paired `AbortHandle` fires.
    pub async fn resolve_abortable(
        &self,
        did: &Did,
        registration: AbortRegistration,
    ) -> Result<Arc<DidDocument>, ResolveError> {
        Abortable::new(self.resolve(did), registration)
            .await
            .map_err(|_| ResolveError::Cancelled)?
    }

    /// Forget cached versions so the next resolution goes to the backends.
    pub fn invalidate(&self, did: &Did) {
        self.inner.cache.invalidate(did);
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            fetches: self.inner.fetches.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl DocumentResolver for DidResolver {
    async fn resolve(&self, did: &Did) -> Result<Arc<DidDocument>, ResolveError> {
        DidResolver::resolve(self, did).await
    }
}
