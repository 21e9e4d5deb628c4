//! Expiring in-process cache and the scheduler that sweeps it.
//!
//! A [`Scheduler`] is an ordinary value: the server builds one at startup,
//! hands it to every cache it creates, calls [`Scheduler::start`] once the
//! caches exist and [`Scheduler::stop`] during shutdown.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Something the scheduler sweeps periodically.
pub trait Sweep: Send + Sync {
    /// Drop expired entries, returning how many were removed.
    fn sweep(&self) -> usize;

    /// Name used in logs.
    fn name(&self) -> &str;
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Periodic sweeper for registered caches.
#[derive(Clone)]
pub struct Scheduler {
    interval: Duration,
    jobs: Arc<DashMap<u64, Weak<dyn Sweep>>>,
    next_job: Arc<AtomicU64>,
    running: Arc<Mutex<Option<Running>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Scheduler ticking every `interval`. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            jobs: Arc::new(DashMap::new()),
            next_job: Arc::new(AtomicU64::new(0)),
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a job. The scheduler holds it weakly, so dropping the job unregisters it.
    pub fn register(&self, job: Weak<dyn Sweep>) {
        let key = self.next_job.fetch_add(1, Ordering::Relaxed);
        self.jobs.insert(key, job);
    }

    /// Number of live registered jobs.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.jobs.iter().filter(|job| job.strong_count() > 0).count()
    }

    /// Run every registered job once, pruning dropped ones.
    pub fn run_once(&self) -> usize {
        run_jobs(&self.jobs)
    }

    /// Spawn the ticking task. Starting a running scheduler does nothing.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }

        let (shutdown, mut stopped) = oneshot::channel();
        let jobs = Arc::clone(&self.jobs);
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = run_jobs(&jobs);
                        if removed > 0 {
                            debug!(removed, "cache sweep");
                        }
                    }
                    _ = &mut stopped => break,
                }
            }
        });

        info!(interval_secs = period.as_secs(), "cache scheduler started");
        *running = Some(Running { shutdown, task });
    }

    /// Signal the task and wait for it to finish. Stopping a stopped scheduler does nothing.
    pub async fn stop(&self) {
        let Some(Running { shutdown, task }) = self.running.lock().await.take() else {
            return;
        };
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            warn!(error = %e, "cache scheduler task ended abnormally");
        }
        info!("cache scheduler stopped");
    }

    /// Whether the ticking task is running.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

fn run_jobs(jobs: &DashMap<u64, Weak<dyn Sweep>>) -> usize {
    let mut removed = 0;
    jobs.retain(|_, job| match job.upgrade() {
        Some(job) => {
            let count = job.sweep();
            if count > 0 {
                debug!(cache = job.name(), removed = count, "expired entries dropped");
            }
            removed += count;
            true
        }
        None => false,
    });
    removed
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored, expired or not.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing live.
    pub misses: u64,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<K, V> {
    name: String,
    ttl: Duration,
    entries: DashMap<K, Entry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> Sweep for Inner<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Send + Sync,
{
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Key-value cache whose entries expire after a fixed time to live.
pub struct TtlCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Cache registered with `scheduler` for periodic sweeping.
    #[must_use]
    pub fn new(name: &str, ttl: Duration, scheduler: &Scheduler) -> Self {
        let inner = Arc::new(Inner {
            name: name.to_string(),
            ttl,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        });
        let job: Arc<dyn Sweep> = inner.clone();
        scheduler.register(Arc::downgrade(&job));
        Self { inner }
    }

    /// The live value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self
            .inner
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone());
        let counter = if value.is_some() {
            &self.inner.hits
        } else {
            &self.inner.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Store `value`, replacing any previous entry and restarting its lifetime.
    pub fn insert(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.inner.ttl;
        self.inner.entries.insert(key, Entry { value, expires_at });
    }

    /// Forget `key`.
    pub fn invalidate(&self, key: &K) {
        self.inner.entries.remove(key);
    }

    /// Drop expired entries now.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.entries.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scheduler() -> Scheduler {
        Scheduler::new(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let scheduler = scheduler();
        let cache: TtlCache<String, u32> = TtlCache::new("test", Duration::from_secs(10), &scheduler);

        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get(&"a".to_string()), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate() {
        let scheduler = scheduler();
        let cache: TtlCache<u8, u8> = TtlCache::new("test", Duration::from_secs(10), &scheduler);
        cache.insert(1, 1);
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_sweeps_registered_caches() {
        let scheduler = Scheduler::new(Duration::from_secs(5));
        let cache: TtlCache<u8, u8> = TtlCache::new("test", Duration::from_secs(1), &scheduler);
        cache.insert(1, 1);
        cache.insert(2, 2);

        scheduler.start().await;
        assert!(scheduler.is_running().await);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.stats().entries, 0);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn test_dropped_cache_is_unregistered() {
        let scheduler = scheduler();
        let cache: TtlCache<u8, u8> = TtlCache::new("test", Duration::from_secs(1), &scheduler);
        assert_eq!(scheduler.job_count(), 1);
        drop(cache);
        assert_eq!(scheduler.job_count(), 0);
        assert_eq!(scheduler.run_once(), 0);
        assert!(scheduler.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let scheduler = scheduler();
        scheduler.stop().await;
        scheduler.start().await;
        scheduler.start().await;
        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
    }
}
