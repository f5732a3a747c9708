//! Single-slot cache that refreshes itself while serving stale results.
//!
//! A [`RefreshingCache`] holds the result of one lookup. Within the first half
//! of the TTL the result is served as is. During the second half the first
//! caller to notice takes the refresh gate and runs the lookup while everybody
//! else keeps getting the previous result. Once the TTL has fully elapsed the
//! entry is gone and callers wait on the cold lock for a new one.
//!
//! A refresh that fails keeps serving the previous result until that result
//! reaches its eviction deadline; the deadline is never pushed back by a
//! failure.

mod gate;

use std::{fmt, future::Future, sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use tokio::{sync::Mutex, time::Instant};

use gate::RefreshGate;

/// Immutable snapshot of the last lookup
#[derive(Debug)]
struct CacheEntry<T, E> {
    result: Result<T, E>,
    fresh_until: Instant,
    evict_at: Instant,
}

impl<T, E> CacheEntry<T, E> {
    fn new(result: Result<T, E>, now: Instant, ttl: Duration) -> Self {
        Self {
            result,
            fresh_until: now + ttl / 2,
            evict_at: now + ttl,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.fresh_until
    }

    fn is_evicted(&self, now: Instant) -> bool {
        now >= self.evict_at
    }
}

/// Stale-tolerant cache of a single lookup result
///
/// At most one lookup is in flight per cache at any time. Safe to share
/// between tasks; no external locking is needed.
#[derive(Debug)]
pub struct RefreshingCache<T, E> {
    what: &'static str,
    entry: ArcSwapOption<CacheEntry<T, E>>,
    gate: RefreshGate,
    cold: Mutex<()>,
}

impl<T, E> RefreshingCache<T, E>
where
    T: Clone + fmt::Display,
    E: Clone + fmt::Display,
{
    /// Create an empty cache; `what` names the cached resource in log lines
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            entry: ArcSwapOption::empty(),
            gate: RefreshGate::default(),
            cold: Mutex::new(()),
        }
    }

    /// Return the cached result, running `lookup` when the entry is missing or stale
    ///
    /// # Behavior
    /// 1. No live entry: callers queue on the cold lock, the first one runs
    ///    `lookup` and the rest get its result
    /// 2. Fresh entry: returned without running `lookup`
    /// 3. Stale entry: one caller wins the refresh gate and runs `lookup`,
    ///    concurrent callers get the stale result immediately
    /// 4. A failed refresh returns the previous result as long as it has not
    ///    been evicted
    ///
    /// # Arguments
    /// * `ttl` - Total lifetime of a new entry; it is fresh for the first half
    /// * `lookup` - Produces the new result; only called by the caller doing the refresh
    pub async fn get_or_refresh<F, Fut>(&self, ttl: Duration, lookup: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let now = Instant::now();

        if let Some(current) = self.entry.load_full() {
            if current.is_fresh(now) {
                return current.result.clone();
            }
            if !current.is_evicted(now) {
                return self.refresh_stale(current, ttl, lookup).await;
            }
        }

        self.load_cold(ttl, lookup).await
    }

    /// Refresh a stale entry unless somebody else is already doing it
    async fn refresh_stale<F, Fut>(
        &self,
        stale: Arc<CacheEntry<T, E>>,
        ttl: Duration,
        lookup: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(_permit) = self.gate.try_acquire() else {
            return stale.result.clone();
        };

        // The previous holder may have published a new entry before releasing the gate
        let latest = self.entry.load_full();
        if let Some(latest) = latest.as_ref().filter(|entry| entry.is_fresh(Instant::now())) {
            return latest.result.clone();
        }

        self.refresh(latest, ttl, lookup).await
    }

    async fn load_cold<F, Fut>(&self, ttl: Duration, lookup: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _lock = self.cold.lock().await;
        if let Some(result) = self.live_result() {
            return result;
        }

        // A stale refresh may still be running for an entry that has since expired
        let _permit = self.gate.acquire().await;
        if let Some(result) = self.live_result() {
            return result;
        }

        let previous = self.entry.load_full();
        self.refresh(previous, ttl, lookup).await
    }

    fn live_result(&self) -> Option<Result<T, E>> {
        let current = self.entry.load_full()?;
        (!current.is_evicted(Instant::now())).then(|| current.result.clone())
    }

    /// Run `lookup` and publish its outcome; the caller holds the refresh gate
    async fn refresh<F, Fut>(
        &self,
        previous: Option<Arc<CacheEntry<T, E>>>,
        ttl: Duration,
        lookup: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let now = Instant::now();

        let entry = match lookup().await {
            Ok(value) => {
                log::info!("updated {} to {}", self.what, value);
                CacheEntry::new(Ok(value), now, ttl)
            }
            Err(err) => match previous {
                Some(previous) if !previous.is_evicted(now) => {
                    log::warn!(
                        "retaining previously cached {} entry after failure to refresh: {}",
                        self.what,
                        err
                    );
                    return previous.result.clone();
                }
                _ => {
                    log::error!("error loading {}: {}", self.what, err);
                    CacheEntry::new(Err(err), now, ttl)
                }
            },
        };

        let result = entry.result.clone();
        self.entry.store(Some(Arc::new(entry)));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(10);

    type Cache = RefreshingCache<u32, String>;

    async fn populate(cache: &Cache, value: u32) {
        let result = cache.get_or_refresh(TTL, move || async move { Ok(value) }).await;
        assert_eq!(result, Ok(value));
    }

    async fn never_called() -> Result<u32, String> {
        panic!("lookup must not run")
    }

    async fn resolver_bug() -> Result<u32, String> {
        panic!("resolver bug")
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_is_served_without_lookup() {
        let cache = Cache::new("test");
        populate(&cache, 1).await;

        tokio::time::advance(TTL / 2 - Duration::from_millis(1)).await;

        let result = cache.get_or_refresh(TTL, never_called).await;
        assert_eq!(result, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_is_refreshed() {
        let cache = Cache::new("test");
        populate(&cache, 1).await;

        tokio::time::advance(TTL / 2).await;

        let result = cache.get_or_refresh(TTL, || async { Ok(2) }).await;
        assert_eq!(result, Ok(2));

        // the refreshed entry starts a new fresh window
        let result = cache.get_or_refresh(TTL, never_called).await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_retains_previous_value() {
        let cache = Cache::new("test");
        populate(&cache, 1).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        let result = cache
            .get_or_refresh(TTL, || async { Err("dns down".to_string()) })
            .await;
        assert_eq!(result, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_does_not_extend_eviction() {
        let cache = Cache::new("test");
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        populate(&cache, 1).await;

        let failing = move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>("dns down".to_string())
        };

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get_or_refresh(TTL, failing).await, Ok(1));

        // still stale: the failed refresh did not start a new fresh window
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(cache.get_or_refresh(TTL, failing).await, Ok(1));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        // past the original deadline the failure is surfaced
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            cache.get_or_refresh(TTL, failing).await,
            Err("dns down".to_string())
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_failure_is_served_until_refresh_succeeds() {
        let cache = Cache::new("test");

        let result = cache
            .get_or_refresh(TTL, || async { Err("no such host".to_string()) })
            .await;
        assert_eq!(result, Err("no such host".to_string()));

        // the failure is cached like any other result
        let result = cache.get_or_refresh(TTL, never_called).await;
        assert_eq!(result, Err("no such host".to_string()));

        tokio::time::advance(TTL / 2).await;
        let result = cache.get_or_refresh(TTL, || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_entry_is_not_served() {
        let cache = Cache::new("test");
        populate(&cache, 1).await;

        tokio::time::advance(TTL).await;

        let result = cache.get_or_refresh(TTL, || async { Ok(2) }).await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stale_callers_trigger_one_lookup() {
        let cache = Arc::new(Cache::new("test"));
        let lookups = Arc::new(AtomicUsize::new(0));
        populate(&cache, 1).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let lookups = Arc::clone(&lookups);
                tokio::spawn(async move {
                    cache
                        .get_or_refresh(TTL, || async move {
                            lookups.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok(2)
                        })
                        .await
                })
            })
            .collect();

        let mut stale = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(1) => stale += 1,
                Ok(2) => {}
                other => panic!("unexpected result {other:?}"),
            }
        }

        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert_eq!(stale, 49);
        assert_eq!(cache.get_or_refresh(TTL, || async { Ok(3) }).await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cold_callers_share_one_lookup() {
        let cache = Arc::new(Cache::new("test"));
        let lookups = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let lookups = Arc::clone(&lookups);
                tokio::spawn(async move {
                    cache
                        .get_or_refresh(TTL, || async move {
                            lookups.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok(i)
                        })
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|value| *value == results[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_refresh_releases_the_gate() {
        let cache = Arc::new(Cache::new("test"));
        populate(&cache, 1).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        let panicked = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_refresh(TTL, resolver_bug).await }).await
        };
        assert!(panicked.is_err());
        assert!(!cache.gate.is_busy());

        let result = cache.get_or_refresh(TTL, || async { Ok(2) }).await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_concurrent_update_is_skipped() {
        let cache = Cache::new("test");
        populate(&cache, 1).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        let stale = cache.entry.load_full().unwrap();

        // another caller refreshes between our snapshot and taking the gate
        assert_eq!(cache.get_or_refresh(TTL, || async { Ok(2) }).await, Ok(2));

        let result = cache.refresh_stale(stale, TTL, never_called).await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cold_callers_share_one_failure() {
        let cache = Arc::new(Cache::new("test"));
        let lookups = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let lookups = Arc::clone(&lookups);
                tokio::spawn(async move {
                    cache
                        .get_or_refresh(TTL, || async move {
                            lookups.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Err("no such host".to_string())
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err("no such host".to_string()));
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_callers_survive_cancelled_refresher() {
        let cache = Arc::new(Cache::new("test"));
        populate(&cache, 1).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        let refresher = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_refresh(TTL, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(2)
                    })
                    .await
            })
        };

        // let the refresher take the gate
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(cache.gate.is_busy());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_or_refresh(TTL, never_called).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(1));
        }

        refresher.abort();
        assert!(refresher.await.unwrap_err().is_cancelled());
        assert!(!cache.gate.is_busy());

        let result = cache.get_or_refresh(TTL, || async { Ok(3) }).await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_refresh_leaves_entry_untouched() {
        let cache = Cache::new("test");
        populate(&cache, 1).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        let slow = cache.get_or_refresh(TTL, || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(2)
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(100), slow).await;
        assert!(timed_out.is_err());
        assert!(!cache.gate.is_busy());

        let result = cache.get_or_refresh(TTL, || async { Ok(3) }).await;
        assert_eq!(result, Ok(3));
    }
}
