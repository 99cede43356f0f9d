//! Refresh-coalescing cache over the aggregation pass.
//!
//! At most one refresh round is in flight at any time. Callers that find
//! the entry stale either start the round or subscribe to the one already
//! running; every subscriber of a round observes that round's outcome. A
//! failed round keeps the previous entry in place.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

use crate::aggregator::StatsProducer;
use crate::error::StatsError;
use crate::metrics::Metrics;
use crate::stats::ProfileStats;

/// What every caller of a refresh round receives.
pub type RoundOutcome = Result<Arc<Vec<ProfileStats>>, Arc<StatsError>>;

struct CacheEntry {
    stats: Arc<Vec<ProfileStats>>,
    refreshed_at: Instant,
}

pub struct StatsCache {
    ttl: Duration,
    producer: Box<dyn StatsProducer>,
    metrics: Arc<Metrics>,
    entry: RwLock<Option<CacheEntry>>,
    /// Coordination slot: `Some` while a round is in flight. Joiners
    /// subscribe to the sender; the slot is cleared before the outcome is
    /// broadcast.
    round: Mutex<Option<broadcast::Sender<RoundOutcome>>>,
}

impl StatsCache {
    pub fn new(ttl: Duration, producer: Box<dyn StatsProducer>, metrics: Arc<Metrics>) -> Self {
        Self {
            ttl,
            producer,
            metrics,
            entry: RwLock::new(None),
            round: Mutex::new(None),
        }
    }

    /// Returns the cached collection if fresh, otherwise the outcome of a
    /// refresh round shared with every other caller of that round.
    pub async fn query(self: &Arc<Self>) -> RoundOutcome {
        self.metrics.queries.fetch_add(1, Ordering::Relaxed);

        if let Some(stats) = self.fresh().await {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(stats);
        }

        let mut round = self.round.lock().await;

        // A round may have completed while we waited for the slot.
        if let Some(stats) = self.fresh().await {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(stats);
        }

        let mut rx = match round.as_ref() {
            Some(tx) => {
                self.metrics.rounds_joined.fetch_add(1, Ordering::Relaxed);
                tx.subscribe()
            }
            None => {
                let (tx, rx) = broadcast::channel(1);
                *round = Some(tx.clone());
                self.metrics.rounds_started.fetch_add(1, Ordering::Relaxed);

                // The round runs as a detached task with no lock held, so
                // readers of fresh data never wait on the external tool and
                // a caller that disappears mid-round cannot abort it for
                // the joiners.
                let cache = Arc::clone(self);
                tokio::spawn(async move {
                    let outcome = cache.refresh().await;
                    *cache.round.lock().await = None;
                    let _ = tx.send(outcome);
                });
                rx
            }
        };
        drop(round);

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(Arc::new(StatsError::RoundAborted(
                "refresh round ended without a result".to_owned(),
            ))),
        }
    }

    /// One aggregation pass. The new entry is installed only on success;
    /// stale data survives a failing round.
    async fn refresh(&self) -> RoundOutcome {
        let outcome = match self.producer.collect().await {
            Ok(stats) => {
                let stats = Arc::new(stats);
                *self.entry.write().await = Some(CacheEntry {
                    stats: stats.clone(),
                    refreshed_at: Instant::now(),
                });
                Ok(stats)
            }
            Err(err) => {
                self.metrics.rounds_failed.fetch_add(1, Ordering::Relaxed);
                warn!(%err, "refresh round failed, keeping previous entry");
                Err(Arc::new(err))
            }
        };
        debug!(metrics = ?self.metrics, "refresh round finished");
        outcome
    }

    async fn fresh(&self) -> Option<Arc<Vec<ProfileStats>>> {
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|e| e.refreshed_at.elapsed() < self.ttl)
            .map(|e| e.stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use async_trait::async_trait;

    use super::*;
    use crate::stats::SnapshotSummary;

    fn record(name: &str) -> ProfileStats {
        crate::stats::reduced(name.to_owned(), SnapshotSummary::default())
    }

    /// Counts collect() calls, sleeps to widen the race window, and fails
    /// while `failing` is set.
    struct FlakyProducer {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl FlakyProducer {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay,
            }
        }
    }

    #[async_trait]
    impl StatsProducer for FlakyProducer {
        async fn collect(&self) -> Result<Vec<ProfileStats>, StatsError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(StatsError::Discovery {
                    root: "/data".into(),
                    source: std::io::Error::other("unreadable"),
                });
            }
            Ok(vec![record(&format!("round-{call}"))])
        }
    }

    fn cache_with(
        ttl: Duration,
        delay: Duration,
    ) -> (Arc<StatsCache>, Arc<FlakyProducer>) {
        let producer = Arc::new(FlakyProducer::new(delay));
        let cache = Arc::new(StatsCache::new(
            ttl,
            Box::new(SharedProducer(producer.clone())),
            Arc::new(Metrics::default()),
        ));
        (cache, producer)
    }

    /// Lets tests keep a handle on the producer the cache owns.
    struct SharedProducer(Arc<FlakyProducer>);

    #[async_trait]
    impl StatsProducer for SharedProducer {
        async fn collect(&self) -> Result<Vec<ProfileStats>, StatsError> {
            self.0.collect().await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stale_queries_share_one_round() {
        let (cache, producer) = cache_with(Duration::from_secs(60), Duration::from_millis(50));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move { cache.query().await }));
        }

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        assert_eq!(producer.calls.load(Ordering::SeqCst), 1);
        for result in &results[1..] {
            assert_eq!(*result, results[0]);
        }
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_recomputation() {
        let (cache, producer) = cache_with(Duration::from_secs(60), Duration::from_millis(1));

        let first = cache.query().await.unwrap();
        let second = cache.query().await.unwrap();

        assert_eq!(producer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expired_entry_starts_a_new_round() {
        let (cache, producer) = cache_with(Duration::from_millis(20), Duration::from_millis(1));

        let first = cache.query().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let second = cache.query().await.unwrap();

        assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
        assert_ne!(first[0].name, second[0].name);
    }

    #[tokio::test]
    async fn failed_round_propagates_but_keeps_the_previous_entry() {
        let (cache, producer) = cache_with(Duration::ZERO, Duration::from_millis(1));

        let good = cache.query().await.unwrap();
        assert_eq!(good[0].name, "round-0");

        producer.failing.store(true, Ordering::SeqCst);
        let err = cache.query().await.unwrap_err();
        assert!(matches!(*err, StatsError::Discovery { .. }));

        // The failing round must not have erased the last good entry.
        let retained = cache.entry.read().await;
        assert_eq!(retained.as_ref().unwrap().stats[0].name, "round-0");
        drop(retained);

        producer.failing.store(false, Ordering::SeqCst);
        let recovered = cache.query().await.unwrap();
        assert_eq!(recovered[0].name, "round-2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn joiners_observe_the_failing_round_error() {
        let (cache, producer) = cache_with(Duration::from_secs(60), Duration::from_millis(50));
        producer.failing.store(true, Ordering::SeqCst);

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move { cache.query().await }));
        }

        for task in tasks {
            assert!(task.await.unwrap().is_err());
        }
        assert_eq!(producer.calls.load(Ordering::SeqCst), 1);
    }
}
