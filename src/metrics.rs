use std::sync::atomic::AtomicUsize;

#[derive(Default, Debug)]
pub struct Metrics {
    pub queries: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub rounds_joined: AtomicUsize,
    pub rounds_started: AtomicUsize,
    pub rounds_failed: AtomicUsize,

    pub source_invocations: AtomicUsize,
    pub profiles_aggregated: AtomicUsize,
    pub profiles_skipped: AtomicUsize,
}
