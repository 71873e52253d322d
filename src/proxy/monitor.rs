use crate::constants::STATS_LOG_INTERVAL_SECS;
use crate::proxy::classifier::RequestClass;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

// Process-wide request counters. Everything is atomic; there is no lock on
// the request path.
pub struct ProxyMonitor {
    started_at: Instant,
    total_requests: AtomicU64,
    cached_responses: AtomicU64,
    error_responses: AtomicU64,
    title_requests: AtomicU64,
    topic_requests: AtomicU64,
    warmup_requests: AtomicU64,
    tools_requests: AtomicU64,
    normal_requests: AtomicU64,
    // Requests observed since the last periodic stats line.
    window_requests: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub cached_responses: u64,
    pub error_responses: u64,
    pub by_classification: ClassificationCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationCounts {
    pub title: u64,
    pub topic: u64,
    pub warmup: u64,
    pub tools: u64,
    pub normal: u64,
}

impl ProxyMonitor {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            cached_responses: AtomicU64::new(0),
            error_responses: AtomicU64::new(0),
            title_requests: AtomicU64::new(0),
            topic_requests: AtomicU64::new(0),
            warmup_requests: AtomicU64::new(0),
            tools_requests: AtomicU64::new(0),
            normal_requests: AtomicU64::new(0),
            window_requests: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, class: RequestClass) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.window_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match class {
            RequestClass::Title => &self.title_requests,
            RequestClass::Topic => &self.topic_requests,
            RequestClass::Warmup => &self.warmup_requests,
            RequestClass::Tools => &self.tools_requests,
            RequestClass::Normal => &self.normal_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cached_response(&self) {
        self.cached_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime_secs(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cached_responses: self.cached_responses.load(Ordering::Relaxed),
            error_responses: self.error_responses.load(Ordering::Relaxed),
            by_classification: ClassificationCounts {
                title: self.title_requests.load(Ordering::Relaxed),
                topic: self.topic_requests.load(Ordering::Relaxed),
                warmup: self.warmup_requests.load(Ordering::Relaxed),
                tools: self.tools_requests.load(Ordering::Relaxed),
                normal: self.normal_requests.load(Ordering::Relaxed),
            },
        }
    }

    fn take_window(&self) -> u64 {
        self.window_requests.swap(0, Ordering::Relaxed)
    }
}

impl Default for ProxyMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// Logs one stats line per interval, but only while traffic is flowing.
pub fn spawn_stats_logger(monitor: Arc<ProxyMonitor>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(STATS_LOG_INTERVAL_SECS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let window = monitor.take_window();
            if window == 0 {
                continue;
            }
            let snapshot = monitor.snapshot();
            tracing::info!(
                "[Stats] window={} total={} cached={} errors={} (title={} topic={} warmup={} tools={} normal={})",
                window,
                snapshot.total_requests,
                snapshot.cached_responses,
                snapshot.error_responses,
                snapshot.by_classification.title,
                snapshot.by_classification.topic,
                snapshot.by_classification.warmup,
                snapshot.by_classification.tools,
                snapshot.by_classification.normal,
            );
        }
    })
}
