//! Token-bucket admission control.
//!
//! Either one global bucket gates all traffic, or every client IP gets its own
//! bucket. Idle client buckets are swept by a background task.

mod client_ip;

pub use client_ip::client_ip;

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Bucket = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct ClientBucket {
    bucket: Bucket,
    last_seen: Instant,
}

enum Mode {
    Disabled,
    Global(Bucket),
    PerClient(DashMap<String, ClientBucket>),
}

/// Admission gate shared by every HTTP route.
pub struct RateLimiter {
    mode: Mode,
    quota: Quota,
    cleanup_interval: Duration,
    cancel: CancellationToken,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let quota = build_quota(config.rps, config.burst);
        let mode = if !config.enabled {
            Mode::Disabled
        } else if config.per_client {
            Mode::PerClient(DashMap::new())
        } else {
            Mode::Global(Bucket::direct(quota))
        };

        Self {
            mode,
            quota,
            cleanup_interval: Duration::from_secs(config.cleanup_interval_seconds.max(1)),
            cancel: CancellationToken::new(),
        }
    }

    /// A limiter that admits everything.
    pub fn disabled() -> Self {
        Self::new(&RateLimitConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Take one token for `client_id`. Returns false when the bucket is empty.
    pub fn allow(&self, client_id: &str) -> bool {
        match &self.mode {
            Mode::Disabled => true,
            Mode::Global(bucket) => bucket.check().is_ok(),
            Mode::PerClient(clients) => {
                let mut entry = clients
                    .entry(client_id.to_string())
                    .or_insert_with(|| ClientBucket {
                        bucket: Bucket::direct(self.quota),
                        last_seen: Instant::now(),
                    });
                entry.last_seen = Instant::now();
                entry.bucket.check().is_ok()
            }
        }
    }

    /// Number of tracked client buckets (zero outside per-client mode).
    pub fn tracked_clients(&self) -> usize {
        match &self.mode {
            Mode::PerClient(clients) => clients.len(),
            _ => 0,
        }
    }

    /// Drop client buckets idle for longer than `max_idle`. Returns how many were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let Mode::PerClient(clients) = &self.mode else {
            return 0;
        };
        let before = clients.len();
        clients.retain(|_, client| client.last_seen.elapsed() <= max_idle);
        before.saturating_sub(clients.len())
    }

    /// Spawn the periodic sweep. Buckets unseen for two intervals are evicted.
    pub fn start_cleanup(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !matches!(self.mode, Mode::PerClient(_)) {
            return None;
        }

        let limiter = Arc::clone(self);
        let cancel = self.cancel.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(limiter.cleanup_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Rate limiter cleanup stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = limiter.evict_idle(limiter.cleanup_interval * 2);
                        if removed > 0 {
                            tracing::debug!(removed, remaining = limiter.tracked_clients(), "Evicted idle rate-limit buckets");
                        }
                    }
                }
            }
        }))
    }

    /// Signal the cleanup task to exit.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

fn build_quota(rps: f64, burst: u32) -> Quota {
    let period = if rps > 0.0 {
        Duration::try_from_secs_f64(1.0 / rps).unwrap_or(Duration::from_secs(3600))
    } else {
        Duration::from_secs(1)
    };
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(period.max(Duration::from_nanos(1)))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}
