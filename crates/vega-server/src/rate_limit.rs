//! Sliding-window admission control keyed by `"{team}:{route}"`.
//!
//! The table lives in process memory: it is created at start-up, cleared on
//! shutdown and never shared between instances, so with N instances the
//! effective ceiling is N times the configured one.

use crate::api::error_response;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use vega_common::tenant::TeamId;

/// Expired keys are swept at most this often.
pub const SWEEP_INTERVAL_MS: u64 = 5 * 60 * 1000;

pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Millisecond time source.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Milliseconds until the oldest recorded hit leaves the window. Zero
    /// when allowed.
    pub retry_after_ms: u64,
}

/// Backing table for the limiter. One call of [`check_and_record`] is one
/// atomic prune-compare-record step for its key.
///
/// [`check_and_record`]: RateLimitStore::check_and_record
pub trait RateLimitStore: Send + Sync {
    fn check_and_record(&self, key: &str, now_ms: u64, max: u32, window_ms: u64) -> RateDecision;

    /// Drops keys with no hit newer than `max_age_ms`. Returns `None` instead
    /// of waiting when the table is busy.
    fn try_sweep(&self, now_ms: u64, max_age_ms: u64) -> Option<usize>;

    fn clear(&self);

    fn key_count(&self) -> usize;
}

#[derive(Default)]
pub struct InMemoryRateLimitStore {
    entries: Mutex<HashMap<String, VecDeque<u64>>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<u64>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drops hits that are `window_ms` or more in the past.
fn prune(hits: &mut VecDeque<u64>, now_ms: u64, window_ms: u64) {
    while hits
        .front()
        .is_some_and(|&t| now_ms.saturating_sub(t) >= window_ms)
    {
        hits.pop_front();
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn check_and_record(&self, key: &str, now_ms: u64, max: u32, window_ms: u64) -> RateDecision {
        let mut entries = self.lock();
        let hits = entries.entry(key.to_string()).or_default();
        prune(hits, now_ms, window_ms);

        let used = u32::try_from(hits.len()).unwrap_or(u32::MAX);
        if used >= max {
            let retry_after_ms = hits
                .front()
                .map(|&oldest| (oldest + window_ms).saturating_sub(now_ms))
                .unwrap_or(window_ms);
            return RateDecision {
                allowed: false,
                remaining: 0,
                retry_after_ms,
            };
        }

        hits.push_back(now_ms);
        RateDecision {
            allowed: true,
            remaining: max - used - 1,
            retry_after_ms: 0,
        }
    }

    fn try_sweep(&self, now_ms: u64, max_age_ms: u64) -> Option<usize> {
        let mut entries = match self.entries.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return None,
        };
        let before = entries.len();
        entries.retain(|_, hits| {
            prune(hits, now_ms, max_age_ms);
            !hits.is_empty()
        });
        Some(before - entries.len())
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn key_count(&self) -> usize {
        self.lock().len()
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    last_sweep_ms: AtomicU64,
    /// Longest window seen so far; a key idle for this long is expired
    /// whatever window it was checked with.
    max_window_ms: AtomicU64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            store,
            clock,
            last_sweep_ms: AtomicU64::new(now),
            max_window_ms: AtomicU64::new(DEFAULT_WINDOW_MS),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), Arc::new(SystemClock))
    }

    /// Admits or denies one request for `key`. A denied attempt is not
    /// recorded.
    pub fn check(&self, key: &str, max: u32, window_ms: u64) -> RateDecision {
        let now = self.clock.now_ms();
        self.max_window_ms.fetch_max(window_ms, Ordering::Relaxed);
        let decision = self.store.check_and_record(key, now, max, window_ms);
        self.maybe_sweep(now);
        decision
    }

    fn maybe_sweep(&self, now: u64) {
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < SWEEP_INTERVAL_MS {
            return;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let max_age = self.max_window_ms.load(Ordering::Relaxed);
        if let Some(removed) = self.store.try_sweep(now, max_age) {
            if removed > 0 {
                tracing::debug!(removed, "Swept expired rate-limit keys");
            }
        }
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn key_count(&self) -> usize {
        self.store.key_count()
    }
}

/// Route middleware. Must run after the team has been resolved.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let settings = &state.config.rate_limit;
    if !settings.enabled {
        return next.run(req).await;
    }

    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let team = req
        .extensions()
        .get::<TeamId>()
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let key = format!("{team}:{route}");
    let max = settings.max_for(&route);

    let decision = state.limiter.check(&key, max, settings.window_ms);
    if !decision.allowed {
        let trace_id = req
            .extensions()
            .get::<TraceId>()
            .map(|t| t.0.clone())
            .unwrap_or_default();
        tracing::warn!(
            trace_id = %trace_id,
            key = %key,
            max,
            retry_after_ms = decision.retry_after_ms,
            "Request rate limited"
        );
        let mut response = error_response(
            StatusCode::TOO_MANY_REQUESTS,
            &trace_id,
            "rate_limited",
            "too many requests, try again later",
        );
        let retry_after_secs = decision.retry_after_ms.div_ceil(1000).max(1);
        if let Ok(val) = HeaderValue::from_str(&retry_after_secs.to_string()) {
            response.headers_mut().insert("retry-after", val);
        }
        return response;
    }

    let mut response = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&decision.remaining.to_string()) {
        response.headers_mut().insert("x-ratelimit-remaining", val);
    }
    response
}
