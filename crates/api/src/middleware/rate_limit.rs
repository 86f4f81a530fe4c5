//! Rate limiting.
//!
//! A keyed set of `governor` limiters. Authenticated routes are limited per
//! user id; OTP sends are limited per email address. Limiters left untouched
//! for a full replenish period are back at full quota and can be dropped
//! with [`RateLimiterState::prune_idle`].

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use std::{
    collections::HashMap,
    hash::Hash,
    num::NonZeroU32,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::{Duration, Instant},
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;

type DirectLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct Entry {
    limiter: Arc<DirectLimiter>,
    last_seen: Mutex<Instant>,
}

impl Entry {
    fn touch(&self, now: Instant) -> Arc<DirectLimiter> {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = now;
        self.limiter.clone()
    }

    fn idle_since(&self) -> Instant {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One limiter per key, created on first use.
pub struct RateLimiterState<K> {
    limiters: RwLock<HashMap<K, Entry>>,
    quota: Quota,
}

impl<K: Hash + Eq + Clone> RateLimiterState<K> {
    /// `limit` requests per minute; zero is treated as one.
    pub fn per_minute(limit: u32) -> Self {
        Self::with_quota(Quota::per_minute(non_zero(limit)))
    }

    /// `limit` requests per hour; zero is treated as one.
    pub fn per_hour(limit: u32) -> Self {
        Self::with_quota(Quota::per_hour(non_zero(limit)))
    }

    fn with_quota(quota: Quota) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            quota,
        }
    }

    fn get_or_create_limiter(&self, key: &K) -> Arc<DirectLimiter> {
        let now = Instant::now();
        {
            let limiters = self.limiters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = limiters.get(key) {
                return entry.touch(now);
            }
        }

        let mut limiters = self.limiters.write().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry(key.clone())
            .or_insert_with(|| Entry {
                limiter: Arc::new(GovRateLimiter::direct(self.quota)),
                last_seen: Mutex::new(now),
            })
            .touch(now)
    }

    /// Time for an exhausted limiter to regain its whole burst.
    fn replenish_period(&self) -> Duration {
        self.quota.replenish_interval() * self.quota.burst_size().get()
    }

    /// Drops limiters unused for a full replenish period. Returns how many
    /// were removed.
    pub fn prune_idle(&self) -> usize {
        self.prune_idle_at(Instant::now())
    }

    fn prune_idle_at(&self, now: Instant) -> usize {
        let period = self.replenish_period();
        let mut limiters = self.limiters.write().unwrap_or_else(PoisonError::into_inner);
        let before = limiters.len();
        limiters.retain(|_, entry| now.saturating_duration_since(entry.idle_since()) < period);
        before - limiters.len()
    }

    /// `Err` carries the retry-after in whole seconds, at least 1.
    pub fn check(&self, key: &K) -> Result<(), u64> {
        let limiter = self.get_or_create_limiter(key);
        limiter.check().map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            wait.as_secs().max(1)
        })
    }

    pub fn len(&self) -> usize {
        self.limiters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> std::fmt::Debug for RateLimiterState<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

fn non_zero(limit: u32) -> NonZeroU32 {
    NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN)
}

/// Per-user limiting for authenticated routes. Must run after
/// `require_user_auth`; requests without auth info pass through.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(req).await;
    };
    let Some(user_id) = req.extensions().get::<UserAuth>().map(|a| a.user_id) else {
        return next.run(req).await;
    };

    if let Err(retry_after_secs) = limiter.check(&user_id) {
        tracing::warn!(user_id, retry_after_secs, "Rate limit exceeded");
        return ApiError::RateLimited { retry_after_secs }.into_response();
    }

    next.run(req).await
}
