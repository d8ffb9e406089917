//! Per-client token-bucket admission control.
//!
//! One [`RateLimiter`] is shared by the whole process and handed to the
//! transport layer explicitly. All state lives in a single map behind one lock,
//! held only for the duration of an admission check or a sweep.
//!
//! ```rust
//! use std::time::Duration;
//! use lucipedia_core::rate_limit::{RateLimiter, RateLimitSettings};
//!
//! let limiter = RateLimiter::new(RateLimitSettings {
//!     burst: 2.0,
//!     refill_per_second: 1.0,
//!     idle_ttl: Duration::from_secs(60),
//! });
//!
//! assert!(limiter.allow("10.0.0.1"));
//! assert!(limiter.allow("10.0.0.1"));
//! assert!(!limiter.allow("10.0.0.1"));
//! assert!(limiter.allow("10.0.0.2"));
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Key used when a caller cannot be identified.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Token-bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    /// Bucket capacity; a new client starts with this many tokens.
    pub burst: f64,
    /// Tokens added per elapsed second.
    pub refill_per_second: f64,
    /// Clients unseen for longer than this are evicted. Zero disables eviction.
    pub idle_ttl: Duration,
}

#[derive(Debug, Clone, Copy)]
struct ClientState {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// Shared token-bucket limiter keyed by client identifier.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    clients: Mutex<HashMap<String, ClientState>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    ///
    /// A negative or NaN refill rate is treated as no refill.
    #[must_use]
    pub fn new(mut settings: RateLimitSettings) -> Self {
        settings.refill_per_second = settings.refill_per_second.max(0.0);
        Self {
            settings,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter parameters.
    #[must_use]
    pub const fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Admit or deny one request from `key` at the current time.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Admit or deny one request from `key` at `now`.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let key = if key.is_empty() { UNKNOWN_CLIENT } else { key };
        let RateLimitSettings {
            burst,
            refill_per_second,
            ..
        } = self.settings;

        let mut clients = self.lock();
        let client = clients.entry(key.to_string()).or_insert(ClientState {
            tokens: burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(client.last_refill);
        if !elapsed.is_zero() {
            client.tokens = elapsed
                .as_secs_f64()
                .mul_add(refill_per_second, client.tokens)
                .min(burst);
            client.last_refill = now;
        }
        client.last_seen = now;

        if client.tokens >= 1.0 {
            client.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Evict clients idle for longer than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Evict clients idle for longer than the TTL as of `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let ttl = self.settings.idle_ttl;
        if ttl.is_zero() {
            return 0;
        }
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, client| now.saturating_duration_since(client.last_seen) <= ttl);
        before - clients.len()
    }

    /// Number of clients currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Run [`RateLimiter::sweep`] every TTL on the current tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the limiter is
    /// dropped. Returns `None` when eviction is disabled.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let ttl = self.settings.idle_ttl;
        if ttl.is_zero() {
            return None;
        }
        let Some(start) = Instant::now().checked_add(ttl) else {
            warn!(idle_ttl_secs = ttl.as_secs(), "idle TTL out of range, eviction disabled");
            return None;
        };
        let weak = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, ttl);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(limiter) = weak.upgrade() else {
                    break;
                };
                let evicted = limiter.sweep();
                if evicted > 0 {
                    debug!(evicted, remaining = limiter.tracked_clients(), "swept idle clients");
                }
            }
        }))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientState>> {
        // The map stays consistent even if a holder panicked mid-check.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Derive the limiter key for an HTTP caller.
///
/// Prefers the first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// connection address. Forwarded headers are caller-controlled, so this is a
/// fairness key, not an identity. Returns an empty string when nothing is
/// known, which [`RateLimiter::allow`] files under [`UNKNOWN_CLIENT`].
#[must_use]
pub fn client_key(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    remote: Option<IpAddr>,
) -> String {
    if let Some(first) = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return first.to_string();
    }
    if let Some(real) = real_ip.map(str::trim).filter(|value| !value.is_empty()) {
        return real.to_string();
    }
    remote.map(|ip| ip.to_string()).unwrap_or_default()
}
