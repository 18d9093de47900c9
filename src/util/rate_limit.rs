//! Per-connection intent rate limiting

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Caps how many client messages one socket may push into the simulation
/// per second. Excess messages are dropped before parsing.
pub struct IntentRateLimiter {
    limiter: Limiter,
}

impl IntentRateLimiter {
    pub fn new(per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// True if one more message is allowed right now
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
