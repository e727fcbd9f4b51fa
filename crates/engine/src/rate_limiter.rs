//! Process-wide rate limiting for trade attempts.
//!
//! One token-bucket limiter caps aggregate trade operations across all
//! tokens. Every trade attempt spends exactly one unit of the shared bucket,
//! so a window with capacity K grants K trades across however many tokens
//! are due; a token's configured per-minute share is a tag carried for
//! logging and operator intent, never a consumption weight. Acquisition is
//! non-blocking: a denied tick records `rate_limited` and retries on its
//! next cycle, so tokens queue by arrival order rather than by configured
//! priority and a newly activated token cannot starve the rest.

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

type GovernorLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Shared, cloneable gate over all trade attempts.
#[derive(Clone)]
pub struct TradeRateLimiter {
    limiter: Arc<GovernorLimiter>,
    per_minute: NonZeroU32,
}

impl TradeRateLimiter {
    /// Creates a limiter with a global ceiling of `per_minute` operations,
    /// refilled continuously.
    #[must_use]
    pub fn new(per_minute: NonZeroU32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            per_minute,
        }
    }

    /// Builds the limiter from a configured ops/minute value, flooring at 1.
    #[must_use]
    pub fn from_config(per_minute: u32) -> Self {
        Self::new(NonZeroU32::new(per_minute).unwrap_or(nonzero!(1u32)))
    }

    /// Attempts to take one unit of capacity without blocking.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    #[must_use]
    pub const fn per_minute(&self) -> NonZeroU32 {
        self.per_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_cap_bounds_a_burst_of_due_tokens() {
        // K = 5 capacity, M = 12 tokens due in the same window.
        let limiter = TradeRateLimiter::new(nonzero!(5u32));
        let granted = (0..12).filter(|_| limiter.try_acquire()).count();
        assert_eq!(granted, 5);
    }

    #[test]
    fn denial_is_immediate_and_does_not_consume_capacity() {
        let limiter = TradeRateLimiter::new(nonzero!(2u32));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn from_config_floors_zero_to_one() {
        let limiter = TradeRateLimiter::from_config(0);
        assert_eq!(limiter.per_minute().get(), 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }
}
