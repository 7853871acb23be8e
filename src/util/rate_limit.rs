//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Inbound frame limiter for a single connection
pub struct ConnectionRateLimiter {
    limiter: Option<Limiter>,
}

impl ConnectionRateLimiter {
    /// A limit of zero disables limiting
    pub fn new(frames_per_second: u32) -> Self {
        let limiter = NonZeroU32::new(frames_per_second)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        Self { limiter }
    }

    /// Check if a frame is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter
            .as_ref()
            .map_or(true, |limiter| limiter.check().is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_disables_limit() {
        let limiter = ConnectionRateLimiter::new(0);
        assert!((0..10_000).all(|_| limiter.check()));
    }

    #[test]
    fn burst_beyond_quota_is_rejected() {
        let limiter = ConnectionRateLimiter::new(5);
        let allowed = (0..50).filter(|_| limiter.check()).count();
        assert!(allowed >= 5);
        assert!(allowed < 50);
    }
}
