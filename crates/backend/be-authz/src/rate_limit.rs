use std::{net::IpAddr, num::NonZeroU32, sync::Arc};

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

pub type AuthFailureRateLimiter =
    Arc<RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>>;

const FAILURES_PER_MINUTE: NonZeroU32 = NonZeroU32::new(50).unwrap();
const FAILURE_BURST: NonZeroU32 = NonZeroU32::new(20).unwrap();

/// Keyed by client IP. One cell is consumed per failed authentication.
pub fn new_auth_failure_rate_limiter() -> AuthFailureRateLimiter {
    Arc::new(RateLimiter::keyed(
        Quota::per_minute(FAILURES_PER_MINUTE).allow_burst(FAILURE_BURST),
    ))
}
