/// Cross-instance coordination over the shared Redis store.
///
/// Request handlers are stateless and may run on any instance, so both
/// the refresh lock and the rate limiter live entirely in Redis. Both
/// fail closed for the refresh entrypoint: an unreachable store
/// rejects the request, because an unguarded duplicate run is a
/// correctness hazard while over-rejection only costs convenience.
pub mod lock;
pub mod rate_limit;

pub use lock::RefreshLock;
pub use rate_limit::{RateLimitDecision, RefreshRateLimiter};
