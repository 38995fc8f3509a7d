//! Rate-limit and quota layer (`§4.3`).
//!
//! Three limiter strategies share one bucket table, keyed by an opaque
//! `kind:id` string (`api:{key}`, `user:{id}`, `ip:{addr}` — `§4.4`). Quota
//! tracking (hourly/daily request+token counters per [`gateway_core::KeyInfo`])
//! lives alongside in [`quota`].

pub mod limiter;
pub mod quota;
pub mod registry;
pub mod route;

pub use limiter::{retry_after, LimitDecision, RateLimitStrategy};
pub use quota::QuotaTracker;
pub use registry::LimiterRegistry;
pub use route::{KeySelector, RouteClass};
