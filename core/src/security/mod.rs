pub mod events;
pub mod rate_limit;

pub use events::{SecurityEventSink, SecurityLog};
pub use rate_limit::{RateLimitDecision, RateLimiter};

/// Action key used for login attempts.
pub const LOGIN_ACTION: &str = "login";
