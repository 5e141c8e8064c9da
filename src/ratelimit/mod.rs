//! Sliding window rate limiting logic and state management.

mod backend;
mod clock;
mod history;
mod limiter;

pub use backend::LimiterBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use history::EventHistory;
pub use limiter::SlidingWindowLimiter;
