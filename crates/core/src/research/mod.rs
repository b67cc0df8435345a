pub mod client;
pub mod rate_limit;
pub mod retry;

pub use client::ResearchClient;
pub use rate_limit::{Permit, Quota, RateLimiter};
pub use retry::RetryPolicy;
