use chrono::{DateTime, FixedOffset, Local};
use std::time::Duration;

/// Source of local wall-clock time plus the ability to wait.
///
/// The pipeline never reads the system clock directly, so rate limiting,
/// backoff and day rollover can be driven deterministically.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Current instant expressed in the operator's local offset.
    fn now(&self) -> DateTime<FixedOffset>;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
