use crate::clock::Clock;
use crate::error::{ErrorKind, StageError};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const WINDOW_SECS: i64 = 60;

/// Provider call caps. Defaults match the free Gemini tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub per_minute: usize,
    pub per_day: u32,
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            per_minute: 15,
            per_day: 1500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    pub used_today: u32,
}

/// Sliding-window limiter over the per-minute cap plus a per-local-day counter.
///
/// The day counter lives in process memory; one process serves one daily run.
pub struct RateLimiter {
    quota: Quota,
    clock: Arc<dyn Clock>,
    state: tokio::sync::Mutex<WindowState>,
}

#[derive(Debug, Default)]
struct WindowState {
    recent: VecDeque<DateTime<FixedOffset>>,
    day: Option<NaiveDate>,
    used_today: u32,
}

impl WindowState {
    fn roll_day(&mut self, today: NaiveDate) {
        if self.day != Some(today) {
            if self.day.is_some() {
                tracing::info!(%today, previous = self.used_today, "local day changed; daily quota reset");
            }
            self.day = Some(today);
            self.used_today = 0;
        }
    }

    fn evict_expired(&mut self, now: DateTime<FixedOffset>) {
        let horizon = now - chrono::Duration::seconds(WINDOW_SECS);
        while self.recent.front().is_some_and(|t| *t <= horizon) {
            self.recent.pop_front();
        }
    }
}

impl RateLimiter {
    pub fn new(quota: Quota, clock: Arc<dyn Clock>) -> Self {
        Self {
            quota,
            clock,
            state: tokio::sync::Mutex::new(WindowState::default()),
        }
    }

    /// Waits for per-minute headroom, then grants a permit and counts it against both caps.
    ///
    /// Fails fast with `QuotaExhausted` once the daily cap is spent.
    pub async fn acquire(&self) -> Result<Permit, StageError> {
        let mut state = self.state.lock().await;
        loop {
            let now = self.clock.now();
            state.roll_day(now.date_naive());

            if state.used_today >= self.quota.per_day {
                return Err(StageError::new(
                    ErrorKind::QuotaExhausted,
                    "rate_limit",
                    format!("daily quota of {} calls exhausted", self.quota.per_day),
                ));
            }

            state.evict_expired(now);
            if state.recent.len() < self.quota.per_minute {
                state.recent.push_back(now);
                state.used_today += 1;
                return Ok(Permit {
                    used_today: state.used_today,
                });
            }

            let Some(oldest) = state.recent.front().copied() else {
                // per_minute == 0 would never grant; treat as exhausted rather than spin.
                return Err(StageError::new(
                    ErrorKind::QuotaExhausted,
                    "rate_limit",
                    "per-minute quota is zero",
                ));
            };
            let wait = (oldest + chrono::Duration::seconds(WINDOW_SECS) - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                in_window = state.recent.len(),
                "per-minute quota reached; waiting"
            );
            self.clock.sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    fn limiter(quota: Quota, clock: &Arc<ManualClock>) -> RateLimiter {
        RateLimiter::new(quota, clock.clone())
    }

    #[tokio::test]
    async fn sixteenth_call_waits_for_window() {
        let clock = Arc::new(ManualClock::at(2026, 10, 19, 9, 0, 0));
        let limiter = limiter(Quota::default(), &clock);

        for _ in 0..15 {
            limiter.acquire().await.unwrap();
        }
        assert!(clock.sleeps().is_empty());

        let permit = limiter.acquire().await.unwrap();
        assert_eq!(permit.used_today, 16);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn never_exceeds_per_minute_cap_in_any_window() {
        let clock = Arc::new(ManualClock::at(2026, 10, 19, 9, 0, 0));
        let limiter = limiter(Quota::default(), &clock);

        let mut grants = Vec::new();
        for i in 0..100 {
            limiter.acquire().await.unwrap();
            grants.push(clock.now());
            // Uneven spacing between callers.
            if i % 7 == 0 {
                clock.advance(Duration::from_secs(3));
            }
        }

        for (i, start) in grants.iter().enumerate() {
            let end = *start + chrono::Duration::seconds(WINDOW_SECS);
            let in_window = grants[i..].iter().take_while(|t| **t < end).count();
            assert!(in_window <= 15, "window starting at {start} held {in_window} grants");
        }
    }

    #[tokio::test]
    async fn daily_cap_fails_without_waiting() {
        let clock = Arc::new(ManualClock::at(2026, 10, 19, 0, 10, 0));
        let limiter = limiter(Quota::default(), &clock);

        for _ in 0..1500 {
            limiter.acquire().await.unwrap();
        }
        let sleeps_before = clock.sleeps().len();
        let started = clock.now();

        let err = limiter.acquire().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::QuotaExhausted);
        assert_eq!(clock.sleeps().len(), sleeps_before);
        assert_eq!(clock.now(), started);
        // Still the same local day after 100 minutes of pacing.
        assert_eq!(clock.now().date_naive(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[tokio::test]
    async fn day_counter_resets_at_local_midnight() {
        let clock = Arc::new(ManualClock::at(2026, 10, 19, 23, 59, 0));
        let limiter = limiter(
            Quota {
                per_minute: 10,
                per_day: 2,
            },
            &clock,
        );

        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert_eq!(
            limiter.acquire().await.unwrap_err().kind,
            ErrorKind::QuotaExhausted
        );

        clock.advance(Duration::from_secs(61));
        let permit = limiter.acquire().await.unwrap();
        assert_eq!(permit.used_today, 1);
    }
}
