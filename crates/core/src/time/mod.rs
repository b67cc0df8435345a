use crate::config::Schedule;
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::time::Duration;

/// Run date from an explicit `YYYY-MM-DD` argument, else the local calendar date of `now`.
pub fn resolve_run_date(
    run_date_arg: Option<&str>,
    now: DateTime<FixedOffset>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = run_date_arg {
        return Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?);
    }
    Ok(now.date_naive())
}

/// How long to wait until today's scheduled time, or `None` if it has already passed.
pub fn until_schedule(schedule: Schedule, now: DateTime<FixedOffset>) -> Option<Duration> {
    let target = schedule.at(now.date_naive())?;
    let remaining = target - now.naive_local();
    remaining.to_std().ok().filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kst(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, h, m, 0)
            .unwrap()
    }

    #[test]
    fn explicit_date_wins() {
        let d = resolve_run_date(Some("2026-01-05"), kst(9, 0)).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    }

    #[test]
    fn defaults_to_local_date() {
        // 00:30 KST is still the previous day in UTC; the local date is what counts.
        let d = resolve_run_date(None, kst(0, 30)).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(resolve_run_date(Some("19/10/2026"), kst(9, 0)).is_err());
    }

    #[test]
    fn waits_only_for_future_schedule() {
        let schedule = Schedule { hour: 9, minute: 30 };
        assert_eq!(
            until_schedule(schedule, kst(9, 0)),
            Some(Duration::from_secs(30 * 60))
        );
        assert_eq!(until_schedule(schedule, kst(10, 0)), None);
    }
}
