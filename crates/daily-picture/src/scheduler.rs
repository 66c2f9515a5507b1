//! Once-a-day trigger for the generation run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::generator::ContentGenerator;

/// Time until the next `at` (UTC) strictly after `now`.
pub fn delay_until_next(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        // Days::new(1) cannot overflow for any date a clock will report.
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Spawn the daily loop. Each run uses the default style for that day;
/// failures are logged and the loop waits for the next slot.
pub fn spawn(generator: Arc<ContentGenerator>, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delay = delay_until_next(Utc::now(), at);
            info!(
                at = %at.format("%H:%M"),
                in_secs = delay.as_secs(),
                "Next scheduled generation"
            );
            tokio::time::sleep(delay).await;

            match generator.generate(None, None).await {
                Ok(report) => info!(
                    date = %report.date,
                    title = %report.title,
                    "Scheduled generation succeeded"
                ),
                Err(e) => error!(stage = %e.stage(), "Scheduled generation failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ten() -> NaiveTime {
        NaiveTime::from_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn test_before_slot_waits_same_day() {
        let now = Utc.with_ymd_and_hms(2024, 7, 4, 8, 30, 0).unwrap();
        assert_eq!(delay_until_next(now, ten()), Duration::from_secs(90 * 60));
    }

    #[test]
    fn test_after_slot_waits_until_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 7, 4, 11, 0, 0).unwrap();
        assert_eq!(delay_until_next(now, ten()), Duration::from_secs(23 * 3600));
    }

    #[test]
    fn test_exactly_on_slot_waits_a_full_day() {
        let now = Utc.with_ymd_and_hms(2024, 7, 4, 10, 0, 0).unwrap();
        assert_eq!(delay_until_next(now, ten()), Duration::from_secs(86_400));
    }

    #[test]
    fn test_crosses_month_end() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap();
        assert_eq!(delay_until_next(now, ten()), Duration::from_secs(11 * 3600));
    }
}
