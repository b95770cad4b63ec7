//! Daily digest scheduler.
//!
//! Fires the `dailyDigest` trigger once a day at a fixed UTC time by
//! enqueueing it on the background dispatch queue. The timer is the only
//! scheduling concern here; digest content lives in the trigger.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;

use crate::worker::{DispatchJob, DispatchQueue};

/// Fires the daily digest trigger on a fixed UTC schedule.
#[derive(Debug, Clone)]
pub struct DigestScheduler {
    queue: DispatchQueue,
    hour_utc: u32,
    minute_utc: u32,
}

impl DigestScheduler {
    /// Creates a scheduler firing daily at `hour_utc:minute_utc`.
    #[must_use]
    pub fn new(queue: DispatchQueue, hour_utc: u32, minute_utc: u32) -> Self {
        Self {
            queue,
            hour_utc: hour_utc.min(23),
            minute_utc: minute_utc.min(59),
        }
    }

    /// Computes the next firing strictly after `now`.
    #[must_use]
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let fire_time = NaiveTime::from_hms_opt(self.hour_utc, self.minute_utc, 0)
            .unwrap_or(NaiveTime::MIN);
        let today = now.date_naive().and_time(fire_time).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }

    /// Spawns the scheduler loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                hour_utc = self.hour_utc,
                minute_utc = self.minute_utc,
                "Daily digest scheduled"
            );
            loop {
                let now = Utc::now();
                let next = self.next_fire_after(now);
                let wait = (next - now)
                    .to_std()
                    .unwrap_or(std::time::Duration::from_secs(60));
                tokio::time::sleep(wait).await;

                tracing::info!("Running daily digest");
                self.queue.enqueue(DispatchJob {
                    trigger: "dailyDigest".to_string(),
                    payload: serde_json::json!({}),
                    triggered_by: "scheduler".to_string(),
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scheduler(hour: u32, minute: u32) -> DigestScheduler {
        let (queue, _rx) = DispatchQueue::bounded(1);
        DigestScheduler::new(queue, hour, minute)
    }

    #[test]
    fn fires_later_today_when_time_not_yet_reached() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 1, 0, 0).unwrap();
        let next = scheduler(3, 0).next_fire_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 6, 3, 0, 0).unwrap());
    }

    #[test]
    fn fires_tomorrow_when_time_already_passed() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 4, 30, 0).unwrap();
        let next = scheduler(3, 0).next_fire_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 7, 3, 0, 0).unwrap());
    }

    #[test]
    fn firing_instant_itself_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 3, 0, 0).unwrap();
        let next = scheduler(3, 0).next_fire_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 7, 3, 0, 0).unwrap());
    }

    #[test]
    fn out_of_range_times_are_clamped() {
        let s = scheduler(99, 99);
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 0, 0, 0).unwrap();
        let next = s.next_fire_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 6, 23, 59, 0).unwrap());
    }
}
