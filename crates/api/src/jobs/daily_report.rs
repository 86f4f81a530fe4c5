//! Daily complaint summary email.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, Timelike};
use domain::services::{Clock, ComplaintLifecycle};

use super::scheduler::{Job, JobFrequency};
use crate::services::EmailService;

/// Checks every minute and mails the statistics once per UTC day, on the
/// first check at or after `report_hour_utc`. A failed send is retried on the
/// next check.
pub struct DailyReportJob {
    lifecycle: ComplaintLifecycle,
    email: EmailService,
    clock: Arc<dyn Clock>,
    report_hour_utc: u32,
    last_sent: Mutex<Option<NaiveDate>>,
}

impl DailyReportJob {
    pub fn new(
        lifecycle: ComplaintLifecycle,
        email: EmailService,
        clock: Arc<dyn Clock>,
        report_hour_utc: u32,
    ) -> Self {
        Self {
            lifecycle,
            email,
            clock,
            report_hour_utc,
            last_sent: Mutex::new(None),
        }
    }

    pub fn last_sent(&self) -> Option<NaiveDate> {
        *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl Job for DailyReportJob {
    fn name(&self) -> &'static str {
        "daily_report"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let now = self.clock.now();
        let today = now.date_naive();
        if now.hour() < self.report_hour_utc || self.last_sent() == Some(today) {
            return Ok(());
        }

        let stats = self
            .lifecycle
            .stats(None)
            .await
            .map_err(|e| format!("Failed to load complaint stats: {}", e))?;
        let sent = self
            .email
            .send_daily_report(today, &stats)
            .await
            .map_err(|e| format!("Failed to send daily report: {}", e))?;

        *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner) = Some(today);
        if sent {
            tracing::info!(day = %today, total = stats.total, "Daily report sent");
        } else {
            tracing::debug!(day = %today, "No daily report recipients configured");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use chrono::{TimeZone, Utc};
    use domain::memory::InMemoryStore;
    use domain::services::{ConnectionRegistry, ManualClock, NotificationEngine};

    fn job(clock: Arc<ManualClock>, provider: &str) -> DailyReportJob {
        let stores = Arc::new(InMemoryStore::new()).stores();
        let notifications = NotificationEngine::new(
            stores.notifications.clone(),
            Arc::new(ConnectionRegistry::new()),
        );
        let lifecycle = ComplaintLifecycle::new(
            stores.complaints.clone(),
            stores.users.clone(),
            stores.comments.clone(),
            notifications,
            clock.clone(),
        );
        let email = EmailService::new(EmailConfig {
            enabled: true,
            provider: provider.to_string(),
            report_recipients: vec!["ops@example.com".into()],
            ..EmailConfig::default()
        });
        DailyReportJob::new(lifecycle, email, clock, 8)
    }

    #[tokio::test]
    async fn test_waits_for_report_hour_then_sends_once() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 7, 59, 0).unwrap(),
        ));
        let job = job(clock.clone(), "console");

        job.execute().await.unwrap();
        assert_eq!(job.last_sent(), None);

        clock.advance(chrono::Duration::minutes(1));
        job.execute().await.unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(job.last_sent(), Some(day));

        // Later checks on the same day do nothing.
        clock.advance(chrono::Duration::hours(3));
        job.execute().await.unwrap();
        assert_eq!(job.last_sent(), Some(day));

        clock.advance(chrono::Duration::hours(21));
        job.execute().await.unwrap();
        assert_eq!(job.last_sent(), day.succ_opt());
    }

    #[tokio::test]
    async fn test_failed_send_is_retried() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
        ));
        // brevo without an API key cannot send
        let job = job(clock, "brevo");
        assert!(job.execute().await.is_err());
        assert_eq!(job.last_sent(), None);
    }
}
