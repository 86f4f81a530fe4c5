//! Background job that drops expired password-reset codes and idle send
//! limiters.

use std::sync::Arc;

use domain::services::OtpStore;

use super::scheduler::{Job, JobFrequency};
use crate::middleware::RateLimiterState;

/// Expired codes are already refused at verification; this keeps abandoned
/// entries from piling up in memory.
pub struct OtpSweepJob {
    otp: Arc<OtpStore>,
    send_limiter: Arc<RateLimiterState<String>>,
}

impl OtpSweepJob {
    pub fn new(otp: Arc<OtpStore>, send_limiter: Arc<RateLimiterState<String>>) -> Self {
        Self { otp, send_limiter }
    }
}

#[async_trait::async_trait]
impl Job for OtpSweepJob {
    fn name(&self) -> &'static str {
        "otp_sweep"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let removed = self.otp.purge_expired();
        if removed > 0 {
            tracing::info!(removed, remaining = self.otp.len(), "Purged expired OTP entries");
        }

        let pruned = self.send_limiter.prune_idle();
        if pruned > 0 {
            tracing::debug!(pruned, remaining = self.send_limiter.len(), "Pruned idle OTP limiters");
        }
        Ok(())
    }
}
