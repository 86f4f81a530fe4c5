//! Background job scheduler and job implementations.

mod daily_report;
mod otp_sweep;
mod pool_metrics;
mod scheduler;

pub use daily_report::DailyReportJob;
pub use otp_sweep::OtpSweepJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
