//! Periodic gauges for the database pool and live WebSocket connections.

use std::sync::Arc;

use domain::services::ConnectionRegistry;
use metrics::gauge;
use sqlx::PgPool;

use super::scheduler::{Job, JobFrequency};

pub struct PoolMetricsJob {
    pool: PgPool,
    registry: Arc<ConnectionRegistry>,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool, registry: Arc<ConnectionRegistry>) -> Self {
        Self { pool, registry }
    }
}

/// Publishes connection registry sizes.
pub fn record_realtime_metrics(registry: &ConnectionRegistry) {
    gauge!("realtime_connections").set(registry.connection_count() as f64);
    gauge!("realtime_users").set(registry.user_count() as f64);
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(10)
    }

    async fn execute(&self) -> Result<(), String> {
        persistence::metrics::record_pool_metrics(&self.pool);
        record_realtime_metrics(&self.registry);
        Ok(())
    }
}
