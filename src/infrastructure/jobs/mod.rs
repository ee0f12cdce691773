use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::domain::billing::BillingServiceApi;

/// Periodically persist rollovers and expiries for cycles that have ended.
///
/// Reads already roll over lazily; this keeps stored records from drifting
/// for users who stop calling the API.
pub async fn start_rollover_sweep_job(service: Arc<dyn BillingServiceApi>, every: Duration) {
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        tracing::debug!("Running billing cycle rollover sweep");

        match service.run_rollover_sweep().await {
            Ok(0) => tracing::debug!("Rollover sweep found nothing due"),
            Ok(settled) => tracing::info!(settled = settled, "Rollover sweep completed"),
            Err(e) => tracing::error!(error = %e, "Rollover sweep failed"),
        }
    }
}
