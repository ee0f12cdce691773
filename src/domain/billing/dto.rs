use super::error::BillingError;
use super::metrics::SubscriptionMetrics;
use super::model::{PaygPurchase, Subscription};
use super::service::{RecordUsageCommand, UsageInCycle};
use crate::domain::plan::{format_minutes, Plan, PlanId};
use crate::domain::usage::{minutes_from_duration_seconds, SessionType, UsageRecord};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request body for POST /api/users/:user_id/subscription
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub plan_id: String,
}

/// Request body for POST /api/users/:user_id/subscription/plan
#[derive(Debug, Serialize, Deserialize)]
pub struct SwitchPlanRequest {
    pub plan_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchasePaygRequest {
    pub minutes: i32,
}

/// A finished session. Give either whole `minutes` or the raw
/// `duration_seconds`, which is rounded up to the next minute.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordUsageRequest {
    pub minutes: Option<i32>,
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub session_type: SessionType,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RecordUsageRequest {
    pub fn into_command(self) -> Result<RecordUsageCommand, BillingError> {
        let minutes = match (self.minutes, self.duration_seconds) {
            (Some(minutes), None) => minutes,
            (None, Some(seconds)) => minutes_from_duration_seconds(seconds)?,
            _ => {
                return Err(BillingError::InvalidUsage(
                    "provide exactly one of minutes or duration_seconds".to_string(),
                ))
            }
        };

        Ok(RecordUsageCommand {
            minutes,
            session_type: self.session_type,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaygQuoteQuery {
    pub minutes: i32,
}

/// A subscription with its plan terms and derived usage figures
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub subscription: Subscription,
    pub plan: Plan,
    pub metrics: SubscriptionMetrics,
    pub credits_display: String,
}

impl SubscriptionResponse {
    pub fn build(subscription: Subscription, now: DateTime<Utc>) -> Self {
        let metrics = SubscriptionMetrics::compute(&subscription, now);
        Self {
            plan: subscription.plan(),
            credits_display: format_minutes(subscription.credits_remaining_minutes),
            metrics,
            subscription,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordUsageResponse {
    pub record: UsageRecord,
    pub subscription: SubscriptionResponse,
}

/// Response for GET /api/users/:user_id/usage
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub cycle_start: DateTime<Utc>,
    pub cycle_end: DateTime<Utc>,
    pub total_minutes: i64,
    pub records: Vec<UsageRecord>,
}

impl From<UsageInCycle> for UsageResponse {
    fn from(usage: UsageInCycle) -> Self {
        Self {
            cycle_start: usage.billing_cycle.start_date,
            cycle_end: usage.billing_cycle.end_date,
            total_minutes: usage.total_minutes,
            records: usage.records,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaygPurchaseResponse {
    pub purchase: PaygPurchase,
    pub subscription: SubscriptionResponse,
}

#[derive(Debug, Serialize)]
pub struct PaygQuoteResponse {
    pub plan_id: PlanId,
    pub minutes: i32,
    pub rate_per_minute: Decimal,
    pub total_cost_usd: Decimal,
}
