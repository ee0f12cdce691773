use crate::domain::billing::BillingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "kebab-case")]
pub enum SessionType {
    #[default]
    #[serde(rename = "ai-avatar")]
    AiAvatar,
    #[serde(rename = "therapist")]
    Therapist,
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionType::AiAvatar => write!(f, "ai-avatar"),
            SessionType::Therapist => write!(f, "therapist"),
        }
    }
}

/// One completed session, charged against a subscription's credits.
///
/// `plan_minutes + payg_minutes == minutes_used` for every record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct UsageRecord {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub date: DateTime<Utc>,
    pub minutes_used: i32,
    pub session_type: SessionType,
    pub plan_minutes: i32,
    pub payg_minutes: i32,
    pub cost_usd: Decimal,
}

/// Build a ledger entry for a finished session.
///
/// The split between plan and PAYG minutes is filled in by the subscription
/// when the usage is applied.
pub fn record_usage(
    subscription_id: Uuid,
    minutes_used: i32,
    session_type: SessionType,
    timestamp: DateTime<Utc>,
) -> Result<UsageRecord, BillingError> {
    if minutes_used <= 0 {
        return Err(BillingError::InvalidUsage(format!(
            "minutes used must be greater than zero, got {}",
            minutes_used
        )));
    }

    Ok(UsageRecord {
        id: Uuid::new_v4(),
        subscription_id,
        date: timestamp,
        minutes_used,
        session_type,
        plan_minutes: minutes_used,
        payg_minutes: 0,
        cost_usd: Decimal::ZERO,
    })
}

/// Session length billed in whole minutes, rounded up.
pub fn minutes_from_duration_seconds(duration_seconds: i64) -> Result<i32, BillingError> {
    if duration_seconds <= 0 {
        return Err(BillingError::InvalidUsage(
            "session duration must be greater than zero".to_string(),
        ));
    }
    let minutes = (duration_seconds + 59) / 60;
    i32::try_from(minutes)
        .map_err(|_| BillingError::InvalidUsage("session duration too large".to_string()))
}

pub fn sum_minutes(records: &[UsageRecord]) -> i64 {
    records.iter().map(|r| i64::from(r.minutes_used)).sum()
}
