use super::error::BillingError;
use crate::domain::plan::{catalog::TRIAL_DAYS, get_plan, Plan, PlanId};
use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "trial")]
    Trial,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "expired")]
    Expired,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Trial => write!(f, "trial"),
            SubscriptionStatus::Cancelled => write!(f, "cancelled"),
            SubscriptionStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Half-open window `[start_date, end_date)` over which plan credits are allotted.
///
/// Monthly boundaries are always counted from `anchor_date`, so a cycle that
/// starts on the 31st falls back to the last day of short months without
/// losing its billing day afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct BillingCycle {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub renews_on: Option<DateTime<Utc>>,
    pub anchor_date: DateTime<Utc>,
}

impl BillingCycle {
    pub fn monthly_from(start: DateTime<Utc>) -> Result<Self, BillingError> {
        let end = add_months(start, 1)?;
        Ok(Self {
            start_date: start,
            end_date: end,
            renews_on: Some(end),
            anchor_date: start,
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && at < self.end_date
    }
}

pub(crate) fn add_months(at: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>, BillingError> {
    at.checked_add_months(Months::new(months))
        .ok_or_else(|| BillingError::InvalidTransition("billing cycle out of range".to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    #[sqlx(flatten)]
    pub billing_cycle: BillingCycle,
    pub credits_remaining_minutes: i32,
    pub payg_credits_minutes: i32,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub total_spent_usd: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// A fresh trial: hard-capped allowance, no renewal.
    pub fn new_trial(user_id: Uuid, now: DateTime<Utc>) -> Self {
        let plan = get_plan(PlanId::Trial);
        Self {
            id: Uuid::new_v4(),
            user_id,
            plan_id: PlanId::Trial,
            status: SubscriptionStatus::Trial,
            billing_cycle: BillingCycle {
                start_date: now,
                end_date: now + Duration::days(plan.trial_days.unwrap_or(TRIAL_DAYS)),
                renews_on: None,
                anchor_date: now,
            },
            credits_remaining_minutes: plan.monthly_credits_minutes,
            payg_credits_minutes: 0,
            trial_started_at: Some(now),
            total_spent_usd: Decimal::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// A paid monthly subscription whose first cycle starts at `now`.
    pub fn new_paid(user_id: Uuid, plan_id: PlanId, now: DateTime<Utc>) -> Result<Self, BillingError> {
        let plan = get_plan(plan_id);
        if plan.hard_cap {
            return Err(BillingError::InvalidTransition(format!(
                "the {} plan cannot be purchased",
                plan_id
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            status: SubscriptionStatus::Active,
            billing_cycle: BillingCycle::monthly_from(now)?,
            credits_remaining_minutes: plan.monthly_credits_minutes,
            payg_credits_minutes: 0,
            trial_started_at: None,
            total_spent_usd: plan.price_usd_per_month,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn plan(&self) -> Plan {
        get_plan(self.plan_id)
    }

    /// Trial and active subscriptions can take usage and purchases.
    pub fn is_live(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Trial | SubscriptionStatus::Active
        )
    }

    pub fn total_credits_minutes(&self) -> i32 {
        self.credits_remaining_minutes
            .saturating_add(self.payg_credits_minutes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
pub enum PurchaseStatus {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PaygPurchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub plan_id: PlanId,
    pub minutes_purchased: i32,
    pub rate_per_minute: Decimal,
    pub total_cost_usd: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub status: PurchaseStatus,
}
