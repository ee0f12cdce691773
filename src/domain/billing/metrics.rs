use super::model::{Subscription, SubscriptionStatus};
use crate::domain::plan::catalog::TRIAL_DAYS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const LOW_CREDITS_THRESHOLD_MINUTES: i32 = 10;

/// Share of the plan allowance consumed this cycle, in `[0, 100]`.
pub fn usage_percentage(sub: &Subscription) -> f64 {
    let allowance = sub.plan().monthly_credits_minutes;
    if allowance <= 0 {
        return 0.0;
    }
    let used = f64::from(allowance - sub.credits_remaining_minutes);
    (used / f64::from(allowance) * 100.0).clamp(0.0, 100.0)
}

pub fn should_warn_low_credits(credits_remaining: i32) -> bool {
    credits_remaining > 0 && credits_remaining <= LOW_CREDITS_THRESHOLD_MINUTES
}

pub fn has_credits_remaining(sub: &Subscription) -> bool {
    sub.credits_remaining_minutes > 0 || sub.payg_credits_minutes > 0
}

pub fn remaining_trial_days(trial_started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed_days = now.signed_duration_since(trial_started_at).num_days();
    (TRIAL_DAYS - elapsed_days).clamp(0, TRIAL_DAYS)
}

pub fn is_subscription_active(sub: &Subscription, now: DateTime<Utc>) -> bool {
    sub.status == SubscriptionStatus::Active && now <= sub.billing_cycle.end_date
}

/// Read-side figures rendered next to a subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionMetrics {
    pub usage_percentage: f64,
    pub low_credit_warning: bool,
    pub has_credits_remaining: bool,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_trial_days: Option<i64>,
}

impl SubscriptionMetrics {
    pub fn compute(sub: &Subscription, now: DateTime<Utc>) -> Self {
        let remaining_trial_days = match (sub.status, sub.trial_started_at) {
            (SubscriptionStatus::Trial, Some(started)) => Some(remaining_trial_days(started, now)),
            _ => None,
        };

        Self {
            usage_percentage: usage_percentage(sub),
            low_credit_warning: should_warn_low_credits(sub.credits_remaining_minutes),
            has_credits_remaining: has_credits_remaining(sub),
            is_active: is_subscription_active(sub, now),
            remaining_trial_days,
        }
    }
}
