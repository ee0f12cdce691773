//! Credit policy for a single subscription.
//!
//! Every transition takes the current record and returns the next one; nothing
//! here touches storage. The service layer is responsible for serializing
//! writes per subscription and committing the result together with any ledger
//! or purchase entry.

use super::error::BillingError;
use super::model::{
    add_months, BillingCycle, PaygPurchase, PurchaseStatus, Subscription, SubscriptionStatus,
};
use crate::domain::plan::{can_purchase_payg, get_plan, quote_payg_cost, PlanId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// How a usage event was covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditSplit {
    pub plan_minutes: i32,
    pub payg_minutes: i32,
}

fn ensure_accepts_usage(sub: &Subscription, now: DateTime<Utc>) -> Result<(), BillingError> {
    match sub.status {
        SubscriptionStatus::Trial | SubscriptionStatus::Active => Ok(()),
        // cancelled subscriptions stay usable until the paid-for cycle ends
        SubscriptionStatus::Cancelled if now < sub.billing_cycle.end_date => Ok(()),
        status => Err(BillingError::SubscriptionInactive(status)),
    }
}

fn ensure_live(sub: &Subscription) -> Result<(), BillingError> {
    if sub.is_live() {
        Ok(())
    } else {
        Err(BillingError::SubscriptionInactive(sub.status))
    }
}

/// Deduct `minutes` from plan credits first, then from PAYG credits.
///
/// Fails without touching balances when the combined credits cannot cover the
/// usage.
pub fn apply_usage(
    sub: &Subscription,
    minutes: i32,
    now: DateTime<Utc>,
) -> Result<(Subscription, CreditSplit), BillingError> {
    ensure_accepts_usage(sub, now)?;
    if minutes <= 0 {
        return Err(BillingError::InvalidUsage(format!(
            "minutes used must be greater than zero, got {}",
            minutes
        )));
    }

    let plan_minutes = minutes.min(sub.credits_remaining_minutes.max(0));
    let payg_minutes = minutes - plan_minutes;

    if payg_minutes > sub.payg_credits_minutes {
        return Err(BillingError::InsufficientCredits {
            requested: minutes,
            available: sub.total_credits_minutes(),
        });
    }

    let mut next = sub.clone();
    next.credits_remaining_minutes -= plan_minutes;
    next.payg_credits_minutes -= payg_minutes;
    next.updated_at = now;

    Ok((
        next,
        CreditSplit {
            plan_minutes,
            payg_minutes,
        },
    ))
}

/// Price `minutes` extra minutes at the plan's PAYG rate as a pending purchase.
///
/// Rejects the request up front if the subscription cannot take PAYG minutes
/// or the resulting balance would not fit.
pub fn quote_purchase(
    sub: &Subscription,
    minutes: i32,
    now: DateTime<Utc>,
) -> Result<PaygPurchase, BillingError> {
    ensure_live(sub)?;
    if !can_purchase_payg(sub.plan_id) {
        return Err(BillingError::PaygNotAvailable(sub.plan_id));
    }
    let total_cost_usd = quote_payg_cost(sub.plan_id, minutes)?;
    let rate_per_minute = sub
        .plan()
        .payg_rate_usd_per_minute
        .ok_or(BillingError::PaygNotAvailable(sub.plan_id))?;
    credited_balance(sub, minutes)?;

    Ok(PaygPurchase {
        id: Uuid::new_v4(),
        user_id: sub.user_id,
        subscription_id: sub.id,
        plan_id: sub.plan_id,
        minutes_purchased: minutes,
        rate_per_minute,
        total_cost_usd,
        purchase_date: now,
        status: PurchaseStatus::Pending,
    })
}

/// Resolve a pending purchase with the payment processor's verdict.
///
/// An approved charge is credited even if the subscription stopped being live
/// after the quote. A declined one yields a failed purchase and leaves the
/// balance unchanged.
pub fn settle_purchase(
    sub: &Subscription,
    pending: &PaygPurchase,
    payment_approved: bool,
    now: DateTime<Utc>,
) -> Result<(Subscription, PaygPurchase), BillingError> {
    let mut purchase = pending.clone();
    if !payment_approved {
        purchase.status = PurchaseStatus::Failed;
        return Ok((sub.clone(), purchase));
    }

    let mut next = sub.clone();
    next.payg_credits_minutes = credited_balance(sub, pending.minutes_purchased)?;
    next.total_spent_usd += pending.total_cost_usd;
    next.updated_at = now;
    purchase.status = PurchaseStatus::Completed;

    Ok((next, purchase))
}

fn credited_balance(sub: &Subscription, minutes: i32) -> Result<i32, BillingError> {
    sub.payg_credits_minutes.checked_add(minutes).ok_or_else(|| {
        BillingError::InvalidUsage(format!(
            "buying {} minutes would exceed the maximum pay-as-you-go balance",
            minutes
        ))
    })
}

/// Close out an ended billing cycle.
///
/// Renewing subscriptions get fresh plan credits and the first whole month
/// counted from the cycle anchor that covers `now`. PAYG credits carry over. Anything else that
/// has reached its end date expires. Before the end date this is a no-op.
pub fn rollover_cycle(sub: &Subscription, now: DateTime<Utc>) -> Result<Subscription, BillingError> {
    if now < sub.billing_cycle.end_date {
        return Ok(sub.clone());
    }

    let mut next = sub.clone();
    match (sub.status, sub.billing_cycle.renews_on) {
        (SubscriptionStatus::Expired, _) => return Ok(next),
        (SubscriptionStatus::Active, Some(_)) => {
            let anchor = sub.billing_cycle.anchor_date;
            let mut months = 1;
            let mut end = add_months(anchor, months)?;
            while end <= now {
                months += 1;
                end = add_months(anchor, months)?;
            }
            next.billing_cycle = BillingCycle {
                start_date: add_months(anchor, months - 1)?,
                end_date: end,
                renews_on: Some(end),
                anchor_date: anchor,
            };
            next.credits_remaining_minutes = sub.plan().monthly_credits_minutes;
        }
        _ => {
            next.status = SubscriptionStatus::Expired;
            next.billing_cycle.renews_on = None;
        }
    }
    next.updated_at = now;

    Ok(next)
}

/// Move to another plan mid-cycle.
///
/// Consumed minutes are not refunded: the new plan's allowance is reduced by
/// the plan minutes already used this cycle. Upgrading out of a trial starts a
/// fresh monthly cycle with the full allowance.
pub fn switch_plan(
    sub: &Subscription,
    new_plan_id: PlanId,
    plan_minutes_used_this_cycle: i64,
    now: DateTime<Utc>,
) -> Result<Subscription, BillingError> {
    ensure_live(sub)?;
    if new_plan_id == PlanId::Trial {
        return Err(BillingError::InvalidTransition(
            "cannot switch back to the trial plan".to_string(),
        ));
    }
    if new_plan_id == sub.plan_id {
        return Err(BillingError::InvalidTransition(format!(
            "already on the {} plan",
            new_plan_id
        )));
    }

    let new_plan = get_plan(new_plan_id);
    let mut next = sub.clone();
    next.plan_id = new_plan_id;
    next.updated_at = now;

    if sub.status == SubscriptionStatus::Trial {
        next.status = SubscriptionStatus::Active;
        next.billing_cycle = BillingCycle::monthly_from(now)?;
        next.credits_remaining_minutes = new_plan.monthly_credits_minutes;
    } else {
        let remaining = i64::from(new_plan.monthly_credits_minutes) - plan_minutes_used_this_cycle;
        next.credits_remaining_minutes = remaining.clamp(0, i64::from(new_plan.monthly_credits_minutes)) as i32;
    }

    Ok(next)
}

/// Stop renewal. The subscription stays readable and usable until its cycle ends.
pub fn cancel(sub: &Subscription, now: DateTime<Utc>) -> Result<Subscription, BillingError> {
    ensure_live(sub)?;

    let mut next = sub.clone();
    next.status = SubscriptionStatus::Cancelled;
    next.billing_cycle.renews_on = None;
    next.updated_at = now;

    Ok(next)
}
