use super::model::{Plan, PlanId};
use crate::domain::billing::BillingError;
use rust_decimal::Decimal;

const TRIAL_CREDITS_MINUTES: i32 = 30;
const CORE_CREDITS_MINUTES: i32 = 200;
const PRO_CREDITS_MINUTES: i32 = 400;
pub const TRIAL_DAYS: i64 = 7;

/// $5 per 25 minutes
fn standard_payg_rate() -> Decimal {
    Decimal::new(20, 2)
}

pub fn get_plan(plan_id: PlanId) -> Plan {
    match plan_id {
        PlanId::Trial => Plan {
            id: PlanId::Trial,
            name: "Trial",
            display_name: "Trial",
            monthly_credits_minutes: TRIAL_CREDITS_MINUTES,
            price_usd_per_month: Decimal::ZERO,
            payg_rate_usd_per_minute: None,
            hard_cap: true,
            trial_days: Some(TRIAL_DAYS),
            allowance_description: format!(
                "{} Total Hard Cap",
                format_minutes(TRIAL_CREDITS_MINUTES)
            ),
        },
        PlanId::Core => Plan {
            id: PlanId::Core,
            name: "Core",
            display_name: "Core (Habit Plan)",
            monthly_credits_minutes: CORE_CREDITS_MINUTES,
            price_usd_per_month: Decimal::new(25, 0),
            payg_rate_usd_per_minute: Some(standard_payg_rate()),
            hard_cap: false,
            trial_days: None,
            allowance_description: format!(
                "{} Resets Monthly",
                format_minutes(CORE_CREDITS_MINUTES)
            ),
        },
        PlanId::Pro => Plan {
            id: PlanId::Pro,
            name: "Pro",
            display_name: "Pro / Clarity",
            monthly_credits_minutes: PRO_CREDITS_MINUTES,
            price_usd_per_month: Decimal::new(49, 0),
            payg_rate_usd_per_minute: Some(standard_payg_rate()),
            hard_cap: false,
            trial_days: None,
            allowance_description: format!(
                "{} Resets Monthly",
                format_minutes(PRO_CREDITS_MINUTES)
            ),
        },
    }
}

pub fn all_plans() -> Vec<Plan> {
    [PlanId::Trial, PlanId::Core, PlanId::Pro]
        .into_iter()
        .map(get_plan)
        .collect()
}

pub fn can_purchase_payg(plan_id: PlanId) -> bool {
    let plan = get_plan(plan_id);
    !plan.hard_cap && plan.payg_rate_usd_per_minute.is_some()
}

/// Price of `minutes` pay-as-you-go minutes on the given plan.
///
/// Plans without a PAYG rate yield `PaygNotAvailable` rather than a zero quote.
pub fn quote_payg_cost(plan_id: PlanId, minutes: i32) -> Result<Decimal, BillingError> {
    if !can_purchase_payg(plan_id) {
        return Err(BillingError::PaygNotAvailable(plan_id));
    }
    if minutes <= 0 {
        return Err(BillingError::InvalidUsage(
            "minutes must be greater than zero".to_string(),
        ));
    }

    let rate = get_plan(plan_id)
        .payg_rate_usd_per_minute
        .ok_or(BillingError::PaygNotAvailable(plan_id))?;

    Ok(rate * Decimal::from(minutes))
}

/// Render an allowance as e.g. `200 Minutes (3.33 Hours)`
pub fn format_minutes(minutes: i32) -> String {
    let hours = (Decimal::from(minutes) / Decimal::from(60))
        .round_dp(2)
        .normalize();
    let unit = if hours <= Decimal::ONE { "Hour" } else { "Hours" };
    format!("{} Minutes ({} {})", minutes, hours, unit)
}
