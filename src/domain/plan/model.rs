use crate::domain::billing::BillingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
pub enum PlanId {
    #[serde(rename = "trial")]
    Trial,
    #[serde(rename = "core")]
    Core,
    #[serde(rename = "pro")]
    Pro,
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanId::Trial => write!(f, "trial"),
            PlanId::Core => write!(f, "core"),
            PlanId::Pro => write!(f, "pro"),
        }
    }
}

impl FromStr for PlanId {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(PlanId::Trial),
            "core" => Ok(PlanId::Core),
            "pro" => Ok(PlanId::Pro),
            other => Err(BillingError::UnknownPlan(other.to_string())),
        }
    }
}

/// Terms of a plan tier. Catalog-defined and never mutated at runtime.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Plan {
    pub id: PlanId,
    pub name: &'static str,
    pub display_name: &'static str,
    pub monthly_credits_minutes: i32,
    pub price_usd_per_month: Decimal,
    pub payg_rate_usd_per_minute: Option<Decimal>,
    pub hard_cap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_days: Option<i64>,
    pub allowance_description: String,
}

impl Plan {
    pub fn is_paid(&self) -> bool {
        self.price_usd_per_month > Decimal::ZERO
    }
}
