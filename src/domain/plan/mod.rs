pub mod catalog;
pub mod model;

pub use catalog::{all_plans, can_purchase_payg, format_minutes, get_plan, quote_payg_cost};
pub use model::{Plan, PlanId};
