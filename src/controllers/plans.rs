use axum::{
    extract::{Path, Query},
    Json,
};

use crate::domain::billing::{PaygQuoteQuery, PaygQuoteResponse};
use crate::domain::plan::{all_plans, get_plan, quote_payg_cost, Plan, PlanId};
use crate::error::AppResult;

/// GET /api/plans - The plan catalog
pub async fn list_plans() -> Json<Vec<Plan>> {
    Json(all_plans())
}

/// GET /api/plans/:plan_id/payg-quote?minutes=N
pub async fn payg_quote(
    Path(plan_id): Path<String>,
    Query(query): Query<PaygQuoteQuery>,
) -> AppResult<Json<PaygQuoteResponse>> {
    let plan_id: PlanId = plan_id.parse()?;
    let total_cost_usd = quote_payg_cost(plan_id, query.minutes)?;
    let rate_per_minute = get_plan(plan_id)
        .payg_rate_usd_per_minute
        .unwrap_or_default();

    Ok(Json(PaygQuoteResponse {
        plan_id,
        minutes: query.minutes,
        rate_per_minute,
        total_cost_usd,
    }))
}
