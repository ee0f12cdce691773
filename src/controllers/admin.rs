use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::domain::billing::{BillingServiceApi, SubscriptionResponse};
use crate::error::AppResult;

pub struct AdminController {
    billing_service: Arc<dyn BillingServiceApi>,
}

impl AdminController {
    pub fn new(billing_service: Arc<dyn BillingServiceApi>) -> Self {
        Self { billing_service }
    }

    /// GET /api/admin/subscriptions - Every subscription, newest first
    pub async fn list_subscriptions(
        State(controller): State<Arc<AdminController>>,
    ) -> AppResult<Json<Vec<SubscriptionResponse>>> {
        let now = Utc::now();
        let subscriptions = controller
            .billing_service
            .list_subscriptions()
            .await?
            .into_iter()
            .map(|s| SubscriptionResponse::build(s, now))
            .collect();
        Ok(Json(subscriptions))
    }
}
