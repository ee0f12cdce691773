use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::billing::{
    BillingServiceApi, RecordUsageRequest, RecordUsageResponse, SubscriptionResponse,
    UsageResponse,
};
use crate::error::AppResult;

pub struct UsageController {
    billing_service: Arc<dyn BillingServiceApi>,
}

impl UsageController {
    pub fn new(billing_service: Arc<dyn BillingServiceApi>) -> Self {
        Self { billing_service }
    }

    /// POST /api/users/:user_id/usage - Charge a finished session
    pub async fn record_usage(
        State(controller): State<Arc<UsageController>>,
        Path(user_id): Path<Uuid>,
        Json(request): Json<RecordUsageRequest>,
    ) -> AppResult<(StatusCode, Json<RecordUsageResponse>)> {
        let command = request.into_command()?;
        let (subscription, record) = controller
            .billing_service
            .record_usage(user_id, command)
            .await?;
        Ok((
            StatusCode::CREATED,
            Json(RecordUsageResponse {
                record,
                subscription: SubscriptionResponse::build(subscription, Utc::now()),
            }),
        ))
    }

    /// GET /api/users/:user_id/usage - Current cycle's ledger
    pub async fn list_usage(
        State(controller): State<Arc<UsageController>>,
        Path(user_id): Path<Uuid>,
    ) -> AppResult<Json<UsageResponse>> {
        let usage = controller
            .billing_service
            .usage_in_current_cycle(user_id)
            .await?;
        Ok(Json(usage.into()))
    }
}
