use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::billing::{
    BillingServiceApi, CreateSubscriptionRequest, PaygPurchase, PaygPurchaseResponse,
    PurchasePaygRequest, SubscriptionResponse, SwitchPlanRequest,
};
use crate::domain::plan::PlanId;
use crate::error::AppResult;

pub struct SubscriptionController {
    billing_service: Arc<dyn BillingServiceApi>,
}

impl SubscriptionController {
    pub fn new(billing_service: Arc<dyn BillingServiceApi>) -> Self {
        Self { billing_service }
    }

    /// GET /api/users/:user_id/subscription
    pub async fn get_subscription(
        State(controller): State<Arc<SubscriptionController>>,
        Path(user_id): Path<Uuid>,
    ) -> AppResult<Json<SubscriptionResponse>> {
        let subscription = controller.billing_service.get_subscription(user_id).await?;
        Ok(Json(SubscriptionResponse::build(subscription, Utc::now())))
    }

    /// POST /api/users/:user_id/subscription - Start a paid plan
    pub async fn create_subscription(
        State(controller): State<Arc<SubscriptionController>>,
        Path(user_id): Path<Uuid>,
        Json(request): Json<CreateSubscriptionRequest>,
    ) -> AppResult<(StatusCode, Json<SubscriptionResponse>)> {
        let plan_id: PlanId = request.plan_id.parse()?;
        let subscription = controller
            .billing_service
            .subscribe(user_id, plan_id)
            .await?;
        Ok((
            StatusCode::CREATED,
            Json(SubscriptionResponse::build(subscription, Utc::now())),
        ))
    }

    /// POST /api/users/:user_id/subscription/trial
    pub async fn start_trial(
        State(controller): State<Arc<SubscriptionController>>,
        Path(user_id): Path<Uuid>,
    ) -> AppResult<(StatusCode, Json<SubscriptionResponse>)> {
        let subscription = controller.billing_service.start_trial(user_id).await?;
        Ok((
            StatusCode::CREATED,
            Json(SubscriptionResponse::build(subscription, Utc::now())),
        ))
    }

    /// POST /api/users/:user_id/subscription/plan - Upgrade or downgrade
    pub async fn switch_plan(
        State(controller): State<Arc<SubscriptionController>>,
        Path(user_id): Path<Uuid>,
        Json(request): Json<SwitchPlanRequest>,
    ) -> AppResult<Json<SubscriptionResponse>> {
        let plan_id: PlanId = request.plan_id.parse()?;
        let subscription = controller
            .billing_service
            .switch_plan(user_id, plan_id)
            .await?;
        Ok(Json(SubscriptionResponse::build(subscription, Utc::now())))
    }

    /// POST /api/users/:user_id/subscription/cancel
    pub async fn cancel(
        State(controller): State<Arc<SubscriptionController>>,
        Path(user_id): Path<Uuid>,
    ) -> AppResult<Json<SubscriptionResponse>> {
        let subscription = controller.billing_service.cancel(user_id).await?;
        Ok(Json(SubscriptionResponse::build(subscription, Utc::now())))
    }

    /// POST /api/users/:user_id/subscription/payg - Buy extra minutes
    pub async fn purchase_payg(
        State(controller): State<Arc<SubscriptionController>>,
        Path(user_id): Path<Uuid>,
        Json(request): Json<PurchasePaygRequest>,
    ) -> AppResult<(StatusCode, Json<PaygPurchaseResponse>)> {
        let (subscription, purchase) = controller
            .billing_service
            .purchase_payg(user_id, request.minutes)
            .await?;
        Ok((
            StatusCode::CREATED,
            Json(PaygPurchaseResponse {
                purchase,
                subscription: SubscriptionResponse::build(subscription, Utc::now()),
            }),
        ))
    }

    /// GET /api/users/:user_id/payg-purchases
    pub async fn list_payg_purchases(
        State(controller): State<Arc<SubscriptionController>>,
        Path(user_id): Path<Uuid>,
    ) -> AppResult<Json<Vec<PaygPurchase>>> {
        let purchases = controller
            .billing_service
            .list_payg_purchases(user_id)
            .await?;
        Ok(Json(purchases))
    }
}
