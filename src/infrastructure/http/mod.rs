pub mod request_id;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::controllers::{
    admin::AdminController, health, plans, subscription::SubscriptionController,
    usage::UsageController,
};
use crate::domain::billing::BillingServiceApi;
use crate::infrastructure::config::Config;
use crate::infrastructure::repositories::LedgerRepository;

pub use request_id::{request_id_middleware, RequestId, X_REQUEST_ID};

/// Assemble every route with its controller state and the shared layers
pub fn build_router(
    repo: Arc<dyn LedgerRepository>,
    billing_service: Arc<dyn BillingServiceApi>,
) -> Router {
    let subscription_controller = Arc::new(SubscriptionController::new(billing_service.clone()));
    let usage_controller = Arc::new(UsageController::new(billing_service.clone()));
    let admin_controller = Arc::new(AdminController::new(billing_service));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(repo);

    let plan_routes = Router::new()
        .route("/api/plans", get(plans::list_plans))
        .route("/api/plans/:plan_id/payg-quote", get(plans::payg_quote));

    let subscription_routes = Router::new()
        .route(
            "/api/users/:user_id/subscription",
            get(SubscriptionController::get_subscription)
                .post(SubscriptionController::create_subscription),
        )
        .route(
            "/api/users/:user_id/subscription/trial",
            post(SubscriptionController::start_trial),
        )
        .route(
            "/api/users/:user_id/subscription/plan",
            post(SubscriptionController::switch_plan),
        )
        .route(
            "/api/users/:user_id/subscription/cancel",
            post(SubscriptionController::cancel),
        )
        .route(
            "/api/users/:user_id/subscription/payg",
            post(SubscriptionController::purchase_payg),
        )
        .route(
            "/api/users/:user_id/payg-purchases",
            get(SubscriptionController::list_payg_purchases),
        )
        .with_state(subscription_controller);

    let usage_routes = Router::new()
        .route(
            "/api/users/:user_id/usage",
            get(UsageController::list_usage).post(UsageController::record_usage),
        )
        .with_state(usage_controller);

    let admin_routes = Router::new()
        .route(
            "/api/admin/subscriptions",
            get(AdminController::list_subscriptions),
        )
        .with_state(admin_controller);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(X_REQUEST_ID)])
        .expose_headers([HeaderName::from_static(X_REQUEST_ID)]);

    Router::new()
        .merge(health_routes)
        .merge(plan_routes)
        .merge(subscription_routes)
        .merge(usage_routes)
        .merge(admin_routes)
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until the process stops
pub async fn start_http_server(
    config: Arc<Config>,
    app: Router,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
