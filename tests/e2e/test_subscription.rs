use crate::e2e::helpers;

use helpers::api_client::subscription_path;
use helpers::TestContext;
use chrono::{DateTime, Utc};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use test_context::test_context;
use uuid::Uuid;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_start_a_trial(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    let path = subscription_path(user_id);

    let response = ctx.client.post_empty(&format!("{}/trial", path)).await.unwrap();
    response.assert_status(StatusCode::CREATED);

    assert_eq!(response.str_field("subscription/status"), "trial");
    assert_eq!(response.str_field("subscription/plan_id"), "trial");
    assert_eq!(response.i64_field("subscription/credits_remaining_minutes"), 30);
    assert!(response.field("subscription/billing_cycle/renews_on").is_null());
    assert_eq!(response.i64_field("metrics/remaining_trial_days"), 7);
    assert_eq!(response.str_field("credits_display"), "30 Minutes (0.5 Hour)");

    let fetched = ctx.client.get(&path).await.unwrap();
    fetched.assert_status(StatusCode::OK);
    assert_eq!(
        fetched.str_field("subscription/id"),
        response.str_field("subscription/id")
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_allow_only_one_trial(ctx: &TestContext) {
    let path = format!("{}/trial", subscription_path(Uuid::new_v4()));

    ctx.client.post_empty(&path).await.unwrap().assert_status(StatusCode::CREATED);
    ctx.client
        .post_empty(&path)
        .await
        .unwrap()
        .assert_status(StatusCode::CONFLICT)
        .assert_error_message("Trial is only available to new users");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_subscribe_to_a_paid_plan(ctx: &TestContext) {
    let path = subscription_path(Uuid::new_v4());

    let response = ctx.client.post(&path, &json!({"plan_id": "pro"})).await.unwrap();
    response.assert_status(StatusCode::CREATED);

    assert_eq!(response.str_field("subscription/status"), "active");
    assert_eq!(response.i64_field("subscription/credits_remaining_minutes"), 400);
    assert_eq!(response.i64_field("subscription/payg_credits_minutes"), 0);
    assert_eq!(
        response.decimal_field("subscription/total_spent_usd"),
        Decimal::new(49, 0)
    );
    assert_eq!(response.str_field("plan/display_name"), "Pro / Clarity");
    assert_eq!(response.field("metrics/is_active").as_bool(), Some(true));
    assert!(response.field("subscription/billing_cycle/renews_on").is_string());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_unknown_plan(ctx: &TestContext) {
    let path = subscription_path(Uuid::new_v4());

    ctx.client
        .post(&path, &json!({"plan_id": "enterprise"}))
        .await
        .unwrap()
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("unknown plan: enterprise");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_not_sell_the_trial_plan(ctx: &TestContext) {
    let path = subscription_path(Uuid::new_v4());

    ctx.client
        .post(&path, &json!({"plan_id": "trial"}))
        .await
        .unwrap()
        .assert_status(StatusCode::BAD_REQUEST);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_not_found_without_subscription(ctx: &TestContext) {
    ctx.client
        .get(&subscription_path(Uuid::new_v4()))
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND)
        .assert_error_message("Subscription not found");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_upgrade_trial_to_core(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    let path = subscription_path(user_id);
    ctx.client.post_empty(&format!("{}/trial", path)).await.unwrap();

    let response = ctx
        .client
        .post(&format!("{}/plan", path), &json!({"plan_id": "core"}))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    assert_eq!(response.str_field("subscription/status"), "active");
    assert_eq!(response.str_field("subscription/plan_id"), "core");
    assert_eq!(response.i64_field("subscription/credits_remaining_minutes"), 200);
    assert!(response.json().get("metrics").unwrap().get("remaining_trial_days").is_none());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_prorate_downgrade_against_minutes_used(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    let path = subscription_path(user_id);
    ctx.client.post(&path, &json!({"plan_id": "pro"})).await.unwrap();
    ctx.client
        .post(&format!("/api/users/{}/usage", user_id), &json!({"minutes": 150}))
        .await
        .unwrap()
        .assert_status(StatusCode::CREATED);

    let response = ctx
        .client
        .post(&format!("{}/plan", path), &json!({"plan_id": "core"}))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.i64_field("subscription/credits_remaining_minutes"), 50);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_charge_the_difference_on_mid_cycle_upgrade(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    let path = subscription_path(user_id);
    ctx.client.post(&path, &json!({"plan_id": "core"})).await.unwrap();
    ctx.client
        .post(&format!("/api/users/{}/usage", user_id), &json!({"minutes": 120}))
        .await
        .unwrap()
        .assert_status(StatusCode::CREATED);

    let response = ctx
        .client
        .post(&format!("{}/plan", path), &json!({"plan_id": "pro"}))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.str_field("subscription/plan_id"), "pro");
    assert_eq!(response.i64_field("subscription/credits_remaining_minutes"), 280);
    assert_eq!(
        response.decimal_field("subscription/total_spent_usd"),
        Decimal::new(49, 0)
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_switching_to_same_plan(ctx: &TestContext) {
    let path = subscription_path(Uuid::new_v4());
    ctx.client.post(&path, &json!({"plan_id": "core"})).await.unwrap();

    ctx.client
        .post(&format!("{}/plan", path), &json!({"plan_id": "core"}))
        .await
        .unwrap()
        .assert_status(StatusCode::BAD_REQUEST);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_cancel_and_keep_access_until_cycle_end(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    let path = subscription_path(user_id);
    ctx.client.post(&path, &json!({"plan_id": "core"})).await.unwrap();

    let response = ctx.client.post_empty(&format!("{}/cancel", path)).await.unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.str_field("subscription/status"), "cancelled");
    assert!(response.field("subscription/billing_cycle/renews_on").is_null());

    ctx.client
        .post(&format!("/api/users/{}/usage", user_id), &json!({"minutes": 20}))
        .await
        .unwrap()
        .assert_status(StatusCode::CREATED);

    ctx.client
        .post_empty(&format!("{}/cancel", path))
        .await
        .unwrap()
        .assert_status(StatusCode::FORBIDDEN);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_expire_a_lapsed_trial_on_read(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    ctx.fixtures.create_trial_started(user_id, 9).await.unwrap();

    let response = ctx.client.get(&subscription_path(user_id)).await.unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.str_field("subscription/status"), "expired");
    assert_eq!(response.field("metrics/is_active").as_bool(), Some(false));

    ctx.client
        .post(&format!("/api/users/{}/usage", user_id), &json!({"minutes": 5}))
        .await
        .unwrap()
        .assert_status(StatusCode::FORBIDDEN)
        .assert_error_message("subscription is expired");

    // a lapsed trial does not block buying a plan
    ctx.client
        .post(&subscription_path(user_id), &json!({"plan_id": "core"}))
        .await
        .unwrap()
        .assert_status(StatusCode::CREATED);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_renew_an_active_plan_after_cycle_end(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    let seeded = ctx
        .fixtures
        .create_paid_started(user_id, wellness_billing::domain::plan::PlanId::Core, 35)
        .await
        .unwrap();

    let response = ctx.client.get(&subscription_path(user_id)).await.unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.str_field("subscription/status"), "active");
    assert_eq!(response.i64_field("subscription/credits_remaining_minutes"), 200);
    let start: DateTime<Utc> = response
        .str_field("subscription/billing_cycle/start_date")
        .parse()
        .unwrap();
    let end: DateTime<Utc> = response
        .str_field("subscription/billing_cycle/end_date")
        .parse()
        .unwrap();
    assert!(start > seeded.billing_cycle.start_date);
    assert!(start <= Utc::now() && Utc::now() < end);
}
