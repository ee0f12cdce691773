use crate::e2e::helpers;

use helpers::api_client::{subscription_path, usage_path};
use helpers::{DecliningPaymentsContext, TestContext};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use test_context::test_context;
use uuid::Uuid;
use wellness_billing::domain::plan::PlanId;

fn payg_path(user_id: Uuid) -> String {
    format!("{}/payg", subscription_path(user_id))
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_draw_on_payg_after_plan_credits(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    ctx.client
        .post(&subscription_path(user_id), &json!({"plan_id": "core"}))
        .await
        .unwrap();
    ctx.client
        .post(&usage_path(user_id), &json!({"minutes": 150}))
        .await
        .unwrap()
        .assert_status(StatusCode::CREATED);

    let purchase = ctx
        .client
        .post(&payg_path(user_id), &json!({"minutes": 60}))
        .await
        .unwrap();
    purchase.assert_status(StatusCode::CREATED);
    assert_eq!(purchase.str_field("purchase/status"), "completed");
    assert_eq!(purchase.i64_field("purchase/minutes_purchased"), 60);
    assert_eq!(purchase.decimal_field("purchase/total_cost_usd"), Decimal::new(12, 0));
    assert_eq!(
        purchase.i64_field("subscription/subscription/payg_credits_minutes"),
        60
    );

    let usage = ctx
        .client
        .post(&usage_path(user_id), &json!({"minutes": 80}))
        .await
        .unwrap();
    usage.assert_status(StatusCode::CREATED);
    assert_eq!(usage.i64_field("record/plan_minutes"), 50);
    assert_eq!(usage.i64_field("record/payg_minutes"), 30);
    assert_eq!(
        usage.i64_field("subscription/subscription/credits_remaining_minutes"),
        0
    );
    assert_eq!(
        usage.i64_field("subscription/subscription/payg_credits_minutes"),
        30
    );
    assert_eq!(
        usage.field("subscription/metrics/has_credits_remaining").as_bool(),
        Some(true)
    );

    // allowance + bought - balances == consumed
    let ledger = ctx.client.get(&usage_path(user_id)).await.unwrap();
    assert_eq!(ledger.i64_field("total_minutes"), 200 + 60 - 30);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_refuse_payg_on_trial(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    ctx.client
        .post_empty(&format!("{}/trial", subscription_path(user_id)))
        .await
        .unwrap();

    ctx.client
        .post(&payg_path(user_id), &json!({"minutes": 25}))
        .await
        .unwrap()
        .assert_status(StatusCode::FORBIDDEN)
        .assert_error_message("not available on the trial plan");

    let purchases = ctx
        .client
        .get(&format!("/api/users/{}/payg-purchases", user_id))
        .await
        .unwrap();
    purchases.assert_status(StatusCode::OK);
    assert_eq!(purchases.json().as_array().map(Vec::len), Some(0));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_non_positive_purchase(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    ctx.client
        .post(&subscription_path(user_id), &json!({"plan_id": "pro"}))
        .await
        .unwrap();

    ctx.client
        .post(&payg_path(user_id), &json!({"minutes": -5}))
        .await
        .unwrap()
        .assert_status(StatusCode::BAD_REQUEST);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_list_purchases_newest_first(ctx: &TestContext) {
    let user_id = Uuid::new_v4();
    ctx.client
        .post(&subscription_path(user_id), &json!({"plan_id": "pro"}))
        .await
        .unwrap();

    for minutes in [25, 50] {
        ctx.client
            .post(&payg_path(user_id), &json!({ "minutes": minutes }))
            .await
            .unwrap()
            .assert_status(StatusCode::CREATED);
    }

    let response = ctx
        .client
        .get(&format!("/api/users/{}/payg-purchases", user_id))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    let minutes: Vec<i64> = response
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.get("minutes_purchased").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(minutes, vec![50, 25]);
}

#[test_context(DecliningPaymentsContext)]
#[tokio::test]
async fn it_should_record_declined_purchase_as_failed(ctx: &DecliningPaymentsContext) {
    let user_id = Uuid::new_v4();
    ctx.fixtures
        .create_paid_started(user_id, PlanId::Core, 1)
        .await
        .unwrap();

    ctx.client
        .post(&payg_path(user_id), &json!({"minutes": 30}))
        .await
        .unwrap()
        .assert_status(StatusCode::PAYMENT_REQUIRED)
        .assert_error_message("payment declined");

    let purchases = ctx
        .client
        .get(&format!("/api/users/{}/payg-purchases", user_id))
        .await
        .unwrap();
    let list = purchases.json().as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].get("status").and_then(|v| v.as_str()), Some("failed"));

    let subscription = ctx.client.get(&subscription_path(user_id)).await.unwrap();
    assert_eq!(
        subscription.i64_field("subscription/payg_credits_minutes"),
        0
    );
}

#[test_context(DecliningPaymentsContext)]
#[tokio::test]
async fn it_should_not_open_a_plan_when_payment_declines(ctx: &DecliningPaymentsContext) {
    let user_id = Uuid::new_v4();

    ctx.client
        .post(&subscription_path(user_id), &json!({"plan_id": "core"}))
        .await
        .unwrap()
        .assert_status(StatusCode::PAYMENT_REQUIRED);

    ctx.client
        .get(&subscription_path(user_id))
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
}
