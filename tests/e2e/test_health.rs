use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_ok_for_health_check(ctx: &TestContext) {
    let response = ctx.client.get("/health").await.unwrap();

    response.assert_status(StatusCode::OK);

    // liveness is plain text
    let body = String::from_utf8(response.body_bytes.clone()).unwrap();
    assert_eq!(body, "OK");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_ledger_readiness(ctx: &TestContext) {
    let response = ctx.client.get("/health/ready").await.unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.str_field("status"), "ready");
    assert_eq!(response.str_field("ledger"), "connected");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_include_request_id_in_responses(ctx: &TestContext) {
    let response = ctx.client.get("/health").await.unwrap();
    response.assert_header_exists("x-request-id");

    let response = ctx.client.get("/api/plans").await.unwrap();
    response.assert_header_exists("x-request-id");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_echo_caller_request_id(ctx: &TestContext) {
    let response = ctx
        .client
        .get_with_headers("/health", &[("x-request-id", "trace-abc-123")])
        .await
        .unwrap();

    assert_eq!(
        response.header("x-request-id").map(String::as_str),
        Some("trace-abc-123")
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_attach_request_id_to_error_responses(ctx: &TestContext) {
    let response = ctx
        .client
        .get(&format!("/api/users/{}/subscription", uuid::Uuid::new_v4()))
        .await
        .unwrap();

    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_header_exists("x-request-id");
}
