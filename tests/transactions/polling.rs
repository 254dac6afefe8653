//! Manual status check tests

#[path = "../common/mod.rs"]
mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_status(app: &TestApp, id: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/api/transactions/{}/status", id)))
        .respond_with(response)
        .mount(&app.server)
        .await;
}

#[tokio::test]
async fn test_pending_check_reports_both_statuses() {
    let app = setup().await;
    mount_status(
        &app,
        "t1",
        ResponseTemplate::new(200).set_body_json(status_json(
            "awaiting_payment_method",
            "pendingVerification",
            false,
        )),
    )
    .await;

    let refresh = RefreshTrigger::new();
    let poller = app.poller(refresh.clone());
    let outcome = poller.check("t1").await.unwrap();

    assert!(matches!(outcome, PollOutcome::Pending(_)));
    assert_eq!(
        outcome.report().unwrap().current_status,
        "awaiting_payment_method"
    );
    assert_eq!(
        app.notices.messages(),
        vec![
            "Gateway status: awaiting_payment_method | App status: pendingVerification".to_string()
        ]
    );
    assert_eq!(refresh.generation(), 1);
    assert!(!poller.is_checking("t1"));
}

#[tokio::test]
async fn test_concurrent_checks_for_same_transaction() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/transactions/t1/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_json("awaiting_payment_method", "pendingVerification", false))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&app.server)
        .await;

    let poller = app.poller(RefreshTrigger::new());
    let (first, second) = tokio::join!(poller.check("t1"), poller.check("t1"));

    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(
        outcomes.iter().filter(|o| **o == PollOutcome::Busy).count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, PollOutcome::Pending(_)))
            .count(),
        1
    );
    assert!(!poller.is_checking("t1"));
}

#[tokio::test]
async fn test_checks_for_different_transactions_run_together() {
    let app = setup().await;
    for id in ["t1", "t2"] {
        mount_status(
            &app,
            id,
            ResponseTemplate::new(200)
                .set_body_json(status_json("awaiting_payment_method", "pendingVerification", false))
                .set_delay(Duration::from_millis(100)),
        )
        .await;
    }

    let poller = app.poller(RefreshTrigger::new());
    let (a, b) = tokio::join!(poller.check("t1"), poller.check("t2"));

    assert!(matches!(a.unwrap(), PollOutcome::Pending(_)));
    assert!(matches!(b.unwrap(), PollOutcome::Pending(_)));
}

#[tokio::test]
async fn test_success_closes_flow_and_stays_closed() {
    let app = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "transaction": transaction_json("t1", 50.0, "online", "pendingVerification"),
            "qrImage": "data:image/png;base64,AAAA",
            "paymentCompleted": false
        })))
        .mount(&app.server)
        .await;
    mount_status(
        &app,
        "t1",
        ResponseTemplate::new(200).set_body_json(status_json("succeeded", "success", true)),
    )
    .await;

    let mut flow = app.flow();
    flow.submit(&draft(payment(50.0, vec![]), Decimal::from(50), PaymentMethod::Online))
        .await
        .unwrap();
    assert!(matches!(flow.state(), FlowState::QrPending { .. }));

    assert!(flow.check_status().await.unwrap().is_completed());
    assert_eq!(flow.state(), &FlowState::Closed);
    assert!(app.notices.contains("Payment succeeded!"));
    assert!(app.notices.contains("Payment fully completed!"));

    // Checking again reports the settled status and never reopens the flow
    assert!(flow.check_status().await.unwrap().is_completed());
    assert_eq!(flow.state(), &FlowState::Closed);
}

#[tokio::test]
async fn test_failed_gateway_payment_keeps_flow_open() {
    let app = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "transaction": transaction_json("t1", 50.0, "online", "pendingVerification"),
            "qrImage": "00020101021228",
            "paymentCompleted": false
        })))
        .mount(&app.server)
        .await;
    mount_status(
        &app,
        "t1",
        ResponseTemplate::new(200).set_body_json(status_json("failed", "failed", false)),
    )
    .await;

    let mut flow = app.flow();
    flow.submit(&draft(payment(1000.0, vec![]), Decimal::from(50), PaymentMethod::Online))
        .await
        .unwrap();

    let outcome = flow.check_status().await.unwrap();
    assert!(!outcome.is_completed());
    assert!(matches!(flow.state(), FlowState::QrPending { .. }));
    assert!(!app.notices.contains("Payment succeeded!"));
}

#[tokio::test]
async fn test_check_failure_uses_backend_message_then_fallback() {
    let app = setup().await;
    mount_status(
        &app,
        "t1",
        ResponseTemplate::new(502).set_body_json(error_json("Gateway unreachable")),
    )
    .await;
    mount_status(&app, "t2", ResponseTemplate::new(500).set_body_string("oops")).await;

    let refresh = RefreshTrigger::new();
    let poller = app.poller(refresh.clone());

    assert!(poller.check("t1").await.is_err());
    assert!(poller.check("t2").await.is_err());

    assert_eq!(
        app.notices.messages(),
        vec!["Gateway unreachable".to_string(), "Status check failed".to_string()]
    );
    assert!(!poller.is_checking("t1"));
    assert_eq!(refresh.generation(), 0);
    assert!(app.session.is_logged_in());
}

#[tokio::test]
async fn test_check_without_submission() {
    let app = setup().await;
    let err = app.flow().check_status().await.unwrap_err();
    assert!(matches!(err, CashierError::InvalidState(_)));
}
