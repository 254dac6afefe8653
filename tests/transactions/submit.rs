//! Transaction submission flow tests

#[path = "../common/mod.rs"]
mod common;

use common::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

fn created(transaction: serde_json::Value, qr: Option<&str>, completed: bool) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "success": true,
        "transaction": transaction,
        "qrImage": qr,
        "paymentCompleted": completed
    }))
}

#[tokio::test]
async fn test_online_payment_waits_for_qr_scan() {
    let app = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .and(body_json(json!({
            "studentId": "s1",
            "paymentId": "p1",
            "amountPaid": 50.0,
            "paymentMethod": "online",
            "source": "cashier"
        })))
        .respond_with(created(
            transaction_json("t1", 50.0, "online", "pendingVerification"),
            Some("data:image/png;base64,iVBORw0KGgo"),
            false,
        ))
        .expect(1)
        .mount(&app.server)
        .await;

    let mut flow = app.flow();
    let state = flow
        .submit(&draft(payment(1000.0, vec![]), Decimal::from(50), PaymentMethod::Online))
        .await
        .unwrap()
        .clone();

    assert_eq!(
        state,
        FlowState::QrPending {
            transaction_id: "t1".to_string(),
            qr: QrPayload::Image("data:image/png;base64,iVBORw0KGgo".to_string()),
        }
    );
    assert_eq!(flow.transaction_id(), Some("t1"));
    assert_eq!(app.notices.messages(), vec!["Transaction recorded!".to_string()]);
}

#[tokio::test]
async fn test_cash_over_balance_is_rejected_locally() {
    let app = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(created(transaction_json("t2", 1.0, "cash", "success"), None, false))
        .expect(0)
        .mount(&app.server)
        .await;

    let settled = payment(1000.0, vec![transaction_json("t1", 1000.0, "cash", "success")]);
    let mut flow = app.flow();
    let err = flow
        .submit(&draft(settled, Decimal::from(1), PaymentMethod::Cash))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CashierError::Validation(ValidationError::ExceedsBalance { remaining })
            if remaining.is_zero()
    ));
    assert_eq!(flow.state(), &FlowState::Editing);
    assert_eq!(app.notices.notices()[0].level, NoticeLevel::Error);
    assert_eq!(app.request_count().await, 0);
}

#[tokio::test]
async fn test_pending_online_amount_does_not_reduce_cash_balance() {
    let app = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(created(transaction_json("t3", 900.0, "cash", "success"), None, true))
        .expect(1)
        .mount(&app.server)
        .await;

    let partly = payment(
        1000.0,
        vec![
            transaction_json("t1", 100.0, "cash", "success"),
            transaction_json("t2", 500.0, "online", "pendingVerification"),
        ],
    );
    let mut flow = app.flow();
    let state = flow
        .submit(&draft(partly, Decimal::from(900), PaymentMethod::Cash))
        .await
        .unwrap();

    assert_eq!(state, &FlowState::Closed);
    assert!(app.notices.contains("Payment fully completed!"));
}

#[tokio::test]
async fn test_online_below_minimum_is_rejected_locally() {
    let app = setup().await;

    let mut flow = app.flow();
    let err = flow
        .submit(&draft(payment(1000.0, vec![]), Decimal::new(1999, 2), PaymentMethod::Online))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CashierError::Validation(ValidationError::BelowMinimum { .. })
    ));
    assert!(app.notices.contains("Online payments must be at least ₱20"));
    assert_eq!(app.request_count().await, 0);
}

#[tokio::test]
async fn test_backend_message_shown_on_failure() {
    let app = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(error_json("Payment already completed")),
        )
        .mount(&app.server)
        .await;

    let mut flow = app.flow();
    let result = flow
        .submit(&draft(payment(1000.0, vec![]), Decimal::from(100), PaymentMethod::Cash))
        .await;

    assert!(result.is_err());
    assert_eq!(flow.state(), &FlowState::Editing);
    assert_eq!(app.notices.messages(), vec!["Payment already completed".to_string()]);
}

#[tokio::test]
async fn test_generic_message_without_backend_message() {
    let app = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&app.server)
        .await;

    let mut flow = app.flow();
    let result = flow
        .submit(&draft(payment(1000.0, vec![]), Decimal::from(100), PaymentMethod::Cash))
        .await;

    assert!(result.is_err());
    assert_eq!(app.notices.messages(), vec!["Transaction failed".to_string()]);
}

#[tokio::test]
async fn test_submitted_flow_cannot_submit_again() {
    let app = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(created(
            transaction_json("t1", 50.0, "online", "pendingVerification"),
            Some("00020101021228"),
            false,
        ))
        .expect(1)
        .mount(&app.server)
        .await;

    let mut flow = app.flow();
    let d = draft(payment(1000.0, vec![]), Decimal::from(50), PaymentMethod::Online);
    flow.submit(&d).await.unwrap();

    let err = flow.submit(&d).await.unwrap_err();
    assert!(matches!(err, CashierError::InvalidState(_)));
}

#[tokio::test]
async fn test_missing_selection() {
    let app = setup().await;

    let mut d = draft(payment(1000.0, vec![]), Decimal::from(10), PaymentMethod::Cash);
    d.student_id = String::new();

    let err = app.flow().submit(&d).await.unwrap_err();
    assert!(matches!(
        err,
        CashierError::Validation(ValidationError::MissingSelection)
    ));
}

#[tokio::test]
async fn test_prepare_refuses_closed_or_foreign_payment() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/payments/student/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "payments": [
                payment_json("p1", 1000.0, "completed", vec![]),
                payment_json("p2", 2000.0, "partial", vec![])
            ]
        })))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(created(transaction_json("t1", 10.0, "cash", "success"), None, false))
        .expect(0)
        .mount(&app.server)
        .await;

    let flow = app.flow();
    for payment_id in ["p1", "p9"] {
        let err = flow
            .prepare("s1", payment_id, Decimal::from(10), PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CashierError::Validation(ValidationError::PaymentUnavailable)
        ));
    }
    assert_eq!(
        app.notices.messages(),
        vec![ValidationError::PaymentUnavailable.to_string(); 2]
    );

    let d = flow
        .prepare("s1", "p2", Decimal::from(10), PaymentMethod::Cash)
        .await
        .unwrap();
    assert_eq!(d.payment.id, "p2");
    assert_eq!(d.payment.total_amount, Decimal::from(2000));
    assert_eq!(flow.state(), &FlowState::Editing);
}
