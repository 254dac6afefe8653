//! Listings, dashboard and export tests

#[path = "../common/mod.rs"]
mod common;

use cashier::listing::{filter_transactions, load_payments, load_transactions};
use cashier::report::{Dashboard, export_csv};
use common::*;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let app = setup().await;
    let token = app.session.token().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/transactions"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transactions": [
                transaction_json("t1", 100.0, "cash", "success"),
                transaction_json("t2", 50.0, "online", "pendingVerification")
            ]
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    let transactions = app.client.transactions().await.unwrap();
    assert_eq!(transactions.len(), 2);

    let pending = filter_transactions(&transactions, "PENDING");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "t2");
    assert_eq!(filter_transactions(&transactions, "txn-t1").len(), 1);
    assert_eq!(filter_transactions(&transactions, "ana reyes").len(), 2);
}

#[tokio::test]
async fn test_student_payments_skip_completed() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/payments/student/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "payments": [
                payment_json("p1", 1000.0, "completed", vec![]),
                payment_json("p2", 2000.0, "partial", vec![]),
                payment_json("p3", 500.0, "pending", vec![])
            ]
        })))
        .mount(&app.server)
        .await;

    let payments = app.client.student_payments("s1").await.unwrap();
    let ids: Vec<_> = payments.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "p3"]);
}

#[tokio::test]
async fn test_transaction_list_fails_open() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/transactions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_json("boom")))
        .mount(&app.server)
        .await;

    assert!(load_transactions(&app.client).await.unwrap().is_empty());
    assert!(app.session.is_logged_in());
}

#[tokio::test]
async fn test_lists_propagate_session_loss() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/payments"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_json("jwt expired")))
        .mount(&app.server)
        .await;

    let err = load_payments(&app.client).await.unwrap_err();
    assert!(err.is_session_fatal());
    assert!(!app.session.is_logged_in());
    assert_eq!(app.notices.messages(), vec![UNAUTHORIZED_NOTICE.to_string()]);

    // With the session gone the next list call never reaches the backend
    let err = load_transactions(&app.client).await.unwrap_err();
    assert!(matches!(err, CashierError::NoSession));
    assert_eq!(app.request_count().await, 1);
}

#[tokio::test]
async fn test_transactions_with_populated_payment() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transactions": [
                transaction_with_payment_json("t1", "p1", "partial"),
                transaction_json("t2", 50.0, "cash", "success")
            ]
        })))
        .mount(&app.server)
        .await;

    let transactions = load_transactions(&app.client).await.unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0].payment_id(), Some("p1"));
    assert_eq!(transactions[0].payment_status(), Some(PaymentStatus::Partial));
    assert_eq!(transactions[1].payment_id(), Some("p1"));
    assert_eq!(transactions[1].payment_status(), None);
}

#[tokio::test]
async fn test_dashboard_loads_summary_and_recent() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/transactions/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "summary": {
                "transactionsToday": 3,
                "amountCollected": 1500.5,
                "pendingPayments": 2,
                "completedPayments": 1
            }
        })))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/transactions/recent"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transactions": [transaction_json("t1", 100.0, "cash", "success")]
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    let dashboard = Dashboard::load(&app.client, 5).await.unwrap();

    assert_eq!(dashboard.summary.transactions_today, 3);
    assert_eq!(dashboard.summary.amount_collected, Decimal::new(15005, 1));
    assert_eq!(dashboard.recent.len(), 1);

    let mut csv = Vec::new();
    export_csv(&dashboard.recent, &mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.starts_with("Student,Method,Amount,Status,Date\n"));
    assert!(csv.contains("Ana Reyes,cash,100.00,success,"));
}

#[tokio::test]
async fn test_dashboard_fails_open_to_empty() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/transactions/summary"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_json("boom")))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/transactions/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transactions": [transaction_json("t1", 100.0, "cash", "success")]
        })))
        .mount(&app.server)
        .await;

    let dashboard = Dashboard::load(&app.client, 5).await.unwrap();
    assert_eq!(dashboard.summary, DashboardSummary::default());
    assert!(dashboard.recent.is_empty());
}

#[tokio::test]
async fn test_dashboard_propagates_session_loss() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/transactions/summary"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_json("jwt expired")))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/transactions/recent"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_json("jwt expired")))
        .mount(&app.server)
        .await;

    let err = Dashboard::load(&app.client, 5).await.unwrap_err();
    assert!(err.is_session_fatal());
    assert!(!app.session.is_logged_in());
}
