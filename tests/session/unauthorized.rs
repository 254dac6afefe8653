//! 401 interceptor tests

#[path = "../common/mod.rs"]
mod common;

use common::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_401(app: &TestApp, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_json("jwt expired")))
        .mount(&app.server)
        .await;
}

#[tokio::test]
async fn test_401_clears_session_and_notifies() {
    let app = setup().await;
    mount_401(&app, "/api/transactions").await;

    let err = app.client.transactions().await.unwrap_err();

    assert!(matches!(err, CashierError::Unauthorized));
    assert!(!app.session.is_logged_in());
    assert_eq!(app.storage.get(keys::TOKEN), None);
    assert_eq!(app.storage.get(keys::ROLE), None);
    assert_eq!(app.session.last_logout(), Some(LogoutReason::Unauthorized));
    assert_eq!(app.notices.messages(), vec![UNAUTHORIZED_NOTICE.to_string()]);
    assert_eq!(app.notices.notices()[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_concurrent_401s_notify_once() {
    let app = setup().await;
    mount_401(&app, "/api/transactions").await;
    mount_401(&app, "/api/payments").await;

    let (a, b) = tokio::join!(app.client.transactions(), app.client.payments());

    assert!(a.unwrap_err().is_session_fatal());
    assert!(b.unwrap_err().is_session_fatal());
    assert!(!app.session.is_logged_in());
    assert_eq!(
        app.notices
            .messages()
            .iter()
            .filter(|m| m.as_str() == UNAUTHORIZED_NOTICE)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_other_errors_keep_session() {
    let app = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/transactions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_json("Database down")))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/payments"))
        .respond_with(ResponseTemplate::new(403).set_body_json(error_json("Forbidden")))
        .mount(&app.server)
        .await;

    let err = app.client.transactions().await.unwrap_err();
    assert_eq!(err.notice_text("fallback"), "Database down");
    assert!(app.client.payments().await.is_err());

    assert!(app.session.is_logged_in());
    assert!(app.notices.notices().is_empty());
}

#[tokio::test]
async fn test_dropped_interceptor_no_longer_logs_out() {
    let mut app = setup().await;
    mount_401(&app, "/api/transactions").await;

    assert!(app.client.interceptors().is_registered("session-401"));
    app.interceptor.take();
    assert!(!app.client.interceptors().is_registered("session-401"));

    let err = app.client.transactions().await.unwrap_err();

    assert!(matches!(err, CashierError::Unauthorized));
    assert!(app.session.is_logged_in());
    assert!(app.notices.notices().is_empty());
}

#[tokio::test]
async fn test_interceptor_registration_is_reference_counted() {
    let app = setup().await;
    mount_401(&app, "/api/transactions").await;

    // A second mount of the same interceptor shares the first registration
    let second = app.client.install_session_interceptor(app.notifier());
    assert_eq!(app.client.interceptors().len(), 1);
    drop(second);
    assert!(app.client.interceptors().is_registered("session-401"));

    app.client.transactions().await.unwrap_err();
    assert_eq!(app.notices.messages(), vec![UNAUTHORIZED_NOTICE.to_string()]);
}
