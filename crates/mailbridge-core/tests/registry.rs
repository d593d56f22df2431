//! Session registry lifecycle against scripted connections.

#![allow(clippy::unwrap_used)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use mailbridge_core::{Error, ServerConfig, SessionRegistry};

use support::{MockConnector, sample_state};

fn config(password: &str) -> ServerConfig {
    ServerConfig::from_email("alice@x.org", password, None, None).unwrap()
}

#[tokio::test]
async fn test_connect_registers_session() {
    let connector = MockConnector::new(sample_state());
    let registry = SessionRegistry::new(connector.clone(), Duration::from_secs(10));

    let session = registry.connect("alice@x.org", &config("pw")).await.unwrap();
    assert_eq!(session.lock().await.user_id, "alice@x.org");

    let found = registry.get("alice@x.org").await.unwrap();
    assert!(Arc::ptr_eq(&session, &found));
    assert!(registry.get("bob@x.org").await.is_none());
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_reconnect_replaces_and_closes_previous() {
    let connector = MockConnector::new(sample_state());
    let registry = SessionRegistry::new(connector.clone(), Duration::from_secs(10));

    let first = registry.connect("alice@x.org", &config("pw")).await.unwrap();
    let second = registry.connect("alice@x.org", &config("pw")).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len().await, 1);
    assert!(Arc::ptr_eq(&registry.get("alice@x.org").await.unwrap(), &second));
    assert_eq!(connector.mailbox.lock().unwrap().closed, 1);
    assert_eq!(*connector.submission_closed.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_failed_login_registers_nothing() {
    let mut connector = MockConnector::new(sample_state());
    connector.reject_password = Some("wrong".to_string());
    let registry = SessionRegistry::new(connector.clone(), Duration::from_secs(10));

    let err = registry
        .connect("alice@x.org", &config("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_failed_submission_closes_mailbox() {
    let mut connector = MockConnector::new(sample_state());
    connector.submission_down = true;
    let registry = SessionRegistry::new(connector.clone(), Duration::from_secs(10));

    let err = registry
        .connect("alice@x.org", &config("pw"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 502);
    assert!(registry.is_empty().await);
    assert_eq!(connector.mailbox.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_failed_reconnect_keeps_existing_session() {
    let mut connector = MockConnector::new(sample_state());
    connector.reject_password = Some("wrong".to_string());
    let registry = SessionRegistry::new(connector.clone(), Duration::from_secs(10));

    let session = registry.connect("alice@x.org", &config("pw")).await.unwrap();
    assert!(registry.connect("alice@x.org", &config("wrong")).await.is_err());
    assert!(Arc::ptr_eq(&registry.get("alice@x.org").await.unwrap(), &session));
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let connector = MockConnector::new(sample_state());
    let registry = SessionRegistry::new(connector.clone(), Duration::from_secs(10));

    registry.connect("alice@x.org", &config("pw")).await.unwrap();
    registry.disconnect("alice@x.org").await;
    registry.disconnect("alice@x.org").await;
    registry.disconnect("nobody@x.org").await;

    assert!(registry.get("alice@x.org").await.is_none());
    assert_eq!(connector.mailbox.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_sessions_are_per_user() {
    let connector = MockConnector::new(sample_state());
    let registry = SessionRegistry::new(connector.clone(), Duration::from_secs(10));

    registry.connect("alice@x.org", &config("pw")).await.unwrap();
    let bob = ServerConfig::from_email("bob@x.org", "pw", None, None).unwrap();
    registry.connect("bob@x.org", &bob).await.unwrap();
    registry.disconnect("alice@x.org").await;

    assert!(registry.get("bob@x.org").await.is_some());
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_credentials_check_registers_nothing() {
    let connector = MockConnector::new(sample_state());
    let registry = SessionRegistry::new(connector.clone(), Duration::from_secs(10));

    let check = registry.test_credentials(&config("pw")).await;
    assert!(check.all_ok());
    assert!(registry.is_empty().await);
    assert_eq!(connector.mailbox.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_credentials_check_reports_each_side() {
    let mut connector = MockConnector::new(sample_state());
    connector.submission_down = true;
    let registry = SessionRegistry::new(connector, Duration::from_secs(10));

    let check = registry.test_credentials(&config("pw")).await;
    assert!(check.mailbox_ok);
    assert!(!check.submission_ok);
    assert!(!check.all_ok());
}

#[tokio::test(start_paused = true)]
async fn test_credentials_check_times_out() {
    let mut connector = MockConnector::new(sample_state());
    connector.mailbox_delay = Some(Duration::from_secs(30));
    let registry = SessionRegistry::new(connector, Duration::from_secs(10));

    let check = registry.test_credentials(&config("pw")).await;
    assert!(!check.mailbox_ok);
    assert!(check.submission_ok);
}
