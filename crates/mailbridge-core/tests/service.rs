//! Service envelopes end to end over scripted connections.

#![allow(clippy::unwrap_used)]

mod support;

use std::time::Duration;

use mailbridge_core::{
    AttachmentUpload, Credentials, MailService, PipelineConfig, SendRequest, encode_session_id,
};

use support::{MockConnector, sample_state};

async fn connected(connector: &MockConnector) -> (MailService<MockConnector>, String) {
    let service = MailService::new(connector.clone(), PipelineConfig::default());
    let response = service
        .connect_session(&Credentials::new("alice@x.org", "pw"))
        .await;
    assert!(response.success, "{:?}", response.details);
    let session_id = response.data.unwrap().session_id;
    (service, session_id)
}

#[tokio::test]
async fn test_connect_returns_reversible_session_id() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;

    assert_eq!(session_id, encode_session_id("alice@x.org"));
    assert!(service.registry().get("alice@x.org").await.is_some());
}

#[tokio::test]
async fn test_missing_credentials_are_rejected_before_io() {
    let connector = MockConnector::new(sample_state());
    let service = MailService::new(connector.clone(), PipelineConfig::default());

    let response = service.test_connection(&Credentials::default()).await;
    assert!(!response.success);
    assert_eq!(response.status, 400);

    let response = service
        .connect_session(&Credentials {
            email: Some("alice@x.org".to_string()),
            ..Credentials::default()
        })
        .await;
    assert_eq!(response.status, 400);
    assert_eq!(*connector.opened.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_connection_reports_both_sides() {
    let connector = MockConnector::new(sample_state());
    let service = MailService::new(connector, PipelineConfig::default());

    let response = service
        .test_connection(&Credentials::new("alice@x.org", "pw"))
        .await;
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["mailboxOk"], true);
    assert_eq!(json["data"]["submissionOk"], true);
}

#[tokio::test]
async fn test_data_plane_requires_session() {
    let connector = MockConnector::new(sample_state());
    let service = MailService::new(connector, PipelineConfig::default());

    let missing = service.list_folders(None).await;
    assert_eq!(missing.status, 400);
    assert_eq!(missing.error.as_deref(), Some("Failed to list folders"));

    let unknown = service
        .list_folders(Some(&encode_session_id("ghost@x.org")))
        .await;
    assert_eq!(unknown.status, 401);

    let garbage = service.list_messages(Some("%%%"), None, None).await;
    assert_eq!(garbage.status, 401);
}

#[tokio::test]
async fn test_list_folders_and_messages() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;

    let folders = service.list_folders(Some(&session_id)).await;
    assert_eq!(folders.data.unwrap()[0].full_name, "INBOX");

    let messages = service.list_messages(Some(&session_id), None, Some(2)).await;
    let messages = messages.data.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].subject, "Newest");
    assert!(
        connector
            .mailbox
            .lock()
            .unwrap()
            .commands
            .contains(&"FETCH 2:*".to_string())
    );
}

#[tokio::test]
async fn test_mutations_report_success() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;
    let id = Some(session_id.as_str());

    assert!(service.set_read(id, 101, "INBOX").await.success);
    assert!(service.set_starred(id, 101, "INBOX", true).await.success);
    assert!(service.set_starred(id, 101, "INBOX", true).await.success);
    assert!(service.set_unread(id, 101, "INBOX").await.success);
    assert!(service.copy_message(id, 101, "INBOX", "Work").await.success);
    assert!(service.move_message(id, 102, "INBOX", "Trash").await.success);
    assert!(service.delete_message(id, 103, "INBOX").await.success);

    let state = connector.mailbox.lock().unwrap();
    let flags = &state.message("INBOX", 101).unwrap().flags;
    assert!(flags.contains("\\Flagged"));
    assert!(!flags.contains("\\Seen"));
    assert_eq!(state.folder("INBOX").len(), 1);
}

#[tokio::test]
async fn test_mutation_validation() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;
    let id = Some(session_id.as_str());

    assert_eq!(service.move_message(id, 101, "INBOX", " ").await.status, 400);
    assert_eq!(service.delete_message(id, 0, "INBOX").await.status, 400);
}

#[tokio::test]
async fn test_failed_delete_envelope() {
    let mut state = sample_state();
    state.fail_expunge = true;
    let connector = MockConnector::new(state);
    let (service, session_id) = connected(&connector).await;

    let response = service.delete_message(Some(&session_id), 101, "INBOX").await;
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Failed to delete message");
    assert!(json["details"].as_str().unwrap().contains("not expunged"));
    assert_eq!(response.status, 502);
}

#[tokio::test]
async fn test_get_message() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;

    let response = service.get_message(Some(&session_id), 102, "INBOX").await;
    let message = response.data.unwrap();
    assert_eq!(message.subject, "Newest");
    assert!(message.text.contains("third body"));
}

#[tokio::test]
async fn test_send_message_uses_session_sender() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;

    let request = SendRequest {
        to: vec!["bob@y.org".to_string()],
        subject: Some("Report".to_string()),
        text: Some("See attached.".to_string()),
        attachments: vec![AttachmentUpload {
            name: "r.txt".to_string(),
            mime_type: Some("text/plain".to_string()),
            content_base64: "cmVwb3J0".to_string(),
        }],
        ..SendRequest::default()
    };
    let response = service.send_message(Some(&session_id), &request).await;
    let message_id = response.data.unwrap().message_id;

    let sent = connector.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sender, "alice@x.org");
    assert_eq!(sent[0].message_id, message_id);
    assert!(sent[0].content.contains("Subject: Report"));
}

#[tokio::test]
async fn test_send_message_requires_recipient_and_subject() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;

    let response = service
        .send_message(Some(&session_id), &SendRequest::default())
        .await;
    assert_eq!(response.status, 400);
    assert!(connector.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_disconnect_always_succeeds() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;

    assert!(service.disconnect_session(Some(&session_id)).await.success);
    assert!(service.disconnect_session(Some(&session_id)).await.success);
    assert!(service.disconnect_session(None).await.success);
    assert_eq!(service.list_folders(Some(&session_id)).await.status, 401);
}

#[tokio::test(start_paused = true)]
async fn test_operation_timeout() {
    let mut state = sample_state();
    state.list_delay = Some(Duration::from_secs(120));
    let connector = MockConnector::new(state);
    let config = PipelineConfig {
        operation_timeout_secs: 1,
        ..PipelineConfig::default()
    };
    let service = MailService::new(connector, config);
    let session_id = service
        .connect_session(&Credentials::new("alice@x.org", "pw"))
        .await
        .data
        .unwrap()
        .session_id;

    let response = service.list_folders(Some(&session_id)).await;
    assert!(!response.success);
    assert_eq!(response.status, 502);
    assert!(response.details.unwrap().starts_with("Timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_operations_on_one_session_are_serialized() {
    let connector = MockConnector::new(sample_state());
    let (service, session_id) = connected(&connector).await;

    let handle = service.registry().get("alice@x.org").await.unwrap();
    let guard = handle.lock().await;
    let blocked = tokio::time::timeout(
        Duration::from_secs(5),
        service.list_folders(Some(&session_id)),
    )
    .await;
    assert!(blocked.is_err());

    drop(guard);
    assert!(service.list_folders(Some(&session_id)).await.success);
}
