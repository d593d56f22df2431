//! Control- and data-plane operations for the UI layer.
//!
//! Every operation returns an [`ApiResponse`] envelope and never an error:
//! failures are caught here and reported as `success: false` with a short
//! `error` label and the underlying cause in `details`.

use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use mailbridge_mime::{DecodedMessage, Decoder, MessageBuilder, OutgoingAttachment};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{EndpointSettings, PipelineConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::mailbox;
use crate::model::{CredentialCheck, FolderDescriptor, MessageSummary};
use crate::protocol::{Connector, SubmissionProtocol};
use crate::registry::{SessionHandle, SessionRegistry};

/// Folder listed when the caller names none.
pub const DEFAULT_FOLDER: &str = "INBOX";

/// Response envelope of every service operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Short failure label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// HTTP-style status for the transport layer.
    #[serde(skip)]
    pub status: u16,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            status: 200,
        }
    }

    /// Successful response without a payload.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            details: None,
            status: 200,
        }
    }

    /// Failed response labelled `context`.
    #[must_use]
    pub fn failure(context: &str, error: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(context.to_string()),
            details: Some(error.to_string()),
            status: error.status_code(),
        }
    }

    fn from_result(context: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                warn!(context, status = e.status_code(), error = %e, "operation failed");
                Self::failure(context, &e)
            }
        }
    }
}

impl ApiResponse<()> {
    fn from_unit(context: &str, result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::empty(),
            Err(e) => {
                warn!(context, status = e.status_code(), error = %e, "operation failed");
                Self::failure(context, &e)
            }
        }
    }
}

/// Login details for connection tests and new sessions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Credentials {
    /// Email address, also the login name.
    pub email: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Mailbox server override.
    pub mailbox_config: Option<EndpointSettings>,
    /// Submission server override.
    pub submission_config: Option<EndpointSettings>,
}

impl Credentials {
    /// Credentials with guessed servers.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    fn server_config(&self) -> Result<ServerConfig> {
        let email = self.email.as_deref().ok_or_else(|| Error::missing("email"))?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| Error::missing("password"))?;
        ServerConfig::from_email(
            email,
            password,
            self.mailbox_config.as_ref(),
            self.submission_config.as_ref(),
        )
    }
}

/// Payload of a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Opaque session key for the data-plane operations.
    pub session_id: String,
}

/// An attachment as uploaded by the UI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttachmentUpload {
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Content, standard base64.
    pub content_base64: String,
}

/// A message to send.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendRequest {
    /// `To` recipients.
    pub to: Vec<String>,
    /// `Cc` recipients.
    pub cc: Vec<String>,
    /// `Bcc` recipients.
    pub bcc: Vec<String>,
    /// Subject.
    pub subject: Option<String>,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Attachments.
    pub attachments: Vec<AttachmentUpload>,
}

impl SendRequest {
    fn builder(&self, sender: &str) -> Result<MessageBuilder> {
        if self.to.iter().all(|to| to.trim().is_empty()) {
            return Err(Error::missing("to"));
        }
        let subject = self
            .subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::missing("subject"))?;

        let mut builder = MessageBuilder::new().from(sender).subject(subject);
        for to in self.to.iter().filter(|to| !to.trim().is_empty()) {
            builder = builder.to(to.trim());
        }
        for cc in &self.cc {
            builder = builder.cc(cc.trim());
        }
        for bcc in &self.bcc {
            builder = builder.bcc(bcc.trim());
        }
        if let Some(text) = &self.text {
            builder = builder.text_body(text);
        }
        if let Some(html) = &self.html {
            builder = builder.html_body(html);
        }
        for upload in &self.attachments {
            let content = STANDARD
                .decode(upload.content_base64.trim())
                .map_err(|e| Error::validation("attachments", format!("{}: {e}", upload.name)))?;
            builder = builder.attach(OutgoingAttachment {
                name: upload.name.clone(),
                mime_type: upload
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                content,
            });
        }
        Ok(builder)
    }
}

/// Payload of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    /// `Message-ID` of the submitted message.
    pub message_id: String,
}

/// Encodes an email address as a session id.
#[must_use]
pub fn encode_session_id(email: &str) -> String {
    URL_SAFE_NO_PAD.encode(email.as_bytes())
}

/// Recovers the email address from a session id.
#[must_use]
pub fn decode_session_id(session_id: &str) -> Option<String> {
    URL_SAFE_NO_PAD
        .decode(session_id.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|email| !email.is_empty())
}

/// The mail service: session registry, decoder and settings.
pub struct MailService<C: Connector> {
    registry: SessionRegistry<C>,
    decoder: Decoder,
    config: PipelineConfig,
}

impl<C: Connector> std::fmt::Debug for MailService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailService")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> MailService<C> {
    /// Creates a service using `connector` for all connections.
    #[must_use]
    pub fn new(connector: C, config: PipelineConfig) -> Self {
        Self {
            registry: SessionRegistry::new(connector, config.connect_test_timeout()),
            decoder: Decoder::new(&config.decoder_config()),
            config,
        }
    }

    /// The session registry.
    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry<C> {
        &self.registry
    }

    /// The message decoder.
    #[must_use]
    pub const fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    async fn session(&self, session_id: Option<&str>) -> Result<SessionHandle<C>> {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::missing("sessionId"))?;
        let user_id = decode_session_id(session_id)
            .ok_or_else(|| Error::Auth("invalid session id".to_string()))?;
        self.registry
            .get(&user_id)
            .await
            .ok_or_else(|| Error::Auth("no active session".to_string()))
    }

    async fn bounded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.config.operation_timeout();
        tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| Error::Timeout(limit))?
    }

    /// Checks the credentials against both servers without keeping a
    /// session.
    pub async fn test_connection(&self, credentials: &Credentials) -> ApiResponse<CredentialCheck> {
        let result = async {
            let config = credentials.server_config()?;
            Ok(self.registry.test_credentials(&config).await)
        }
        .await;
        ApiResponse::from_result("Connection test failed", result)
    }

    /// Opens a session and returns its id.
    pub async fn connect_session(&self, credentials: &Credentials) -> ApiResponse<SessionInfo> {
        let result = async {
            let config = credentials.server_config()?;
            let email = config.mailbox.username.clone();
            self.registry.connect(&email, &config).await?;
            Ok(SessionInfo {
                session_id: encode_session_id(&email),
            })
        }
        .await;
        ApiResponse::from_result("Failed to connect", result)
    }

    /// Closes the session. Always succeeds.
    pub async fn disconnect_session(&self, session_id: Option<&str>) -> ApiResponse<()> {
        if let Some(user_id) = session_id.and_then(decode_session_id) {
            self.registry.disconnect(&user_id).await;
        } else {
            debug!("disconnect without a valid session id");
        }
        ApiResponse::empty()
    }

    /// Lists the folders of the session's mailbox.
    pub async fn list_folders(&self, session_id: Option<&str>) -> ApiResponse<Vec<FolderDescriptor>> {
        let result = async {
            let handle = self.session(session_id).await?;
            let mut session = handle.lock().await;
            self.bounded(mailbox::list_folders(&mut session.mailbox))
                .await
        }
        .await;
        ApiResponse::from_result("Failed to list folders", result)
    }

    /// Lists the newest messages of `folder` (default `INBOX`), at most
    /// `limit` (default from the configuration).
    pub async fn list_messages(
        &self,
        session_id: Option<&str>,
        folder: Option<&str>,
        limit: Option<u32>,
    ) -> ApiResponse<Vec<MessageSummary>> {
        let folder = folder
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_FOLDER);
        let limit = limit.unwrap_or(self.config.default_fetch_limit);
        let result = async {
            let handle = self.session(session_id).await?;
            let mut session = handle.lock().await;
            self.bounded(mailbox::fetch_messages(
                &mut session.mailbox,
                &self.decoder,
                folder,
                limit,
                self.config.preview_chars,
            ))
            .await
        }
        .await;
        ApiResponse::from_result("Failed to fetch messages", result)
    }

    /// Fetches and renders one message.
    pub async fn get_message(
        &self,
        session_id: Option<&str>,
        uid: u32,
        folder: &str,
    ) -> ApiResponse<DecodedMessage> {
        let result = async {
            let handle = self.session(session_id).await?;
            require_uid(uid)?;
            let folder = require_folder("folder", folder)?;
            let mut session = handle.lock().await;
            self.bounded(mailbox::fetch_message(
                &mut session.mailbox,
                &self.decoder,
                folder,
                uid,
            ))
            .await
        }
        .await;
        ApiResponse::from_result("Failed to fetch message", result)
    }

    /// Moves a message between folders.
    pub async fn move_message(
        &self,
        session_id: Option<&str>,
        uid: u32,
        from: &str,
        to: &str,
    ) -> ApiResponse<()> {
        let result = async {
            let handle = self.session(session_id).await?;
            require_uid(uid)?;
            let from = require_folder("fromFolder", from)?;
            let to = require_folder("toFolder", to)?;
            let mut session = handle.lock().await;
            self.bounded(mailbox::move_message(&mut session.mailbox, uid, from, to))
                .await
                .map(drop)
        }
        .await;
        ApiResponse::from_unit("Failed to move message", result)
    }

    /// Copies a message to another folder.
    pub async fn copy_message(
        &self,
        session_id: Option<&str>,
        uid: u32,
        from: &str,
        to: &str,
    ) -> ApiResponse<()> {
        let result = async {
            let handle = self.session(session_id).await?;
            require_uid(uid)?;
            let from = require_folder("fromFolder", from)?;
            let to = require_folder("toFolder", to)?;
            let mut session = handle.lock().await;
            self.bounded(mailbox::copy_message(&mut session.mailbox, uid, from, to))
                .await
                .map(drop)
        }
        .await;
        ApiResponse::from_unit("Failed to copy message", result)
    }

    /// Deletes a message permanently.
    pub async fn delete_message(
        &self,
        session_id: Option<&str>,
        uid: u32,
        folder: &str,
    ) -> ApiResponse<()> {
        let result = async {
            let handle = self.session(session_id).await?;
            require_uid(uid)?;
            let folder = require_folder("folder", folder)?;
            let mut session = handle.lock().await;
            self.bounded(mailbox::delete_message(&mut session.mailbox, uid, folder))
                .await
                .map(drop)
        }
        .await;
        ApiResponse::from_unit("Failed to delete message", result)
    }

    /// Marks a message as read.
    pub async fn set_read(&self, session_id: Option<&str>, uid: u32, folder: &str) -> ApiResponse<()> {
        self.change_read(session_id, uid, folder, true).await
    }

    /// Marks a message as unread.
    pub async fn set_unread(
        &self,
        session_id: Option<&str>,
        uid: u32,
        folder: &str,
    ) -> ApiResponse<()> {
        self.change_read(session_id, uid, folder, false).await
    }

    async fn change_read(
        &self,
        session_id: Option<&str>,
        uid: u32,
        folder: &str,
        read: bool,
    ) -> ApiResponse<()> {
        let result = async {
            let handle = self.session(session_id).await?;
            require_uid(uid)?;
            let folder = require_folder("folder", folder)?;
            let mut session = handle.lock().await;
            self.bounded(mailbox::set_read(&mut session.mailbox, uid, folder, read))
                .await
        }
        .await;
        let context = if read {
            "Failed to mark message as read"
        } else {
            "Failed to mark message as unread"
        };
        ApiResponse::from_unit(context, result)
    }

    /// Stars or unstars a message.
    pub async fn set_starred(
        &self,
        session_id: Option<&str>,
        uid: u32,
        folder: &str,
        starred: bool,
    ) -> ApiResponse<()> {
        let result = async {
            let handle = self.session(session_id).await?;
            require_uid(uid)?;
            let folder = require_folder("folder", folder)?;
            let mut session = handle.lock().await;
            self.bounded(mailbox::set_starred(&mut session.mailbox, uid, folder, starred))
                .await
        }
        .await;
        ApiResponse::from_unit("Failed to update star", result)
    }

    /// Composes and submits a message from the session's user.
    pub async fn send_message(
        &self,
        session_id: Option<&str>,
        request: &SendRequest,
    ) -> ApiResponse<SentMessage> {
        let result = async {
            let handle = self.session(session_id).await?;
            let mut session = handle.lock().await;
            let composed = request
                .builder(&session.user_id)?
                .build()
                .map_err(|e| Error::validation("to", e.to_string()))?;
            let message_id = self.bounded(session.submission.submit(&composed)).await?;
            Ok(SentMessage { message_id })
        }
        .await;
        ApiResponse::from_result("Failed to send message", result)
    }
}

fn require_uid(uid: u32) -> Result<()> {
    if uid == 0 {
        return Err(Error::validation("uid", "must be positive"));
    }
    Ok(())
}

fn require_folder<'a>(field: &'static str, folder: &'a str) -> Result<&'a str> {
    let folder = folder.trim();
    if folder.is_empty() {
        return Err(Error::missing(field));
    }
    Ok(folder)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_round_trip() {
        let id = encode_session_id("alice@x.org");
        assert!(!id.contains('='));
        assert_eq!(decode_session_id(&id).as_deref(), Some("alice@x.org"));
        assert!(decode_session_id("!!!").is_none());
        assert!(decode_session_id("").is_none());
    }

    #[test]
    fn test_failure_envelope() {
        let response: ApiResponse<()> =
            ApiResponse::failure("Failed to connect", &Error::Connection("refused".to_string()));
        assert_eq!(response.status, 502);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Failed to connect");
        assert_eq!(json["details"], "Connection failed: refused");
        assert!(json.get("data").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_send_request_validation() {
        let request = SendRequest {
            subject: Some("Hi".to_string()),
            ..SendRequest::default()
        };
        let err = request.builder("alice@x.org").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "to", .. }));

        let request = SendRequest {
            to: vec!["bob@y.org".to_string()],
            ..SendRequest::default()
        };
        let err = request.builder("alice@x.org").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "subject", .. }));

        let request = SendRequest {
            to: vec!["bob@y.org".to_string()],
            subject: Some("Hi".to_string()),
            attachments: vec![AttachmentUpload {
                name: "a.bin".to_string(),
                mime_type: None,
                content_base64: "not base64!".to_string(),
            }],
            ..SendRequest::default()
        };
        let err = request.builder("alice@x.org").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "attachments", .. }));
    }

    #[test]
    fn test_send_request_builds_message() {
        let request = SendRequest {
            to: vec!["bob@y.org".to_string()],
            bcc: vec!["carol@y.org".to_string()],
            subject: Some("Hi".to_string()),
            text: Some("Hello".to_string()),
            attachments: vec![AttachmentUpload {
                name: "a.txt".to_string(),
                mime_type: Some("text/plain".to_string()),
                content_base64: "aGk=".to_string(),
            }],
            ..SendRequest::default()
        };
        let message = request.builder("alice@x.org").unwrap().build().unwrap();
        assert_eq!(message.sender, "alice@x.org");
        assert_eq!(message.recipients, ["bob@y.org", "carol@y.org"]);
        assert!(message.content.contains("multipart/mixed"));
        assert!(!message.content.contains("carol@y.org"));
    }

    #[test]
    fn test_credentials_deserialize() {
        let credentials: Credentials = serde_json::from_str(
            r#"{"email":"alice@x.org","password":"pw","mailboxConfig":{"host":"mail.x.org","port":993,"useTls":true}}"#,
        )
        .unwrap();
        let config = credentials.server_config().unwrap();
        assert_eq!(config.mailbox.host, "mail.x.org");
        assert_eq!(config.submission.host, "smtp.x.org");
    }
}
