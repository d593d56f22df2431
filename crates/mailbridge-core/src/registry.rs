//! Per-user session registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::model::CredentialCheck;
use crate::protocol::{Connector, MailboxProtocol, SubmissionProtocol};

/// Authenticated protocol handles of one user.
pub struct Session<C: Connector> {
    /// Registry key.
    pub user_id: String,
    /// Mailbox connection.
    pub mailbox: C::Mailbox,
    /// Submission handle.
    pub submission: C::Submission,
    /// When the session was established.
    pub created_at: DateTime<Utc>,
}

impl<C: Connector> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Session<C> {
    async fn close(&mut self) {
        if let Err(e) = self.mailbox.close().await {
            warn!(user = %self.user_id, error = %e, "closing mailbox connection failed");
        }
        if let Err(e) = self.submission.close().await {
            warn!(user = %self.user_id, error = %e, "closing submission handle failed");
        }
    }
}

/// Shared handle to a session. Holding the lock serializes operations.
pub type SessionHandle<C> = Arc<Mutex<Session<C>>>;

/// Maps user ids to at most one live session each.
pub struct SessionRegistry<C: Connector> {
    connector: C,
    sessions: RwLock<HashMap<String, SessionHandle<C>>>,
    test_timeout: Duration,
}

impl<C: Connector> std::fmt::Debug for SessionRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("test_timeout", &self.test_timeout)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> SessionRegistry<C> {
    /// Creates an empty registry. Credential tests are bounded by
    /// `test_timeout` per protocol.
    #[must_use]
    pub fn new(connector: C, test_timeout: Duration) -> Self {
        Self {
            connector,
            sessions: RwLock::new(HashMap::new()),
            test_timeout,
        }
    }

    /// Opens the mailbox connection and verifies the submission
    /// credentials, then registers the session, closing any previous one
    /// for `user_id`. Nothing is registered when either side fails.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unusable configuration and a
    /// connection error when either server cannot be reached or refuses
    /// the credentials.
    pub async fn connect(&self, user_id: &str, config: &ServerConfig) -> Result<SessionHandle<C>> {
        config.validate()?;
        debug!(user = %user_id, mailbox = %config.mailbox.host, submission = %config.submission.host, "connecting session");

        let (mailbox, submission) = tokio::join!(
            self.connector.open_mailbox(&config.mailbox),
            self.connector.open_submission(&config.submission),
        );
        let (mailbox, submission) = match (mailbox, submission) {
            (Ok(mailbox), Ok(submission)) => (mailbox, submission),
            (Ok(mut mailbox), Err(e)) => {
                if let Err(close_error) = mailbox.close().await {
                    warn!(user = %user_id, error = %close_error, "closing mailbox connection failed");
                }
                return Err(e.into_connection());
            }
            (Err(e), Ok(mut submission)) => {
                if let Err(close_error) = submission.close().await {
                    warn!(user = %user_id, error = %close_error, "closing submission handle failed");
                }
                return Err(e.into_connection());
            }
            (Err(e), Err(_)) => return Err(e.into_connection()),
        };

        let session = Arc::new(Mutex::new(Session {
            user_id: user_id.to_string(),
            mailbox,
            submission,
            created_at: Utc::now(),
        }));
        let previous = self
            .sessions
            .write()
            .await
            .insert(user_id.to_string(), Arc::clone(&session));

        if let Some(previous) = previous {
            info!(user = %user_id, "replacing existing session");
            previous.lock().await.close().await;
        }
        info!(user = %user_id, "session connected");
        Ok(session)
    }

    /// Looks up the session of `user_id`.
    pub async fn get(&self, user_id: &str) -> Option<SessionHandle<C>> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// Closes and removes the session of `user_id`. Does nothing when there
    /// is none.
    pub async fn disconnect(&self, user_id: &str) {
        let removed = self.sessions.write().await.remove(user_id);
        if let Some(session) = removed {
            session.lock().await.close().await;
            info!(user = %user_id, "session disconnected");
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Connects to both servers concurrently and closes again without
    /// registering anything. Each side is bounded by the test timeout.
    pub async fn test_credentials(&self, config: &ServerConfig) -> CredentialCheck {
        let limit = self.test_timeout;
        let mailbox = async {
            match tokio::time::timeout(limit, self.connector.open_mailbox(&config.mailbox)).await {
                Ok(Ok(mut mailbox)) => {
                    if let Err(e) = mailbox.close().await {
                        warn!(error = %e, "closing mailbox test connection failed");
                    }
                    true
                }
                Ok(Err(e)) => {
                    debug!(host = %config.mailbox.host, error = %e, "mailbox credential test failed");
                    false
                }
                Err(_) => {
                    debug!(host = %config.mailbox.host, ?limit, "mailbox credential test timed out");
                    false
                }
            }
        };
        let submission = async {
            match tokio::time::timeout(limit, self.connector.open_submission(&config.submission))
                .await
            {
                Ok(Ok(mut submission)) => {
                    if let Err(e) = submission.close().await {
                        warn!(error = %e, "closing submission test handle failed");
                    }
                    true
                }
                Ok(Err(e)) => {
                    debug!(host = %config.submission.host, error = %e, "submission credential test failed");
                    false
                }
                Err(_) => {
                    debug!(host = %config.submission.host, ?limit, "submission credential test timed out");
                    false
                }
            }
        };

        let (mailbox_ok, submission_ok) = tokio::join!(mailbox, submission);
        CredentialCheck {
            mailbox_ok,
            submission_ok,
        }
    }
}
