//! IMAP client.
//!
//! One [`Client`] owns one connection and runs one command at a time. Each
//! command is checked against the current [`ProtocolState`] before it is
//! sent; the untagged data it produces is handed to the command's own
//! collector until the matching tagged completion arrives.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::config::{Config, Security};
use super::framed::FramedStream;
use super::stream::{self, ImapStream, with_timeout};
use crate::command::{Command, FetchAttribute, StoreAction, TagGenerator};
use crate::parser::{Response, ResponseParser, Status, StatusResponse, UntaggedResponse};
use crate::state::{ProtocolState, SelectedState};
use crate::types::{FetchedMessage, ListResponse, MailboxStatus, SeqNum, SequenceSet};
use crate::{Error, Result};

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// An IMAP connection.
#[derive(Debug)]
pub struct Client<S> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    state: ProtocolState,
    capabilities: Vec<String>,
    io_timeout: Duration,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the server greeting from an open transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bye`] if the server refuses the connection, or a
    /// protocol error if the greeting is not a status response.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self {
            stream: FramedStream::new(stream),
            tags: TagGenerator::default(),
            state: ProtocolState::NotAuthenticated,
            capabilities: Vec::new(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        };
        client.read_greeting().await?;
        Ok(client)
    }

    async fn read_greeting(&mut self) -> Result<()> {
        let raw = with_timeout(self.io_timeout, self.stream.read_response()).await?;
        let greeting = match ResponseParser::parse(&raw)? {
            Response::Untagged(UntaggedResponse::Status(status)) => status,
            other => {
                return Err(Error::Protocol(format!("unexpected greeting {other:?}")));
            }
        };
        debug!(status = ?greeting.status, text = %greeting.text, "greeting");

        match greeting.status {
            Status::Ok => self.state = ProtocolState::NotAuthenticated,
            Status::PreAuth => self.state = ProtocolState::Authenticated,
            Status::Bye => {
                self.state = ProtocolState::Logout;
                return Err(Error::Bye(greeting.text));
            }
            Status::No | Status::Bad => {
                return Err(Error::Protocol(format!("greeting rejected: {}", greeting.text)));
            }
        }
        self.remember_capabilities(&greeting);
        Ok(())
    }

    /// Sets the limit applied to each read and write.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// Capabilities last announced by the server.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Returns `true` if the server announced `name`.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Asks the server for its capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn capability(&mut self) -> Result<&[String]> {
        let mut announced = Vec::new();
        self.run(&Command::Capability, |response| {
            if let UntaggedResponse::Capability(caps) = response {
                announced = caps;
            }
        })
        .await?;
        self.capabilities = announced;
        Ok(&self.capabilities)
    }

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] for rejected credentials and
    /// [`Error::InvalidState`] if already logged in.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.state.require_not_authenticated()?;
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        let mut announced = None;
        let done = self
            .run(&command, |response| {
                if let UntaggedResponse::Capability(caps) = response {
                    announced = Some(caps);
                }
            })
            .await?;

        self.state = ProtocolState::Authenticated;
        if let Some(caps) = announced {
            self.capabilities = caps;
        } else {
            self.remember_capabilities(&done);
        }
        info!(user = %username, "logged in");
        Ok(())
    }

    /// Lists mailboxes matching `pattern` below `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in or the command fails.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.state.require_authenticated()?;
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let mut mailboxes = Vec::new();
        self.run(&command, |response| {
            if let UntaggedResponse::List(entry) = response {
                mailboxes.push(entry);
            }
        })
        .await?;
        Ok(mailboxes)
    }

    /// Opens `mailbox` read-write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] if the mailbox does not exist. The previous
    /// mailbox is closed either way.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        self.open(
            Command::Select {
                mailbox: mailbox.to_string(),
            },
            mailbox,
        )
        .await
    }

    /// Opens `mailbox` read-only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] if the mailbox does not exist.
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        self.open(
            Command::Examine {
                mailbox: mailbox.to_string(),
            },
            mailbox,
        )
        .await
    }

    async fn open(&mut self, command: Command, mailbox: &str) -> Result<MailboxStatus> {
        self.state.require_authenticated()?;
        let read_only = matches!(command, Command::Examine { .. });

        let mut status = MailboxStatus::default();
        let result = self
            .run(&command, |response| match response {
                UntaggedResponse::Exists(n) => status.exists = n,
                UntaggedResponse::Recent(n) => status.recent = n,
                UntaggedResponse::Flags(flags) => status.flags = flags,
                UntaggedResponse::Status(s) => {
                    if let Some(v) = s.code_value("UIDVALIDITY").and_then(|v| v.parse().ok()) {
                        status.uid_validity = Some(v);
                    }
                    if let Some(v) = s.code_value("UIDNEXT").and_then(|v| v.parse().ok()) {
                        status.uid_next = Some(v);
                    }
                }
                _ => {}
            })
            .await;

        let done = match result {
            Ok(done) => done,
            Err(e) => {
                if self.state.is_authenticated() {
                    self.state = ProtocolState::Authenticated;
                }
                return Err(e);
            }
        };

        status.read_only = read_only || done.has_code("READ-ONLY");
        self.state = ProtocolState::Selected(SelectedState {
            mailbox: mailbox.to_string(),
            read_only: status.read_only,
        });
        debug!(mailbox, exists = status.exists, read_only = status.read_only, "mailbox open");
        Ok(status)
    }

    /// The open mailbox, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&SelectedState> {
        self.state.selected()
    }

    /// Fetches `items` for `sequence`, handing each message to `on_message`
    /// as soon as its response arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the command fails. Messages
    /// delivered before the failure have already been passed on.
    pub async fn fetch_each<F>(
        &mut self,
        sequence: &SequenceSet,
        items: &[FetchAttribute],
        uid: bool,
        mut on_message: F,
    ) -> Result<()>
    where
        F: FnMut(FetchedMessage),
    {
        self.state.require_selected()?;
        let command = Command::Fetch {
            sequence: sequence.clone(),
            items: items.to_vec(),
            uid,
        };
        self.run(&command, |response| {
            if let UntaggedResponse::Fetch(message) = response {
                on_message(message);
            }
        })
        .await?;
        Ok(())
    }

    /// Fetches `items` for `sequence` and returns all messages.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the command fails.
    pub async fn fetch(
        &mut self,
        sequence: &SequenceSet,
        items: &[FetchAttribute],
        uid: bool,
    ) -> Result<Vec<FetchedMessage>> {
        let mut messages = Vec::new();
        self.fetch_each(sequence, items, uid, |m| messages.push(m))
            .await?;
        Ok(messages)
    }

    /// Changes flags of the messages with the given UIDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox is read-only or the command fails.
    pub async fn uid_store(&mut self, uids: &SequenceSet, action: StoreAction) -> Result<()> {
        self.state.require_writable()?;
        let command = Command::Store {
            sequence: uids.clone(),
            action,
            uid: true,
            silent: true,
        };
        self.run(&command, |_| {}).await?;
        Ok(())
    }

    /// Copies messages to `mailbox`.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the server rejects the copy.
    pub async fn uid_copy(&mut self, uids: &SequenceSet, mailbox: &str) -> Result<()> {
        self.state.require_selected()?;
        let command = Command::Copy {
            sequence: uids.clone(),
            mailbox: mailbox.to_string(),
            uid: true,
        };
        self.run(&command, |_| {}).await?;
        Ok(())
    }

    /// Moves messages to `mailbox` (RFC 6851).
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox is read-only or the server rejects
    /// the move.
    pub async fn uid_move(&mut self, uids: &SequenceSet, mailbox: &str) -> Result<()> {
        self.state.require_writable()?;
        let command = Command::Move {
            sequence: uids.clone(),
            mailbox: mailbox.to_string(),
            uid: true,
        };
        self.run(&command, |_| {}).await?;
        Ok(())
    }

    /// Permanently removes `\Deleted` messages and returns the sequence
    /// numbers the server reported as expunged.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox is read-only or the command fails.
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        self.state.require_writable()?;
        let mut expunged = Vec::new();
        self.run(&Command::Expunge, |response| {
            if let UntaggedResponse::Expunge(seq) = response {
                expunged.push(seq);
            }
        })
        .await?;
        Ok(expunged)
    }

    /// Closes the open mailbox without reporting expunges.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the command fails.
    pub async fn close(&mut self) -> Result<()> {
        self.state.require_selected()?;
        self.run(&Command::Close, |_| {}).await?;
        self.state = ProtocolState::Authenticated;
        Ok(())
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is gone.
    pub async fn noop(&mut self) -> Result<()> {
        self.run(&Command::Noop, |_| {}).await?;
        Ok(())
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if LOGOUT could not be sent or completed.
    pub async fn logout(mut self) -> Result<()> {
        let result = self.run(&Command::Logout, |_| {}).await;
        self.state = ProtocolState::Logout;
        result.map(|_| ())
    }

    fn remember_capabilities(&mut self, status: &StatusResponse) {
        if let Some(caps) = status.code_value("CAPABILITY") {
            self.capabilities = caps.split_whitespace().map(str::to_string).collect();
        }
    }

    /// Sends one command and feeds its untagged responses to `on_untagged`
    /// until the tagged completion arrives.
    async fn run<F>(&mut self, command: &Command, mut on_untagged: F) -> Result<StatusResponse>
    where
        F: FnMut(UntaggedResponse),
    {
        if self.state == ProtocolState::Logout {
            return Err(Error::InvalidState("connection is logged out".to_string()));
        }

        let tag = self.tags.next_tag();
        debug!(tag = %tag, command = command.name(), "sending");
        let wire = command.serialize(&tag);
        with_timeout(self.io_timeout, self.stream.write_all(&wire)).await?;

        let logging_out = matches!(command, Command::Logout);
        // Reading continues to the completion so the stream stays in sync,
        // then the first unparsable response fails the command.
        let mut unparsable = None;
        loop {
            let raw = with_timeout(self.io_timeout, self.stream.read_response()).await?;
            let response = match ResponseParser::parse(&raw) {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, line = %String::from_utf8_lossy(&raw).trim_end(), "unparsable response");
                    unparsable.get_or_insert(e);
                    continue;
                }
            };

            match response {
                Response::Tagged { tag: done, status } if done == tag => {
                    debug!(tag = %tag, status = ?status.status, "completed");
                    return match (status.status, unparsable) {
                        (Status::Ok, None) => Ok(status),
                        (Status::Ok, Some(e)) => Err(e),
                        _ => Err(status.into()),
                    };
                }
                Response::Tagged { tag: other, .. } => {
                    warn!(expected = %tag, got = %other, "ignoring completion for unknown tag");
                }
                Response::Untagged(UntaggedResponse::Status(status))
                    if status.status == Status::Bye =>
                {
                    if !logging_out {
                        self.state = ProtocolState::Logout;
                        return Err(Error::Bye(status.text));
                    }
                }
                Response::Untagged(untagged) => on_untagged(untagged),
                Response::Continuation(text) => {
                    return Err(Error::Protocol(format!(
                        "unexpected continuation request: {text}"
                    )));
                }
            }
        }
    }
}

impl Client<ImapStream> {
    /// Connects as described by `config`, upgrading with STARTTLS when
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns an error on DNS, TCP or TLS failure, a refused greeting, or
    /// timeout.
    pub async fn connect(config: &Config) -> Result<Self> {
        let transport = stream::connect(config).await?;
        let client = with_timeout(config.connect_timeout, Self::from_stream(transport))
            .await?
            .with_timeout(config.io_timeout);
        if config.security == Security::StartTls {
            return client.starttls(&config.host).await;
        }
        Ok(client)
    }

    /// Upgrades the connection to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not support STARTTLS, the
    /// connection is already encrypted, or the handshake fails.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        self.state.require_not_authenticated()?;
        self.run(&Command::StartTls, |_| {}).await?;

        let transport = self.stream.into_inner().upgrade_to_tls(host).await?;
        let mut client = Self {
            stream: FramedStream::new(transport),
            tags: self.tags,
            state: ProtocolState::NotAuthenticated,
            capabilities: Vec::new(),
            io_timeout: self.io_timeout,
        };
        client.capability().await?;
        Ok(client)
    }
}
