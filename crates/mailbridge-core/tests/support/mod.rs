//! Scripted in-memory protocol implementations.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mailbridge_core::{
    Connector, EndpointConfig, Error, FetchEvent, FolderNode, MailboxProtocol, MessageFlag, Result,
    SelectedFolder, SubmissionProtocol,
};
use mailbridge_mime::ComposedMessage;
use tokio::sync::mpsc::UnboundedSender;

/// One stored message.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub uid: u32,
    pub headers: Vec<u8>,
    pub preview: Vec<u8>,
    pub flags: BTreeSet<String>,
    pub internal_date: Option<String>,
    pub size: u32,
    pub raw: Vec<u8>,
}

impl StoredMessage {
    pub fn new(uid: u32, subject: &str, date: &str, body: &str) -> Self {
        let headers = format!(
            "From: sender{uid}@x.org\r\nTo: alice@x.org\r\nSubject: {subject}\r\nDate: {date}\r\nMessage-ID: <{uid}@x.org>\r\n\r\n"
        );
        let raw = format!("{headers}{body}");
        Self {
            uid,
            headers: headers.into_bytes(),
            preview: body.as_bytes().to_vec(),
            flags: BTreeSet::new(),
            internal_date: None,
            size: u32::try_from(raw.len()).unwrap(),
            raw: raw.into_bytes(),
        }
    }
}

/// Server-side state shared by every handle a connector opens.
#[derive(Debug, Default)]
pub struct MailboxState {
    pub folders: Vec<FolderNode>,
    pub messages: BTreeMap<String, Vec<StoredMessage>>,
    pub selected: Option<(String, bool)>,
    pub commands: Vec<String>,
    pub fetches: usize,
    pub fail_expunge: bool,
    pub fail_fetch_after: Option<usize>,
    pub omit_preview_for: Option<u32>,
    pub list_delay: Option<Duration>,
    pub closed: usize,
}

impl MailboxState {
    pub fn folder(&self, name: &str) -> &[StoredMessage] {
        self.messages.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn message(&self, folder: &str, uid: u32) -> Option<&StoredMessage> {
        self.folder(folder).iter().find(|m| m.uid == uid)
    }

    fn selected(&self) -> Result<(String, bool)> {
        self.selected
            .clone()
            .ok_or_else(|| Error::Protocol("no folder selected".to_string()))
    }

    fn selected_messages(&mut self) -> Result<&mut Vec<StoredMessage>> {
        let (folder, _) = self.selected()?;
        Ok(self.messages.entry(folder).or_default())
    }

    fn require_writable(&self) -> Result<()> {
        match self.selected()? {
            (_, true) => Err(Error::Protocol("folder is read-only".to_string())),
            (_, false) => Ok(()),
        }
    }
}

/// Mailbox handle backed by [`MailboxState`].
#[derive(Debug, Clone)]
pub struct MockMailbox {
    pub state: Arc<Mutex<MailboxState>>,
}

impl MailboxProtocol for MockMailbox {
    async fn folder_tree(&mut self) -> Result<Vec<FolderNode>> {
        let delay = self.state.lock().unwrap().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.commands.push("LIST".to_string());
        Ok(state.folders.clone())
    }

    async fn select(&mut self, folder: &str, read_only: bool) -> Result<SelectedFolder> {
        let mut state = self.state.lock().unwrap();
        state
            .commands
            .push(format!("{} {folder}", if read_only { "EXAMINE" } else { "SELECT" }));
        let Some(messages) = state.messages.get(folder) else {
            state.selected = None;
            return Err(Error::Protocol(format!("no such folder {folder}")));
        };
        let total = u32::try_from(messages.len()).unwrap();
        state.selected = Some((folder.to_string(), read_only));
        Ok(SelectedFolder { total, read_only })
    }

    async fn fetch_summaries(&mut self, start: u32, events: UnboundedSender<FetchEvent>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;
        state.commands.push(format!("FETCH {start}:*"));
        let fail_after = state.fail_fetch_after;
        let omit_preview_for = state.omit_preview_for;
        let (folder, _) = state.selected()?;
        let messages = state.folder(&folder).to_vec();

        let mut sent = 0;
        for (index, message) in messages.iter().enumerate() {
            let seq = u32::try_from(index + 1).unwrap();
            if seq < start {
                continue;
            }
            if fail_after == Some(sent) {
                return Err(Error::Protocol("connection reset".to_string()));
            }
            // Facets arrive in a different order for every other message.
            let attributes = FetchEvent::Attributes {
                seq,
                uid: Some(message.uid),
                flags: Some(message.flags.iter().cloned().collect()),
                internal_date: message.internal_date.clone(),
                size: Some(message.size),
            };
            if seq % 2 == 0 {
                events.send(attributes.clone()).unwrap();
            }
            if omit_preview_for != Some(message.uid) {
                events
                    .send(FetchEvent::Preview {
                        seq,
                        bytes: message.preview.clone(),
                    })
                    .unwrap();
            }
            events
                .send(FetchEvent::Headers {
                    seq,
                    bytes: message.headers.clone(),
                })
                .unwrap();
            if seq % 2 == 1 {
                events.send(attributes).unwrap();
            }
            sent += 1;
        }
        Ok(())
    }

    async fn fetch_raw(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(format!("UID FETCH {uid} BODY.PEEK[]"));
        let (folder, _) = state.selected()?;
        Ok(state.message(&folder, uid).map(|m| m.raw.clone()))
    }

    async fn store_flag(&mut self, uid: u32, flag: MessageFlag, add: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.require_writable()?;
        state.commands.push(format!(
            "UID STORE {uid} {}FLAGS ({})",
            if add { '+' } else { '-' },
            flag.as_str()
        ));
        if let Some(message) = state
            .selected_messages()?
            .iter_mut()
            .find(|m| m.uid == uid)
        {
            if add {
                message.flags.insert(flag.as_str().to_string());
            } else {
                message.flags.remove(flag.as_str());
            }
        }
        Ok(())
    }

    async fn copy(&mut self, uid: u32, to: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(format!("UID COPY {uid} {to}"));
        let (folder, _) = state.selected()?;
        let message = state
            .message(&folder, uid)
            .cloned()
            .ok_or_else(|| Error::Protocol(format!("no message {uid}")))?;
        let target = state
            .messages
            .get_mut(to)
            .ok_or_else(|| Error::Protocol(format!("no such folder {to}")))?;
        let next_uid = target.iter().map(|m| m.uid).max().unwrap_or(0) + 1;
        target.push(StoredMessage {
            uid: next_uid,
            ..message
        });
        Ok(())
    }

    async fn move_to(&mut self, uid: u32, to: &str) -> Result<()> {
        self.copy(uid, to).await?;
        let mut state = self.state.lock().unwrap();
        state.require_writable()?;
        if let Some(last) = state.commands.last_mut() {
            *last = format!("UID MOVE {uid} {to}");
        }
        state.selected_messages()?.retain(|m| m.uid != uid);
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.require_writable()?;
        state.commands.push("EXPUNGE".to_string());
        if state.fail_expunge {
            return Err(Error::Protocol("EXPUNGE failed".to_string()));
        }
        state
            .selected_messages()?
            .retain(|m| !m.flags.contains("\\Deleted"));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.closed += 1;
        state.selected = None;
        Ok(())
    }
}

/// Submission handle recording what it was asked to send.
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub sent: Arc<Mutex<Vec<ComposedMessage>>>,
    pub closed: Arc<Mutex<usize>>,
}

impl SubmissionProtocol for MockSubmission {
    async fn submit(&mut self, message: &ComposedMessage) -> Result<String> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(message.message_id.clone())
    }

    async fn close(&mut self) -> Result<()> {
        *self.closed.lock().unwrap() += 1;
        Ok(())
    }
}

/// Connector handing out handles over shared mock state.
#[derive(Debug, Clone)]
pub struct MockConnector {
    pub mailbox: Arc<Mutex<MailboxState>>,
    pub sent: Arc<Mutex<Vec<ComposedMessage>>>,
    pub submission_closed: Arc<Mutex<usize>>,
    pub reject_password: Option<String>,
    pub submission_down: bool,
    pub mailbox_delay: Option<Duration>,
    pub opened: Arc<Mutex<usize>>,
}

impl MockConnector {
    pub fn new(state: MailboxState) -> Self {
        Self {
            mailbox: Arc::new(Mutex::new(state)),
            sent: Arc::default(),
            submission_closed: Arc::default(),
            reject_password: None,
            submission_down: false,
            mailbox_delay: None,
            opened: Arc::default(),
        }
    }

    pub fn mailbox(&self) -> MockMailbox {
        MockMailbox {
            state: Arc::clone(&self.mailbox),
        }
    }
}

impl Connector for MockConnector {
    type Mailbox = MockMailbox;
    type Submission = MockSubmission;

    async fn open_mailbox(&self, config: &EndpointConfig) -> Result<Self::Mailbox> {
        if let Some(delay) = self.mailbox_delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject_password.as_deref() == Some(config.password.as_str()) {
            return Err(Error::Protocol("LOGIN failed".to_string()));
        }
        *self.opened.lock().unwrap() += 1;
        Ok(self.mailbox())
    }

    async fn open_submission(&self, config: &EndpointConfig) -> Result<Self::Submission> {
        if self.submission_down {
            return Err(Error::Connection(format!("{}: connection refused", config.host)));
        }
        Ok(MockSubmission {
            sent: Arc::clone(&self.sent),
            closed: Arc::clone(&self.submission_closed),
        })
    }
}

/// A mailbox with an inbox, a sent folder and a nested work folder.
pub fn sample_state() -> MailboxState {
    let mut work = FolderNode::leaf("Work", Some('/'));
    work.children = vec![FolderNode::leaf("Clients", Some('/'))];
    let folders = vec![
        FolderNode::leaf("Zeta", Some('/')),
        FolderNode::leaf("INBOX", Some('/')),
        FolderNode::leaf("Sent Items", Some('/')),
        work,
        FolderNode::leaf("Trash", Some('/')),
    ];

    let inbox = vec![
        StoredMessage::new(101, "Oldest", "Mon, 1 Jan 2024 09:00:00 +0000", "first body"),
        StoredMessage::new(102, "Newest", "Wed, 3 Jan 2024 09:00:00 +0000", "third body"),
        StoredMessage::new(103, "Middle", "Tue, 2 Jan 2024 09:00:00 +0000", "second body"),
    ];

    let mut messages = BTreeMap::new();
    messages.insert("INBOX".to_string(), inbox);
    messages.insert("Sent Items".to_string(), Vec::new());
    messages.insert("Zeta".to_string(), Vec::new());
    messages.insert("Work".to_string(), Vec::new());
    messages.insert("Work/Clients".to_string(), Vec::new());
    messages.insert("Trash".to_string(), Vec::new());

    MailboxState {
        folders,
        messages,
        ..MailboxState::default()
    }
}
