//! Seams between the operations and the wire protocols.
//!
//! Mailbox fetches report each message as three independent facet events
//! over a channel; the operation that issued the fetch merges them per
//! sequence number.

use std::future::Future;

use mailbridge_mime::ComposedMessage;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::EndpointConfig;
use crate::error::Result;
use crate::model::MessageFlag;

/// One facet of a fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// The requested header block.
    Headers {
        /// Sequence number.
        seq: u32,
        /// Raw header bytes.
        bytes: Vec<u8>,
    },
    /// The first bytes of the first body part.
    Preview {
        /// Sequence number.
        seq: u32,
        /// Raw content bytes.
        bytes: Vec<u8>,
    },
    /// Message attributes. A response may carry only some of them, such as
    /// an unsolicited flag update; absent items leave earlier values alone.
    Attributes {
        /// Sequence number.
        seq: u32,
        /// Unique identifier.
        uid: Option<u32>,
        /// Full flag set as sent by the server.
        flags: Option<Vec<String>>,
        /// `INTERNALDATE` as sent by the server.
        internal_date: Option<String>,
        /// `RFC822.SIZE`.
        size: Option<u32>,
    },
}

impl FetchEvent {
    /// Sequence number the facet belongs to.
    #[must_use]
    pub const fn seq(&self) -> u32 {
        match self {
            Self::Headers { seq, .. } | Self::Preview { seq, .. } | Self::Attributes { seq, .. } => {
                *seq
            }
        }
    }
}

/// A folder and its sub-folders as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    /// Last path segment.
    pub name: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Whether the folder can be selected.
    pub selectable: bool,
    /// Whether the server flagged the folder as having children.
    pub has_children_attr: bool,
    /// Sub-folders.
    pub children: Vec<Self>,
}

impl FolderNode {
    /// Creates a selectable leaf.
    #[must_use]
    pub fn leaf(name: impl Into<String>, delimiter: Option<char>) -> Self {
        Self {
            name: name.into(),
            delimiter,
            selectable: true,
            has_children_attr: false,
            children: Vec::new(),
        }
    }

    /// Whether the folder has sub-folders.
    #[must_use]
    pub fn has_children(&self) -> bool {
        self.has_children_attr || !self.children.is_empty()
    }
}

/// Result of selecting a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectedFolder {
    /// Number of messages.
    pub total: u32,
    /// Whether the folder was opened read-only.
    pub read_only: bool,
}

/// Stateful connection to a mailbox server.
///
/// One folder is active at a time. Every method except
/// [`folder_tree`](Self::folder_tree) and [`close`](Self::close) acts on
/// the folder chosen by the last [`select`](Self::select).
pub trait MailboxProtocol: Send {
    /// Lists all folders as a tree.
    fn folder_tree(&mut self) -> impl Future<Output = Result<Vec<FolderNode>>> + Send;

    /// Makes `folder` the active folder.
    fn select(
        &mut self,
        folder: &str,
        read_only: bool,
    ) -> impl Future<Output = Result<SelectedFolder>> + Send;

    /// Fetches summaries of messages `start..` of the active folder,
    /// sending three facet events per message to `events`.
    fn fetch_summaries(
        &mut self,
        start: u32,
        events: UnboundedSender<FetchEvent>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetches the full message with the given UID, `None` if absent.
    fn fetch_raw(&mut self, uid: u32) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Adds or removes a flag.
    fn store_flag(
        &mut self,
        uid: u32,
        flag: MessageFlag,
        add: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Copies a message to another folder.
    fn copy(&mut self, uid: u32, to: &str) -> impl Future<Output = Result<()>> + Send;

    /// Moves a message to another folder.
    fn move_to(&mut self, uid: u32, to: &str) -> impl Future<Output = Result<()>> + Send;

    /// Removes messages flagged `\Deleted` from the active folder.
    fn expunge(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Logs out. The handle is unusable afterwards.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Handle for submitting messages.
pub trait SubmissionProtocol: Send {
    /// Submits a message and returns its `Message-ID`.
    fn submit(&mut self, message: &ComposedMessage)
    -> impl Future<Output = Result<String>> + Send;

    /// Releases the handle.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens protocol handles.
pub trait Connector: Send + Sync + 'static {
    /// Mailbox handle type.
    type Mailbox: MailboxProtocol + 'static;
    /// Submission handle type.
    type Submission: SubmissionProtocol + 'static;

    /// Connects and logs in to the mailbox server.
    fn open_mailbox(
        &self,
        config: &EndpointConfig,
    ) -> impl Future<Output = Result<Self::Mailbox>> + Send;

    /// Connects to the submission server and verifies the credentials.
    fn open_submission(
        &self,
        config: &EndpointConfig,
    ) -> impl Future<Output = Result<Self::Submission>> + Send;
}
