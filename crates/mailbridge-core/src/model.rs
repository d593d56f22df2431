//! Plain data handed to the UI layer.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Well-known folder role, derived from the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    /// Incoming mail.
    Inbox,
    /// Sent mail.
    Sent,
    /// Drafts.
    Drafts,
    /// Deleted items.
    Trash,
    /// Junk mail.
    Spam,
    /// Archive.
    Archive,
    /// Any other folder.
    Other,
}

impl FolderKind {
    /// Detects the folder role from its full name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower == "inbox" {
            Self::Inbox
        } else if lower.contains("sent") {
            Self::Sent
        } else if lower.contains("draft") {
            Self::Drafts
        } else if lower.contains("trash") || lower.contains("deleted") {
            Self::Trash
        } else if lower.contains("spam") || lower.contains("junk") {
            Self::Spam
        } else if lower.contains("archive") {
            Self::Archive
        } else {
            Self::Other
        }
    }
}

/// One folder with its qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDescriptor {
    /// Qualified name, `Parent<delim>Child`.
    pub full_name: String,
    /// Hierarchy delimiter reported by the server.
    pub delimiter: Option<char>,
    /// Whether the folder has sub-folders.
    pub has_children: bool,
    /// Folder role.
    pub kind: FolderKind,
}

/// A listed message without its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    /// Position in the folder at fetch time.
    pub sequence_number: u32,
    /// Unique identifier.
    pub uid: u32,
    /// Flags as sent by the server (`\Seen`, `\Flagged`, keywords).
    pub flags: BTreeSet<String>,
    /// Header date, falling back to the arrival date.
    pub date: Option<DateTime<Utc>>,
    /// Decoded sender.
    pub from: String,
    /// Decoded recipients.
    pub to: String,
    /// Decoded subject.
    pub subject: String,
    /// `Message-ID` header.
    pub message_id: Option<String>,
    /// `RFC822.SIZE`.
    pub size_bytes: u32,
    /// Whitespace-collapsed start of the body.
    pub preview_text: String,
}

impl MessageSummary {
    /// Whether `\Seen` is set.
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case("\\Seen"))
    }

    /// Whether `\Flagged` is set.
    #[must_use]
    pub fn is_starred(&self) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case("\\Flagged"))
    }
}

/// Flags the mailbox operations change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFlag {
    /// `\Seen`.
    Seen,
    /// `\Flagged`.
    Flagged,
    /// `\Deleted`.
    Deleted,
}

impl MessageFlag {
    /// Wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
        }
    }
}

/// Result of a credential test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCheck {
    /// Whether the mailbox server accepted the credentials.
    pub mailbox_ok: bool,
    /// Whether the submission server accepted the credentials.
    pub submission_ok: bool,
}

impl CredentialCheck {
    /// Both servers accepted the credentials.
    #[must_use]
    pub const fn all_ok(self) -> bool {
        self.mailbox_ok && self.submission_ok
    }
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
    fn test_folder_kind_from_name() {
        assert_eq!(FolderKind::from_name("INBOX"), FolderKind::Inbox);
        assert_eq!(FolderKind::from_name("Sent Items"), FolderKind::Sent);
        assert_eq!(FolderKind::from_name("[Gmail]/Drafts"), FolderKind::Drafts);
        assert_eq!(FolderKind::from_name("Deleted Messages"), FolderKind::Trash);
        assert_eq!(FolderKind::from_name("Junk"), FolderKind::Spam);
        assert_eq!(FolderKind::from_name("Archive/2023"), FolderKind::Archive);
        assert_eq!(FolderKind::from_name("Receipts"), FolderKind::Other);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = MessageSummary {
            sequence_number: 3,
            uid: 42,
            flags: BTreeSet::from(["\\Seen".to_string()]),
            date: None,
            from: "a@x.org".to_string(),
            to: "b@x.org".to_string(),
            subject: "Hi".to_string(),
            message_id: None,
            size_bytes: 120,
            preview_text: "Hello".to_string(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["sequenceNumber"], 3);
        assert_eq!(json["sizeBytes"], 120);
        assert_eq!(json["previewText"], "Hello");
        assert!(summary.is_read());
        assert!(!summary.is_starred());
    }

    #[test]
    fn test_credential_check() {
        let check = CredentialCheck {
            mailbox_ok: true,
            submission_ok: false,
        };
        assert!(!check.all_ok());
        assert_eq!(
            serde_json::to_string(&check).unwrap(),
            r#"{"mailboxOk":true,"submissionOk":false}"#
        );
    }
}
