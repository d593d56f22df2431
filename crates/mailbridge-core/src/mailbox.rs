//! Mailbox operations over an open mailbox connection.
//!
//! Every operation selects its folder first, so the handle's active folder
//! after a call is the one the call named.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use mailbridge_mime::{DecodedMessage, Decoder};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{FolderDescriptor, FolderKind, MessageFlag, MessageSummary};
use crate::protocol::{FetchEvent, FolderNode, MailboxProtocol};

/// Names that sort right after `INBOX` when contained in a folder name.
const PRIORITY_NAMES: [&str; 6] = ["inbox", "sent", "drafts", "trash", "spam", "archive"];

/// Lists all selectable folders with qualified names, well-known folders
/// first.
///
/// # Errors
///
/// Returns an error if the folder list cannot be retrieved.
pub async fn list_folders<M: MailboxProtocol>(mailbox: &mut M) -> Result<Vec<FolderDescriptor>> {
    let tree = mailbox.folder_tree().await?;
    let mut folders = Vec::new();
    flatten(&tree, None, &mut folders);
    sort_folders(&mut folders);
    debug!(count = folders.len(), "listed folders");
    Ok(folders)
}

fn flatten(nodes: &[FolderNode], parent: Option<&str>, out: &mut Vec<FolderDescriptor>) {
    for node in nodes {
        let full_name = match parent {
            Some(parent) => format!("{parent}{}{}", node.delimiter.unwrap_or('/'), node.name),
            None => node.name.clone(),
        };
        if node.selectable {
            out.push(FolderDescriptor {
                kind: FolderKind::from_name(&full_name),
                full_name: full_name.clone(),
                delimiter: node.delimiter,
                has_children: node.has_children(),
            });
        }
        if !node.children.is_empty() {
            flatten(&node.children, Some(&full_name), out);
        }
    }
}

/// Sort tier of a folder: 0 for `INBOX`, 1 for names containing a
/// well-known folder name, 2 for everything else.
#[must_use]
pub fn folder_tier(name: &str) -> u8 {
    let lower = name.to_lowercase();
    if lower == "inbox" {
        0
    } else if PRIORITY_NAMES.iter().any(|p| lower.contains(p)) {
        1
    } else {
        2
    }
}

/// Sorts folders by tier, then by name.
pub fn sort_folders(folders: &mut [FolderDescriptor]) {
    folders.sort_by(|a, b| {
        folder_tier(&a.full_name)
            .cmp(&folder_tier(&b.full_name))
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
}

/// First sequence number of the newest `limit` messages out of `total`.
#[must_use]
pub const fn window_start(total: u32, limit: u32) -> u32 {
    let start = total.saturating_sub(limit).saturating_add(1);
    if start == 0 { 1 } else { start }
}

#[derive(Debug, Default)]
struct PartialSummary {
    headers: Option<Vec<u8>>,
    preview: Option<Vec<u8>>,
    attributes: Attributes,
}

#[derive(Debug, Default)]
struct Attributes {
    uid: Option<u32>,
    flags: Option<Vec<String>>,
    internal_date: Option<String>,
    size: Option<u32>,
}

impl PartialSummary {
    fn apply(&mut self, event: FetchEvent) {
        match event {
            FetchEvent::Headers { bytes, .. } => self.headers = Some(bytes),
            FetchEvent::Preview { bytes, .. } => self.preview = Some(bytes),
            FetchEvent::Attributes {
                uid,
                flags,
                internal_date,
                size,
                ..
            } => {
                let attributes = &mut self.attributes;
                attributes.uid = uid.or(attributes.uid);
                attributes.flags = flags.or(attributes.flags.take());
                attributes.internal_date = internal_date.or(attributes.internal_date.take());
                attributes.size = size.or(attributes.size);
            }
        }
    }

    fn complete(
        self,
        seq: u32,
        decoder: &Decoder,
        preview_chars: usize,
    ) -> Option<MessageSummary> {
        let attributes = self.attributes;
        let (Some(headers), Some(preview), Some(uid)) = (self.headers, self.preview, attributes.uid)
        else {
            return None;
        };
        let decoded = decoder.decode_headers(&headers);
        let date = decoded.date.or_else(|| {
            attributes
                .internal_date
                .as_deref()
                .and_then(parse_internal_date)
        });

        Some(MessageSummary {
            sequence_number: seq,
            uid,
            flags: attributes.flags.into_iter().flatten().collect::<BTreeSet<_>>(),
            date,
            from: decoded.from,
            to: decoded.to,
            subject: decoded.subject,
            message_id: decoded.message_id,
            size_bytes: attributes.size.unwrap_or(0),
            preview_text: decoder.preview(&preview, preview_chars),
        })
    }
}

/// Parses an `INTERNALDATE` value such as `17-Jul-1996 02:44:25 -0700`.
#[must_use]
pub fn parse_internal_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value.trim(), "%d-%b-%Y %H:%M:%S %z")
        .map(|date| date.with_timezone(&Utc))
        .ok()
}

/// Lists the newest `limit` messages of `folder`, newest first.
///
/// The folder is opened read-only. Each message is assembled from its
/// header, preview and attribute facets, which may arrive across several
/// responses. Messages whose header, preview or UID never arrived are left
/// out.
///
/// # Errors
///
/// Returns an error if the folder cannot be selected or the fetch fails.
/// Nothing is returned for a failed fetch.
pub async fn fetch_messages<M: MailboxProtocol>(
    mailbox: &mut M,
    decoder: &Decoder,
    folder: &str,
    limit: u32,
    preview_chars: usize,
) -> Result<Vec<MessageSummary>> {
    let selected = mailbox.select(folder, true).await?;
    if selected.total == 0 || limit == 0 {
        debug!(folder, total = selected.total, "nothing to fetch");
        return Ok(Vec::new());
    }

    let start = window_start(selected.total, limit);
    let (sender, mut receiver) = mpsc::unbounded_channel::<FetchEvent>();
    let collect = async {
        let mut partials: BTreeMap<u32, PartialSummary> = BTreeMap::new();
        while let Some(event) = receiver.recv().await {
            partials.entry(event.seq()).or_default().apply(event);
        }
        partials
    };
    let (fetched, partials) = tokio::join!(mailbox.fetch_summaries(start, sender), collect);
    fetched?;

    let mut summaries = Vec::with_capacity(partials.len());
    for (seq, partial) in partials {
        match partial.complete(seq, decoder, preview_chars) {
            Some(summary) => summaries.push(summary),
            None => warn!(folder, seq, "incomplete fetch response, message skipped"),
        }
    }
    summaries.sort_by_key(|s| {
        (
            Reverse(s.date.map_or(0, |d| d.timestamp_millis())),
            Reverse(s.sequence_number),
        )
    });
    debug!(folder, start, count = summaries.len(), "fetched message summaries");
    Ok(summaries)
}

/// Fetches and renders one full message.
///
/// # Errors
///
/// Returns a protocol error if no message has the given UID.
pub async fn fetch_message<M: MailboxProtocol>(
    mailbox: &mut M,
    decoder: &Decoder,
    folder: &str,
    uid: u32,
) -> Result<DecodedMessage> {
    mailbox.select(folder, true).await?;
    let raw = mailbox
        .fetch_raw(uid)
        .await?
        .ok_or_else(|| Error::Protocol(format!("message {uid} not found in {folder}")))?;
    debug!(folder, uid, bytes = raw.len(), "fetched message");
    Ok(decoder.render(&raw, None))
}

/// Moves a message to another folder.
///
/// # Errors
///
/// Returns an error if either step fails.
pub async fn move_message<M: MailboxProtocol>(
    mailbox: &mut M,
    uid: u32,
    from: &str,
    to: &str,
) -> Result<bool> {
    mailbox.select(from, false).await?;
    mailbox.move_to(uid, to).await?;
    debug!(uid, from, to, "moved message");
    Ok(true)
}

/// Copies a message to another folder.
///
/// # Errors
///
/// Returns an error if either step fails.
pub async fn copy_message<M: MailboxProtocol>(
    mailbox: &mut M,
    uid: u32,
    from: &str,
    to: &str,
) -> Result<bool> {
    mailbox.select(from, false).await?;
    mailbox.copy(uid, to).await?;
    debug!(uid, from, to, "copied message");
    Ok(true)
}

/// Flags a message `\Deleted` and expunges the folder.
///
/// # Errors
///
/// Returns an error if any step fails, including an expunge that fails
/// after the flag was set.
pub async fn delete_message<M: MailboxProtocol>(
    mailbox: &mut M,
    uid: u32,
    folder: &str,
) -> Result<bool> {
    mailbox.select(folder, false).await?;
    mailbox.store_flag(uid, MessageFlag::Deleted, true).await?;
    mailbox.expunge().await.map_err(|e| {
        warn!(uid, folder, error = %e, "expunge failed after flagging");
        Error::Protocol(format!("message {uid} flagged but not expunged: {e}"))
    })?;
    debug!(uid, folder, "deleted message");
    Ok(true)
}

/// Adds or removes `\Seen`.
///
/// # Errors
///
/// Returns an error if the folder cannot be opened or the store fails.
pub async fn set_read<M: MailboxProtocol>(
    mailbox: &mut M,
    uid: u32,
    folder: &str,
    read: bool,
) -> Result<()> {
    set_flag(mailbox, uid, folder, MessageFlag::Seen, read).await
}

/// Adds or removes `\Flagged`.
///
/// # Errors
///
/// Returns an error if the folder cannot be opened or the store fails.
pub async fn set_starred<M: MailboxProtocol>(
    mailbox: &mut M,
    uid: u32,
    folder: &str,
    starred: bool,
) -> Result<()> {
    set_flag(mailbox, uid, folder, MessageFlag::Flagged, starred).await
}

async fn set_flag<M: MailboxProtocol>(
    mailbox: &mut M,
    uid: u32,
    folder: &str,
    flag: MessageFlag,
    add: bool,
) -> Result<()> {
    mailbox.select(folder, false).await?;
    mailbox.store_flag(uid, flag, add).await?;
    debug!(uid, folder, flag = flag.as_str(), add, "stored flag");
    Ok(())
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
    use chrono::TimeZone;

    use super::*;

    fn descriptor(name: &str) -> FolderDescriptor {
        FolderDescriptor {
            full_name: name.to_string(),
            delimiter: Some('/'),
            has_children: false,
            kind: FolderKind::from_name(name),
        }
    }

    #[test]
    fn test_sort_folders_example() {
        let mut folders: Vec<_> = ["Zeta", "INBOX", "Sent Items", "Notes"]
            .into_iter()
            .map(descriptor)
            .collect();
        sort_folders(&mut folders);
        let names: Vec<_> = folders.iter().map(|f| f.full_name.as_str()).collect();
        assert_eq!(names, ["INBOX", "Sent Items", "Notes", "Zeta"]);
    }

    #[test]
    fn test_folder_tier() {
        assert_eq!(folder_tier("inbox"), 0);
        assert_eq!(folder_tier("INBOX/Receipts"), 1);
        assert_eq!(folder_tier("[Gmail]/Spam"), 1);
        assert_eq!(folder_tier("Notes"), 2);
    }

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(120, 50), 71);
        assert_eq!(window_start(10, 50), 1);
        assert_eq!(window_start(50, 50), 1);
        assert_eq!(window_start(1, 1), 1);
    }

    #[test]
    fn test_flatten_joins_with_delimiter() {
        let mut work = FolderNode::leaf("Work", Some('.'));
        work.selectable = false;
        work.children = vec![
            FolderNode::leaf("Clients", Some('.')),
            FolderNode::leaf("Invoices", Some('.')),
        ];
        let tree = vec![FolderNode::leaf("INBOX", Some('.')), work];

        let mut out = Vec::new();
        flatten(&tree, None, &mut out);
        let names: Vec<_> = out.iter().map(|f| f.full_name.as_str()).collect();
        assert_eq!(names, ["INBOX", "Work.Clients", "Work.Invoices"]);
        assert_eq!(out[0].kind, FolderKind::Inbox);
    }

    #[test]
    fn test_parse_internal_date() {
        let date = parse_internal_date("17-Jul-1996 02:44:25 -0700").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(1996, 7, 17, 9, 44, 25).unwrap());
        assert!(parse_internal_date("yesterday").is_none());
    }

    #[test]
    fn test_partial_summary_requires_all_facets() {
        let decoder = Decoder::default();
        let mut partial = PartialSummary::default();
        partial.apply(FetchEvent::Headers {
            seq: 1,
            bytes: b"Subject: Hi\r\n\r\n".to_vec(),
        });
        partial.apply(FetchEvent::Preview {
            seq: 1,
            bytes: b"Hello".to_vec(),
        });
        assert!(
            PartialSummary {
                headers: partial.headers.clone(),
                preview: partial.preview.clone(),
                attributes: Attributes::default(),
            }
            .complete(1, &decoder, 200)
            .is_none()
        );

        partial.apply(FetchEvent::Attributes {
            seq: 1,
            uid: Some(9),
            flags: Some(vec!["\\Seen".to_string()]),
            internal_date: Some("01-Feb-2024 10:00:00 +0000".to_string()),
            size: Some(321),
        });
        let summary = partial.complete(1, &decoder, 200).unwrap();
        assert_eq!(summary.uid, 9);
        assert_eq!(summary.subject, "Hi");
        assert_eq!(summary.preview_text, "Hello");
        assert_eq!(
            summary.date,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap())
        );
        assert!(summary.is_read());
    }

    #[test]
    fn test_flag_update_keeps_other_facets() {
        let decoder = Decoder::default();
        let mut partial = PartialSummary::default();
        partial.apply(FetchEvent::Attributes {
            seq: 3,
            uid: Some(12),
            flags: Some(Vec::new()),
            internal_date: None,
            size: Some(2048),
        });
        partial.apply(FetchEvent::Headers {
            seq: 3,
            bytes: b"Subject: Report\r\n\r\n".to_vec(),
        });
        partial.apply(FetchEvent::Preview {
            seq: 3,
            bytes: b"Numbers".to_vec(),
        });
        partial.apply(FetchEvent::Attributes {
            seq: 3,
            uid: None,
            flags: Some(vec!["\\Seen".to_string(), "\\Flagged".to_string()]),
            internal_date: None,
            size: None,
        });

        let summary = partial.complete(3, &decoder, 200).unwrap();
        assert_eq!(summary.uid, 12);
        assert_eq!(summary.size_bytes, 2048);
        assert_eq!(summary.subject, "Report");
        assert_eq!(summary.preview_text, "Numbers");
        assert!(summary.is_read());
        assert!(summary.flags.contains("\\Flagged"));
    }

    #[test]
    fn test_partial_summary_without_uid_is_dropped() {
        let mut partial = PartialSummary::default();
        partial.apply(FetchEvent::Headers {
            seq: 1,
            bytes: b"Subject: Hi\r\n\r\n".to_vec(),
        });
        partial.apply(FetchEvent::Preview {
            seq: 1,
            bytes: Vec::new(),
        });
        partial.apply(FetchEvent::Attributes {
            seq: 1,
            uid: None,
            flags: Some(Vec::new()),
            internal_date: None,
            size: Some(10),
        });
        assert!(partial.complete(1, &Decoder::default(), 200).is_none());
    }
}
