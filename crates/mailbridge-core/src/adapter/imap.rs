//! Mailbox protocol over the IMAP client.

use mailbridge_imap::{
    Client, Config, FetchAttribute, FetchedMessage, Flag, ImapStream, ListResponse,
    MailboxAttribute, SequenceSet, StoreAction,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

use crate::config::{EndpointConfig, Security};
use crate::error::{Error, Result};
use crate::model::MessageFlag;
use crate::protocol::{FetchEvent, FolderNode, MailboxProtocol, SelectedFolder};

/// Header fields requested for message summaries.
pub const SUMMARY_HEADERS: [&str; 5] = ["FROM", "TO", "SUBJECT", "DATE", "MESSAGE-ID"];

/// Bytes of the first body part requested for the preview.
pub const PREVIEW_BYTES: u32 = 2048;

/// Translates an endpoint into IMAP client settings.
#[must_use]
pub fn imap_config(endpoint: &EndpointConfig) -> Config {
    let security = match endpoint.security {
        Security::Tls => mailbridge_imap::Security::Implicit,
        Security::StartTls => mailbridge_imap::Security::StartTls,
        Security::None => mailbridge_imap::Security::None,
    };
    Config::new(endpoint.host.clone())
        .security(security)
        .port(endpoint.port)
}

/// An authenticated IMAP connection.
#[derive(Debug)]
pub struct ImapMailbox<S = ImapStream> {
    client: Option<Client<S>>,
}

impl ImapMailbox<ImapStream> {
    /// Connects and logs in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] when the server is unreachable or
    /// refuses the credentials.
    pub async fn connect(endpoint: &EndpointConfig) -> Result<Self> {
        let client = Client::connect(&imap_config(endpoint))
            .await
            .map_err(|e| Error::Connection(format!("{}:{}: {e}", endpoint.host, endpoint.port)))?;
        Self::login(client, endpoint).await
    }
}

impl<S> ImapMailbox<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Logs in on an already greeted client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] when the credentials are refused.
    pub async fn login(mut client: Client<S>, endpoint: &EndpointConfig) -> Result<Self> {
        client
            .login(&endpoint.username, &endpoint.password)
            .await
            .map_err(|e| Error::Connection(format!("login failed: {e}")))?;
        Ok(Self {
            client: Some(client),
        })
    }

    fn client(&mut self) -> Result<&mut Client<S>> {
        self.client
            .as_mut()
            .ok_or_else(|| Error::Protocol("connection is closed".to_string()))
    }
}

/// Builds the folder tree from flat LIST responses. Parents missing from
/// the listing are added as non-selectable nodes.
#[must_use]
pub fn build_tree(entries: &[ListResponse]) -> Vec<FolderNode> {
    let mut roots = Vec::new();
    for entry in entries {
        let segments: Vec<&str> = match entry.delimiter {
            Some(delimiter) => entry.name.split(delimiter).collect(),
            None => vec![entry.name.as_str()],
        };
        insert(&mut roots, &segments, entry);
    }
    roots
}

fn insert(nodes: &mut Vec<FolderNode>, segments: &[&str], entry: &ListResponse) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let index = if let Some(index) = nodes.iter().position(|n| n.name == *first) {
        index
    } else {
        let mut placeholder = FolderNode::leaf(*first, entry.delimiter);
        placeholder.selectable = false;
        nodes.push(placeholder);
        nodes.len() - 1
    };

    let node = &mut nodes[index];
    if rest.is_empty() {
        node.selectable = entry.is_selectable();
        node.has_children_attr = entry.attributes.contains(&MailboxAttribute::HasChildren);
    } else {
        insert(&mut node.children, rest, entry);
    }
}

const fn imap_flag(flag: MessageFlag) -> Flag {
    match flag {
        MessageFlag::Seen => Flag::Seen,
        MessageFlag::Flagged => Flag::Flagged,
        MessageFlag::Deleted => Flag::Deleted,
    }
}

fn summary_items() -> Vec<FetchAttribute> {
    vec![
        FetchAttribute::Uid,
        FetchAttribute::Flags,
        FetchAttribute::InternalDate,
        FetchAttribute::Rfc822Size,
        FetchAttribute::header_fields(&SUMMARY_HEADERS),
        FetchAttribute::BodyPeek {
            section: "1".to_string(),
            partial: Some((0, PREVIEW_BYTES)),
        },
    ]
}

/// Forwards the facets a FETCH response actually carried. Servers may split
/// one message over several responses or send bare flag updates.
fn send_facets(message: FetchedMessage, events: &UnboundedSender<FetchEvent>) {
    let seq = message.seq;
    let mut facets = Vec::with_capacity(3);
    if let Some(headers) = message.section("HEADER") {
        facets.push(FetchEvent::Headers {
            seq,
            bytes: headers.data.clone(),
        });
    }
    if let Some(preview) = message.section("1") {
        facets.push(FetchEvent::Preview {
            seq,
            bytes: preview.data.clone(),
        });
    }
    let has_attributes = message.uid.is_some()
        || message.flags.is_some()
        || message.internal_date.is_some()
        || message.size.is_some();
    if has_attributes {
        facets.push(FetchEvent::Attributes {
            seq,
            uid: message.uid,
            flags: message
                .flags
                .map(|flags| flags.iter().map(ToString::to_string).collect()),
            internal_date: message.internal_date,
            size: message.size,
        });
    }
    if facets.is_empty() {
        trace!(seq, "FETCH response without summary items");
    }

    for facet in facets {
        // The receiver only goes away when the fetch is abandoned.
        let _ = events.send(facet);
    }
}

impl<S> MailboxProtocol for ImapMailbox<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn folder_tree(&mut self) -> Result<Vec<FolderNode>> {
        let entries = self.client()?.list("", "*").await?;
        debug!(count = entries.len(), "LIST");
        Ok(build_tree(&entries))
    }

    async fn select(&mut self, folder: &str, read_only: bool) -> Result<SelectedFolder> {
        let client = self.client()?;
        let status = if read_only {
            client.examine(folder).await?
        } else {
            client.select(folder).await?
        };
        Ok(SelectedFolder {
            total: status.exists,
            read_only: status.read_only,
        })
    }

    async fn fetch_summaries(&mut self, start: u32, events: UnboundedSender<FetchEvent>) -> Result<()> {
        let items = summary_items();
        self.client()?
            .fetch_each(&SequenceSet::starting_at(start), &items, false, |message| {
                send_facets(message, &events);
            })
            .await?;
        Ok(())
    }

    async fn fetch_raw(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let items = [FetchAttribute::Uid, FetchAttribute::body_peek("")];
        let messages = self
            .client()?
            .fetch(&SequenceSet::single(uid), &items, true)
            .await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.uid == Some(uid))
            .find_map(|m| m.sections.into_iter().find(|s| s.section.is_empty()))
            .map(|s| s.data))
    }

    async fn store_flag(&mut self, uid: u32, flag: MessageFlag, add: bool) -> Result<()> {
        let flags = vec![imap_flag(flag)];
        let action = if add {
            StoreAction::Add(flags)
        } else {
            StoreAction::Remove(flags)
        };
        self.client()?
            .uid_store(&SequenceSet::single(uid), action)
            .await?;
        Ok(())
    }

    async fn copy(&mut self, uid: u32, to: &str) -> Result<()> {
        self.client()?.uid_copy(&SequenceSet::single(uid), to).await?;
        Ok(())
    }

    async fn move_to(&mut self, uid: u32, to: &str) -> Result<()> {
        let client = self.client()?;
        let set = SequenceSet::single(uid);
        if client.has_capability("MOVE") {
            client.uid_move(&set, to).await?;
        } else {
            debug!(uid, to, "server lacks MOVE, using COPY and EXPUNGE");
            client.uid_copy(&set, to).await?;
            client
                .uid_store(&set, StoreAction::Add(vec![Flag::Deleted]))
                .await?;
            client.expunge().await?;
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let expunged = self.client()?.expunge().await?;
        debug!(count = expunged.len(), "expunged");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => Ok(client.logout().await?),
            None => Ok(()),
        }
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

    fn list(name: &str, attrs: &[&str]) -> ListResponse {
        ListResponse {
            attributes: attrs.iter().map(|a| MailboxAttribute::parse(a)).collect(),
            delimiter: Some('/'),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_build_tree_nests_children() {
        let tree = build_tree(&[
            list("INBOX", &["\\HasNoChildren"]),
            list("Work", &["\\HasChildren"]),
            list("Work/Clients", &[]),
        ]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1].name, "Work");
        assert!(tree[1].has_children());
        assert_eq!(tree[1].children[0].name, "Clients");
    }

    #[test]
    fn test_build_tree_adds_missing_parents() {
        let tree = build_tree(&[list("Archive/2024/Q1", &[])]);
        assert_eq!(tree[0].name, "Archive");
        assert!(!tree[0].selectable);
        assert!(!tree[0].children[0].selectable);
        assert!(tree[0].children[0].children[0].selectable);
    }

    #[test]
    fn test_build_tree_parent_listed_after_child() {
        let tree = build_tree(&[list("A/B", &[]), list("A", &["\\Noselect"])]);
        assert_eq!(tree.len(), 1);
        assert!(!tree[0].selectable);
        assert_eq!(tree[0].children.len(), 1);
    }

    #[test]
    fn test_imap_config_mapping() {
        let endpoint = EndpointConfig {
            host: "imap.x.org".to_string(),
            port: 143,
            security: Security::StartTls,
            username: "alice".to_string(),
            password: "pw".to_string(),
        };
        let config = imap_config(&endpoint);
        assert_eq!(config.port, 143);
        assert_eq!(config.security, mailbridge_imap::Security::StartTls);
    }

    #[test]
    fn test_summary_items_wire_form() {
        let items: Vec<String> = summary_items().iter().map(ToString::to_string).collect();
        assert_eq!(
            items.last().map(String::as_str),
            Some("BODY.PEEK[1]<0.2048>")
        );
        assert!(items.iter().any(|i| i.contains("HEADER.FIELDS (FROM TO SUBJECT DATE MESSAGE-ID)")));
    }
}
