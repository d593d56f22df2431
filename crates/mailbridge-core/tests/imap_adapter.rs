//! The IMAP mailbox adapter against scripted server conversations.

#![allow(clippy::unwrap_used)]

use mailbridge_core::{
    EndpointConfig, FetchEvent, ImapMailbox, MailboxProtocol, MessageFlag, Security, mailbox,
};
use mailbridge_imap::Client;
use mailbridge_mime::Decoder;
use tokio::sync::mpsc;
use tokio_test::io::{Builder, Mock};

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 MOVE] ready\r\n";
const LOGIN: &[u8] = b"A0001 LOGIN alice@x.org pw\r\n";
const LOGGED_IN: &[u8] = b"A0001 OK logged in\r\n";
const FETCH_SUMMARIES: &[u8] = b"A0003 FETCH 1:* (UID FLAGS INTERNALDATE RFC822.SIZE \
    BODY.PEEK[HEADER.FIELDS (FROM TO SUBJECT DATE MESSAGE-ID)] BODY.PEEK[1]<0.2048>)\r\n";

fn endpoint() -> EndpointConfig {
    EndpointConfig {
        host: "imap.x.org".to_string(),
        port: 993,
        security: Security::Tls,
        username: "alice@x.org".to_string(),
        password: "pw".to_string(),
    }
}

async fn open(mock: Mock) -> ImapMailbox<Mock> {
    let client = Client::from_stream(mock).await.unwrap();
    ImapMailbox::login(client, &endpoint()).await.unwrap()
}

#[tokio::test]
async fn test_login_rejected_is_connection_error() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(b"A0001 NO [AUTHENTICATIONFAILED] bad password\r\n")
        .build();
    let client = Client::from_stream(mock).await.unwrap();
    let err = ImapMailbox::login(client, &endpoint()).await.unwrap_err();
    assert_eq!(err.status_code(), 502);
    assert!(err.to_string().contains("login failed"));
}

#[tokio::test]
async fn test_folder_listing_through_adapter() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 LIST \"\" \"*\"\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" Notes\r\n")
        .read(b"* LIST (\\HasChildren) \"/\" INBOX\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX/Receipts\"\r\n")
        .read(b"* LIST (\\HasNoChildren \\Sent) \"/\" \"Sent Items\"\r\n")
        .read(b"A0002 OK done\r\n")
        .build();

    let mut handle = open(mock).await;
    let folders = mailbox::list_folders(&mut handle).await.unwrap();
    let names: Vec<_> = folders.iter().map(|f| f.full_name.as_str()).collect();
    assert_eq!(names, ["INBOX", "INBOX/Receipts", "Sent Items", "Notes"]);
    assert!(folders[0].has_children);
    assert_eq!(folders[1].delimiter, Some('/'));
}

#[tokio::test]
async fn test_fetch_sends_three_facets_per_message() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 EXAMINE INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
        .write(FETCH_SUMMARIES)
        .read(
            b"* 1 FETCH (UID 10 FLAGS (\\Seen) INTERNALDATE \"02-Jan-2024 09:00:00 +0000\" \
              RFC822.SIZE 900 BODY[HEADER.FIELDS (FROM TO SUBJECT DATE MESSAGE-ID)] {53}\r\n\
              Subject: Hi\r\nDate: Tue, 2 Jan 2024 09:00:00 +0000\r\n\r\n BODY[1]<0> {5}\r\nhello)\r\n",
        )
        .read(b"A0003 OK done\r\n")
        .build();

    let mut handle = open(mock).await;
    let selected = handle.select("INBOX", true).await.unwrap();
    assert_eq!(selected.total, 1);
    assert!(selected.read_only);

    let (sender, mut receiver) = mpsc::unbounded_channel();
    handle.fetch_summaries(1, sender).await.unwrap();

    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.seq() == 1));
    assert!(matches!(&events[1], FetchEvent::Preview { bytes, .. } if bytes == b"hello"));
    assert!(matches!(
        &events[2],
        FetchEvent::Attributes { uid: Some(10), size: Some(900), flags: Some(flags), .. }
            if flags == &["\\Seen".to_string()]
    ));
}

#[tokio::test]
async fn test_fetch_messages_end_to_end() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 EXAMINE INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
        .write(FETCH_SUMMARIES)
        .read(
            b"* 1 FETCH (UID 10 FLAGS () INTERNALDATE \"02-Jan-2024 09:00:00 +0000\" \
              RFC822.SIZE 900 BODY[HEADER.FIELDS (FROM TO SUBJECT DATE MESSAGE-ID)] {53}\r\n\
              Subject: Hi\r\nDate: Tue, 2 Jan 2024 09:00:00 +0000\r\n\r\n BODY[1]<0> {5}\r\nhello)\r\n",
        )
        .read(b"A0003 OK done\r\n")
        .build();

    let mut handle = open(mock).await;
    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].subject, "Hi");
    assert_eq!(summaries[0].preview_text, "hello");
    assert_eq!(summaries[0].size_bytes, 900);
    assert!(!summaries[0].is_read());
}

#[tokio::test]
async fn test_fetch_messages_joins_split_responses() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 EXAMINE INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
        .write(FETCH_SUMMARIES)
        .read(
            b"* 1 FETCH (UID 10 FLAGS () INTERNALDATE \"02-Jan-2024 09:00:00 +0000\" \
              RFC822.SIZE 900 BODY[HEADER.FIELDS (FROM TO SUBJECT DATE MESSAGE-ID)] {53}\r\n\
              Subject: Hi\r\nDate: Tue, 2 Jan 2024 09:00:00 +0000\r\n\r\n)\r\n",
        )
        .read(b"* 1 FETCH (UID 10 BODY[1]<0> {5}\r\nhello)\r\n")
        .read(b"A0003 OK done\r\n")
        .build();

    let mut handle = open(mock).await;
    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].uid, 10);
    assert_eq!(summaries[0].subject, "Hi");
    assert_eq!(summaries[0].preview_text, "hello");
    assert_eq!(summaries[0].size_bytes, 900);
    assert!(summaries[0].date.is_some());
}

#[tokio::test]
async fn test_fetch_messages_applies_flag_update() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 EXAMINE INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
        .write(FETCH_SUMMARIES)
        .read(
            b"* 1 FETCH (UID 10 FLAGS () INTERNALDATE \"02-Jan-2024 09:00:00 +0000\" \
              RFC822.SIZE 900 BODY[HEADER.FIELDS (FROM TO SUBJECT DATE MESSAGE-ID)] {53}\r\n\
              Subject: Hi\r\nDate: Tue, 2 Jan 2024 09:00:00 +0000\r\n\r\n BODY[1]<0> {5}\r\nhello)\r\n",
        )
        .read(b"* 1 FETCH (FLAGS (\\Seen))\r\n")
        .read(b"A0003 OK done\r\n")
        .build();

    let mut handle = open(mock).await;
    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].subject, "Hi");
    assert_eq!(summaries[0].preview_text, "hello");
    assert_eq!(summaries[0].size_bytes, 900);
    assert!(summaries[0].is_read());
}

#[tokio::test]
async fn test_fetch_messages_fails_on_malformed_response() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 EXAMINE INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
        .write(FETCH_SUMMARIES)
        .read(b"* 1 FETCH (UID x)\r\n")
        .read(b"A0003 OK done\r\n")
        .build();

    let mut handle = open(mock).await;
    let result =
        mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_star_and_delete_commands() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 SELECT INBOX\r\n")
        .read(b"* 3 EXISTS\r\nA0002 OK [READ-WRITE] done\r\n")
        .write(b"A0003 UID STORE 42 +FLAGS.SILENT (\\Flagged)\r\n")
        .read(b"A0003 OK stored\r\n")
        .write(b"A0004 SELECT INBOX\r\n")
        .read(b"* 3 EXISTS\r\nA0004 OK [READ-WRITE] done\r\n")
        .write(b"A0005 UID STORE 42 +FLAGS.SILENT (\\Deleted)\r\n")
        .read(b"A0005 OK stored\r\n")
        .write(b"A0006 EXPUNGE\r\n")
        .read(b"A0006 NO expunge failed\r\n")
        .build();

    let mut handle = open(mock).await;
    mailbox::set_starred(&mut handle, 42, "INBOX", true)
        .await
        .unwrap();
    let err = mailbox::delete_message(&mut handle, 42, "INBOX")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not expunged"));
}

#[tokio::test]
async fn test_fetch_raw_and_unknown_uid() {
    let raw = b"Subject: Hi\r\n\r\nHello there";
    let mut response = b"* 1 FETCH (UID 10 BODY[] {26}\r\n".to_vec();
    response.extend_from_slice(raw);
    response.extend_from_slice(b")\r\nA0003 OK done\r\n");

    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 EXAMINE INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
        .write(b"A0003 UID FETCH 10 (UID BODY.PEEK[])\r\n")
        .read(&response)
        .write(b"A0004 UID FETCH 11 (UID BODY.PEEK[])\r\n")
        .read(b"A0004 OK done\r\n")
        .build();

    let mut handle = open(mock).await;
    handle.select("INBOX", true).await.unwrap();
    assert_eq!(handle.fetch_raw(10).await.unwrap().unwrap(), raw);
    assert!(handle.fetch_raw(11).await.unwrap().is_none());
}

#[tokio::test]
async fn test_close_logs_out_once() {
    let mock = Builder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(LOGGED_IN)
        .write(b"A0002 LOGOUT\r\n")
        .read(b"* BYE see you\r\nA0002 OK bye\r\n")
        .build();

    let mut handle = open(mock).await;
    handle.close().await.unwrap();
    handle.close().await.unwrap();
    let err = handle
        .store_flag(1, MessageFlag::Seen, true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("closed"));
}
