//! Client tests against scripted server conversations.

#![allow(clippy::unwrap_used)]

use tokio_test::io::Builder;

use mailbridge_imap::{
    Client, Error, FetchAttribute, Flag, ProtocolState, SequenceSet, StoreAction,
};

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 MOVE] ready\r\n";

#[tokio::test]
async fn test_greeting_capabilities_and_login() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN alice secret\r\n")
        .read(b"A0001 OK [CAPABILITY IMAP4rev1 MOVE UIDPLUS] logged in\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    assert!(client.has_capability("move"));
    assert_eq!(*client.state(), ProtocolState::NotAuthenticated);

    client.login("alice", "secret").await.unwrap();
    assert!(client.state().is_authenticated());
    assert!(client.has_capability("UIDPLUS"));
}

#[tokio::test]
async fn test_login_rejected() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN alice wrong\r\n")
        .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    let err = client.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::No(_)));
    assert_eq!(*client.state(), ProtocolState::NotAuthenticated);
}

#[tokio::test]
async fn test_bye_greeting() {
    let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Bye(text) if text == "too many connections"));
}

#[tokio::test]
async fn test_preauth_greeting() {
    let mock = Builder::new()
        .read(b"* PREAUTH welcome back\r\n")
        .write(b"A0001 LIST \"\" \"*\"\r\n")
        .read(b"* LIST (\\HasChildren) \"/\" INBOX\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX/Receipts\"\r\n")
        .read(b"A0001 OK done\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    let mailboxes = client.list("", "*").await.unwrap();
    assert_eq!(mailboxes.len(), 2);
    assert_eq!(mailboxes[1].name, "INBOX/Receipts");
    assert_eq!(mailboxes[1].delimiter, Some('/'));
}

#[tokio::test]
async fn test_examine_reports_status() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN alice secret\r\n")
        .read(b"A0001 OK logged in\r\n")
        .write(b"A0002 EXAMINE INBOX\r\n")
        .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
        .read(b"* 172 EXISTS\r\n* 1 RECENT\r\n")
        .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
        .read(b"* OK [UIDNEXT 4392] Predicted next UID\r\n")
        .read(b"A0002 OK [READ-ONLY] EXAMINE completed\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    client.login("alice", "secret").await.unwrap();
    let status = client.examine("INBOX").await.unwrap();

    assert_eq!(status.exists, 172);
    assert_eq!(status.recent, 1);
    assert_eq!(status.uid_validity, Some(3_857_529_045));
    assert_eq!(status.uid_next, Some(4392));
    assert_eq!(status.flags.len(), 5);
    assert!(status.read_only);
    assert_eq!(client.selected().unwrap().mailbox, "INBOX");
}

#[tokio::test]
async fn test_failed_select_leaves_no_mailbox_open() {
    let mock = Builder::new()
        .read(b"* PREAUTH hi\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\n")
        .read(b"A0001 OK [READ-WRITE] done\r\n")
        .write(b"A0002 SELECT Missing\r\n")
        .read(b"A0002 NO Mailbox does not exist\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    client.select("INBOX").await.unwrap();
    assert!(client.select("Missing").await.is_err());
    assert_eq!(*client.state(), ProtocolState::Authenticated);
}

#[tokio::test]
async fn test_fetch_each_delivers_messages_in_order() {
    let mock = Builder::new()
        .read(b"* PREAUTH hi\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 2 EXISTS\r\nA0001 OK done\r\n")
        .write(b"A0002 FETCH 1:* (UID FLAGS BODY.PEEK[HEADER.FIELDS (SUBJECT)])\r\n")
        .read(b"* 1 FETCH (UID 10 FLAGS (\\Seen) BODY[HEADER.FIELDS (SUBJECT)] {14}\r\n")
        .read(b"Subject: a\r\n\r\n)\r\n")
        .read(b"* 2 FETCH (UID 11 FLAGS () BODY[HEADER.FIELDS (SUBJECT)] {14}\r\nSubject: b\r\n\r\n)\r\n")
        .read(b"A0002 OK done\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    client.select("INBOX").await.unwrap();

    let mut seen = Vec::new();
    client
        .fetch_each(
            &SequenceSet::starting_at(1),
            &[
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::header_fields(&["Subject"]),
            ],
            false,
            |message| seen.push(message),
        )
        .await
        .unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].uid, Some(10));
    assert_eq!(seen[0].flags.as_deref(), Some(&[Flag::Seen][..]));
    assert_eq!(
        seen[1].section("HEADER").unwrap().data,
        b"Subject: b\r\n\r\n"
    );
}

#[tokio::test]
async fn test_unparsable_fetch_fails_command_after_completion() {
    let mock = Builder::new()
        .read(b"* PREAUTH hi\r\n")
        .write(b"A0001 EXAMINE INBOX\r\n")
        .read(b"A0001 OK done\r\n")
        .write(b"A0002 UID FETCH 5 UID\r\n")
        .read(b"* 1 FETCH (UID x)\r\n")
        .read(b"* 2 FETCH (UID 5)\r\n")
        .read(b"A0002 OK done\r\n")
        .write(b"A0003 NOOP\r\n")
        .read(b"A0003 OK done\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    client.examine("INBOX").await.unwrap();
    let err = client
        .fetch(&SequenceSet::single(5), &[FetchAttribute::Uid], true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));

    // The completion was consumed, so the connection stays in step.
    client.noop().await.unwrap();
}

#[tokio::test]
async fn test_commands_checked_against_state() {
    let mock = Builder::new().read(GREETING).build();
    let mut client = Client::from_stream(mock).await.unwrap();

    let err = client.list("", "*").await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    let err = client
        .fetch(&SequenceSet::single(1), &[FetchAttribute::Uid], false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn test_read_only_mailbox_rejects_store() {
    let mock = Builder::new()
        .read(b"* PREAUTH hi\r\n")
        .write(b"A0001 EXAMINE INBOX\r\n")
        .read(b"A0001 OK [READ-ONLY] done\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    client.examine("INBOX").await.unwrap();
    let err = client
        .uid_store(&SequenceSet::single(1), StoreAction::Add(vec![Flag::Seen]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn test_store_expunge_and_move() {
    let mock = Builder::new()
        .read(b"* PREAUTH hi\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"A0001 OK [READ-WRITE] done\r\n")
        .write(b"A0002 UID STORE 42 +FLAGS.SILENT (\\Deleted)\r\n")
        .read(b"A0002 OK stored\r\n")
        .write(b"A0003 EXPUNGE\r\n")
        .read(b"* 3 EXPUNGE\r\n* 3 EXPUNGE\r\nA0003 OK expunged\r\n")
        .write(b"A0004 UID MOVE 7 Archive\r\n")
        .read(b"* OK [COPYUID 1 7 1] moved\r\n* 2 EXPUNGE\r\nA0004 OK done\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    client.select("INBOX").await.unwrap();
    client
        .uid_store(&SequenceSet::single(42), StoreAction::Add(vec![Flag::Deleted]))
        .await
        .unwrap();
    assert_eq!(client.expunge().await.unwrap(), vec![3, 3]);
    client
        .uid_move(&SequenceSet::single(7), "Archive")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_bye_during_command() {
    let mock = Builder::new()
        .read(b"* PREAUTH hi\r\n")
        .write(b"A0001 NOOP\r\n")
        .read(b"* BYE idle too long\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    let err = client.noop().await.unwrap_err();
    assert!(matches!(err, Error::Bye(_)));
    assert_eq!(*client.state(), ProtocolState::Logout);
    assert!(matches!(
        client.noop().await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn test_logout_accepts_bye() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0001 OK LOGOUT completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    client.logout().await.unwrap();
}
