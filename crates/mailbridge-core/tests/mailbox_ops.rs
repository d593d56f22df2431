//! Mailbox operations against a scripted mailbox.

#![allow(clippy::unwrap_used)]

mod support;

use mailbridge_core::{Error, FolderKind, mailbox};
use mailbridge_mime::Decoder;
use proptest::prelude::*;

use support::{MockConnector, StoredMessage, sample_state};

#[tokio::test]
async fn test_list_folders_flattens_and_sorts() {
    let connector = MockConnector::new(sample_state());
    let mut handle = connector.mailbox();

    let folders = mailbox::list_folders(&mut handle).await.unwrap();
    let names: Vec<_> = folders.iter().map(|f| f.full_name.as_str()).collect();
    assert_eq!(
        names,
        ["INBOX", "Sent Items", "Trash", "Work", "Work/Clients", "Zeta"]
    );
    assert_eq!(folders[0].kind, FolderKind::Inbox);
    assert!(folders[3].has_children);
    assert!(!folders[4].has_children);
}

#[tokio::test]
async fn test_fetch_messages_sorted_newest_first() {
    let connector = MockConnector::new(sample_state());
    let mut handle = connector.mailbox();
    let decoder = Decoder::default();

    let summaries = mailbox::fetch_messages(&mut handle, &decoder, "INBOX", 50, 200)
        .await
        .unwrap();
    let subjects: Vec<_> = summaries.iter().map(|s| s.subject.as_str()).collect();
    assert_eq!(subjects, ["Newest", "Middle", "Oldest"]);
    assert_eq!(summaries[0].uid, 102);
    assert_eq!(summaries[0].sequence_number, 2);
    assert_eq!(summaries[0].preview_text, "third body");
    assert_eq!(summaries[0].message_id.as_deref(), Some("<102@x.org>"));

    let state = connector.mailbox.lock().unwrap();
    assert!(state.commands.contains(&"EXAMINE INBOX".to_string()));
    assert!(state.commands.contains(&"FETCH 1:*".to_string()));
}

#[tokio::test]
async fn test_fetch_window_starts_at_newest_limit() {
    let mut state = sample_state();
    let inbox: Vec<_> = (1..=120)
        .map(|uid| StoredMessage::new(uid, "bulk", "Mon, 1 Jan 2024 09:00:00 +0000", "x"))
        .collect();
    state.messages.insert("INBOX".to_string(), inbox);
    let connector = MockConnector::new(state);
    let mut handle = connector.mailbox();

    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 50);
    assert!(
        connector
            .mailbox
            .lock()
            .unwrap()
            .commands
            .contains(&"FETCH 71:*".to_string())
    );
    // Equal dates fall back to newest sequence number first.
    assert_eq!(summaries[0].sequence_number, 120);
    assert_eq!(summaries[49].sequence_number, 71);
}

#[tokio::test]
async fn test_empty_folder_skips_fetch() {
    let connector = MockConnector::new(sample_state());
    let mut handle = connector.mailbox();

    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "Trash", 50, 200)
        .await
        .unwrap();
    assert!(summaries.is_empty());
    assert_eq!(connector.mailbox.lock().unwrap().fetches, 0);
}

#[tokio::test]
async fn test_missing_date_sorts_last() {
    let mut state = sample_state();
    let mut undated = StoredMessage::new(200, "Undated", "not a date", "body");
    undated.internal_date = None;
    state.messages.get_mut("INBOX").unwrap().push(undated);
    let connector = MockConnector::new(state);
    let mut handle = connector.mailbox();

    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap();
    assert_eq!(summaries.last().unwrap().subject, "Undated");
    assert!(summaries.last().unwrap().date.is_none());
}

#[tokio::test]
async fn test_internal_date_used_without_date_header() {
    let mut state = sample_state();
    let mut message = StoredMessage::new(300, "Arrived", "garbage", "body");
    message.internal_date = Some("04-Jan-2024 09:00:00 +0000".to_string());
    state.messages.get_mut("INBOX").unwrap().push(message);
    let connector = MockConnector::new(state);
    let mut handle = connector.mailbox();

    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap();
    assert_eq!(summaries[0].subject, "Arrived");
}

#[tokio::test]
async fn test_incomplete_message_is_skipped() {
    let mut state = sample_state();
    state.omit_preview_for = Some(103);
    let connector = MockConnector::new(state);
    let mut handle = connector.mailbox();

    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.uid != 103));
}

#[tokio::test]
async fn test_fetch_error_aborts_whole_listing() {
    let mut state = sample_state();
    state.fail_fetch_after = Some(1);
    let connector = MockConnector::new(state);
    let mut handle = connector.mailbox();

    let err = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn test_preview_is_truncated() {
    let mut state = sample_state();
    let long_body = "word ".repeat(100);
    state.messages.insert(
        "INBOX".to_string(),
        vec![StoredMessage::new(
            1,
            "Long",
            "Mon, 1 Jan 2024 09:00:00 +0000",
            &long_body,
        )],
    );
    let connector = MockConnector::new(state);
    let mut handle = connector.mailbox();

    let summaries = mailbox::fetch_messages(&mut handle, &Decoder::default(), "INBOX", 50, 200)
        .await
        .unwrap();
    let preview = &summaries[0].preview_text;
    assert!(preview.ends_with("..."));
    assert!(preview.chars().count() <= 203);
}

#[tokio::test]
async fn test_set_starred_twice_keeps_one_flag() {
    let connector = MockConnector::new(sample_state());
    let mut handle = connector.mailbox();

    mailbox::set_starred(&mut handle, 101, "INBOX", true)
        .await
        .unwrap();
    mailbox::set_starred(&mut handle, 101, "INBOX", true)
        .await
        .unwrap();

    let state = connector.mailbox.lock().unwrap();
    let flags = &state.message("INBOX", 101).unwrap().flags;
    assert_eq!(flags.iter().filter(|f| *f == "\\Flagged").count(), 1);
    assert!(state.commands.contains(&"SELECT INBOX".to_string()));
}

#[tokio::test]
async fn test_set_read_and_unread() {
    let connector = MockConnector::new(sample_state());
    let mut handle = connector.mailbox();

    mailbox::set_read(&mut handle, 102, "INBOX", true)
        .await
        .unwrap();
    assert!(
        connector
            .mailbox
            .lock()
            .unwrap()
            .message("INBOX", 102)
            .unwrap()
            .flags
            .contains("\\Seen")
    );

    mailbox::set_read(&mut handle, 102, "INBOX", false)
        .await
        .unwrap();
    assert!(
        connector
            .mailbox
            .lock()
            .unwrap()
            .message("INBOX", 102)
            .unwrap()
            .flags
            .is_empty()
    );
}

#[tokio::test]
async fn test_delete_message_expunges() {
    let connector = MockConnector::new(sample_state());
    let mut handle = connector.mailbox();

    assert!(
        mailbox::delete_message(&mut handle, 101, "INBOX")
            .await
            .unwrap()
    );
    let state = connector.mailbox.lock().unwrap();
    assert!(state.message("INBOX", 101).is_none());
    assert_eq!(state.commands.last().map(String::as_str), Some("EXPUNGE"));
}

#[tokio::test]
async fn test_delete_fails_when_expunge_fails() {
    let mut state = sample_state();
    state.fail_expunge = true;
    let connector = MockConnector::new(state);
    let mut handle = connector.mailbox();

    let err = mailbox::delete_message(&mut handle, 101, "INBOX")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(ref m) if m.contains("not expunged")));

    let state = connector.mailbox.lock().unwrap();
    let message = state.message("INBOX", 101).unwrap();
    assert!(message.flags.contains("\\Deleted"));
}

#[tokio::test]
async fn test_move_and_copy() {
    let connector = MockConnector::new(sample_state());
    let mut handle = connector.mailbox();

    assert!(
        mailbox::copy_message(&mut handle, 101, "INBOX", "Work")
            .await
            .unwrap()
    );
    assert!(
        mailbox::move_message(&mut handle, 102, "INBOX", "Trash")
            .await
            .unwrap()
    );

    let state = connector.mailbox.lock().unwrap();
    assert_eq!(state.folder("INBOX").len(), 2);
    assert!(state.message("INBOX", 101).is_some());
    assert_eq!(state.folder("Work").len(), 1);
    assert_eq!(state.folder("Trash").len(), 1);
    assert!(state.message("INBOX", 102).is_none());
    assert!(state.commands.contains(&"UID MOVE 102 Trash".to_string()));
}

#[tokio::test]
async fn test_move_to_unknown_folder_fails() {
    let connector = MockConnector::new(sample_state());
    let mut handle = connector.mailbox();

    let err = mailbox::move_message(&mut handle, 101, "INBOX", "Nowhere")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 502);
    assert!(connector.mailbox.lock().unwrap().message("INBOX", 101).is_some());
}

#[tokio::test]
async fn test_fetch_message_renders() {
    let mut state = sample_state();
    state.messages.insert(
        "INBOX".to_string(),
        vec![StoredMessage {
            raw: b"Subject: Hi\r\nContent-Type: text/html\r\n\r\n<p>ok</p><script>alert(1)</script>"
                .to_vec(),
            ..StoredMessage::new(7, "Hi", "Mon, 1 Jan 2024 09:00:00 +0000", "")
        }],
    );
    let connector = MockConnector::new(state);
    let mut handle = connector.mailbox();

    let message = mailbox::fetch_message(&mut handle, &Decoder::default(), "INBOX", 7)
        .await
        .unwrap();
    assert_eq!(message.subject, "Hi");
    assert_eq!(message.html, "<p>ok</p>");

    let err = mailbox::fetch_message(&mut handle, &Decoder::default(), "INBOX", 8)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(ref m) if m.contains("not found")));
}

fn folder_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("INBOX".to_string()),
        Just("inbox".to_string()),
        "[A-Za-z ]{1,12}",
        "(Sent|Drafts|Trash|Spam|Archive) [a-z]{0,5}",
    ]
}

proptest! {
    #[test]
    fn sort_keeps_tiers_in_order(names in prop::collection::vec(folder_name(), 0..20)) {
        let mut folders: Vec<_> = names
            .iter()
            .map(|name| mailbridge_core::FolderDescriptor {
                full_name: name.clone(),
                delimiter: Some('/'),
                has_children: false,
                kind: FolderKind::from_name(name),
            })
            .collect();
        mailbox::sort_folders(&mut folders);

        for pair in folders.windows(2) {
            let (a, b) = (&pair[0].full_name, &pair[1].full_name);
            let (ta, tb) = (mailbox::folder_tier(a), mailbox::folder_tier(b));
            prop_assert!(ta < tb || (ta == tb && a <= b));
        }
        prop_assert_eq!(folders.len(), names.len());
    }
}
