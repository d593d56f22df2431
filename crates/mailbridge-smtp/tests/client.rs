//! Client tests against scripted server conversations.

#![allow(clippy::unwrap_used)]

use tokio_test::io::Builder;

use mailbridge_smtp::{Client, Envelope, Error, ReplyCode};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// "\0alice@x.org\0secret"
const AUTH_LINE: &[u8] = b"AUTH PLAIN AGFsaWNlQHgub3JnAHNlY3JldA==\r\n";

#[tokio::test]
async fn test_full_submission() {
    init_tracing();
    let mock = Builder::new()
        .read(b"220 smtp.x.org ESMTP ready\r\n")
        .write(b"EHLO localhost\r\n")
        .read(b"250-smtp.x.org hello\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n")
        .write(AUTH_LINE)
        .read(b"235 2.7.0 Authentication successful\r\n")
        .write(b"MAIL FROM:<alice@x.org>\r\n")
        .read(b"250 OK\r\n")
        .write(b"RCPT TO:<bob@y.org>\r\n")
        .read(b"250 OK\r\n")
        .write(b"RCPT TO:<carol@y.org>\r\n")
        .read(b"250 OK\r\n")
        .write(b"DATA\r\n")
        .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
        .write(b"Subject: hi\r\n\r\n..leading dot\r\n.\r\n")
        .read(b"250 2.0.0 OK queued as 12345\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 2.0.0 Bye\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    assert_eq!(client.server_info().hostname, "smtp.x.org");

    let client = client.auth_plain("alice@x.org", "secret").await.unwrap();
    let envelope = Envelope::new("alice@x.org", ["bob@y.org", "carol@y.org"]).unwrap();
    let (client, reply) = client
        .send(&envelope, b"Subject: hi\n\n.leading dot\n")
        .await
        .unwrap();
    assert_eq!(reply.code, ReplyCode::OK);
    assert!(reply.text().contains("queued"));
    client.quit().await.unwrap();
}

#[tokio::test]
async fn test_auth_failure() {
    let mock = Builder::new()
        .read(b"220 ready\r\n")
        .write(b"EHLO localhost\r\n")
        .read(b"250 smtp.x.org\r\n")
        .write(AUTH_LINE)
        .read(b"535 5.7.8 Username and Password not accepted\r\n")
        .build();

    let client = Client::from_stream(mock)
        .await
        .unwrap()
        .ehlo("localhost")
        .await
        .unwrap();
    let err = client.auth_plain("alice@x.org", "secret").await.unwrap_err();
    assert!(matches!(err, Error::Auth { code: 535, .. }));
}

#[tokio::test]
async fn test_refused_greeting() {
    let mock = Builder::new()
        .read(b"554 no service for you\r\n")
        .build();
    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Rejected { code: 554, .. }));
}

#[tokio::test]
async fn test_recipient_rejected() {
    let mock = Builder::new()
        .read(b"220 ready\r\n")
        .write(AUTH_LINE)
        .read(b"235 ok\r\n")
        .write(b"MAIL FROM:<alice@x.org>\r\n")
        .read(b"250 OK\r\n")
        .write(b"RCPT TO:<ghost@y.org>\r\n")
        .read(b"550 5.1.1 No such user\r\n")
        .build();

    let client = Client::from_stream(mock)
        .await
        .unwrap()
        .auth_plain("alice@x.org", "secret")
        .await
        .unwrap();
    let envelope = Envelope::new("alice@x.org", ["ghost@y.org"]).unwrap();
    let err = client.send(&envelope, b"Subject: x\r\n\r\nbody").await.unwrap_err();
    assert!(err.is_permanent());
}

#[tokio::test]
async fn test_connect_refused() {
    use mailbridge_smtp::{Config, Security, connection};

    let config = Config::new("127.0.0.1")
        .security(Security::None)
        .port(1)
        .connect_timeout(std::time::Duration::from_millis(200));
    assert!(connection::connect(&config).await.is_err());
}
