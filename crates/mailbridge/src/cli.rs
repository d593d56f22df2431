//! Command-line surface over the mail service.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mailbridge_core::{ApiResponse, Credentials, MailService, NetworkConnector};
use mailbridge_mime::{Decoder, DecodedMessage, LegacyMessage};
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;

/// Environment variable holding the account password.
pub const PASSWORD_VAR: &str = "MAILBRIDGE_PASSWORD";

/// Webmail session pipeline driver. Results are printed as JSON.
#[derive(Debug, Parser)]
#[command(name = "mailbridge", version)]
pub struct Cli {
    /// Configuration file [default: <config dir>/mailbridge/config.json]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check the credentials against the mailbox and submission servers.
    Test {
        /// Account address.
        email: String,
    },
    /// List the folders of an account.
    Folders {
        /// Account address.
        email: String,
    },
    /// List the newest messages of a folder.
    List {
        /// Account address.
        email: String,
        /// Folder name [default: INBOX]
        folder: Option<String>,
        /// Number of messages [default: from the configuration]
        limit: Option<u32>,
    },
    /// Fetch and render one message.
    Show {
        /// Account address.
        email: String,
        /// Folder holding the message.
        folder: String,
        /// Message UID.
        uid: u32,
    },
    /// Render a local `.eml` file, or a stored message as `.json`.
    Decode {
        /// Input file.
        file: PathBuf,
    },
}

/// Runs one command and prints its result.
pub async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&path).await?;

    let service = MailService::new(NetworkConnector, config.pipeline.clone());
    match cli.command {
        Command::Decode { file } => print(&decode_file(service.decoder(), &file).await?),
        Command::Test { email } => {
            let credentials = config.credentials(&email, &password()?);
            report(&service.test_connection(&credentials).await)
        }
        Command::Folders { email } => {
            let session_id = open(&service, &config.credentials(&email, &password()?)).await?;
            let response = service.list_folders(Some(&session_id)).await;
            service.disconnect_session(Some(&session_id)).await;
            report(&response)
        }
        Command::List {
            email,
            folder,
            limit,
        } => {
            let session_id = open(&service, &config.credentials(&email, &password()?)).await?;
            let response = service
                .list_messages(Some(&session_id), folder.as_deref(), limit)
                .await;
            service.disconnect_session(Some(&session_id)).await;
            report(&response)
        }
        Command::Show { email, folder, uid } => {
            let session_id = open(&service, &config.credentials(&email, &password()?)).await?;
            let response = service.get_message(Some(&session_id), uid, &folder).await;
            service.disconnect_session(Some(&session_id)).await;
            report(&response)
        }
    }
}

fn password() -> Result<String> {
    std::env::var(PASSWORD_VAR).with_context(|| format!("{PASSWORD_VAR} is not set"))
}

async fn open(service: &MailService<NetworkConnector>, credentials: &Credentials) -> Result<String> {
    let response = service.connect_session(credentials).await;
    let Some(info) = &response.data else {
        report(&response)?;
        bail!("no session returned");
    };
    debug!(session = %info.session_id, "session open");
    Ok(info.session_id.clone())
}

/// Renders a message file. `.json` files hold a stored message, anything
/// else is read as raw RFC 5322 bytes.
pub async fn decode_file(decoder: &Decoder, path: &Path) -> Result<DecodedMessage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let legacy: LegacyMessage = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(decoder.render_legacy(&legacy))
    } else {
        Ok(decoder.render(&bytes, None))
    }
}

/// Prints the envelope and turns a failed one into an error.
fn report<T: Serialize>(response: &ApiResponse<T>) -> Result<()> {
    print(response)?;
    if response.success {
        return Ok(());
    }
    let error = response.error.as_deref().unwrap_or("Request failed");
    match &response.details {
        Some(details) => bail!("{error}: {details}"),
        None => bail!("{error}"),
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{json}");
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
    use super::*;

    #[test]
    fn test_parse_list_with_defaults() {
        let cli = Cli::try_parse_from(["mailbridge", "list", "alice@x.org"]).unwrap();
        assert_eq!(
            cli.command,
            Command::List {
                email: "alice@x.org".to_string(),
                folder: None,
                limit: None,
            }
        );
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_show_and_config() {
        let cli = Cli::try_parse_from([
            "mailbridge",
            "show",
            "alice@x.org",
            "Sent Items",
            "42",
            "--config",
            "/tmp/mb.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mb.json")));
        assert!(matches!(cli.command, Command::Show { uid: 42, .. }));
    }

    #[test]
    fn test_parse_rejects_bad_uid() {
        assert!(Cli::try_parse_from(["mailbridge", "show", "a@x.org", "INBOX", "abc"]).is_err());
    }

    #[test]
    fn test_report_failure_is_error() {
        let response: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some("Failed to list folders".to_string()),
            details: Some("no active session".to_string()),
            status: 401,
        };
        let err = report(&response).unwrap_err();
        assert_eq!(err.to_string(), "Failed to list folders: no active session");
    }

    #[tokio::test]
    async fn test_decode_eml_and_json() {
        let dir = std::env::temp_dir();
        let eml = dir.join(format!("mailbridge-{}.eml", std::process::id()));
        let json = dir.join(format!("mailbridge-{}.json", std::process::id()));
        tokio::fs::write(&eml, b"Subject: Hello\r\n\r\nPlain body")
            .await
            .unwrap();
        tokio::fs::write(
            &json,
            r#"{"subject":"Stored","from":"a@x.org","to":"b@x.org","body":"<p>Hi</p>","attachments":[]}"#,
        )
        .await
        .unwrap();

        let decoder = Decoder::default();
        let from_eml = decode_file(&decoder, &eml).await;
        let from_json = decode_file(&decoder, &json).await;
        tokio::fs::remove_file(&eml).await.unwrap();
        tokio::fs::remove_file(&json).await.unwrap();

        let from_eml = from_eml.unwrap();
        assert_eq!(from_eml.subject, "Hello");
        assert!(from_eml.text.contains("Plain body"));
        assert_eq!(from_json.unwrap().subject, "Stored");
    }
}
