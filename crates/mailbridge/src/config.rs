//! Application configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mailbridge_core::{Credentials, EndpointSettings, PipelineConfig};
use serde::{Deserialize, Serialize};

/// Settings read from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Pipeline tunables.
    pub pipeline: PipelineConfig,
    /// Mailbox server used instead of the guessed one.
    pub mailbox: Option<EndpointSettings>,
    /// Submission server used instead of the guessed one.
    pub submission: Option<EndpointSettings>,
}

impl AppConfig {
    /// Default location, `<config dir>/mailbridge/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailbridge")
            .join("config.json")
    }

    /// Loads the file at `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Credentials for `email` with the configured server overrides.
    pub fn credentials(&self, email: &str, password: &str) -> Credentials {
        Credentials {
            mailbox_config: self.mailbox.clone(),
            submission_config: self.submission.clone(),
            ..Credentials::new(email, password)
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

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("mailbridge-missing-config.json");
        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let path = std::env::temp_dir().join(format!(
            "mailbridge-config-{}.json",
            std::process::id()
        ));
        tokio::fs::write(
            &path,
            r#"{"pipeline":{"preview_chars":80},"mailbox":{"host":"mail.x.org","port":143,"useTls":false}}"#,
        )
        .await
        .unwrap();
        let loaded = AppConfig::load(&path).await;
        tokio::fs::remove_file(&path).await.unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.pipeline.preview_chars, 80);
        assert_eq!(config.pipeline.operation_timeout_secs, 60);
        assert_eq!(config.mailbox.unwrap().port, Some(143));
        assert!(config.submission.is_none());
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "mailbridge-bad-config-{}.json",
            std::process::id()
        ));
        tokio::fs::write(&path, "{ not json").await.unwrap();
        let loaded = AppConfig::load(&path).await;
        tokio::fs::remove_file(&path).await.unwrap();
        assert!(loaded.is_err());
    }

    #[test]
    fn test_credentials_carry_overrides() {
        let config = AppConfig {
            submission: Some(EndpointSettings {
                host: Some("out.x.org".to_string()),
                ..EndpointSettings::default()
            }),
            ..AppConfig::default()
        };
        let credentials = config.credentials("alice@x.org", "pw");
        assert_eq!(credentials.email.as_deref(), Some("alice@x.org"));
        assert!(credentials.mailbox_config.is_none());
        assert_eq!(
            credentials.submission_config.unwrap().host.as_deref(),
            Some("out.x.org")
        );
    }
}
