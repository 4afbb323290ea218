//! Outbound mail: sender abstraction, alias rotation and the daily quota.

pub mod alias;
pub mod dry_run;
pub mod mailgun;
pub mod quota;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, MailProvider};
use crate::error::SendError;

pub use alias::AliasPool;
pub use dry_run::DryRunSender;
pub use mailgun::MailgunSender;
pub use quota::DailyQuota;

/// A mail provider the dispatcher can hand messages to.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver one HTML message using `from_alias` as the sender identity.
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        from_alias: &str,
    ) -> Result<(), SendError>;

    /// Sends still allowed today.
    async fn remaining_daily_quota(&self) -> Result<u32, SendError>;

    /// Sender identities available for rotation, in a stable order.
    async fn list_aliases(&self) -> Result<Vec<String>, SendError>;
}

/// Build a From header value, attaching the display name when configured.
pub fn format_from(sender_name: Option<&str>, alias: &str) -> String {
    match sender_name {
        Some(name) if !name.trim().is_empty() => format!("{} <{}>", name.trim(), alias),
        _ => alias.to_string(),
    }
}

/// Build the backend selected by `MAIL_PROVIDER`.
pub fn sender_from_config(config: &Config) -> Result<Arc<dyn MailSender>, SendError> {
    Ok(match config.mail_provider {
        MailProvider::Mailgun => Arc::new(MailgunSender::from_config(config)?),
        MailProvider::DryRun => Arc::new(DryRunSender::new(
            config.sender_aliases.clone(),
            config.sender_name.clone(),
            DailyQuota::from_config(config),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from() {
        assert_eq!(format_from(Some("Acme"), "hello@acme.io"), "Acme <hello@acme.io>");
        assert_eq!(format_from(Some("  "), "hello@acme.io"), "hello@acme.io");
        assert_eq!(format_from(None, "hello@acme.io"), "hello@acme.io");
    }

    #[tokio::test]
    async fn test_sender_from_config() {
        let mut config = Config::for_tests();
        let sender = sender_from_config(&config).unwrap();
        assert_eq!(sender.remaining_daily_quota().await.unwrap(), 50);

        config.mail_provider = MailProvider::Mailgun;
        config.mailgun_api_key = None;
        assert!(sender_from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_quota_carries_over_between_runs() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::for_tests();
        config.daily_send_limit = 3;
        config.quota_state_path = Some(temp_dir.path().join("recipients.quota.json"));

        let first_run = sender_from_config(&config).unwrap();
        for to in ["b@y.com", "c@y.com"] {
            first_run.send_email(to, "Hi", "<p>Body</p>", "a@mg.example.com").await.unwrap();
        }
        drop(first_run);

        let second_run = sender_from_config(&config).unwrap();
        assert_eq!(second_run.remaining_daily_quota().await.unwrap(), 1);
    }
}
