//! Mailgun HTTP API backend.
//!
//! Messages are posted as form data to `/v3/{domain}/messages` using HTTP
//! basic auth with the `api` user.
//! Reference: https://documentation.mailgun.com/docs/mailgun/api-reference/send/mailgun/messages

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};

use super::{format_from, DailyQuota, MailSender};
use crate::config::Config;
use crate::error::SendError;

pub struct MailgunSender {
    client: Client,
    api_base: String,
    domain: String,
    api_key: String,
    sender_name: Option<String>,
    aliases: Vec<String>,
    quota: DailyQuota,
}

impl MailgunSender {
    /// Build the backend from configuration.
    ///
    /// Fails when the API key or domain is missing.
    pub fn from_config(config: &Config) -> Result<Self, SendError> {
        let api_key = config
            .mailgun_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SendError::Misconfigured("MAILGUN_API_KEY is not set".to_string()))?;

        let domain = config
            .mailgun_domain
            .clone()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| SendError::Misconfigured("MAILGUN_DOMAIN is not set".to_string()))?;

        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            api_base: config.mailgun_api_base.trim_end_matches('/').to_string(),
            domain,
            api_key,
            sender_name: config.sender_name.clone(),
            aliases: config.sender_aliases.clone(),
            quota: DailyQuota::from_config(config),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v3/{}/messages", self.api_base, self.domain)
    }
}

#[async_trait]
impl MailSender for MailgunSender {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        from_alias: &str,
    ) -> Result<(), SendError> {
        let from = format_from(self.sender_name.as_deref(), from_alias);
        let form = [
            ("from", from.as_str()),
            ("to", to),
            ("subject", subject),
            ("html", html_body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                to = %to,
                from = %from,
                status_code = status.as_u16(),
                "mailgun_send_rejected"
            );
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        info!(to = %to, from = %from, "mailgun_send_accepted");

        // The message is out; a lost count must not turn it into a failure.
        if let Err(e) = self.quota.record().await {
            error!(to = %to, error = %e, "quota_record_failed");
        }

        Ok(())
    }

    async fn remaining_daily_quota(&self) -> Result<u32, SendError> {
        Ok(self.quota.remaining().await?)
    }

    async fn list_aliases(&self) -> Result<Vec<String>, SendError> {
        Ok(self.aliases.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::for_tests()
    }

    #[test]
    fn test_messages_url() {
        let sender = MailgunSender::from_config(&config()).unwrap();
        assert_eq!(
            sender.messages_url(),
            "https://api.eu.mailgun.net/v3/mg.example.com/messages"
        );
    }

    #[test]
    fn test_missing_credentials() {
        let mut cfg = config();
        cfg.mailgun_api_key = None;
        assert!(matches!(
            MailgunSender::from_config(&cfg),
            Err(SendError::Misconfigured(_))
        ));

        let mut cfg = config();
        cfg.mailgun_domain = Some(String::new());
        assert!(matches!(
            MailgunSender::from_config(&cfg),
            Err(SendError::Misconfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_quota_and_aliases_from_config() {
        let sender = MailgunSender::from_config(&config()).unwrap();
        assert_eq!(sender.remaining_daily_quota().await.unwrap(), 50);
        assert_eq!(sender.list_aliases().await.unwrap(), vec!["a@mg.example.com"]);
    }
}
