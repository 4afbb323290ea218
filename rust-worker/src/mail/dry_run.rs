//! Backend that logs messages instead of delivering them.

use async_trait::async_trait;
use tracing::{error, info};

use super::{format_from, DailyQuota, MailSender};
use crate::error::SendError;

/// Accepts every message, logs it and counts it against the quota.
pub struct DryRunSender {
    sender_name: Option<String>,
    aliases: Vec<String>,
    quota: DailyQuota,
}

impl DryRunSender {
    pub fn new(aliases: Vec<String>, sender_name: Option<String>, quota: DailyQuota) -> Self {
        Self {
            sender_name,
            aliases,
            quota,
        }
    }
}

#[async_trait]
impl MailSender for DryRunSender {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        from_alias: &str,
    ) -> Result<(), SendError> {
        let from = format_from(self.sender_name.as_deref(), from_alias);

        info!(
            to = %to,
            from = %from,
            subject = %subject,
            body_length = html_body.len(),
            "dry_run_send"
        );

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
