//! Daily send quota.
//!
//! The count can be persisted to a small JSON file so that separate
//! dispatcher processes started on the same day share one budget.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::QuotaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct QuotaState {
    date: NaiveDate,
    used: u32,
}

impl QuotaState {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            date: now.date_naive(),
            used: 0,
        }
    }

    fn roll_over(&mut self, now: DateTime<Utc>) {
        if self.date != now.date_naive() {
            *self = Self::fresh(now);
        }
    }
}

/// Counts sends per UTC calendar day against a fixed limit.
pub struct DailyQuota {
    limit: u32,
    path: Option<PathBuf>,
    state: Mutex<QuotaState>,
}

impl DailyQuota {
    /// Quota held in memory only; it starts over with the process.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            path: None,
            state: Mutex::new(QuotaState::fresh(Utc::now())),
        }
    }

    /// Quota backed by the file at `path`. A missing file means nothing
    /// was sent yet today.
    pub fn persistent(limit: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(limit)
        }
    }

    pub fn from_config(config: &Config) -> Self {
        match &config.quota_state_path {
            Some(path) => Self::persistent(config.daily_send_limit, path),
            None => Self::new(config.daily_send_limit),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Sends left on the day containing `now`.
    pub async fn remaining_at(&self, now: DateTime<Utc>) -> Result<u32, QuotaError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        state.roll_over(now);
        Ok(self.limit.saturating_sub(state.used))
    }

    /// Count one send on the day containing `now`.
    pub async fn record_at(&self, now: DateTime<Utc>) -> Result<(), QuotaError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        state.roll_over(now);
        state.used = state.used.saturating_add(1);

        if let Some(path) = &self.path {
            save(path, &state).await?;
        }
        Ok(())
    }

    pub async fn remaining(&self) -> Result<u32, QuotaError> {
        self.remaining_at(Utc::now()).await
    }

    pub async fn record(&self) -> Result<(), QuotaError> {
        self.record_at(Utc::now()).await
    }

    // Another process may have sent since the last look.
    async fn reload(&self, state: &mut QuotaState) -> Result<(), QuotaError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        match fs::read(path).await {
            Ok(raw) => *state = serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

async fn save(path: &Path, state: &QuotaState) -> Result<(), QuotaError> {
    let body = serde_json::to_vec(state)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &body).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
