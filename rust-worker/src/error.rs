//! Error types shared across the store, mail and dispatch layers.

use thiserror::Error;

/// Failure reading or writing the recipient store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row {0} is out of range")]
    RowOutOfRange(usize),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure handing a message to the mail provider.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("mail provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("mail backend misconfigured: {0}")]
    Misconfigured(String),

    #[error("daily quota unavailable: {0}")]
    Quota(#[from] QuotaError),
}

/// Failure reading or writing the persisted daily quota.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota state I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("quota state is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Infrastructure failure that prevents a dispatch run from starting.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("recipient store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("mail sender unavailable: {0}")]
    Sender(#[from] SendError),
}
