//! Outreach - outbound email campaign dispatch with open tracking.
//!
//! This library provides shared modules for the two Outreach binaries:
//! - `outreach-web`: Tracking pixel server, optionally dispatching on an interval
//! - `outreach-dispatch`: One-shot dispatcher run for external schedulers
//!
//! ## Architecture
//!
//! ```text
//! Recipient Store → Dispatcher → Mail Sender → recipient inbox
//!                                                  ↓ (pixel fetch)
//! Recipient Store ← Open Tracker ← /track endpoint
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod mail;
pub mod pixel;
pub mod store;
pub mod tracking;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{DispatchSummary, Dispatcher, StopReason};
pub use error::{CampaignError, QuotaError, SendError, StoreError};
pub use mail::{sender_from_config, MailSender};
pub use store::{JsonFileStore, MemoryStore, RecipientStore, RowLocks};
pub use tracking::{OpenOutcome, OpenTracker};
pub use web::AppState;
