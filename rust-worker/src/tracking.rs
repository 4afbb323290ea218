//! Open detection - debounced, lock-protected open counting.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::error::StoreError;
use crate::store::{format_timestamp, Column, RecipientRecord, RecipientStore, RowLocks, StatusCell};

/// What a single pixel fetch amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The open was counted; `open_count` is the new total
    Recorded { row: usize, open_count: u64 },
    /// No row carries this address
    NoMatchingRecipient,
    /// The address exists but nothing was sent to it yet
    NotYetSent,
    /// The fetch came too soon after the send to be a human open
    Debounced { row: usize },
}

pub struct OpenTracker {
    store: Arc<dyn RecipientStore>,
    locks: RowLocks,
    debounce: Duration,
}

impl OpenTracker {
    /// `locks` must be shared with the dispatcher writing the same store.
    pub fn new(store: Arc<dyn RecipientStore>, locks: RowLocks, debounce: Duration) -> Self {
        Self {
            store,
            locks,
            debounce,
        }
    }

    /// Handle one open of the message sent to `address`, observed at `now`.
    ///
    /// The address must match exactly. Rows without a send time are passed
    /// over, so a duplicate address further down that was sent still counts.
    pub async fn record_open(&self, address: &str, now: DateTime<Utc>) -> Result<OpenOutcome, StoreError> {
        let rows = self.store.read_all().await?;

        let mut seen_unsent = false;
        let target = rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(row, cells)| RecipientRecord::from_row(row, cells))
            .filter(|record| record.address == address)
            .find_map(|record| match record.sent_anchor() {
                Some(anchor) => Some((record.row, anchor)),
                None => {
                    seen_unsent = true;
                    None
                }
            });

        let Some((row, sent_at)) = target else {
            return Ok(if seen_unsent {
                OpenOutcome::NotYetSent
            } else {
                OpenOutcome::NoMatchingRecipient
            });
        };

        // A send time in the future reads as negative elapsed time.
        let past_window = matches!((now - sent_at).to_std(), Ok(elapsed) if elapsed >= self.debounce);
        if !past_window {
            info!(
                row = row,
                email = %address,
                elapsed_ms = (now - sent_at).num_milliseconds(),
                "open_debounced"
            );
            return Ok(OpenOutcome::Debounced { row });
        }

        let open_count = self.increment(row, address, now).await?;
        Ok(open_count.map_or(OpenOutcome::NoMatchingRecipient, |open_count| {
            OpenOutcome::Recorded { row, open_count }
        }))
    }

    /// Bump the open count of `row` under its lock.
    ///
    /// All three cells are attempted even if one write fails; the first
    /// failure is returned afterwards. Returns `None` if the row no longer
    /// holds `address`.
    async fn increment(&self, row: usize, address: &str, now: DateTime<Utc>) -> Result<Option<u64>, StoreError> {
        let _guard = self.locks.lock(row).await;

        let current = RecipientRecord::from_row(row, &self.store.read_row(row).await?);
        if current.address != address {
            info!(row = row, email = %address, "open_row_changed");
            return Ok(None);
        }

        let open_count = current.open_count + 1;
        let count = open_count.to_string();
        let opened_at = format_timestamp(now);
        let writes = [
            (Column::OpenCount, count.as_str()),
            (Column::Status, StatusCell::Opened.as_str()),
            (Column::LastOpenedAt, opened_at.as_str()),
        ];

        let mut first_error = None;
        for (column, value) in writes {
            if let Err(e) = self.store.update_cell(row, column, value).await {
                error!(
                    row = row,
                    column = column.name(),
                    error = %e,
                    "open_store_update_failed"
                );
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(row = row, email = %address, open_count = open_count, "open_recorded");

        Ok(Some(open_count))
    }
}
