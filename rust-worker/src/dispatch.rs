//! Campaign dispatcher - sequential, quota-aware sending.
//!
//! A run walks the recipient table from the first data row, rotating the
//! sender alias by row position and pausing a fixed delay between sends.
//! It stops at the first incomplete row or when the daily quota runs out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, warn};
use url::Url;

use crate::error::CampaignError;
use crate::mail::{AliasPool, MailSender};
use crate::pixel::{append_tracking_pixel, tracking_url};
use crate::store::{format_timestamp, Column, RecipientRecord, RecipientStore, RowLocks, StatusCell};

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every row was processed
    Completed,
    /// The alias pool was empty; nothing was sent
    NoAliasesConfigured,
    /// Row `row` is missing address, subject or body
    IncompleteRecipientData { row: usize },
    /// The quota ran out before row `row`
    QuotaExceeded { row: usize },
    /// The quota could not be read before row `row`
    QuotaUnavailable { row: usize },
    /// Another run was still in progress
    AlreadyRunning,
}

/// Outcome of one dispatcher run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub stop: StopReason,
}

impl DispatchSummary {
    fn stopped(stop: StopReason) -> Self {
        Self {
            sent: 0,
            failed: 0,
            stop,
        }
    }
}

pub struct Dispatcher {
    store: Arc<dyn RecipientStore>,
    sender: Arc<dyn MailSender>,
    locks: RowLocks,
    tracking_base: Url,
    send_delay: Duration,
    running: Mutex<()>,
}

impl Dispatcher {
    /// `locks` must be shared with the open tracker writing the same store.
    pub fn new(
        store: Arc<dyn RecipientStore>,
        sender: Arc<dyn MailSender>,
        locks: RowLocks,
        tracking_base: Url,
        send_delay: Duration,
    ) -> Self {
        Self {
            store,
            sender,
            locks,
            tracking_base,
            send_delay,
            running: Mutex::new(()),
        }
    }

    /// Run one batch over the whole recipient table.
    ///
    /// Per-row failures are recorded and skipped. Only a failure to read
    /// the table or the alias list is returned as an error.
    pub async fn run(&self) -> Result<DispatchSummary, CampaignError> {
        let Ok(_running) = self.running.try_lock() else {
            warn!("dispatch_already_running");
            return Ok(DispatchSummary::stopped(StopReason::AlreadyRunning));
        };

        let rows = self.store.read_all().await?;
        let aliases = self.sender.list_aliases().await?;

        let Some(pool) = AliasPool::new(aliases) else {
            warn!("dispatch_no_aliases_configured");
            return Ok(DispatchSummary::stopped(StopReason::NoAliasesConfigured));
        };

        info!(
            total_rows = rows.len().saturating_sub(1),
            alias_count = pool.len(),
            delay_ms = self.send_delay.as_millis() as u64,
            "dispatch_run_starting"
        );

        let mut summary = DispatchSummary::stopped(StopReason::Completed);

        // Row 0 is the header.
        for (row, cells) in rows.iter().enumerate().skip(1) {
            let record = RecipientRecord::from_row(row, cells);

            if !record.is_complete() {
                info!(row = row, "dispatch_incomplete_row");
                summary.stop = StopReason::IncompleteRecipientData { row };
                break;
            }

            let alias = pool.select(row);

            match self.sender.remaining_daily_quota().await {
                Ok(0) => {
                    warn!(row = row, sent = summary.sent, "dispatch_quota_exceeded");
                    summary.stop = StopReason::QuotaExceeded { row };
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(row = row, error = %e, "dispatch_quota_unavailable");
                    summary.stop = StopReason::QuotaUnavailable { row };
                    break;
                }
            }

            let pixel_url = tracking_url(&self.tracking_base, &record.address);
            let html_body = append_tracking_pixel(&record.body, &pixel_url);

            match self
                .sender
                .send_email(&record.address, &record.subject, &html_body, alias)
                .await
            {
                Ok(()) => {
                    summary.sent += 1;
                    self.mark_sent(row).await;
                    info!(row = row, to = %record.address, from = %alias, "dispatch_row_sent");
                }
                Err(e) => {
                    summary.failed += 1;
                    self.mark_failed(row).await;
                    error!(
                        row = row,
                        to = %record.address,
                        from = %alias,
                        error = %e,
                        "dispatch_row_failed"
                    );
                }
            }

            if row + 1 < rows.len() && !self.send_delay.is_zero() {
                sleep(self.send_delay).await;
            }
        }

        info!(
            sent = summary.sent,
            failed = summary.failed,
            stop = ?summary.stop,
            "dispatch_run_complete"
        );

        Ok(summary)
    }

    async fn mark_sent(&self, row: usize) {
        let now = format_timestamp(Utc::now());
        let _guard = self.locks.lock(row).await;

        let writes = [
            (Column::Status, StatusCell::Sent.as_str()),
            (Column::LastSentAt, now.as_str()),
            (Column::SentTimestamp, now.as_str()),
            (Column::OpenCount, ""),
        ];

        for (column, value) in writes {
            self.write(row, column, value).await;
        }
    }

    async fn mark_failed(&self, row: usize) {
        let _guard = self.locks.lock(row).await;
        self.write(row, Column::Status, StatusCell::Failed.as_str()).await;
    }

    async fn write(&self, row: usize, column: Column, value: &str) {
        if let Err(e) = self.store.update_cell(row, column, value).await {
            error!(
                row = row,
                column = column.name(),
                error = %e,
                "dispatch_store_update_failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use crate::error::{SendError, StoreError};
    use crate::store::{MemoryStore, Row, SendStatus};

    #[derive(Debug, Clone, PartialEq)]
    struct SentMail {
        to: String,
        subject: String,
        html: String,
        from: String,
    }

    /// Mail sender fake: records sends, fails for chosen addresses.
    struct RecordingSender {
        aliases: Vec<String>,
        quota: StdMutex<u32>,
        fail_for: HashSet<String>,
        sent: StdMutex<Vec<SentMail>>,
    }

    impl RecordingSender {
        fn new(aliases: &[&str], quota: u32) -> Self {
            Self {
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                quota: StdMutex::new(quota),
                fail_for: HashSet::new(),
                sent: StdMutex::new(Vec::new()),
            }
        }

        fn failing_for(mut self, address: &str) -> Self {
            self.fail_for.insert(address.to_string());
            self
        }

        fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailSender for RecordingSender {
        async fn send_email(
            &self,
            to: &str,
            subject: &str,
            html_body: &str,
            from_alias: &str,
        ) -> Result<(), SendError> {
            if self.fail_for.contains(to) {
                return Err(SendError::Rejected {
                    status: 400,
                    body: "rejected".to_string(),
                });
            }
            *self.quota.lock().unwrap() -= 1;
            self.sent.lock().unwrap().push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html_body.to_string(),
                from: from_alias.to_string(),
            });
            Ok(())
        }

        async fn remaining_daily_quota(&self) -> Result<u32, SendError> {
            Ok(*self.quota.lock().unwrap())
        }

        async fn list_aliases(&self) -> Result<Vec<String>, SendError> {
            Ok(self.aliases.clone())
        }
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl RecipientStore for ReadOnlyStore {
        async fn read_all(&self) -> Result<Vec<Row>, StoreError> {
            self.0.read_all().await
        }

        async fn update_cell(&self, _row: usize, _column: Column, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
    }

    const HEADER: &[&str] = &[
        "email", "subject", "body", "last_sent", "status", "last_open", "opens", "sent_at",
    ];

    fn dispatcher(store: Arc<dyn RecipientStore>, sender: Arc<RecordingSender>) -> Dispatcher {
        dispatcher_with_delay(store, sender, Duration::ZERO)
    }

    fn dispatcher_with_delay(
        store: Arc<dyn RecipientStore>,
        sender: Arc<RecordingSender>,
        delay: Duration,
    ) -> Dispatcher {
        Dispatcher::new(
            store,
            sender,
            RowLocks::new(),
            Url::parse("https://t.example.com/track").unwrap(),
            delay,
        )
    }

    async fn record(store: &MemoryStore, row: usize) -> RecipientRecord {
        RecipientRecord::from_row(row, &store.read_row(row).await.unwrap())
    }

    #[tokio::test]
    async fn test_end_to_end_stops_at_blank_row() {
        let store = MemoryStore::from_cells(&[
            HEADER,
            &["a@x.com", "Hi", "Body"],
            &["b@x.com", "Hi2", "Body2"],
            &["", "", ""],
        ]);
        let sender = Arc::new(RecordingSender::new(&["alias0@x.com", "alias1@x.com"], 10));

        let summary = dispatcher(Arc::new(store.clone()), Arc::clone(&sender))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.sent, 2);
        assert_eq!(summary.stop, StopReason::IncompleteRecipientData { row: 3 });

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@x.com");
        assert_eq!(sent[0].from, "alias1@x.com");
        assert_eq!(sent[1].to, "b@x.com");
        assert_eq!(sent[1].from, "alias0@x.com");

        for row in [1, 2] {
            let rec = record(&store, row).await;
            assert_eq!(rec.send_status(), SendStatus::Sent);
            assert!(rec.last_sent_at.is_some());
            assert_eq!(rec.sent_timestamp, rec.last_sent_at);
        }
        assert_eq!(store.read_row(3).await.unwrap(), vec!["", "", ""]);
    }

    #[tokio::test]
    async fn test_no_aliases_sends_nothing() {
        let store = MemoryStore::from_cells(&[HEADER, &["a@x.com", "Hi", "Body"]]);
        let before = store.snapshot().await;
        let sender = Arc::new(RecordingSender::new(&[], 10));

        let summary = dispatcher(Arc::new(store.clone()), Arc::clone(&sender))
            .run()
            .await
            .unwrap();

        assert_eq!(summary, DispatchSummary::stopped(StopReason::NoAliasesConfigured));
        assert!(sender.sent().is_empty());
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_quota_caps_sends() {
        let store = MemoryStore::from_cells(&[
            HEADER,
            &["a@x.com", "Hi", "Body"],
            &["b@x.com", "Hi", "Body"],
            &["c@x.com", "Hi", "Body"],
            &["d@x.com", "Hi", "Body"],
        ]);
        let sender = Arc::new(RecordingSender::new(&["alias@x.com"], 2));

        let summary = dispatcher(Arc::new(store.clone()), Arc::clone(&sender))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.sent, 2);
        assert_eq!(summary.stop, StopReason::QuotaExceeded { row: 3 });
        assert_eq!(record(&store, 3).await.send_status(), SendStatus::Unset);
        assert_eq!(record(&store, 4).await.send_status(), SendStatus::Unset);
    }

    #[tokio::test]
    async fn test_gap_leaves_later_rows_untouched() {
        let store = MemoryStore::from_cells(&[
            HEADER,
            &["a@x.com", "Hi", "Body"],
            &["", "Hi", "Body"],
            &["c@x.com", "Hi", "Body"],
        ]);
        let sender = Arc::new(RecordingSender::new(&["alias@x.com"], 10));

        let summary = dispatcher(Arc::new(store.clone()), Arc::clone(&sender))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.stop, StopReason::IncompleteRecipientData { row: 2 });
        assert_eq!(sender.sent().len(), 1);
        assert_eq!(store.read_row(3).await.unwrap(), vec!["c@x.com", "Hi", "Body"]);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_rotation_is_positional() {
        let store = MemoryStore::from_cells(&[
            HEADER,
            &["a@x.com", "Hi", "Body"],
            &["b@x.com", "Hi", "Body"],
            &["c@x.com", "Hi", "Body"],
        ]);
        let sender = Arc::new(
            RecordingSender::new(&["alias0@x.com", "alias1@x.com", "alias2@x.com"], 10)
                .failing_for("b@x.com"),
        );

        let summary = dispatcher(Arc::new(store.clone()), Arc::clone(&sender))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.stop, StopReason::Completed);

        let failed = record(&store, 2).await;
        assert_eq!(failed.send_status(), SendStatus::Failed);
        assert!(failed.last_sent_at.is_none());

        let sent = sender.sent();
        assert_eq!(sent[0].from, "alias1@x.com");
        assert_eq!(sent[1].to, "c@x.com");
        assert_eq!(sent[1].from, "alias0@x.com");
    }

    #[tokio::test]
    async fn test_body_carries_tracking_pixel() {
        let store = MemoryStore::from_cells(&[HEADER, &["a+b@x.com", "Hi", "<p>Body</p>"]]);
        let sender = Arc::new(RecordingSender::new(&["alias@x.com"], 10));

        dispatcher(Arc::new(store), Arc::clone(&sender)).run().await.unwrap();

        let sent = sender.sent();
        assert_eq!(sent[0].subject, "Hi");
        assert!(sent[0].html.starts_with("<p>Body</p><img src="));
        assert!(sent[0]
            .html
            .contains("https://t.example.com/track?email=a%2Bb%40x.com"));
    }

    #[tokio::test]
    async fn test_resend_clears_open_count() {
        let store = MemoryStore::from_cells(&[
            HEADER,
            &["a@x.com", "Hi", "Body", "", "Opened", "2026-01-01T00:00:00Z", "3", ""],
        ]);
        let sender = Arc::new(RecordingSender::new(&["alias@x.com"], 10));

        dispatcher(Arc::new(store.clone()), sender).run().await.unwrap();

        let row = store.read_row(1).await.unwrap();
        assert_eq!(row[Column::OpenCount.index()], "");
        assert_eq!(row[Column::Status.index()], "Sent");
    }

    #[tokio::test]
    async fn test_store_write_failure_does_not_stop_batch() {
        let store = MemoryStore::from_cells(&[
            HEADER,
            &["a@x.com", "Hi", "Body"],
            &["b@x.com", "Hi", "Body"],
        ]);
        let sender = Arc::new(RecordingSender::new(&["alias@x.com"], 10));

        let summary = dispatcher(Arc::new(ReadOnlyStore(store)), Arc::clone(&sender))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.sent, 2);
        assert_eq!(summary.stop, StopReason::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_sends() {
        let store = MemoryStore::from_cells(&[
            HEADER,
            &["a@x.com", "Hi", "Body"],
            &["b@x.com", "Hi", "Body"],
            &["c@x.com", "Hi", "Body"],
        ]);
        let sender = Arc::new(RecordingSender::new(&["alias@x.com"], 10));
        let dispatcher =
            dispatcher_with_delay(Arc::new(store), sender, Duration::from_millis(40));

        let started = tokio::time::Instant::now();
        dispatcher.run().await.unwrap();

        // Two pauses: none after the last row.
        assert_eq!(started.elapsed(), Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_run_is_rejected() {
        let store = MemoryStore::from_cells(&[
            HEADER,
            &["a@x.com", "Hi", "Body"],
            &["b@x.com", "Hi", "Body"],
        ]);
        let sender = Arc::new(RecordingSender::new(&["alias@x.com"], 10));
        let dispatcher = Arc::new(dispatcher_with_delay(
            Arc::new(store),
            Arc::clone(&sender),
            Duration::from_millis(200),
        ));

        let first = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = dispatcher.run().await.unwrap();
        assert_eq!(second.stop, StopReason::AlreadyRunning);

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.sent, 2);
        assert_eq!(sender.sent().len(), 2);
    }
}
