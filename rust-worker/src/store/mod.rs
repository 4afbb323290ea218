//! Recipient store abstraction.
//!
//! The store is a table of string cells addressed by row position and a
//! fixed column layout. Row 0 is a header; data starts at row 1.
//!
//! Population discipline: recipient rows must be contiguous. The dispatcher
//! stops at the first row missing an address, subject or body, so anything
//! after a gap is never sent.

pub mod file;
pub mod locks;
pub mod memory;
pub mod record;

use async_trait::async_trait;

use crate::error::StoreError;

pub use file::JsonFileStore;
pub use locks::RowLocks;
pub use memory::MemoryStore;
pub use record::{format_timestamp, parse_timestamp, OpenStatus, RecipientRecord, SendStatus, StatusCell};

/// A single row of cells in store order.
pub type Row = Vec<String>;

/// Stable column layout of the recipient table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Address,
    Subject,
    Body,
    LastSentAt,
    /// Lifecycle text: `Sent`, `Failed` or `Opened`
    Status,
    LastOpenedAt,
    OpenCount,
    /// Canonical send time used to anchor the open debounce
    SentTimestamp,
}

impl Column {
    pub const COUNT: usize = 8;

    /// Zero-based cell index within a row.
    pub fn index(self) -> usize {
        match self {
            Column::Address => 0,
            Column::Subject => 1,
            Column::Body => 2,
            Column::LastSentAt => 3,
            Column::Status => 4,
            Column::LastOpenedAt => 5,
            Column::OpenCount => 6,
            Column::SentTimestamp => 7,
        }
    }

    /// One-based column number, as shown in spreadsheet-style tooling.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Column::Address => "address",
            Column::Subject => "subject",
            Column::Body => "body",
            Column::LastSentAt => "last_sent_at",
            Column::Status => "status",
            Column::LastOpenedAt => "last_opened_at",
            Column::OpenCount => "open_count",
            Column::SentTimestamp => "sent_timestamp",
        }
    }
}

/// Tabular storage for recipient rows.
///
/// Implementations only need to be consistent per call; callers that
/// read-modify-write a row hold the matching [`RowLocks`] guard.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Read every row, header included, in store order.
    async fn read_all(&self) -> Result<Vec<Row>, StoreError>;

    /// Read a single row by position.
    async fn read_row(&self, row: usize) -> Result<Row, StoreError> {
        self.read_all()
            .await?
            .into_iter()
            .nth(row)
            .ok_or(StoreError::RowOutOfRange(row))
    }

    /// Overwrite one cell.
    async fn update_cell(&self, row: usize, column: Column, value: &str) -> Result<(), StoreError>;
}

/// Write `value` into `row`, padding it with empty cells if it is short.
pub(crate) fn set_cell(row: &mut Row, column: Column, value: &str) {
    let idx = column.index();
    if row.len() <= idx {
        row.resize(idx + 1, String::new());
    }
    row[idx] = value.to_string();
}
