//! Typed view over a raw recipient row.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use super::Column;

/// Contents of the status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCell {
    Unset,
    Sent,
    Failed,
    Opened,
}

impl StatusCell {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCell::Unset => "",
            StatusCell::Sent => "Sent",
            StatusCell::Failed => "Failed",
            StatusCell::Opened => "Opened",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Sent" => StatusCell::Sent,
            "Failed" => StatusCell::Failed,
            "Opened" => StatusCell::Opened,
            _ => StatusCell::Unset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Unset,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStatus {
    Unset,
    Opened,
}

/// One recipient row, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientRecord {
    /// Position in the store (header is row 0)
    pub row: usize,
    pub address: String,
    pub subject: String,
    pub body: String,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub status: StatusCell,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub open_count: u64,
    pub sent_timestamp: Option<DateTime<Utc>>,
}

impl RecipientRecord {
    pub fn from_row(row: usize, cells: &[String]) -> Self {
        let cell = |column: Column| cells.get(column.index()).map(String::as_str).unwrap_or("");

        RecipientRecord {
            row,
            address: cell(Column::Address).to_string(),
            subject: cell(Column::Subject).to_string(),
            body: cell(Column::Body).to_string(),
            last_sent_at: parse_timestamp(cell(Column::LastSentAt)),
            status: StatusCell::parse(cell(Column::Status)),
            last_opened_at: parse_timestamp(cell(Column::LastOpenedAt)),
            open_count: parse_open_count(cell(Column::OpenCount)),
            sent_timestamp: parse_timestamp(cell(Column::SentTimestamp)),
        }
    }

    /// Address, subject and body are all non-empty. Whitespace counts as
    /// content.
    pub fn is_complete(&self) -> bool {
        !self.address.is_empty() && !self.subject.is_empty() && !self.body.is_empty()
    }

    /// An opened message was necessarily sent first.
    pub fn send_status(&self) -> SendStatus {
        match self.status {
            StatusCell::Sent | StatusCell::Opened => SendStatus::Sent,
            StatusCell::Failed => SendStatus::Failed,
            StatusCell::Unset => SendStatus::Unset,
        }
    }

    pub fn open_status(&self) -> OpenStatus {
        match self.status {
            StatusCell::Opened => OpenStatus::Opened,
            _ => OpenStatus::Unset,
        }
    }

    /// Time the open debounce is measured from.
    pub fn sent_anchor(&self) -> Option<DateTime<Utc>> {
        self.sent_timestamp.or(self.last_sent_at)
    }
}

/// Render a timestamp as RFC 3339 with an explicit UTC offset.
///
/// Milliseconds are kept: the send time anchors the open debounce and must
/// not be rounded down.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp cell.
///
/// Accepts RFC 3339 and the plain `YYYY-MM-DD HH:MM:SS` form (read as UTC)
/// that hand-edited sheets tend to contain.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_open_count(raw: &str) -> u64 {
    raw.trim().parse().unwrap_or(0)
}
