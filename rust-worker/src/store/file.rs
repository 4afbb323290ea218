//! JSON-file-backed recipient store.
//!
//! The file holds the table as a JSON array of string arrays, header row
//! first. Every read goes to disk so edits made by other tools are picked
//! up; every write replaces the file through a temporary file and rename.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use super::{set_cell, Column, RecipientStore, Row};
use crate::error::StoreError;

#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes writers inside this process. Other processes writing the
    // same file are not coordinated.
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Row>, StoreError> {
        let raw = fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn save(&self, rows: &[Row]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(rows)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecipientStore for JsonFileStore {
    async fn read_all(&self) -> Result<Vec<Row>, StoreError> {
        self.load().await
    }

    async fn update_cell(&self, row: usize, column: Column, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut rows = self.load().await?;
        let target = rows.get_mut(row).ok_or(StoreError::RowOutOfRange(row))?;
        set_cell(target, column, value);
        self.save(&rows).await?;

        info!(
            path = %self.path.display(),
            row = row,
            column = column.name(),
            "store_cell_updated"
        );

        Ok(())
    }
}
