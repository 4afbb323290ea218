//! In-memory recipient store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{set_cell, Column, RecipientStore, Row};
use crate::error::StoreError;

/// Recipient table held entirely in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<Vec<Row>>>,
}

impl MemoryStore {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows)),
        }
    }

    /// Build a store from string literals, header first.
    pub fn from_cells(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    /// Copy of the current table.
    pub async fn snapshot(&self) -> Vec<Row> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl RecipientStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<Row>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn read_row(&self, row: usize) -> Result<Row, StoreError> {
        self.rows
            .read()
            .await
            .get(row)
            .cloned()
            .ok_or(StoreError::RowOutOfRange(row))
    }

    async fn update_cell(&self, row: usize, column: Column, value: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let target = rows.get_mut(row).ok_or(StoreError::RowOutOfRange(row))?;
        set_cell(target, column, value);
        Ok(())
    }
}
