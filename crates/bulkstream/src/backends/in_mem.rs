//! 📦 A bulk client that never forgets.
//!
//! `InMemoryBulkClient` keeps every batch it receives behind an
//! `Arc<Mutex<Vec<..>>>`, so tests can hand a clone to the writer and peek
//! inside afterwards. It also backs the `InMemory` dry-run mode, where the
//! pipeline runs end to end and indexes precisely nothing.
//!
//! ⚠️ Not for production. Unless your production is a unit test.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::BulkClient;
use crate::common::BulkBatch;

/// 📦 Hoards batches. Clone-able, and every clone shares the same hoard.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBulkClient {
    /// 🔒 The evidence locker. One entry per `bulk()` call, in completion order.
    received: Arc<Mutex<Vec<BulkBatch>>>,
}

impl InMemoryBulkClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔍 A copy of every batch received so far.
    pub async fn batches(&self) -> Vec<BulkBatch> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl BulkClient for InMemoryBulkClient {
    /// 📡 Lock, push, answer like a cluster that had a good day.
    async fn bulk(&self, batch: BulkBatch) -> Result<Value> {
        let items = batch.record_count();
        self.received.lock().await.push(batch);
        Ok(json!({ "errors": false, "items": items }))
    }
}
