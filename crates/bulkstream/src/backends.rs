//! 🔌 Backends: where the batches finally leave the building.
//!
//! 🚰 The writer decides when and what to send. A backend decides how: an HTTP
//! POST to `/_bulk`, or a push onto an in-memory Vec for tests and dry runs.
//! The writer only ever sees the [`BulkClient`] trait.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::common::BulkBatch;

pub mod elasticsearch;
pub mod in_mem;

pub use elasticsearch::{ElasticsearchBulkClient, ElasticsearchConfig};
pub use in_mem::InMemoryBulkClient;

/// 📡 The downstream bulk-indexing capability. One call, many records.
///
/// # Contract 📜
/// - `batch` alternates command descriptors and payloads, `2 * count` entries long.
/// - `Ok(response)` means the call completed without a transport/HTTP error. The
///   response body is handed back as-is; nobody here inspects it.
/// - `Err(..)` is reported once on the writer's error channel. No retries.
/// - Takes `&self`: the writer does not serialize calls, several may be in flight.
#[async_trait]
pub trait BulkClient: std::fmt::Debug + Send + Sync + 'static {
    /// 📦 Send one batch. Whatever happens, happens once.
    async fn bulk(&self, batch: BulkBatch) -> Result<Value>;
}

/// 🔧 Which backend to build, straight from config.
///
/// ```toml
/// [bulk_config.Elasticsearch]
/// url = "http://localhost:9200"
/// ```
/// or `bulk_config = "InMemory"` for a dry run that indexes nothing.
#[derive(Debug, Deserialize, Clone)]
pub enum BulkConfig {
    Elasticsearch(ElasticsearchConfig),
    InMemory,
}

/// 🎭 The many faces of a bulk client: enum dispatch, no vtables.
///
/// Keeps `run()` blissfully ignorant of where the batches actually land.
#[derive(Debug)]
pub enum BulkBackend {
    InMemory(InMemoryBulkClient),
    Elasticsearch(ElasticsearchBulkClient),
}

impl BulkBackend {
    /// 🏗️ Build the configured backend. Elasticsearch pings the cluster on the way up.
    pub async fn from_config(config: BulkConfig) -> Result<Self> {
        Ok(match config {
            BulkConfig::Elasticsearch(es_config) => {
                Self::Elasticsearch(ElasticsearchBulkClient::new(es_config).await?)
            }
            BulkConfig::InMemory => Self::InMemory(InMemoryBulkClient::new()),
        })
    }
}

#[async_trait]
impl BulkClient for BulkBackend {
    async fn bulk(&self, batch: BulkBatch) -> Result<Value> {
        match self {
            BulkBackend::InMemory(client) => client.bulk(batch).await,
            BulkBackend::Elasticsearch(client) => client.bulk(batch).await,
        }
    }
}
