//! 📡 The Elasticsearch bulk client: pure I/O, zero buffering.
//!
//! The writer already decided what goes in the batch. This client renders it
//! as NDJSON, POSTs it to `/_bulk`, and reports how that went. That's it.
//! Knock knock. Who's there? HTTP POST. HTTP POST who? HTTP POST your NDJSON
//! and hope the cluster's in a good mood.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::BulkClient;
use crate::common::BulkBatch;
use crate::composers::{Composer, NdjsonComposer};

/// 🔧 Where the cluster lives and how to get past the bouncer.
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    /// 📡 Cluster root URL, e.g. `http://localhost:9200`.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key. Wins over basic auth when both are set. This is not a democracy.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// ⏱️ Whole-request timeout. Bulk requests can be meaty and we're not monsters.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ElasticsearchConfig {
    /// 🏗️ Just a URL, default timeouts, no auth. The local-docker special.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 📡 POSTs rendered batches to `<url>/_bulk`. One client, reused across calls.
#[derive(Debug)]
pub struct ElasticsearchBulkClient {
    client: reqwest::Client,
    config: ElasticsearchConfig,
    composer: NdjsonComposer,
}

impl ElasticsearchBulkClient {
    /// 🚀 Build the HTTP client and ping the cluster root.
    ///
    /// If the cluster is not there, we find out now, rather than quietly
    /// 50,000 records later on the error channel.
    pub async fn new(config: ElasticsearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;

        let this = Self {
            client,
            config,
            composer: NdjsonComposer,
        };

        // -- 📡 "Hello? Is this thing on?"
        let response = this
            .authorize(this.client.get(&this.config.url))
            .send()
            .await
            .context(format!(
                "💀 Could not reach Elasticsearch at '{}'. The cluster is giving us the silent treatment.",
                this.config.url
            ))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "💀 Elasticsearch at '{}' answered the connectivity ping with '{}'. Check the URL and the credentials.",
                this.config.url,
                status
            );
        }
        debug!("✅ Elasticsearch at {} is home and answering the door", this.config.url);

        Ok(this)
    }

    // -- 🔒 api_key beats basic auth in this club
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.config.username {
            request.basic_auth(username, self.config.password.as_ref())
        } else {
            request
        }
    }
}

#[async_trait]
impl BulkClient for ElasticsearchBulkClient {
    /// 📡 Render, POST, check the status. No retries; retries are somebody else's problem.
    async fn bulk(&self, batch: BulkBatch) -> Result<Value> {
        let body = self.composer.compose(&batch)?;
        let bulk_url = format!("{}/_bulk", self.config.url.trim_end_matches('/'));
        debug!(
            "📡 Sending {} records ({} bytes) to {}",
            batch.record_count(),
            body.len(),
            bulk_url
        );

        let response = self
            .authorize(self.client.post(&bulk_url))
            // ⚠️ application/x-ndjson, not application/json. ES cares. A lot.
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("💀 The bulk request never made it to Elasticsearch. Check connectivity, check timeouts, and check your feelings.")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("💀 Elasticsearch answered, but the response body got lost on the way back.")?;
        if !status.is_success() {
            anyhow::bail!(
                "💀 The bulk request arrived, but Elasticsearch said '{}'. The body of the response read: '{}'.",
                status,
                text
            );
        }

        trace!("🚀 Bulk request landed, documents have left the building");
        // -- the body is handed back, never judged
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
