//! 🎼 Composers: turning a [`BulkBatch`] into the bytes the wire expects.
//!
//! 🧠 Knowledge graph:
//! - **NDJSON** (`NdjsonComposer`): one JSON document per line, trailing `\n`.
//!   This is what Elasticsearch `/_bulk` demands.
//! - Each record contributes two lines: the action envelope, then the document.
//!
//! ```text
//! {"index":{"_index":"people","_type":"person","_id":"1"}}
//! {"name":"Ada"}
//! {"index":{"_index":"people","_type":"person","_id":"2"}}
//! {"name":"Grace"}
//! ```
//!
//! What's the DEAL with NDJSON? It's JSON but every document is in solitary confinement. 🦆

use anyhow::{Context, Result};

use crate::common::BulkBatch;

/// 🎼 Renders a batch into a single wire-format payload.
pub(crate) trait Composer: std::fmt::Debug {
    fn compose(&self, batch: &BulkBatch) -> Result<String>;
}

/// 📡 Newline-Delimited JSON: the format ES `/_bulk` demands.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NdjsonComposer;

impl Composer for NdjsonComposer {
    fn compose(&self, batch: &BulkBatch) -> Result<String> {
        // 🧮 vibes-based pre-allocation, usually close enough
        let mut payload = String::with_capacity(batch.entries.len() * 64);
        for entry in &batch.entries {
            let line = serde_json::to_string(entry).context(
                "💀 Failed to serialize a bulk entry. The JSON that describes JSON has failed to become JSON.",
            )?;
            payload.push_str(&line);
            payload.push('\n');
        }
        // ✅ trailing \n included, ES bulk requires it
        Ok(payload)
    }
}
