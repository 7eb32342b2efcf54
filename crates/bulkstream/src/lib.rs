//! 🚀 bulkstream: one record in, a thousand records out.
//!
//! A buffering, batching write adapter for bulk-indexing APIs. Records are pushed
//! one at a time; the [`BufferedBatchWriter`] validates them, buffers them as
//! (command, payload) pairs, and ships them in batches when the buffer fills up
//! or goes quiet.
//!
//! ```text
//! NDJSON lines ──▶ channel ──▶ WriterWorker ──▶ BufferedBatchWriter ──▶ BulkClient::bulk()
//!                                   ▲                    │
//!                                   └── flush timer ◀────┘
//! ```

pub mod app_config;
pub mod backends;
pub mod common;
pub(crate) mod composers;
pub mod workers;
pub mod writer;

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

pub use backends::{BulkBackend, BulkClient, BulkConfig};
pub use common::{BatchEntry, BulkBatch, Chunk, CommandDescriptor, Record};
pub use workers::spawn_writer;
pub use writer::{BufferedBatchWriter, StatsSnapshot, WriterConfig, WriterError};

use crate::app_config::AppConfig;

/// 🚀 The whole pipeline: build the backend, spawn the writer, pour the input in,
/// wait for the last batch to land, return the final counters.
///
/// Rejected chunks and failed bulk calls are logged and counted, never fatal.
/// Only setup and I/O failures make this return `Err`.
pub async fn run(app_config: AppConfig) -> Result<StatsSnapshot> {
    let client = BulkBackend::from_config(app_config.bulk_config)
        .await
        .context("💀 Could not set up the bulk client. Nothing was read, nothing was sent.")?;

    let (tx, errors, handle) = spawn_writer(
        client,
        app_config.writer,
        app_config.runtime.queue_capacity,
    );

    // 📡 Somebody has to listen, or the errors just evaporate
    let error_watcher = tokio::spawn(async move {
        while let Ok(err) = errors.recv().await {
            if err.is_rejection() {
                warn!("🚫 {}", err);
            } else {
                tracing::error!("💀 {}", err);
            }
        }
    });

    let fed = match app_config.runtime.input_file {
        Some(ref path) => {
            info!("📜 Reading records from {}", path.display());
            let file = tokio::fs::File::open(path)
                .await
                .context(format!("💀 Could not open input file '{}'", path.display()))?;
            feed_lines(BufReader::new(file), &tx).await
        }
        None => {
            info!("📜 Reading records from stdin");
            feed_lines(BufReader::new(tokio::io::stdin()), &tx).await
        }
    };
    // 🏁 closing the channel is the end-of-stream signal
    tx.close();

    let stats = handle
        .await
        .context("💀 The writer task panicked. The buffer went down with it.")??;
    error_watcher
        .await
        .context("💀 The error watcher panicked. Irony noted.")?;
    let lines = fed?;
    debug!("✅ {} lines fed to the writer", lines);

    Ok(stats)
}

/// 📥 Send every non-blank line of `reader` to the writer as an encoded chunk.
///
/// Waits whenever the channel is full. Returns the number of lines sent.
pub async fn feed_lines<R>(reader: R, tx: &Sender<Chunk>) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0u64;
    while let Some(line) = lines
        .next_line()
        .await
        .context("💀 Failed to read the next input line")?
    {
        if line.trim().is_empty() {
            continue;
        }
        tx.send(Chunk::Encoded(line))
            .await
            .context("💀 The writer hung up while we were still talking")?;
        sent += 1;
    }
    Ok(sent)
}
