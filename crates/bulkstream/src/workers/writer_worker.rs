//! 🎬 *[a channel fills with chunks. a timer ticks. somewhere, a buffer waits.]*
//!
//! 🪣 The WriterWorker: owns one writer, drains one channel, minds one timer.
//! It is, in many ways, the most emotionally stable part of this codebase.

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::backends::BulkClient;
use crate::common::Chunk;
use crate::writer::{BufferedBatchWriter, StatsSnapshot};

/// 🪣 Feeds chunks from a channel into a [`BufferedBatchWriter`] and fires its
/// inactivity flushes. Closes the writer when the channel closes.
#[derive(Debug)]
pub struct WriterWorker<C: BulkClient> {
    rx: Receiver<Chunk>,
    writer: BufferedBatchWriter<C>,
}

impl<C: BulkClient> WriterWorker<C> {
    pub fn new(rx: Receiver<Chunk>, writer: BufferedBatchWriter<C>) -> Self {
        Self { rx, writer }
    }
}

impl<C: BulkClient> Worker for WriterWorker<C> {
    type Output = StatsSnapshot;

    fn start(self) -> JoinHandle<Result<StatsSnapshot>> {
        let WriterWorker { rx, mut writer } = self;
        tokio::spawn(async move {
            debug!("📥 WriterWorker started draining channel...");
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(chunk) => writer.submit(chunk),
                        Err(_) => {
                            // -- channel is empty and closed
                            debug!("🏁 WriterWorker: channel closed, draining and shutting down");
                            return writer
                                .close()
                                .await
                                .context("💀 WriterWorker failed to close the writer");
                        }
                    },
                    _ = writer.flush_when_idle() => {}
                }
            }
        })
    }
}
