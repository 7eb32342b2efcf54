//! 🧵 Workers: the tasks that actually keep the writer fed and awake.
//!
//! The writer is a plain `&mut self` state machine. Somebody has to own it,
//! hand it chunks, and poke it when the flush timer goes off. That somebody
//! lives here.
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use anyhow::Result;
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;

mod writer_worker;
pub use writer_worker::WriterWorker;

use crate::backends::BulkClient;
use crate::common::Chunk;
use crate::writer::{BufferedBatchWriter, StatsSnapshot, WriterConfig, WriterError};

/// 🏗️ A background worker, that does work. duh.
pub trait Worker {
    type Output;

    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    fn start(self) -> JoinHandle<Result<Self::Output>>;
}

/// 🚀 Spawn a writer behind a bounded chunk channel.
///
/// Returns the sending side (send = accept a chunk, close/drop = end of stream),
/// the error notifications, and the worker's handle, which yields the final
/// stats once the stream has ended and every bulk call has come back.
///
/// `queue_capacity` is the backpressure knob: a full channel makes `send` wait.
/// Zero is bumped to one, because a rendezvous channel is not a queue.
pub fn spawn_writer<C: BulkClient>(
    client: C,
    config: WriterConfig,
    queue_capacity: usize,
) -> (
    Sender<Chunk>,
    Receiver<WriterError>,
    JoinHandle<Result<StatsSnapshot>>,
) {
    let (tx, rx) = async_channel::bounded(queue_capacity.max(1));
    let (writer, errors) = BufferedBatchWriter::new(client, config);
    let handle = WriterWorker::new(rx, writer).start();
    (tx, errors, handle)
}
