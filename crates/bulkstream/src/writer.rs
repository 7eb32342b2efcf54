//! 🎬 *[a record arrives. then another. then nine hundred and ninety eight more.]*
//! *[somewhere, a bulk API sighs with relief. finally, a reasonable request size.]*
//!
//! 🪣 The BufferedBatchWriter: the part of bulkstream that actually has opinions.
//!
//! It takes records one at a time, validates them, files each one as a
//! (command, payload) pair at the back of a FIFO buffer, and decides when to ship:
//! - as soon as `batch_size` records are waiting, or
//! - when the buffer has been left alone for `inactivity_timeout`, or
//! - when the stream ends.
//!
//! Shipping means draining the oldest `batch_size` records into a [`BulkBatch`]
//! and handing it to [`BulkClient::bulk`] on a spawned task. The writer never waits
//! for that call. It finds out how it went through the stats and the error channel.
//!
//! ```text
//! submit(chunk) → parse → validate → buffer.push(cmd, data) → flush(false)
//!                                                                 │
//!         timer fires → flush(true) ─────────────────────────────┤
//!         end()       → flush(true) ─────────────────────────────┤
//!                                                                 ▼
//!                           drain ≤ batch_size records → spawn bulk(batch)
//! ```
//!
//! ⚠️ No retries. A failed batch is reported and forgotten. That's the deal.

mod errors;
mod flush_timer;
mod parse;
mod stats;

pub use errors::WriterError;
pub use stats::StatsSnapshot;

use std::collections::VecDeque;
use std::num::{NonZeroU64, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::{Receiver, Sender};
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace};

use crate::backends::BulkClient;
use crate::common::{BatchEntry, BulkBatch, Chunk};
use flush_timer::FlushTimer;
use parse::parse_chunk;
use stats::WriterStats;

const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(1000).unwrap();
const DEFAULT_INACTIVITY_TIMEOUT_MS: NonZeroU64 = NonZeroU64::new(1000).unwrap();

/// 🔧 How big a batch, and how long to wait for one.
///
/// Both knobs are non-zero by type. A zero batch size would flush forever,
/// a zero timeout would flush constantly. Serde rejects both at load time.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// 📦 Records per bulk call.
    #[serde(default = "default_batch_size", alias = "buffer")]
    pub batch_size: NonZeroUsize,
    /// ⏱️ Max idle time for a partially filled buffer, in milliseconds.
    #[serde(default = "default_inactivity_timeout_ms", alias = "timeout")]
    pub inactivity_timeout_ms: NonZeroU64,
}

fn default_batch_size() -> NonZeroUsize {
    DEFAULT_BATCH_SIZE
}

fn default_inactivity_timeout_ms() -> NonZeroU64 {
    DEFAULT_INACTIVITY_TIMEOUT_MS
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            inactivity_timeout_ms: DEFAULT_INACTIVITY_TIMEOUT_MS,
        }
    }
}

impl WriterConfig {
    /// 🏗️ Build a config from plain integers. Zero is a configuration error, not a vibe.
    pub fn new(batch_size: usize, inactivity_timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            batch_size: NonZeroUsize::new(batch_size)
                .context("💀 batch_size must be at least 1. A batch of nothing is just a very expensive no-op.")?,
            inactivity_timeout_ms: NonZeroU64::new(inactivity_timeout_ms)
                .context("💀 inactivity_timeout_ms must be at least 1. Zero patience is not a timeout, it's a busy loop.")?,
        })
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms.get())
    }
}

/// 🪣 Buffers validated records and ships them to a [`BulkClient`] in batches.
///
/// Single owner, `&mut self` everywhere. The buffer is never shared; only the
/// counters are, because in-flight bulk tasks update them when they land.
///
/// Must be used inside a tokio runtime: flushing spawns tasks and the flush
/// timer is a tokio `Sleep`.
///
/// ⚠️ Call [`close`](Self::close) when done. Dropping the writer aborts every
/// bulk call that has not completed yet. Rust does not do async drop.
#[derive(Debug)]
pub struct BufferedBatchWriter<C: BulkClient> {
    client: Arc<C>,
    config: WriterConfig,
    buffer: VecDeque<BatchEntry>,
    stats: Arc<WriterStats>,
    errors: Sender<WriterError>,
    flush_timer: FlushTimer,
    in_flight: JoinSet<()>,
}

impl<C: BulkClient> BufferedBatchWriter<C> {
    /// 🚀 Build a writer and the receiving end of its error channel.
    ///
    /// Drop the receiver if you don't care about errors; they will be swallowed
    /// (the stats still count them).
    pub fn new(client: C, config: WriterConfig) -> (Self, Receiver<WriterError>) {
        let (errors, error_rx) = async_channel::unbounded();
        let writer = Self {
            client: Arc::new(client),
            config,
            buffer: VecDeque::new(),
            stats: Arc::new(WriterStats::default()),
            errors,
            flush_timer: FlushTimer::default(),
            in_flight: JoinSet::new(),
        };
        (writer, error_rx)
    }

    /// 📥 Accept one chunk: parse, validate, buffer, maybe flush.
    ///
    /// Returns once the chunk is either buffered or rejected. It never waits on a
    /// bulk call. Rejections bump `error` and go to the error channel.
    pub fn submit(&mut self, chunk: impl Into<Chunk>) {
        let record = match parse_chunk(chunk.into()) {
            Ok(record) => record,
            Err(rejection) => {
                self.stats.record_error();
                debug!("🚫 chunk rejected: {}", rejection);
                self.notify(rejection);
                return;
            }
        };

        self.stats.record_ok();
        trace!(
            "📦 buffering {}/{}/{}",
            record.index, record.doc_type, record.id
        );
        self.buffer.extend(record.into_entries());
        self.flush(false);
    }

    /// 🚽 Ship the oldest `batch_size` records if there are enough of them, or if `force`.
    ///
    /// An unforced call below the threshold sends nothing. A forced call on an
    /// empty buffer sends nothing either; no empty bulk requests, please.
    ///
    /// Every call ends by rescheduling the inactivity timer while records remain
    /// buffered, and cancelling it once the buffer is empty.
    pub fn flush(&mut self, force: bool) {
        let batch_size = self.config.batch_size.get();
        if force || self.buffered_records() >= batch_size {
            self.reap_finished();
            let take = self.buffer.len().min(batch_size.saturating_mul(2));
            if take > 0 {
                let batch = BulkBatch::new(self.buffer.drain(..take).collect());
                let records = batch.record_count();
                self.stats.record_written(records as u64);
                self.dispatch(batch);

                let snapshot = self.stats.snapshot();
                info!(
                    written = snapshot.written,
                    inserted = snapshot.inserted,
                    queued = snapshot.queued(),
                    "📡 writing {} records to the bulk API",
                    records
                );
            } else {
                trace!("💤 forced flush on an empty buffer, nothing to send");
            }
        }

        if self.buffer.is_empty() {
            self.flush_timer.cancel();
        } else {
            self.flush_timer.reschedule(self.config.inactivity_timeout());
        }
    }

    /// 🏁 The upstream is done. Whatever is buffered goes out now.
    pub fn end(&mut self) {
        debug!(
            "🏁 end of stream, draining {} buffered records",
            self.buffered_records()
        );
        self.flush(true);
    }

    /// 💤 Wait for the inactivity timer, then force a flush.
    ///
    /// Pends forever while nothing is buffered. Cancel-safe, so it can sit in a
    /// `select!` next to the chunk source.
    pub async fn flush_when_idle(&mut self) {
        self.flush_timer.elapsed().await;
        debug!(
            "⏱️ buffer idle for {:?}, forcing a flush",
            self.config.inactivity_timeout()
        );
        self.flush(true);
    }

    /// ⏳ Wait for every bulk call dispatched so far to come back.
    pub async fn wait_for_in_flight(&mut self) -> Result<()> {
        while let Some(joined) = self.in_flight.join_next().await {
            joined.context("💀 A bulk call task panicked or was aborted. The batch it carried is lost to the void.")?;
        }
        Ok(())
    }

    /// 🗑️ End the stream, wait for all in-flight bulk calls, and hand back the final counters.
    pub async fn close(mut self) -> Result<StatsSnapshot> {
        self.end();
        self.flush_timer.cancel();
        self.wait_for_in_flight()
            .await
            .context("💀 Closing the writer failed while waiting for the last bulk calls.")?;

        let snapshot = self.stats.snapshot();
        info!(
            written = snapshot.written,
            inserted = snapshot.inserted,
            failed = snapshot.failed,
            ok = snapshot.ok,
            error = snapshot.error,
            "✅ writer closed"
        );
        Ok(snapshot)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 📊 Complete records waiting in the buffer.
    pub fn buffered_records(&self) -> usize {
        self.buffer.len() / 2
    }

    /// 📡 Bulk calls spawned and not yet reaped. Finished-but-unreaped calls still count.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn dispatch(&mut self, batch: BulkBatch) {
        let records = batch.record_count() as u64;
        let client = Arc::clone(&self.client);
        let stats = Arc::clone(&self.stats);
        let errors = self.errors.clone();

        self.in_flight.spawn(async move {
            match client.bulk(batch).await {
                Ok(_response) => {
                    stats.record_inserted(records);
                    trace!("✅ bulk call landed, {} records inserted", records);
                }
                Err(err) => {
                    stats.record_failed(records);
                    debug!("💀 bulk call failed for {} records: {:#}", records, err);
                    // -- nobody listening is fine, the counters still saw it
                    let _ = errors.try_send(WriterError::Downstream(err));
                }
            }
        });
    }

    fn notify(&self, err: WriterError) {
        let _ = self.errors.try_send(err);
    }

    // -- 🧹 JoinSet keeps finished tasks around until joined
    fn reap_finished(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            if let Err(join_error) = joined {
                error!("💀 a bulk call task died before reporting back: {}", join_error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryBulkClient;
    use crate::common::Record;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::time::timeout;

    #[derive(Debug)]
    struct GrumpyBulkClient;

    #[async_trait]
    impl BulkClient for GrumpyBulkClient {
        async fn bulk(&self, _batch: BulkBatch) -> Result<Value> {
            anyhow::bail!("💀 the cluster looked at our documents and said no")
        }
    }

    /// 🚦 Every bulk call parks at the gate until the test lets them all through.
    #[derive(Debug, Clone, Default)]
    struct GatedBulkClient {
        started: Arc<AtomicUsize>,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl BulkClient for GatedBulkClient {
        async fn bulk(&self, _batch: BulkBatch) -> Result<Value> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(json!({"errors": false}))
        }
    }

    fn record(id: &str) -> Record {
        Record::new("people", "person", id, json!({ "name": id }))
    }

    fn writer_with(
        batch_size: usize,
        timeout_ms: u64,
    ) -> (
        BufferedBatchWriter<InMemoryBulkClient>,
        Receiver<WriterError>,
        InMemoryBulkClient,
    ) {
        let client = InMemoryBulkClient::new();
        let config = WriterConfig::new(batch_size, timeout_ms)
            .expect("💀 test config should be valid");
        let (writer, errors) = BufferedBatchWriter::new(client.clone(), config);
        (writer, errors, client)
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_two_records_fill_a_batch_of_two() -> Result<()> {
        let (mut writer, _errors, client) = writer_with(2, 50);

        writer.submit(record("A"));
        assert_eq!(writer.buffered_records(), 1, "one record is not a batch");
        writer.submit(record("B"));

        assert_eq!(writer.buffered_records(), 0, "the batch left the building");
        assert_eq!(writer.stats().written, 2);
        writer.wait_for_in_flight().await?;

        let batches = client.batches().await;
        assert_eq!(batches.len(), 1);
        let mut expected = Vec::new();
        expected.extend(record("A").into_entries());
        expected.extend(record("B").into_entries());
        assert_eq!(batches[0].entries, expected);

        let stats = writer.stats();
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.queued(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_lonely_record_gets_flushed_by_the_timer() -> Result<()> {
        let (mut writer, _errors, client) = writer_with(2, 50);

        writer.submit(record("A"));
        writer.submit(record("B"));
        writer.submit(record("C"));

        // ⏱️ 40ms in, the timer has not fired yet
        let too_early = timeout(Duration::from_millis(40), writer.flush_when_idle()).await;
        assert!(too_early.is_err(), "the timer fired before the inactivity window");
        assert_eq!(writer.buffered_records(), 1);

        // ⏱️ 60ms in, it has
        timeout(Duration::from_millis(20), writer.flush_when_idle())
            .await
            .expect("💀 the inactivity timer should have fired by now");
        writer.wait_for_in_flight().await?;

        let batches = client.batches().await;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].ids(), vec!["C"]);
        assert_eq!(writer.buffered_records(), 0);

        // 💤 empty buffer, no timer: nothing else should ever fire
        let nothing = timeout(Duration::from_secs(10), writer.flush_when_idle()).await;
        assert!(nothing.is_err());
        writer.wait_for_in_flight().await?;
        assert_eq!(client.batches().await.len(), 2, "no empty batches, ever");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_every_append_pushes_the_timer_back() -> Result<()> {
        let (mut writer, _errors, client) = writer_with(10, 50);

        writer.submit(record("A"));
        tokio::time::advance(Duration::from_millis(30)).await;
        writer.submit(record("B"));

        // ⏱️ t=60ms: 50ms after A, but only 30ms after B
        let not_yet = timeout(Duration::from_millis(30), writer.flush_when_idle()).await;
        assert!(not_yet.is_err(), "B's arrival should have rescheduled the timer");

        // ⏱️ t=80ms: 50ms after B
        timeout(Duration::from_millis(25), writer.flush_when_idle())
            .await
            .expect("💀 the timer should fire 50ms after the last append");
        writer.wait_for_in_flight().await?;

        let batches = client.batches().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].ids(), vec!["A", "B"]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_id_never_touches_the_buffer() {
        let (mut writer, errors, _client) = writer_with(2, 50);

        writer.submit(json!({"_index": "people", "_type": "person", "data": {}}));

        let stats = writer.stats();
        assert_eq!(stats.error, 1);
        assert_eq!(stats.ok, 0);
        assert_eq!(writer.buffered_records(), 0);
        let notification = errors.try_recv().expect("💀 a rejection should be notified");
        assert!(matches!(notification, WriterError::InvalidId));
        assert!(notification.is_rejection());
    }

    #[tokio::test]
    async fn the_one_where_undecodable_text_is_counted_and_reported() {
        let (mut writer, errors, _client) = writer_with(2, 50);

        writer.submit("this is not json, this is a cry for help");

        let stats = writer.stats();
        assert_eq!(stats.error, 1);
        assert_eq!(stats.ok, 0);
        let notification = errors.try_recv().expect("💀 a parse failure should be notified");
        assert!(matches!(notification, WriterError::Parse { .. }));
        assert_eq!(notification.to_string(), "failed to parse encoded chunk");
    }

    #[tokio::test]
    async fn the_one_where_fifo_survives_many_flushes() -> Result<()> {
        let (mut writer, _errors, client) = writer_with(2, 1000);

        for id in ["1", "2", "3", "4", "5"] {
            writer.submit(record(id));
        }
        let stats = writer.close().await?;

        let ids: Vec<Vec<String>> = client
            .batches()
            .await
            .iter()
            .map(|batch| batch.ids().into_iter().map(String::from).collect())
            .collect();
        assert_eq!(ids, vec![vec!["1", "2"], vec!["3", "4"], vec!["5"]]);
        assert_eq!(stats.written, 5);
        assert_eq!(stats.inserted, 5);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_partial_flush_counts_what_actually_left() -> Result<()> {
        let (mut writer, _errors, client) = writer_with(3, 1000);

        writer.submit(record("only-child"));
        writer.end();
        writer.wait_for_in_flight().await?;

        let stats = writer.stats();
        assert_eq!(
            stats.written, 1,
            "written counts records removed, not the configured batch size"
        );
        assert_eq!(stats.inserted, 1);
        assert_eq!(client.batches().await[0].record_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_ending_an_empty_stream_sends_nothing() -> Result<()> {
        let (mut writer, _errors, client) = writer_with(2, 50);

        writer.end();
        writer.end();
        let stats = writer.close().await?;

        assert!(client.batches().await.is_empty());
        assert_eq!(stats, StatsSnapshot::default());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_cluster_says_no_and_we_keep_going() -> Result<()> {
        let config = WriterConfig::new(2, 1000)?;
        let (mut writer, errors) = BufferedBatchWriter::new(GrumpyBulkClient, config);

        writer.submit(record("A"));
        writer.submit(record("B"));
        writer.wait_for_in_flight().await?;

        let stats = writer.stats();
        assert_eq!(stats.written, 2, "written is never rolled back");
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.queued(), 2);
        let notification = errors.try_recv().expect("💀 the downstream failure should be notified");
        assert!(matches!(notification, WriterError::Downstream(_)));
        assert!(!notification.is_rejection());
        assert!(notification.to_string().starts_with("bulk insert error"));

        // ✅ still usable after the failure
        writer.submit(record("C"));
        assert_eq!(writer.buffered_records(), 1);
        assert_eq!(writer.stats().ok, 3);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_nobody_listens_and_nothing_breaks() -> Result<()> {
        let (mut writer, errors, _client) = writer_with(2, 50);
        drop(errors);

        writer.submit("{broken");
        writer.submit(json!(42));

        assert_eq!(writer.stats().error, 2);
        writer.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_bulk_calls_overlap_instead_of_queueing() -> Result<()> {
        let client = GatedBulkClient::default();
        let (mut writer, _errors) =
            BufferedBatchWriter::new(client.clone(), WriterConfig::new(1, 1000)?);

        writer.submit(record("A"));
        writer.submit(record("B"));
        assert_eq!(writer.in_flight(), 2, "the second batch must not wait for the first");

        // 🚦 both calls reach the gate before either one is allowed to finish
        timeout(Duration::from_secs(5), async {
            while client.started.load(Ordering::SeqCst) < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("💀 both bulk calls should be running at the same time");
        assert_eq!(writer.stats().inserted, 0);
        assert_eq!(writer.stats().queued(), 2);

        client.gate.notify_waiters();
        writer.wait_for_in_flight().await?;

        assert_eq!(writer.in_flight(), 0);
        assert_eq!(writer.stats().inserted, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_gigantic_batch_size_is_just_a_big_number() -> Result<()> {
        for batch_size in [1usize << 40, usize::MAX] {
            let (mut writer, _errors, client) = writer_with(batch_size, u64::MAX);

            writer.submit(record("A"));
            assert_eq!(writer.buffered_records(), 1, "nowhere near a full batch");
            writer.end();
            writer.wait_for_in_flight().await?;

            assert_eq!(client.batches().await[0].ids(), vec!["A"]);
            assert_eq!(writer.stats().written, 1);
        }
        Ok(())
    }

    #[test]
    fn the_one_where_zero_is_not_a_batch_size() {
        assert!(WriterConfig::new(0, 1000).is_err());
        assert!(WriterConfig::new(1000, 0).is_err());
        let defaults = WriterConfig::default();
        assert_eq!(defaults.batch_size.get(), 1000);
        assert_eq!(defaults.inactivity_timeout(), Duration::from_millis(1000));
    }
}
