//! 💀 The notification channel's vocabulary. Every way a chunk or a bulk call can let us down.
//!
//! None of these are fatal. The writer shrugs, bumps a counter, sends one of these
//! down the channel, and keeps going. Whoever holds the receiver decides how sad to be.

/// 🚨 One event on the writer's error channel.
///
/// The display strings are part of the contract; log scrapers grep for them.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// 📜 A textual chunk that was not JSON. Not even close.
    #[error("failed to parse encoded chunk")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid index specified")]
    InvalidIndex,
    #[error("invalid type specified")]
    InvalidType,
    #[error("invalid id specified")]
    InvalidId,
    /// 🧱 Valid JSON, wrong shape. A number, a string, an array, a null. Anything but an object.
    #[error("invalid bulk API message")]
    InvalidMessage,
    /// 📡 The downstream `bulk()` call failed. The batch is gone, no retry, no re-queue.
    #[error("bulk insert error: {0:#}")]
    Downstream(anyhow::Error),
}

impl WriterError {
    /// ✅ True for the chunk-level rejections, the ones that bump the `error` counter.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, WriterError::Downstream(_))
    }
}
