//! ⏱️ The flush timer: a single slot for "if nothing happens, flush anyway".

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep_until};

// -- ~30 years. Timeouts past this are treated as "effectively never".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// ⏱️ At most one pending deadline. Rescheduling moves it, cancelling empties the slot.
///
/// The `Sleep` is kept pinned and reset in place, so rescheduling on every
/// append does not allocate a new timer each time.
#[derive(Default)]
pub(crate) struct FlushTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl std::fmt::Debug for FlushTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushTimer")
            .field("deadline", &self.deadline())
            .finish()
    }
}

impl FlushTimer {
    /// 🔄 Replace whatever was pending with a deadline `after` from now.
    pub(crate) fn reschedule(&mut self, after: Duration) {
        let deadline = Instant::now() + after.min(FAR_FUTURE);
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(sleep_until(deadline))),
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.sleep = None;
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|sleep| sleep.deadline())
    }

    /// 💤 Resolves once the pending deadline passes. Never resolves while the slot is empty.
    ///
    /// Cancel-safe: dropping this future leaves the deadline where it was.
    pub(crate) async fn elapsed(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending().await,
        }
    }
}
