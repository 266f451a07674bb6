//! Per-stage expiry countdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// Validity window of a freshly issued verification code, in seconds.
pub const STAGE_SECONDS: u32 = 300;

/// An owned, cancellable one-second countdown.
///
/// Starting (or resetting) a countdown spawns a single ticking task that
/// publishes the remaining seconds through a watch channel; the previous task
/// is aborted first, so at most one interval is ever alive per instance.
/// Dropping the countdown stops the task. Ticking is independent of any
/// in-flight remote call.
#[derive(Debug)]
pub struct Countdown {
    tx: Arc<watch::Sender<u32>>,
    rx: watch::Receiver<u32>,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Start a countdown from `secs` seconds. Must be called within a tokio
    /// runtime.
    pub fn start(secs: u32) -> Self {
        let (tx, rx) = watch::channel(secs);
        let mut countdown = Self {
            tx: Arc::new(tx),
            rx,
            task: None,
        };
        countdown.spawn(secs);
        countdown
    }

    /// Restart from `secs`, replacing the running interval.
    pub fn reset(&mut self, secs: u32) {
        self.spawn(secs);
    }

    /// Seconds left. Zero means the stage's code has expired.
    pub fn remaining(&self) -> u32 {
        *self.rx.borrow()
    }

    /// Whether the countdown has reached zero.
    pub fn is_expired(&self) -> bool {
        self.remaining() == 0
    }

    /// A receiver observing every tick, for UI display.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.rx.clone()
    }

    /// Stop ticking without changing the remaining value.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn spawn(&mut self, secs: u32) {
        self.stop();
        self.tx.send_replace(secs);
        if secs == 0 {
            return;
        }
        let tx = Arc::clone(&self.tx);
        // the interval is registered here, not inside the task, so ticks are
        // measured from this call even if the task is first polled later;
        // missed ticks then fire back to back until the value has caught up
        // with elapsed time
        let mut tick = interval_at(
            Instant::now() + Duration::from_secs(1),
            Duration::from_secs(1),
        );
        // unconstrained: the catch-up burst must not be cut short by the
        // cooperative budget when many ticks are overdue at once
        self.task = Some(tokio::spawn(tokio::task::unconstrained(async move {
            loop {
                tick.tick().await;
                let next = tx.borrow().saturating_sub(1);
                tx.send_replace(next);
                if next == 0 {
                    break;
                }
            }
        })));
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Render seconds as `m:ss` for display.
pub fn format_remaining(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
