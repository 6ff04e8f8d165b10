use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Countdown for a timed attempt.
///
/// Ticks at the configured interval, publishing the remaining time through a
/// watch channel. When the remaining time falls to one tick or below it sends
/// exactly one expiry notification and the task ends. The task is aborted on
/// drop so a torn-down session never leaks a ticking interval.
#[derive(Debug)]
pub struct Countdown {
    remaining: watch::Receiver<Duration>,
    handle: JoinHandle<()>,
}

impl Countdown {
    pub fn start(
        initial: Duration,
        tick: Duration,
        expired: mpsc::UnboundedSender<()>,
    ) -> Self {
        let (tx, rx) = watch::channel(initial);
        let handle = tokio::spawn(async move {
            let mut remaining = initial;
            if remaining <= tick {
                let _ = tx.send(Duration::ZERO);
                let _ = expired.send(());
                return;
            }
            let mut interval = tokio::time::interval(tick);
            // The first tick of a tokio interval completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                remaining = remaining.saturating_sub(tick);
                let _ = tx.send(remaining);
                if remaining <= tick {
                    let _ = expired.send(());
                    return;
                }
            }
        });
        Self { remaining: rx, handle }
    }

    pub fn remaining(&self) -> Duration {
        *self.remaining.borrow()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
