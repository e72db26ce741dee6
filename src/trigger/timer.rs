//! Periodic refresh trigger.

use crossbeam_channel::{bounded, select, tick, Sender};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{RefreshReason, RefreshSender, Trigger, TriggerError, TriggerKind};

/// Requests a refresh every `period`, regardless of read activity.
///
/// The timer is not tied to a descriptor, so [`Trigger::rebind`] keeps the
/// running ticker. Dropping the trigger stops the thread.
pub struct TimerTrigger {
    period: Duration,
    cancel: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TimerTrigger {
    /// Start ticking.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Spawn`] if the timer thread cannot be created.
    pub fn start(period: Duration, notifier: RefreshSender) -> Result<Self, TriggerError> {
        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("mapcache-timer".to_string())
            .spawn(move || {
                let ticker = tick(period);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if !notifier.request(RefreshReason::TimerFired) {
                                break;
                            }
                        }
                        // Disconnect on drop ends the timer
                        recv(cancel_rx) -> _ => break,
                    }
                }
                log::trace!("Timer trigger stopped");
            })
            .map_err(|source| TriggerError::Spawn {
                name: "timer",
                source,
            })?;

        log::debug!("Timer trigger started with period {:?}", period);

        Ok(Self {
            period,
            cancel: Some(cancel_tx),
            thread: Some(thread),
        })
    }

    /// The configured period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Trigger for TimerTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Timer(self.period)
    }

    fn rebind(&mut self, _path: &Path) -> Result<(), TriggerError> {
        Ok(())
    }
}

impl Drop for TimerTrigger {
    fn drop(&mut self) {
        drop(self.cancel.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
