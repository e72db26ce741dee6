//! The per-handle refresh loop.
//!
//! Every proactive refresh of a cached file runs on one dedicated thread.
//! Triggers send requests into an unbounded channel; the loop drains any
//! requests that piled up while it was busy and runs the refresh callback
//! once per batch.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

use super::TriggerError;

/// Why a refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// The change-notification watch reported an event.
    FileChanged,
    /// The interval timer fired.
    TimerFired,
}

#[derive(Debug)]
enum LoopMessage {
    Refresh(RefreshReason),
    Shutdown,
}

/// Cloneable handle used by triggers to request a refresh.
#[derive(Debug, Clone)]
pub struct RefreshSender {
    tx: Sender<LoopMessage>,
}

impl RefreshSender {
    /// Queue a refresh request.
    ///
    /// Returns `false` if the loop has already stopped.
    pub fn request(&self, reason: RefreshReason) -> bool {
        self.tx.send(LoopMessage::Refresh(reason)).is_ok()
    }
}

/// Background thread that serializes trigger-driven refreshes.
pub struct RefreshLoop {
    tx: Sender<LoopMessage>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshLoop {
    /// Start the loop thread.
    ///
    /// `on_refresh` runs once per batch of queued requests and returns
    /// `false` when the loop should stop (e.g. its target is gone).
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Spawn`] if the thread cannot be created.
    pub fn spawn<F>(on_refresh: F) -> Result<Self, TriggerError>
    where
        F: FnMut(RefreshReason) -> bool + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("mapcache-refresh".to_string())
            .spawn(move || run(rx, on_refresh))
            .map_err(|source| TriggerError::Spawn {
                name: "refresh loop",
                source,
            })?;

        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// A sender for triggers to post requests with.
    #[must_use]
    pub fn sender(&self) -> RefreshSender {
        RefreshSender {
            tx: self.tx.clone(),
        }
    }

    /// Stop the loop and wait for an in-flight refresh to finish.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(LoopMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Refresh loop panicked");
            }
        }
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<F>(rx: Receiver<LoopMessage>, mut on_refresh: F)
where
    F: FnMut(RefreshReason) -> bool,
{
    log::trace!("Refresh loop started");

    'outer: while let Ok(message) = rx.recv() {
        let reason = match message {
            LoopMessage::Refresh(reason) => reason,
            LoopMessage::Shutdown => break,
        };

        let mut coalesced = 0usize;
        for pending in rx.try_iter() {
            match pending {
                LoopMessage::Refresh(_) => coalesced += 1,
                LoopMessage::Shutdown => break 'outer,
            }
        }
        if coalesced > 0 {
            log::trace!("Coalesced {} queued refresh requests", coalesced);
        }

        if !on_refresh(reason) {
            break;
        }
    }

    log::trace!("Refresh loop stopped");
}
