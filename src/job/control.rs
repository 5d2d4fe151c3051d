//! Control signals shared between callers and the worker
//!
//! Callers set flags; the worker reads them at checkpoints. Repeated requests
//! of the same kind collapse into one pending flag.

use crate::crawler::Checkpoint;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Flags {
    pause: bool,
    cancel: bool,
}

/// Pending pause and cancel requests for the current run
#[derive(Debug, Default)]
pub struct ControlSignals {
    flags: Mutex<Flags>,
    wake: Notify,
}

impl ControlSignals {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears every flag before a new run
    pub fn reset(&self) {
        *self.flags() = Flags::default();
    }

    /// Sets the pause flag; returns false if it was already set
    pub fn request_pause(&self) -> bool {
        let mut flags = self.flags();
        !std::mem::replace(&mut flags.pause, true)
    }

    /// Clears the pause flag and wakes a parked worker
    pub fn clear_pause(&self) -> bool {
        let was_set = std::mem::replace(&mut self.flags().pause, false);
        self.wake.notify_one();
        was_set
    }

    /// Sets the cancel flag and wakes a parked worker
    pub fn request_cancel(&self) -> bool {
        let newly_set = !std::mem::replace(&mut self.flags().cancel, true);
        self.wake.notify_one();
        newly_set
    }

    /// The pending signal; cancel takes precedence over pause
    pub fn pending(&self) -> Checkpoint {
        let flags = self.flags();
        if flags.cancel {
            Checkpoint::Cancel
        } else if flags.pause {
            Checkpoint::Pause
        } else {
            Checkpoint::Continue
        }
    }

    /// Blocks until the pause flag is cleared or a cancel arrives
    pub async fn wait_while_paused(&self) -> Checkpoint {
        loop {
            match self.pending() {
                Checkpoint::Pause => self.wake.notified().await,
                other => return other,
            }
        }
    }
}
