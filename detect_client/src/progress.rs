//! Client-side progress estimate of an outstanding detection.
//!
//! The value is not derived from the network transfer. It creeps towards [`CEILING`] while a
//! request is outstanding and only jumps to 100 once the response has arrived.
//!
//! One tracker lives as long as the workflow. Every update names the submission it belongs to
//! and is dropped unless that submission is the live one.
use tokio::sync::watch;

use crate::status::RequestTicket;

/// Upper bound of the estimate while waiting for a response.
pub const CEILING: f32 = 95.0;

/// Fraction of the remaining distance to [`CEILING`] covered per tick.
const STEP: f32 = 0.1;

pub const DONE: f32 = 100.0;

/// Published progress value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Progress {
    /// Submission the estimate belongs to. `None` before the first submission and after a reset.
    pub ticket: Option<RequestTicket>,
    /// Estimate in percent.
    pub percent: f32,
}

/// Publishes the progress estimate of the live submission.
pub struct ProgressTracker {
    tx: watch::Sender<Progress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Progress::default());
        Self { tx }
    }

    /// Watch progress updates.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Progress {
        *self.tx.borrow()
    }

    pub fn value(&self) -> f32 {
        self.tx.borrow().percent
    }

    /// Make `ticket` the live submission and start over from 0.
    pub fn start(&self, ticket: RequestTicket) {
        self.tx.send_replace(Progress {
            ticket: Some(ticket),
            percent: 0.0,
        });
    }

    /// Advance the estimate of `ticket` by one tick.
    pub fn advance(&self, ticket: RequestTicket) -> bool {
        self.update(ticket, |percent| match percent < CEILING {
            true => percent + (CEILING - percent) * STEP,
            false => percent,
        })
    }

    pub fn complete(&self, ticket: RequestTicket) -> bool {
        self.update(ticket, |_| DONE)
    }

    pub fn fail(&self, ticket: RequestTicket) -> bool {
        self.update(ticket, |_| 0.0)
    }

    /// Detach from any submission and go back to 0.
    pub fn clear(&self) {
        self.tx.send_replace(Progress::default());
    }

    /// Apply `f` if `ticket` is live. Returns whether the value changed.
    fn update(&self, ticket: RequestTicket, f: impl FnOnce(f32) -> f32) -> bool {
        self.tx.send_if_modified(|progress| {
            if progress.ticket != Some(ticket) {
                return false;
            }
            let percent = f(progress.percent);
            let modified = percent != progress.percent;
            progress.percent = percent;
            modified
        })
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
