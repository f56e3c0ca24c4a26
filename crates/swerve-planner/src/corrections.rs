//! Pose correction handoff
//!
//! Vision runs at its own slower cadence on another thread. It pushes
//! [`PoseCorrection`]s into a bounded channel; the control tick drains
//! whatever is waiting without blocking. When the channel is full the
//! newest correction is dropped, since the control loop will catch up on
//! the next one.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use swerve_core::estimation::PoseCorrection;
use tracing::warn;

/// Default number of corrections buffered between ticks
pub const CORRECTION_CAPACITY: usize = 16;

/// Create a connected sender/queue pair
pub fn correction_channel(capacity: usize) -> (CorrectionSender, CorrectionQueue) {
    let (tx, rx) = bounded(capacity.max(1));
    (CorrectionSender { tx }, CorrectionQueue { rx })
}

/// Producer side, held by the vision collaborator
#[derive(Debug, Clone)]
pub struct CorrectionSender {
    tx: Sender<PoseCorrection>,
}

impl CorrectionSender {
    /// Queue a correction; returns false if it was dropped
    pub fn send(&self, correction: PoseCorrection) -> bool {
        match self.tx.try_send(correction) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("correction queue full, dropping correction");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer side, drained by the control loop
#[derive(Debug)]
pub struct CorrectionQueue {
    rx: Receiver<PoseCorrection>,
}

impl CorrectionQueue {
    /// True when at least one correction is waiting
    pub fn has_pending(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Take every waiting correction, oldest first
    pub fn drain(&self) -> Vec<PoseCorrection> {
        self.rx.try_iter().collect()
    }
}
