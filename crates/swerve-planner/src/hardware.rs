//! Hardware collaborators
//!
//! The control loop talks to module drivers and heading sensors only
//! through these traits. Every call is a non-blocking poll of the latest
//! cached value.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use swerve_core::kinematics::{ModulePositionSet, ModuleStateSet};
use swerve_core::sensors::{HeadingMailbox, HeadingSample, HEADING_SENSOR_COUNT};
use swerve_core::simulation::SwerveSimulator;

/// Four swerve modules in the fixed order front-left, front-right,
/// rear-left, rear-right
pub trait ModuleDriver {
    /// Steering angles and cumulative drive distances
    fn positions(&mut self) -> ModulePositionSet;

    /// Measured steering angles and wheel speeds
    fn states(&mut self) -> ModuleStateSet;

    fn set_desired_states(&mut self, states: &ModuleStateSet);
}

/// Redundant heading sensors
pub trait HeadingSource {
    /// Latest reading per sensor; `None` while a sensor has not reported yet
    fn read(&mut self) -> [Option<HeadingSample>; HEADING_SENSOR_COUNT];
}

/// Heading source fed by sensor threads through [`HeadingMailbox`]es
///
/// A mailbox that has never been published reads as `None` until its
/// sensor thread publishes.
#[derive(Debug, Clone)]
pub struct MailboxHeadingSource {
    mailboxes: [Arc<HeadingMailbox>; HEADING_SENSOR_COUNT],
    last: [Option<HeadingSample>; HEADING_SENSOR_COUNT],
}

impl MailboxHeadingSource {
    pub fn new(mailboxes: [Arc<HeadingMailbox>; HEADING_SENSOR_COUNT]) -> Self {
        Self {
            mailboxes,
            last: [None; HEADING_SENSOR_COUNT],
        }
    }
}

impl HeadingSource for MailboxHeadingSource {
    fn read(&mut self) -> [Option<HeadingSample>; HEADING_SENSOR_COUNT] {
        for (mailbox, last) in self.mailboxes.iter().zip(self.last.iter_mut()) {
            if let Some(sample) = mailbox.latest() {
                *last = Some(sample);
            }
        }
        self.last
    }
}

/// Simulator shared between the module and heading collaborators
#[derive(Debug, Clone)]
pub struct SharedSimulator(Rc<RefCell<SwerveSimulator>>);

impl SharedSimulator {
    pub fn new(sim: SwerveSimulator) -> Self {
        Self(Rc::new(RefCell::new(sim)))
    }

    pub fn step(&self) {
        self.0.borrow_mut().step();
    }

    /// Run `f` against the simulator
    pub fn with<R>(&self, f: impl FnOnce(&mut SwerveSimulator) -> R) -> R {
        f(&mut *self.0.borrow_mut())
    }
}

impl ModuleDriver for SharedSimulator {
    fn positions(&mut self) -> ModulePositionSet {
        self.0.borrow().module_positions()
    }

    fn states(&mut self) -> ModuleStateSet {
        self.0.borrow().module_states()
    }

    fn set_desired_states(&mut self, states: &ModuleStateSet) {
        self.0.borrow_mut().command(states);
    }
}

impl HeadingSource for SharedSimulator {
    fn read(&mut self) -> [Option<HeadingSample>; HEADING_SENSOR_COUNT] {
        self.0.borrow_mut().heading_samples().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_source_keeps_last_sample() {
        let mailboxes = [Arc::new(HeadingMailbox::new()), Arc::new(HeadingMailbox::new())];
        let mut source = MailboxHeadingSource::new(mailboxes.clone());

        assert_eq!(source.read(), [None, None]);

        mailboxes[0].publish(&HeadingSample::new(0, 0.5, 0.1));
        assert_eq!(source.read()[1], None);

        mailboxes[1].publish(&HeadingSample::new(1, 0.6, 0.1));
        let samples = source.read();
        assert_eq!(samples[0].map(|s| s.angle), Some(0.5));
        assert_eq!(samples[1].map(|s| s.angle), Some(0.6));

        // Nothing new published: the cached samples are returned again
        assert_eq!(source.read(), samples);
    }
}
