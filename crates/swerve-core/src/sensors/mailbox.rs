//! Lock-free latest-sample handoff
//!
//! Heading sensors on serial or I2C links are usually polled from their own
//! thread. [`HeadingMailbox`] lets that thread publish the newest
//! [`HeadingSample`] while the control tick reads it without ever blocking.
//! It is a sequence lock over atomics: one writer, any number of readers.
//! A reader that races a write retries a few times and then reports
//! nothing, leaving the caller to reuse its previous sample.

use std::sync::atomic::{fence, AtomicU64, Ordering};

use super::heading::HeadingSample;

const READ_ATTEMPTS: usize = 4;

/// Single-writer latest-value cell for heading samples
#[derive(Debug, Default)]
pub struct HeadingMailbox {
    /// Even when stable, odd while a write is in progress, 0 before the first write
    seq: AtomicU64,
    angle: AtomicU64,
    rate: AtomicU64,
    /// source_id in the low byte, connected flag in bit 8
    meta: AtomicU64,
}

impl HeadingMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a sample. Must only be called from one thread.
    pub fn publish(&self, sample: &HeadingSample) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.angle.store(sample.angle.to_bits(), Ordering::Relaxed);
        self.rate.store(sample.rate.to_bits(), Ordering::Relaxed);
        let meta = u64::from(sample.source_id) | (u64::from(sample.connected) << 8);
        self.meta.store(meta, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Newest consistent sample, or `None` if nothing was published yet or
    /// every attempt raced a write
    pub fn latest(&self) -> Option<HeadingSample> {
        for _ in 0..READ_ATTEMPTS {
            let before = self.seq.load(Ordering::Acquire);
            if before == 0 {
                return None;
            }
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let angle = f64::from_bits(self.angle.load(Ordering::Relaxed));
            let rate = f64::from_bits(self.rate.load(Ordering::Relaxed));
            let meta = self.meta.load(Ordering::Relaxed);

            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return Some(HeadingSample {
                    angle,
                    rate,
                    source_id: (meta & 0xff) as u8,
                    connected: meta & (1 << 8) != 0,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_until_published() {
        let mailbox = HeadingMailbox::new();
        assert!(mailbox.latest().is_none());

        mailbox.publish(&HeadingSample::new(3, 1.25, -0.5));
        let sample = mailbox.latest().unwrap();
        assert_eq!(sample, HeadingSample::new(3, 1.25, -0.5));
    }

    #[test]
    fn test_disconnected_flag_round_trips() {
        let mailbox = HeadingMailbox::new();
        mailbox.publish(&HeadingSample::disconnected(1));
        let sample = mailbox.latest().unwrap();
        assert!(!sample.connected);
        assert_eq!(sample.source_id, 1);
    }

    #[test]
    fn test_concurrent_reads_are_consistent() {
        let mailbox = Arc::new(HeadingMailbox::new());
        let writer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                for i in 0..20_000 {
                    let v = i as f64;
                    // angle and rate always written as a matching pair
                    mailbox.publish(&HeadingSample::new(0, v, -v));
                }
            })
        };

        for _ in 0..20_000 {
            if let Some(sample) = mailbox.latest() {
                assert_eq!(sample.angle, -sample.rate);
            }
        }
        writer.join().unwrap();
    }
}
