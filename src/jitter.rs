//! Jitter queue: a warm-up FIFO between fragment production and playback.
//!
//! The queue absorbs the gap between irregular upstream production and the
//! fixed device cadence. Until `threshold` fragments have accumulated, every
//! exchange returns silence; afterwards it is strictly one-in-one-out, so the
//! steady-state depth stays at `threshold` and the listener pays a fixed
//! startup latency in exchange for smooth playback.

use std::collections::VecDeque;

pub struct JitterQueue {
    fragments: VecDeque<Vec<u8>>,
    threshold: usize,
}

impl JitterQueue {
    pub fn new(threshold: usize) -> Self {
        Self {
            fragments: VecDeque::with_capacity(threshold + 1),
            threshold,
        }
    }

    /// Append one produced fragment and take the next playable one.
    ///
    /// Returns an empty fragment (silence) while warming up. The depth can
    /// exceed the threshold only transiently, between the append and the pop
    /// of a single exchange.
    pub fn exchange(&mut self, fragment: Vec<u8>) -> Vec<u8> {
        self.fragments.push_back(fragment);
        if self.fragments.len() > self.threshold {
            self.fragments.pop_front().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Take the head without appending anything.
    ///
    /// Once drained this returns silence; it never blocks, because it runs
    /// inside the real-time callback.
    pub fn pop(&mut self) -> Vec<u8> {
        self.fragments.pop_front().unwrap_or_default()
    }

    pub fn push(&mut self, fragment: Vec<u8>) {
        self.fragments.push_back(fragment);
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
