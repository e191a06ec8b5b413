//! Session deadlines.
//!
//! All session deadlines live in one min-heap polled by the coordinator loop
//! instead of one timer task per session. Cancelling or rescheduling does not
//! touch the heap: each address maps to the token of its live deadline and
//! heap entries carrying any other token are skipped when they surface.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tokio::time::Instant;

use lockmon_core::ReaderAddress;

/// Identifies one scheduled deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeadlineToken(u64);

#[derive(Debug, Default)]
pub struct DeadlineHeap {
    heap: BinaryHeap<Reverse<(Instant, DeadlineToken, ReaderAddress)>>,
    live: HashMap<ReaderAddress, DeadlineToken>,
    next_token: u64,
}

impl DeadlineHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a deadline for `address`, replacing any live one.
    pub fn schedule(&mut self, address: ReaderAddress, at: Instant) -> DeadlineToken {
        let token = DeadlineToken(self.next_token);
        self.next_token += 1;
        self.heap.push(Reverse((at, token, address)));
        self.live.insert(address, token);
        token
    }

    /// Cancel the deadline identified by `token`.
    ///
    /// Returns `false` if it already fired, was cancelled or was replaced.
    pub fn cancel(&mut self, address: ReaderAddress, token: DeadlineToken) -> bool {
        if self.live.get(&address) == Some(&token) {
            self.live.remove(&address);
            true
        } else {
            false
        }
    }

    pub fn is_live(&self, address: ReaderAddress, token: DeadlineToken) -> bool {
        self.live.get(&address) == Some(&token)
    }

    /// Earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.heap.peek().map(|Reverse((at, _, _))| *at)
    }

    /// Remove and return every live deadline due at or before `now`, earliest
    /// first.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<(ReaderAddress, DeadlineToken)> {
        let mut expired = Vec::new();
        loop {
            self.discard_stale();
            match self.heap.peek() {
                Some(Reverse((at, _, _))) if *at <= now => {}
                _ => break,
            }
            if let Some(Reverse((_, token, address))) = self.heap.pop() {
                self.live.remove(&address);
                expired.push((address, token));
            }
        }
        expired
    }

    /// Number of live deadlines.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse((_, token, address))) = self.heap.peek() {
            if self.live.get(address) == Some(token) {
                break;
            }
            self.heap.pop();
        }
    }
}
