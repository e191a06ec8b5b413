//! Priority dispatch queue for outbound bus traffic.
//!
//! Every byte written to the bus goes through one [`DispatchQueue`]. Lower
//! priority values are sent first; equal priorities keep their enqueue order.
//!
//! ```text
//! session replies ──┐
//! poll commands ────┼──► DispatchQueue ──► drain loop ──► Transport::send
//! reboot ───────────┘
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::Mutex;
use tokio::sync::Notify;

use lockmon_core::constants::DEFAULT_SESSION_PRIORITY;
use lockmon_core::ReaderAddress;
use lockmon_protocol::{ControllerCommand, OutgoingCommand};

/// Priority used by [`DispatchQueue::enqueue_default`].
pub const DEFAULT_PRIORITY: i32 = DEFAULT_SESSION_PRIORITY;

struct Task<T> {
    priority: i32,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Task<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Task<T> {}

impl<T> Ord for Task<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap: lower priority value first, then lower seq
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Task<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner<T> {
    heap: BinaryHeap<Task<T>>,
    next_seq: u64,
}

/// Multi-producer priority queue with an async consumer.
///
/// # Examples
///
/// ```
/// use lockmon_engine::DispatchQueue;
///
/// let queue = DispatchQueue::new();
/// queue.enqueue("poll", 200);
/// queue.enqueue("reply", 100);
/// queue.enqueue("reboot", i32::MIN);
///
/// assert_eq!(queue.try_dequeue(), Some("reboot"));
/// assert_eq!(queue.try_dequeue(), Some("reply"));
/// assert_eq!(queue.try_dequeue(), Some("poll"));
/// assert!(!queue.has_more());
/// ```
pub struct DispatchQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Notify,
}

impl<T> DispatchQueue<T> {
    pub fn new() -> Self {
        DispatchQueue {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            available: Notify::new(),
        }
    }

    /// Add `item` and wake a waiting consumer.
    pub fn enqueue(&self, item: T, priority: i32) {
        {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(Task {
                priority,
                seq,
                item,
            });
        }
        self.available.notify_one();
    }

    pub fn enqueue_default(&self, item: T) {
        self.enqueue(item, DEFAULT_PRIORITY);
    }

    /// Remove the most urgent item, waiting until one is available.
    ///
    /// Cancel safe: dropping the future before it completes loses nothing.
    pub async fn dequeue(&self) -> T {
        loop {
            if let Some(item) = self.try_dequeue() {
                return item;
            }
            self.available.notified().await;
        }
    }

    /// Remove the most urgent item if there is one.
    pub fn try_dequeue(&self) -> Option<T> {
        self.inner.lock().heap.pop().map(|task| task.item)
    }

    pub fn has_more(&self) -> bool {
        !self.inner.lock().heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_more()
    }

    /// Drop every pending item.
    pub fn clear(&self) {
        self.inner.lock().heap.clear();
    }
}

impl<T> Default for DispatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DispatchQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("len", &self.len())
            .finish()
    }
}

/// One unit of bus traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Reader(OutgoingCommand),
    Controller(ControllerCommand),
}

impl Outbound {
    pub fn address(&self) -> ReaderAddress {
        match self {
            Outbound::Reader(cmd) => cmd.address,
            Outbound::Controller(_) => ReaderAddress::CONTROLLER,
        }
    }

    /// Returns `true` for approvals and denials.
    pub fn is_decision(&self) -> bool {
        matches!(self, Outbound::Reader(cmd) if cmd.is_decision())
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Outbound::Reader(cmd) => cmd.encode(),
            Outbound::Controller(cmd) => cmd.encode().to_vec(),
        }
    }
}

impl From<OutgoingCommand> for Outbound {
    fn from(cmd: OutgoingCommand) -> Self {
        Outbound::Reader(cmd)
    }
}

impl From<ControllerCommand> for Outbound {
    fn from(cmd: ControllerCommand) -> Self {
        Outbound::Controller(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockmon_protocol::ControllerOpcode;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_ascending_priority() {
        let queue = DispatchQueue::new();
        queue.enqueue('a', 200);
        queue.enqueue('b', 100);
        queue.enqueue('c', 150);

        assert_eq!(queue.try_dequeue(), Some('b'));
        assert_eq!(queue.try_dequeue(), Some('c'));
        assert_eq!(queue.try_dequeue(), Some('a'));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn test_fifo_on_equal_priority() {
        let queue = DispatchQueue::new();
        for i in 0..50 {
            queue.enqueue(i, 100);
        }
        let drained: Vec<i32> = std::iter::from_fn(|| queue.try_dequeue()).collect();
        assert_eq!(drained, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_mixed_priorities_keep_fifo_within_level() {
        let queue = DispatchQueue::new();
        queue.enqueue("poll-1", 200);
        queue.enqueue("reply-1", 100);
        queue.enqueue("poll-2", 200);
        queue.enqueue("reply-2", 100);
        queue.enqueue("reboot", i32::MIN);

        let drained: Vec<_> = std::iter::from_fn(|| queue.try_dequeue()).collect();
        assert_eq!(drained, vec!["reboot", "reply-1", "reply-2", "poll-1", "poll-2"]);
    }

    #[test]
    fn test_extreme_priorities() {
        let queue = DispatchQueue::new();
        queue.enqueue("max", i32::MAX);
        queue.enqueue("min", i32::MIN);
        queue.enqueue("zero", 0);

        assert_eq!(queue.try_dequeue(), Some("min"));
        assert_eq!(queue.try_dequeue(), Some("zero"));
        assert_eq!(queue.try_dequeue(), Some("max"));
    }

    #[test]
    fn test_len_and_clear() {
        let queue = DispatchQueue::new();
        assert!(queue.is_empty());
        queue.enqueue_default(1);
        queue.enqueue_default(2);
        assert_eq!(queue.len(), 2);
        assert!(queue.has_more());

        queue.clear();
        assert!(!queue.has_more());
        assert_eq!(queue.try_dequeue(), None);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let queue = Arc::new(DispatchQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(42, 100);

        let item = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer woke up")
            .unwrap();
        assert_eq!(item, 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_lose_nothing() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 250;

        let queue = Arc::new(DispatchQueue::new());
        let mut producers = Vec::new();
        for p in 0..PRODUCERS {
            let queue = Arc::clone(&queue);
            producers.push(tokio::spawn(async move {
                for i in 0..PER_PRODUCER {
                    queue.enqueue(p * PER_PRODUCER + i, (i % 3) as i32);
                }
            }));
        }

        let mut seen = Vec::with_capacity(PRODUCERS * PER_PRODUCER);
        while seen.len() < PRODUCERS * PER_PRODUCER {
            let item = tokio::time::timeout(Duration::from_secs(5), queue.dequeue())
                .await
                .expect("item available");
            seen.push(item);
        }
        for producer in producers {
            producer.await.unwrap();
        }

        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
        assert!(!queue.has_more());
    }

    #[test]
    fn test_outbound_encoding() {
        let reboot = Outbound::from(ControllerCommand::new(ControllerOpcode::Reboot));
        assert_eq!(reboot.encode(), vec![0x00, 0x03, 0x01, b'R']);
        assert_eq!(reboot.address(), ReaderAddress::CONTROLLER);
        assert!(!reboot.is_decision());

        let denied = Outbound::from(OutgoingCommand::denied(ReaderAddress::new(7)));
        assert_eq!(denied.encode(), vec![0x07, 0x04, 0x00]);
        assert!(denied.is_decision());
    }
}
