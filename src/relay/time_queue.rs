//! A queue of messages ordered by release time.
//!
//! Nodes live in an arena and are linked by index in both directions, so the
//! relay can splice messages into the middle of the queue and move them around
//! when simulating reordering, without reallocating payloads.
//!
//! 按释放时间排序的消息队列。节点存放在 arena 中，通过索引双向链接，中继可以在队列
//! 中间插入消息或移动消息以模拟乱序，而无需重新分配载荷。

use bytes::Bytes;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Largest magnitude of a randomly chosen reorder step.
/// 随机重排步长的最大绝对值。
pub const MAX_RANDOM_REORDER_STEP: i32 = 5;

#[derive(Debug)]
struct Node {
    message: Bytes,
    release_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Messages sorted ascending by `release_at`; messages with equal release
/// times keep their insertion order.
///
/// 按 `release_at` 升序排列的消息；释放时间相同的消息保持插入顺序。
#[derive(Debug, Default)]
pub struct TimeGatedQueue {
    /// Slot storage. Freed slots are kept, with an empty message, for reuse.
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl TimeGatedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `message` for release `delay` after `now`.
    ///
    /// 将 `message` 排入队列，在 `now` 之后 `delay` 时释放。
    pub fn enqueue(&mut self, message: Bytes, delay: Duration, now: Instant) {
        let release_at = now + delay;
        let index = self.alloc(message, release_at);

        let after = match (self.head, self.tail) {
            (Some(_), Some(tail)) if release_at >= self.node(tail).release_at => Some(tail),
            (Some(head), _) if release_at < self.node(head).release_at => None,
            (Some(head), _) => {
                // Splice after the last node released no later than the new one.
                let mut cursor = head;
                while let Some(next) = self.node(cursor).next {
                    if self.node(next).release_at > release_at {
                        break;
                    }
                    cursor = next;
                }
                Some(cursor)
            }
            (None, _) => None,
        };
        self.link_after(index, after);
    }

    /// Removes and returns the head message if its release time has come.
    ///
    /// 若队首消息的释放时间已到，则将其移除并返回。
    pub fn dequeue_if_due(&mut self, now: Instant) -> Option<Bytes> {
        let head = self.head?;
        if self.node(head).release_at > now {
            return None;
        }
        self.unlink(head);
        Some(self.release(head))
    }

    /// Moves one message to simulate reordering and returns the step applied,
    /// or `None` when the queue is too short for anything to move.
    ///
    /// Starting from the tail, the queue is walked `|step|` positions towards
    /// the head (stopping at the head). With a negative step the node found
    /// there is moved to the tail; with a positive step the tail node is moved
    /// in front of it. A step of zero is replaced by a random non-zero step in
    /// `[-MAX_RANDOM_REORDER_STEP, MAX_RANDOM_REORDER_STEP]`.
    ///
    /// The moved node takes over the release time of its new neighbour, so the
    /// queue stays sorted.
    ///
    /// 移动一条消息以模拟乱序，返回实际应用的步长；队列太短时返回 `None`。
    /// 被移动的节点会继承其新邻居的释放时间，因此队列保持有序。
    pub fn reorder<R: Rng + ?Sized>(&mut self, step: i32, rng: &mut R) -> Option<i32> {
        let (head, tail) = (self.head?, self.tail?);
        if head == tail {
            return None;
        }

        let step = if step == 0 {
            random_step(rng)
        } else {
            step
        };

        let mut target = tail;
        for _ in 0..step.unsigned_abs() {
            match self.node(target).prev {
                Some(prev) => target = prev,
                None => break,
            }
        }
        if target == tail {
            return None;
        }

        if step < 0 {
            let release_at = self.node(tail).release_at;
            self.unlink(target);
            self.node_mut(target).release_at = release_at;
            self.link_after(target, Some(tail));
        } else {
            let release_at = self.node(target).release_at;
            let before = self.node(target).prev;
            self.unlink(tail);
            self.node_mut(tail).release_at = release_at;
            self.link_after(tail, before);
        }
        Some(step)
    }

    /// Release time of the head message.
    pub fn next_release_at(&self) -> Option<Instant> {
        self.head.map(|head| self.node(head).release_at)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates head to tail over `(release_at, message)`.
    pub fn iter(&self) -> impl Iterator<Item = (Instant, &Bytes)> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.node(cursor?);
            cursor = node.next;
            Some((node.release_at, &node.message))
        })
    }

    fn alloc(&mut self, message: Bytes, release_at: Instant) -> usize {
        let node = Node {
            message,
            release_at,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Returns a detached slot to the free list, handing back its message.
    fn release(&mut self, index: usize) -> Bytes {
        self.free.push(index);
        std::mem::take(&mut self.nodes[index].message)
    }

    /// Links a detached node after `after`, or at the head when `after` is `None`.
    fn link_after(&mut self, index: usize, after: Option<usize>) {
        let next = match after {
            Some(prev) => self.node(prev).next,
            None => self.head,
        };
        {
            let node = self.node_mut(index);
            node.prev = after;
            node.next = next;
        }
        match after {
            Some(prev) => self.node_mut(prev).next = Some(index),
            None => self.head = Some(index),
        }
        match next {
            Some(next) => self.node_mut(next).prev = Some(index),
            None => self.tail = Some(index),
        }
        self.len += 1;
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let node = self.node_mut(index);
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index]
    }
}

fn random_step<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    loop {
        let step = rng.random_range(-MAX_RANDOM_REORDER_STEP..=MAX_RANDOM_REORDER_STEP);
        if step != 0 {
            return step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn contents(queue: &TimeGatedQueue) -> Vec<String> {
        queue
            .iter()
            .map(|(_, m)| String::from_utf8_lossy(m).into_owned())
            .collect()
    }

    fn assert_sorted(queue: &TimeGatedQueue) {
        let times: Vec<Instant> = queue.iter().map(|(t, _)| t).collect();
        assert!(
            times.windows(2).all(|w| w[0] <= w[1]),
            "queue out of order: {:?}",
            times
        );
        assert_eq!(times.len(), queue.len());
    }

    fn queue_of(names: &[&str], now: Instant) -> TimeGatedQueue {
        let mut queue = TimeGatedQueue::new();
        for (i, name) in names.iter().enumerate() {
            queue.enqueue(
                Bytes::copy_from_slice(name.as_bytes()),
                Duration::from_millis(10 * i as u64),
                now,
            );
        }
        queue
    }

    #[test]
    fn test_release_order_follows_delay() {
        let now = Instant::now();
        let mut queue = TimeGatedQueue::new();
        queue.enqueue(Bytes::from("fifty"), Duration::from_millis(50), now);
        queue.enqueue(Bytes::from("ten"), Duration::from_millis(10), now);
        queue.enqueue(Bytes::from("thirty"), Duration::from_millis(30), now);
        assert_eq!(contents(&queue), vec!["ten", "thirty", "fifty"]);

        assert!(queue.dequeue_if_due(now).is_none());
        let later = now + Duration::from_millis(50);
        assert_eq!(queue.dequeue_if_due(later).unwrap(), "ten");
        assert_eq!(queue.dequeue_if_due(later).unwrap(), "thirty");
        assert_eq!(queue.dequeue_if_due(later).unwrap(), "fifty");
        assert!(queue.dequeue_if_due(later).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_equal_release_times_keep_fifo_order() {
        let now = Instant::now();
        let mut queue = TimeGatedQueue::new();
        queue.enqueue(Bytes::from("late"), Duration::from_millis(20), now);
        for name in ["a", "b", "c"] {
            queue.enqueue(Bytes::from(name), Duration::from_millis(10), now);
        }
        assert_eq!(contents(&queue), vec!["a", "b", "c", "late"]);
    }

    #[test]
    fn test_nothing_is_released_early() {
        let now = Instant::now();
        let mut queue = TimeGatedQueue::new();
        queue.enqueue(Bytes::from("m"), Duration::from_millis(100), now);

        assert_eq!(queue.next_release_at(), Some(now + Duration::from_millis(100)));
        assert!(queue.dequeue_if_due(now + Duration::from_millis(99)).is_none());
        assert_eq!(queue.len(), 1);
        assert!(queue.dequeue_if_due(now + Duration::from_millis(100)).is_some());
    }

    #[test]
    fn test_negative_step_moves_older_message_to_tail() {
        let now = Instant::now();
        let mut queue = queue_of(&["a", "b", "c", "d"], now);

        assert_eq!(queue.reorder(-2, &mut StdRng::seed_from_u64(0)), Some(-2));
        assert_eq!(contents(&queue), vec!["a", "c", "d", "b"]);
        assert_sorted(&queue);
        // "b" inherits the release time of its new predecessor.
        let (last_time, _) = queue.iter().last().unwrap();
        assert_eq!(last_time, now + Duration::from_millis(30));
    }

    #[test]
    fn test_positive_step_moves_newest_message_earlier() {
        let now = Instant::now();
        let mut queue = queue_of(&["a", "b", "c", "d"], now);

        assert_eq!(queue.reorder(2, &mut StdRng::seed_from_u64(0)), Some(2));
        assert_eq!(contents(&queue), vec!["a", "d", "b", "c"]);
        assert_sorted(&queue);
    }

    #[test]
    fn test_step_is_clamped_at_head() {
        let now = Instant::now();
        let mut queue = queue_of(&["a", "b", "c"], now);

        queue.reorder(10, &mut StdRng::seed_from_u64(0));
        assert_eq!(contents(&queue), vec!["c", "a", "b"]);
        assert_sorted(&queue);

        queue.reorder(-10, &mut StdRng::seed_from_u64(0));
        assert_eq!(contents(&queue), vec!["a", "b", "c"]);
        assert_sorted(&queue);
    }

    #[test]
    fn test_short_queues_are_not_reordered() {
        let now = Instant::now();
        let mut rng = StdRng::seed_from_u64(0);
        let mut queue = TimeGatedQueue::new();
        assert!(queue.reorder(1, &mut rng).is_none());

        queue.enqueue(Bytes::from("only"), Duration::ZERO, now);
        assert!(queue.reorder(-1, &mut rng).is_none());
        assert_eq!(contents(&queue), vec!["only"]);
    }

    #[test]
    fn test_random_reorders_keep_queue_sorted() {
        let now = Instant::now();
        let mut rng = StdRng::seed_from_u64(42);
        let mut queue = TimeGatedQueue::new();
        let mut clock = now;

        for round in 0..500u64 {
            let delay = Duration::from_millis(rng.random_range(0..50));
            queue.enqueue(Bytes::from(format!("m{}", round)), delay, clock);
            if round % 3 == 0 {
                let applied = queue.reorder(0, &mut rng);
                if let Some(step) = applied {
                    assert!(step != 0 && step.abs() <= MAX_RANDOM_REORDER_STEP);
                }
            }
            assert_sorted(&queue);

            clock += Duration::from_millis(5);
            while queue.dequeue_if_due(clock).is_some() {}
            if let Some(head) = queue.next_release_at() {
                assert!(head > clock);
            }
        }

        // Freed slots are reused rather than growing the arena.
        assert!(queue.nodes.len() < 500);
    }
}
