//! Holds data frames that arrived ahead of the next expected sequence number
//! until the gap in front of them is filled.
//!
//! 保存比下一个期望序号更早到达的数据帧，直到它们前面的空缺被填补。

use bytes::Bytes;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// A buffered out-of-order payload.
#[derive(Debug, Clone)]
pub struct BufferedPayload {
    pub sequence_number: u64,
    pub payload: Bytes,
}

/// Out-of-order payloads, sorted ascending by sequence number, each sequence
/// number at most once.
#[derive(Debug)]
pub struct ReceiveBuffer {
    received: VecDeque<BufferedPayload>,
    /// The maximum number of payloads to buffer.
    capacity: usize,
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ReceiveBuffer {
    /// Creates a new `ReceiveBuffer`.
    pub fn new(capacity: usize) -> Self {
        Self {
            received: VecDeque::new(),
            capacity,
        }
    }

    /// Buffers a payload that arrived out of order. Returns `true` if the
    /// payload was stored, `false` if it was a duplicate or the buffer is full.
    ///
    /// A payload beyond the current tail is appended directly; anything else is
    /// placed by searching for its slot.
    ///
    /// 缓存乱序到达的载荷。存储成功返回 `true`，重复或缓冲区已满时返回 `false`。
    pub fn insert(&mut self, sequence_number: u64, payload: Bytes) -> bool {
        if self.received.len() >= self.capacity {
            debug!(
                seq = sequence_number,
                capacity = self.capacity,
                "Receive buffer full, discarding out-of-order frame"
            );
            return false;
        }

        let is_new_tail = self
            .received
            .back()
            .is_none_or(|tail| sequence_number > tail.sequence_number);
        if is_new_tail {
            self.received.push_back(BufferedPayload {
                sequence_number,
                payload,
            });
            return true;
        }

        match self
            .received
            .binary_search_by_key(&sequence_number, |p| p.sequence_number)
        {
            Ok(_) => {
                trace!(seq = sequence_number, "Duplicate out-of-order frame ignored");
                false
            }
            Err(index) => {
                self.received.insert(
                    index,
                    BufferedPayload {
                        sequence_number,
                        payload,
                    },
                );
                true
            }
        }
    }

    /// Removes and returns the head payload if it carries `expected`.
    ///
    /// 如果队首载荷的序号等于 `expected`，则将其移除并返回。
    pub fn pop_next(&mut self, expected: u64) -> Option<Bytes> {
        if self.first_sequence()? != expected {
            return None;
        }
        self.received.pop_front().map(|p| p.payload)
    }

    /// Sequence number of the lowest buffered payload.
    pub fn first_sequence(&self) -> Option<u64> {
        self.received.front().map(|p| p.sequence_number)
    }

    pub fn len(&self) -> usize {
        self.received.len()
    }

    /// Checks if there are any buffered, out-of-order payloads.
    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }

    pub fn sequences(&self) -> impl Iterator<Item = u64> + '_ {
        self.received.iter().map(|p| p.sequence_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_recv_buffer() -> ReceiveBuffer {
        ReceiveBuffer::new(256)
    }

    #[test]
    fn test_insert_keeps_sequence_order() {
        let mut buffer = create_test_recv_buffer();
        for seq in [7, 3, 9, 5, 4] {
            assert!(buffer.insert(seq, Bytes::from(format!("p{}", seq))));
        }
        assert_eq!(buffer.sequences().collect::<Vec<_>>(), vec![3, 4, 5, 7, 9]);
        assert_eq!(buffer.first_sequence(), Some(3));
    }

    #[test]
    fn test_duplicate_insert_is_discarded() {
        let mut buffer = create_test_recv_buffer();
        assert!(buffer.insert(3, Bytes::from("three")));
        assert!(buffer.insert(5, Bytes::from("five")));

        // Duplicate of the tail and of an interior entry.
        assert!(!buffer.insert(5, Bytes::from("ignored duplicate")));
        assert!(!buffer.insert(3, Bytes::from("ignored duplicate")));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.pop_next(3).unwrap(), "three");
    }

    #[test]
    fn test_pop_next_only_yields_expected_head() {
        let mut buffer = create_test_recv_buffer();
        buffer.insert(2, Bytes::from("two"));
        buffer.insert(3, Bytes::from("three"));

        assert!(buffer.pop_next(1).is_none());
        assert_eq!(buffer.len(), 2);

        assert_eq!(buffer.pop_next(2).unwrap(), "two");
        assert_eq!(buffer.pop_next(3).unwrap(), "three");
        assert!(buffer.pop_next(4).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_full_buffer_discards_new_frames() {
        let mut buffer = ReceiveBuffer::new(2);
        assert!(buffer.insert(10, Bytes::new()));
        assert!(buffer.insert(11, Bytes::new()));
        assert!(!buffer.insert(12, Bytes::new()));
        assert!(!buffer.insert(5, Bytes::new()));
        assert_eq!(buffer.sequences().collect::<Vec<_>>(), vec![10, 11]);
    }
}
