//! The relay's fault model: drop, corrupt, delay, reorder and duplicate.
//!
//! 中继的故障模型：丢弃、损坏、延迟、乱序和重复。

use super::time_queue::TimeGatedQueue;
use crate::config::ImpairmentConfig;
use crate::packet::frame::LINE_TERMINATOR;
use bytes::{Bytes, BytesMut};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Upper bound on duplicates produced for one message.
/// 单条消息产生的副本数上限。
pub const MAX_DUPLICATES: u32 = 32;

/// Number of bytes overwritten by [`CorruptionKind::CharacterFlip`].
const CHARACTER_FLIPS: usize = 3;

/// Message drop probability, selected by repeating `-d`.
///
/// 消息丢弃概率，通过重复 `-d` 选择。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DropTier {
    #[default]
    None,
    /// About 10%.
    Light,
    /// About 25%.
    Moderate,
    /// About 50%.
    Heavy,
}

impl DropTier {
    /// Maps the number of `-d` flags to a tier; three or more is `Heavy`.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => DropTier::None,
            1 => DropTier::Light,
            2 => DropTier::Moderate,
            _ => DropTier::Heavy,
        }
    }

    /// Drop odds as "one in N", or `None` when nothing is dropped.
    ///
    /// 以"N 分之一"表示的丢弃几率；不丢弃时为 `None`。
    pub fn one_in(self) -> Option<u32> {
        match self {
            DropTier::None => None,
            DropTier::Light => Some(10),
            DropTier::Moderate => Some(4),
            DropTier::Heavy => Some(2),
        }
    }
}

impl fmt::Display for DropTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = match self {
            DropTier::None => 0,
            DropTier::Light => 10,
            DropTier::Moderate => 25,
            DropTier::Heavy => 50,
        };
        write!(f, "{}%", percent)
    }
}

/// How a corrupted message is damaged. All strategies pick positions in
/// `[0, len - 1)`, so the trailing newline itself is never the target.
///
/// 被损坏消息的损坏方式。所有策略都在 `[0, len - 1)` 中选取位置，末尾的换行符本身不会被选中。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CorruptionKind {
    /// Overwrites three random bytes with `X` (or `.` if already `X`).
    CharacterFlip = 1,
    /// Replaces one byte with a newline, splitting the message in two.
    InsertNewline = 2,
    /// Replaces one byte with a newline and cuts off everything after it.
    TruncateClean = 3,
    /// Cuts the message at a random byte, leaving it without a newline.
    TruncateDirty = 4,
}

impl CorruptionKind {
    /// Parses the numeric `-C` option.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(CorruptionKind::CharacterFlip),
            2 => Some(CorruptionKind::InsertNewline),
            3 => Some(CorruptionKind::TruncateClean),
            4 => Some(CorruptionKind::TruncateDirty),
            _ => None,
        }
    }

    /// Damages `message` in place at positions drawn from `rng`. Messages
    /// shorter than two bytes are left untouched; returns whether anything
    /// changed.
    ///
    /// 使用 `rng` 选取的位置就地损坏 `message`。短于两个字节的消息保持不变；返回是否有修改。
    pub fn apply<R: Rng + ?Sized>(self, message: &mut BytesMut, rng: &mut R) -> bool {
        if message.len() < 2 {
            return false;
        }
        let mut pick = |message: &BytesMut| rng.random_range(0..message.len() - 1);

        match self {
            CorruptionKind::CharacterFlip => {
                for _ in 0..CHARACTER_FLIPS {
                    let index = pick(message);
                    message[index] = if message[index] == b'X' { b'.' } else { b'X' };
                }
            }
            CorruptionKind::InsertNewline => {
                let index = pick(message);
                message[index] = LINE_TERMINATOR;
            }
            CorruptionKind::TruncateClean => {
                let index = pick(message);
                message[index] = LINE_TERMINATOR;
                message.truncate(index + 1);
            }
            CorruptionKind::TruncateDirty => {
                let index = pick(message);
                message.truncate(index);
            }
        }
        true
    }
}

impl fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorruptionKind::CharacterFlip => "character-flip",
            CorruptionKind::InsertNewline => "insert-newline",
            CorruptionKind::TruncateClean => "truncate-clean",
            CorruptionKind::TruncateDirty => "truncate-dirty",
        };
        f.write_str(name)
    }
}

/// What happened to one message.
///
/// 一条消息的处理结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Dropped,
    Forwarded {
        /// The (possibly corrupted) bytes that were queued.
        message: Bytes,
        corrupted: bool,
        /// Reorder step applied to the queue after enqueueing, if any.
        reordered: Option<i32>,
        duplicates: u32,
    },
}

/// Applies an [`ImpairmentConfig`] to messages on their way into a
/// [`TimeGatedQueue`].
#[derive(Debug)]
pub struct ImpairmentEngine {
    config: ImpairmentConfig,
    rng: StdRng,
}

impl ImpairmentEngine {
    /// Creates an engine, seeding its RNG from `config.seed` or the OS.
    pub fn new(config: ImpairmentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &ImpairmentConfig {
        &self.config
    }

    /// Runs one message through the fault model and queues whatever survives.
    ///
    /// The steps happen in a fixed order: drop, corrupt, enqueue with the base
    /// latency, reorder the queue, then enqueue duplicates one millisecond apart.
    ///
    /// 让一条消息经过故障模型并将存活的部分入队。步骤顺序固定：丢弃、损坏、以基础延迟入队、
    /// 重排队列，然后以一毫秒间隔入队副本。
    pub fn process(
        &mut self,
        message: Bytes,
        queue: &mut TimeGatedQueue,
        now: Instant,
    ) -> Disposition {
        if let Some(n) = self.config.drop_tier.one_in() {
            if self.rng.random_ratio(1, n) {
                return Disposition::Dropped;
            }
        }

        let mut corrupted = false;
        let message = if message.len() >= 2 && self.chance(self.config.corrupt_rate) {
            let mut damaged = BytesMut::from(&message[..]);
            corrupted = self.config.corruption.apply(&mut damaged, &mut self.rng);
            let damaged = damaged.freeze();
            debug!(
                kind = %self.config.corruption,
                before = %String::from_utf8_lossy(&message).trim_end(),
                after = %String::from_utf8_lossy(&damaged).trim_end(),
                "Corrupted message"
            );
            damaged
        } else {
            message
        };

        let latency = self.config.latency;
        queue.enqueue(message.clone(), latency, now);

        let reordered = if self.chance(self.config.reorder_rate) {
            queue.reorder(self.config.reorder_step, &mut self.rng)
        } else {
            None
        };

        let mut duplicates = 0;
        while duplicates < MAX_DUPLICATES && self.chance(self.config.duplicate_rate) {
            duplicates += 1;
            let delay = latency + Duration::from_millis(u64::from(duplicates));
            queue.enqueue(message.clone(), delay, now);
        }
        trace!(queued = queue.len(), duplicates, ?reordered, "Message queued");

        Disposition::Forwarded {
            message,
            corrupted,
            reordered,
            duplicates,
        }
    }

    /// Rolls a `percent` chance out of 100.
    fn chance(&mut self, percent: u8) -> bool {
        percent > 0 && self.rng.random_range(0..100u8) < percent
    }
}
