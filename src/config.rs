//! 定义了客户端协议与中继损伤模型的可配置参数。
//! Defines configurable parameters for the client protocol and the relay's impairment model.

use crate::relay::impairment::{CorruptionKind, DropTier};
use std::time::Duration;

/// Default upper bound on a single newline-terminated frame, newline included.
/// 单个以换行结尾的帧的默认长度上限（包含换行符）。
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

/// Parameters of the client-side ARQ session.
///
/// 客户端 ARQ 会话的参数。
#[derive(Debug, Clone)]
pub struct ArqConfig {
    /// How long a data frame may stay unacknowledged before it is resent.
    /// 数据帧在被重传之前可以保持未确认状态的时长。
    pub retransmit_timeout: Duration,
    /// Minimum spacing between two retransmissions, so a backlog of expired
    /// frames does not flood the relay.
    /// 两次重传之间的最小间隔，避免大量过期帧冲击中继。
    pub retransmit_pacing: Duration,
    /// Number of retransmissions after which an unacknowledged frame closes the connection.
    /// 未确认帧在达到该重传次数后将关闭连接。
    pub max_retransmissions: u32,
    /// Maximum length of one frame on the wire, newline included.
    /// 线路上单个帧的最大长度（包含换行符）。
    pub max_frame_size: usize,
    /// Maximum number of out-of-order payloads held for reassembly.
    /// 为重组而保留的乱序载荷的最大数量。
    pub recv_buffer_capacity: usize,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            retransmit_timeout: Duration::from_secs(5),
            retransmit_pacing: Duration::from_millis(100),
            max_retransmissions: 25,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            recv_buffer_capacity: 1024,
        }
    }
}

impl ArqConfig {
    /// Longest line the receiving side accepts: one dangling fragment of a
    /// truncated frame followed by one full frame.
    ///
    /// 接收端接受的最长行：一个被截断帧的残留片段加上一个完整帧。
    pub fn receive_line_limit(&self) -> usize {
        self.max_frame_size.saturating_mul(2)
    }
}

/// The fault model applied by the relay to every forwarded message.
///
/// All rates are percentages in `0..=100`. The default is a perfect link.
///
/// 中继对每条转发消息施加的故障模型。所有比率都是 `0..=100` 的百分比，默认是完美链路。
#[derive(Debug, Clone)]
pub struct ImpairmentConfig {
    /// Drop tier selected by the repeatable `-d` flag.
    /// 由可重复的 `-d` 参数选择的丢弃档位。
    pub drop_tier: DropTier,
    /// Percentage of messages that get corrupted.
    /// 被损坏的消息百分比。
    pub corrupt_rate: u8,
    /// Corruption strategy applied to a corrupted message.
    /// 对被损坏消息所采用的损坏策略。
    pub corruption: CorruptionKind,
    /// Base latency added to every forwarded message.
    /// 每条转发消息附加的基础延迟。
    pub latency: Duration,
    /// Percentage of messages that trigger a queue reorder.
    /// 触发队列重排的消息百分比。
    pub reorder_rate: u8,
    /// Reorder step: `>0` moves the newest message earlier, `<0` moves an older
    /// one later, `0` picks a random step in `[-5, 5]`.
    /// 重排步长：`>0` 使最新消息提前，`<0` 使较旧消息延后，`0` 在 `[-5, 5]` 中随机选取。
    pub reorder_step: i32,
    /// Percentage chance of each additional duplicate.
    /// 每个额外副本产生的概率百分比。
    pub duplicate_rate: u8,
    /// RNG seed for reproducible runs. `None` seeds from the OS.
    /// 用于可复现运行的随机数种子。`None` 表示从操作系统获取种子。
    pub seed: Option<u64>,
}

impl Default for ImpairmentConfig {
    fn default() -> Self {
        Self {
            drop_tier: DropTier::None,
            corrupt_rate: 0,
            corruption: CorruptionKind::CharacterFlip,
            latency: Duration::ZERO,
            reorder_rate: 0,
            reorder_step: 0,
            duplicate_rate: 0,
            seed: None,
        }
    }
}

/// Relay-wide parameters.
///
/// 中继的全局参数。
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum length of one line read from a peer, newline included.
    /// 从对端读取的一行的最大长度（包含换行符）。
    pub max_frame_size: usize,
    /// The fault model.
    /// 故障模型。
    pub impairment: ImpairmentConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            impairment: ImpairmentConfig::default(),
        }
    }
}
