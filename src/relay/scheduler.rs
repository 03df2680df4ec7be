//! The relay event loop.
//!
//! Two peers are serviced from one task. Every complete line read from one peer
//! passes through the [`ImpairmentEngine`] into the queue of the other peer,
//! and queued messages are written out once their release time has come.
//!
//! 中继事件循环。单个任务同时服务两个对端：从一端读取的每一个完整行都会经过
//! [`ImpairmentEngine`] 进入另一端的队列，排队的消息在释放时间到达后写出。

use super::impairment::{Disposition, ImpairmentEngine};
use super::time_queue::TimeGatedQueue;
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::packet::framer::LineFramer;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{Level, debug, info, trace};

/// Longest single wait while messages are queued.
/// 有消息排队时单次等待的最长时间。
pub const MAX_POLL_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Per-peer traffic counters.
///
/// 每个对端的流量计数。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub reads: u64,
    pub bytes_read: u64,
    pub lines: u64,
    pub bytes_written: u64,
}

#[derive(Debug)]
struct Channel<S> {
    stream: S,
    framer: LineFramer,
    scratch: Vec<u8>,
    stats: ChannelStats,
}

enum Event {
    Read { channel: usize, len: usize },
    Timeout,
}

/// How long the relay may block before the next queued message is due.
///
/// Returns `None` when both queues are empty, meaning wait for input only.
/// An overdue head yields `Duration::ZERO`.
///
/// 距离下一条排队消息到期、中继可以阻塞的时长。两个队列都为空时返回 `None`，表示只等待输入。
pub fn poll_timeout(queues: &[TimeGatedQueue], now: Instant) -> Option<Duration> {
    queues
        .iter()
        .filter_map(TimeGatedQueue::next_release_at)
        .min()
        .map(|at| at.saturating_duration_since(now).min(MAX_POLL_TIMEOUT))
}

/// Relays newline-terminated messages between two peers through the fault model.
///
/// 通过故障模型在两个对端之间中继以换行结尾的消息。
#[derive(Debug)]
pub struct RelayScheduler<S> {
    channels: [Channel<S>; 2],
    /// `queues[c]` holds messages bound for peer `c`.
    queues: [TimeGatedQueue; 2],
    engine: ImpairmentEngine,
    started_at: Instant,
}

impl<S> RelayScheduler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(first: S, second: S, config: RelayConfig) -> Self {
        let channel = |stream| Channel {
            stream,
            framer: LineFramer::new(config.max_frame_size),
            scratch: vec![0; config.max_frame_size],
            stats: ChannelStats::default(),
        };
        Self {
            channels: [channel(first), channel(second)],
            queues: [TimeGatedQueue::new(), TimeGatedQueue::new()],
            engine: ImpairmentEngine::new(config.impairment),
            started_at: Instant::now(),
        }
    }

    pub fn stats(&self) -> [ChannelStats; 2] {
        [self.channels[0].stats, self.channels[1].stats]
    }

    /// Runs until a peer disconnects or an I/O error occurs. Both are returned
    /// as errors; the relay has no other way to stop.
    ///
    /// 运行直到某个对端断开或发生 I/O 错误，两者都以错误返回。
    pub async fn run(&mut self) -> Result<()> {
        let impairment = self.engine.config();
        info!(
            drop = %impairment.drop_tier,
            corrupt_rate = impairment.corrupt_rate,
            corruption = %impairment.corruption,
            latency = ?impairment.latency,
            reorder_rate = impairment.reorder_rate,
            reorder_step = impairment.reorder_step,
            duplicate_rate = impairment.duplicate_rate,
            "Impairment settings"
        );
        let result = self.event_loop().await;
        let elapsed = self.started_at.elapsed();
        for (channel, stats) in self.stats().iter().enumerate() {
            info!(
                channel,
                reads = stats.reads,
                bytes_read = stats.bytes_read,
                lines = stats.lines,
                bytes_written = stats.bytes_written,
                ?elapsed,
                "Channel summary"
            );
        }
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            let timeout = poll_timeout(&self.queues, Instant::now());
            match self.wait(timeout).await? {
                Event::Read { channel, len } => self.on_read(channel, len)?,
                Event::Timeout => trace!("Poll timeout"),
            }
            self.flush_due().await?;
        }
    }

    async fn wait(&mut self, timeout: Option<Duration>) -> Result<Event> {
        let [a, b] = &mut self.channels;
        let sleep = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        let event = tokio::select! {
            res = a.stream.read(&mut a.scratch) => Event::Read { channel: 0, len: res? },
            res = b.stream.read(&mut b.scratch) => Event::Read { channel: 1, len: res? },
            _ = sleep => Event::Timeout,
        };
        Ok(event)
    }

    fn on_read(&mut self, channel: usize, len: usize) -> Result<()> {
        if len == 0 {
            info!(channel, "Peer closed the connection");
            return Err(Error::ConnectionClosed);
        }
        let now = Instant::now();
        let source = &mut self.channels[channel];
        source.stats.reads += 1;
        source.stats.bytes_read += len as u64;
        debug!(
            channel,
            len,
            total = source.stats.bytes_read,
            elapsed = ?now.duration_since(self.started_at),
            "Read from peer"
        );
        source.framer.extend(&source.scratch[..len]);

        let destination = 1 - channel;
        while let Some(line) = self.channels[channel].framer.next_line()? {
            self.channels[channel].stats.lines += 1;
            let text = String::from_utf8_lossy(&line).trim_end().to_owned();
            match self
                .engine
                .process(line, &mut self.queues[destination], now)
            {
                Disposition::Dropped => info!(channel, line = %text, "#dropped#"),
                Disposition::Forwarded {
                    message,
                    corrupted,
                    reordered,
                    duplicates,
                } => {
                    info!(channel, line = %text, "#forwarded#");
                    if corrupted {
                        info!(
                            channel,
                            line = %String::from_utf8_lossy(&message).trim_end(),
                            "#corrupted#"
                        );
                    }
                    if let Some(step) = reordered {
                        info!(channel, step, "#reordered#");
                    }
                    if duplicates > 0 {
                        info!(channel, duplicates, line = %text, "#duplicate#");
                    }
                }
            }
        }
        self.dump_queues();
        Ok(())
    }

    /// Writes every due message, alternating between the two queues until
    /// neither has anything due.
    async fn flush_due(&mut self) -> Result<()> {
        loop {
            let now = Instant::now();
            let mut progressed = false;
            for channel in 0..2 {
                if let Some(message) = self.queues[channel].dequeue_if_due(now) {
                    let target = &mut self.channels[channel];
                    target.stream.write_all(&message).await?;
                    target.stats.bytes_written += message.len() as u64;
                    trace!(channel, len = message.len(), "Released message");
                    progressed = true;
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    fn dump_queues(&self) {
        if !tracing::enabled!(Level::TRACE) {
            return;
        }
        let now = Instant::now();
        for (channel, queue) in self.queues.iter().enumerate() {
            trace!(channel, len = queue.len(), "Queue dump");
            for (release_at, message) in queue.iter() {
                trace!(
                    channel,
                    due_in = ?release_at.saturating_duration_since(now),
                    message = %String::from_utf8_lossy(message).trim_end(),
                    "  queued"
                );
            }
        }
    }
}
