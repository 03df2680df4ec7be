//! The unreliable relay: accepts two peers and forwards lines between them
//! through a configurable fault model.
//!
//! 不可靠中继：接受两个对端，并通过可配置的故障模型在它们之间转发行。

pub mod impairment;
pub mod scheduler;
pub mod time_queue;

pub use impairment::{CorruptionKind, Disposition, DropTier, ImpairmentEngine};
pub use scheduler::{ChannelStats, RelayScheduler};
pub use time_queue::TimeGatedQueue;

use crate::{config::RelayConfig, error::Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Binds `addr` and relays between the first two peers that connect.
///
/// 绑定 `addr`，并在最先连接的两个对端之间进行中继。
pub async fn listen(addr: SocketAddr, config: RelayConfig) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Relay listening");
    serve(listener, config).await
}

/// Accepts exactly two peers on `listener` and runs the relay until one of
/// them disconnects.
pub async fn serve(listener: TcpListener, config: RelayConfig) -> Result<()> {
    let (first, first_addr) = listener.accept().await?;
    info!(peer = %first_addr, "First peer connected, waiting for second");
    let (second, second_addr) = listener.accept().await?;
    info!(peer = %second_addr, "Second peer connected, relaying");
    drop(listener);

    RelayScheduler::new(first, second, config).run().await
}
