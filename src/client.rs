//! The reliable-delivery client: drives an [`ArqSession`] from a byte stream,
//! an input of user lines and the retransmission clock.
//!
//! 可靠传输客户端：由字节流、用户输入行和重传时钟驱动 [`ArqSession`]。

use crate::config::ArqConfig;
use crate::core::ArqSession;
use crate::error::{Error, Result};
use crate::packet::frame::LINE_TERMINATOR;
use crate::packet::framer::LineFramer;
use bytes::Bytes;
use std::net::{IpAddr, SocketAddr};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The input line that ends the session.
pub const QUIT_COMMAND: &[u8] = b"quit";

/// Builds the relay address from a textual IP and a port.
///
/// 由文本形式的 IP 和端口构造中继地址。
pub fn server_addr(ip: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = ip.trim().parse()?;
    Ok(SocketAddr::new(ip, port))
}

/// Connects to the relay at `addr` and runs a session between stdin/stdout and
/// the connection.
///
/// 连接到 `addr` 上的中继，并在标准输入/输出与连接之间运行会话。
pub async fn connect(addr: SocketAddr, config: ArqConfig) -> Result<()> {
    let stream = TcpStream::connect(addr).await?;
    info!(%addr, "Connected to server");
    let input = BufReader::new(tokio::io::stdin());
    run(stream, input, tokio::io::stdout(), config).await
}

/// Runs one ARQ session over `stream`.
///
/// Every line read from `input` is sent as a data frame, as raw bytes with a
/// trailing `\r` removed; every payload the peer delivers in order is written
/// to `output` followed by a newline. The loop returns `Ok(())` when `quit` is
/// read. End of input only stops reading input; the connection keeps being
/// serviced until it fails. A received line too long to be a frame is
/// discarded and framing resumes after its newline.
///
/// 在 `stream` 上运行一个 ARQ 会话。从 `input` 读取的每一行（按原始字节，去掉结尾的 `\r`）
/// 都作为数据帧发送；对端按序交付的每个载荷都写入 `output` 并追加换行。读到 `quit` 时返回
/// `Ok(())`。输入结束只会停止读取输入，连接会继续被服务直到出错。收到的过长行会被丢弃，
/// 并从其换行之后恢复分帧。
pub async fn run<S, I, O>(stream: S, input: I, mut output: O, config: ArqConfig) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut framer = LineFramer::new(config.receive_line_limit());
    let mut scratch = vec![0; config.max_frame_size];
    let mut session = ArqSession::new(config);
    let mut lines = input.split(LINE_TERMINATOR);
    let mut input_open = true;

    loop {
        let deadline = session.next_deadline();
        let retransmit_timer = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            res = reader.read(&mut scratch) => {
                let len = res?;
                if len == 0 {
                    info!("Client got disconnected");
                    return Err(Error::ConnectionClosed);
                }
                framer.extend(&scratch[..len]);
                loop {
                    let line = match framer.next_line() {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e @ Error::FrameTooLarge { .. }) => {
                            warn!(buffered = framer.buffered(), "Discarding garbled line: {}", e);
                            framer.resync();
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    let incoming = session.on_frame_received(&line);
                    for payload in &incoming.delivered {
                        output.write_all(payload).await?;
                        output.write_all(b"\n").await?;
                    }
                    if !incoming.delivered.is_empty() {
                        output.flush().await?;
                    }
                    for reply in &incoming.replies {
                        writer.write_all(reply).await?;
                    }
                }
            }
            line = lines.next_segment(), if input_open => {
                match line?.map(strip_carriage_return) {
                    None => {
                        debug!("End of input, servicing connection only");
                        input_open = false;
                    }
                    Some(line) if line == QUIT_COMMAND => {
                        info!(
                            in_flight = session.send_queue().in_flight_count(),
                            "Exiting program"
                        );
                        writer.flush().await?;
                        return Ok(());
                    }
                    Some(line) => match session.send(Bytes::from(line), Instant::now()) {
                        Ok(raw) => writer.write_all(&raw).await?,
                        Err(e @ (Error::InvalidPayload | Error::MessageTooLarge)) => {
                            warn!("Skipping input line: {}", e);
                        }
                        Err(e) => return Err(e),
                    },
                }
            }
            _ = retransmit_timer => {
                if let Some(raw) = session.on_tick(Instant::now())? {
                    writer.write_all(&raw).await?;
                }
            }
        }
    }
}

fn strip_carriage_return(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}
