//! tests/common/harness.rs
use arq_relay::client;
use arq_relay::config::{ArqConfig, RelayConfig};
use arq_relay::error::Result;
use arq_relay::relay::RelayScheduler;
use std::sync::Once;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, Lines, duplex,
};
use tokio::task::JoinHandle;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "arq_relay=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// A running client with its terminal replaced by in-memory pipes.
pub struct TestClient {
    /// What the user types.
    pub input: DuplexStream,
    /// What the client prints, one delivered line at a time.
    pub output: Lines<BufReader<DuplexStream>>,
    pub task: JoinHandle<Result<()>>,
}

impl TestClient {
    pub fn spawn<S>(stream: S, config: ArqConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (input, client_input) = duplex(PIPE_CAPACITY);
        let (client_output, output) = duplex(PIPE_CAPACITY);
        let task = tokio::spawn(client::run(
            stream,
            BufReader::new(client_input),
            client_output,
            config,
        ));
        Self {
            input,
            output: BufReader::new(output).lines(),
            task,
        }
    }

    pub async fn type_line(&mut self, line: &str) {
        self.input
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Types `quit` and waits for the client to finish. The write may fail if
    /// the client already stopped on its own.
    pub async fn quit(mut self) -> Result<()> {
        let _ = self.input.write_all(b"quit\n").await;
        self.task.await.unwrap()
    }
}

/// Two clients connected through an in-memory relay.
pub struct TestHarness {
    pub alice: TestClient,
    pub bob: TestClient,
    pub relay: JoinHandle<Result<()>>,
}

impl TestHarness {
    pub fn new(relay_config: RelayConfig, client_config: ArqConfig) -> Self {
        init_tracing();
        let (alice_stream, relay_alice) = duplex(PIPE_CAPACITY);
        let (bob_stream, relay_bob) = duplex(PIPE_CAPACITY);
        let relay = tokio::spawn(async move {
            let mut scheduler = RelayScheduler::new(relay_alice, relay_bob, relay_config);
            scheduler.run().await
        });
        Self {
            alice: TestClient::spawn(alice_stream, client_config.clone()),
            bob: TestClient::spawn(bob_stream, client_config),
            relay,
        }
    }
}
