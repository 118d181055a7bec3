// Network echo probe
// A ping is a TCP round trip of a random nonce to the peer's echo responder

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use regatta_common::{RegattaError, Result};

pub const DEFAULT_ECHO_PORT: u16 = 7010;

/// Sends an echo probe to a network address
#[async_trait]
pub trait EchoPinger: Send + Sync {
    /// Succeeds when the peer echoed the probe back.
    ///
    /// A peer that is down surfaces as `RegattaError::ConnectionClosed`.
    async fn ping(&self, addr: IpAddr, cancel: &CancellationToken) -> Result<()>;
}

/// Echo probe over a short-lived TCP connection
#[derive(Clone, Debug)]
pub struct TcpEchoPinger {
    port: u16,
    timeout: Duration,
}

impl Default for TcpEchoPinger {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_PORT, Duration::from_millis(500))
    }
}

impl TcpEchoPinger {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    async fn round_trip(&self, target: SocketAddr) -> Result<()> {
        let nonce = uuid::Uuid::new_v4().as_u64_pair().0.to_be_bytes();

        let mut stream = TcpStream::connect(target).await.map_err(classify)?;
        stream.set_nodelay(true).map_err(classify)?;
        stream.write_all(&nonce).await.map_err(classify)?;

        let mut echoed = [0u8; 8];
        stream.read_exact(&mut echoed).await.map_err(classify)?;
        if echoed != nonce {
            return Err(RegattaError::TransportError(format!(
                "echo mismatch from {target}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EchoPinger for TcpEchoPinger {
    async fn ping(&self, addr: IpAddr, cancel: &CancellationToken) -> Result<()> {
        let target = SocketAddr::new(addr, self.port);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RegattaError::SleepAborted),
            result = tokio::time::timeout(self.timeout, self.round_trip(target)) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(RegattaError::TransportError(format!(
                    "echo to {target} timed out"
                ))),
            },
        }
    }
}

fn classify(err: std::io::Error) -> RegattaError {
    match err.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => RegattaError::ConnectionClosed(err.to_string()),
        _ => RegattaError::Io(err),
    }
}

/// Serve echo probes on `listener` until `cancel` fires
pub async fn serve_echo(listener: TcpListener, cancel: CancellationToken) -> Result<()> {
    let local = listener.local_addr()?;
    info!(address = %local, "Echo responder listening");

    loop {
        let (mut socket, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted?,
        };
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 8];
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = async {
                    socket.read_exact(&mut buf).await?;
                    socket.write_all(&buf).await
                } => result,
            };
            match result {
                Ok(()) => debug!(peer = %peer, "Answered echo probe"),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {}
                Err(e) => warn!(peer = %peer, error = %e, "Echo probe failed"),
            }
        });
    }

    info!(address = %local, "Echo responder stopped");
    Ok(())
}
