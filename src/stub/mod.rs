use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::{FrameHeader, SCREEN_COMMAND};

/// Frame served by the stub daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubFrame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
    /// Stop writing after this many payload bytes, then hang up.
    pub truncate_at: Option<usize>,
}

impl StubFrame {
    pub fn new(width: u32, height: u32, bits_per_pixel: u32, payload: Vec<u8>) -> Self {
        Self {
            header: FrameHeader {
                width,
                height,
                bits_per_pixel,
            },
            payload,
            truncate_at: None,
        }
    }

    /// Deterministic gradient sized to match the header.
    pub fn test_pattern(width: u32, height: u32, bits_per_pixel: u32) -> Self {
        let len = width as usize * height as usize * bits_per_pixel as usize / 8;
        let payload = (0..len)
            .map(|i| match bits_per_pixel {
                32 if i % 4 == 3 => 0xFF, // opaque alpha
                _ => (i * 7 % 256) as u8,
            })
            .collect();
        Self::new(width, height, bits_per_pixel, payload)
    }

    pub fn truncated(mut self, at: usize) -> Self {
        self.truncate_at = Some(at);
        self
    }

    fn wire_payload(&self) -> &[u8] {
        match self.truncate_at {
            Some(at) => &self.payload[..at.min(self.payload.len())],
            None => &self.payload,
        }
    }
}

/// Fake capture daemon that answers `SCREEN` with a fixed frame.
/// - One frame per connection, then the connection is closed
/// - Any other command is dropped without a reply
pub struct StubDaemon {
    listener: TcpListener,
    local_addr: SocketAddr,
    frame: Arc<StubFrame>,
}

impl StubDaemon {
    pub async fn bind(addr: &str, frame: StubFrame) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            frame: Arc::new(frame),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn run(self) -> Result<()> {
        info!(
            addr = %self.local_addr,
            width = self.frame.header.width,
            height = self.frame.header.height,
            bpp = self.frame.header.bits_per_pixel,
            "Stub capture daemon listening"
        );

        loop {
            let (stream, peer) = self.listener.accept().await?;

            let frame = self.frame.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, frame).await {
                    warn!(peer = %peer, error = %e, "Stub connection failed");
                }
            });
        }
    }

    /// Serve on a background task until the handle is aborted.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}

async fn handle_connection(mut stream: TcpStream, frame: Arc<StubFrame>) -> Result<()> {
    let mut command = [0u8; 6];
    stream.read_exact(&mut command).await?;

    if &command[..] != SCREEN_COMMAND {
        debug!(command = %String::from_utf8_lossy(&command), "Ignoring unknown command");
        return Ok(());
    }

    stream.write_all(&frame.header.to_wire()).await?;
    stream.write_all(frame.wire_payload()).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}
