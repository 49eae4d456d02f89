//! Capture-protocol client.
//!
//! One capture = one TCP connection: connect, send `SCREEN`, read the
//! NUL-terminated header, then read exactly the declared number of pixel bytes.

pub mod probe;

use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::config::Config;
use crate::error::{CaptureError, ProtocolError};
use crate::protocol::{
    FrameHeader, RawFrame, HEADER_TERMINATOR, MAX_HEADER_LEN, SCREEN_COMMAND,
};

pub use probe::probe;

/// Client for the native capture daemon.
#[derive(Debug, Clone)]
pub struct CaptureClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl CaptureClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let defaults = Config::default();
        Self {
            host: host.into(),
            port,
            connect_timeout: defaults.connect_timeout(),
            io_timeout: defaults.io_timeout(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Fetch one frame from the daemon.
    ///
    /// Never returns a partial or placeholder frame: anything short of a
    /// complete payload is an error.
    pub async fn capture(&self) -> Result<RawFrame, CaptureError> {
        let addr = self.addr();
        let mut stream = match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(CaptureError::Connect { addr, source }),
            Err(_) => {
                return Err(CaptureError::ConnectTimeout {
                    addr,
                    timeout: self.connect_timeout,
                })
            }
        };
        debug!(addr = %addr, "Connected to capture daemon");

        let frame = timeout(self.io_timeout, exchange(&mut stream))
            .await
            .map_err(|_| CaptureError::Timeout(self.io_timeout))??;

        debug!(
            width = frame.width,
            height = frame.height,
            bpp = frame.bits_per_pixel,
            bytes = frame.pixels.len(),
            "Received frame"
        );
        Ok(frame)
    }
}

/// Capture a single frame from `host:port`, giving up on the connect after
/// `connect_timeout`.
pub async fn capture(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<RawFrame, CaptureError> {
    CaptureClient::new(host, port)
        .with_connect_timeout(connect_timeout)
        .capture()
        .await
}

async fn exchange(stream: &mut TcpStream) -> Result<RawFrame, CaptureError> {
    stream.write_all(SCREEN_COMMAND).await?;
    stream.flush().await?;

    let mut reader = BufReader::new(stream);
    read_frame(&mut reader).await
}

/// Read a header and its payload from an already-commanded stream.
///
/// Consumes exactly the header, its terminator and the payload; nothing
/// after the payload is touched.
pub async fn read_frame<R>(reader: &mut R) -> Result<RawFrame, CaptureError>
where
    R: AsyncBufRead + Unpin,
{
    let text = read_header(reader).await?;
    let header = FrameHeader::parse(&text)?;
    let len = header.payload_len()?;
    let pixels = read_payload(reader, len).await?;
    Ok(RawFrame::new(header, pixels))
}

async fn read_header<R>(reader: &mut R) -> Result<String, CaptureError>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::with_capacity(16);
    (&mut *reader)
        .take(MAX_HEADER_LEN as u64 + 1)
        .read_until(HEADER_TERMINATOR, &mut raw)
        .await?;

    match raw.last() {
        Some(&HEADER_TERMINATOR) => {
            raw.pop();
        }
        _ if raw.len() > MAX_HEADER_LEN => {
            return Err(ProtocolError::HeaderTooLong(MAX_HEADER_LEN).into());
        }
        _ => return Err(ProtocolError::UnterminatedHeader.into()),
    }

    Ok(String::from_utf8_lossy(&raw).into_owned())
}

async fn read_payload<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, CaptureError>
where
    R: AsyncBufRead + Unpin,
{
    let mut pixels = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut pixels[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::TruncatedPayload {
                expected: len,
                received: filled,
            }
            .into());
        }
        filled += n;
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{StubDaemon, StubFrame};

    fn protocol_error(err: CaptureError) -> ProtocolError {
        match err {
            CaptureError::Protocol(e) => e,
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reads_exact_payload() {
        let mut data: &[u8] = b"2 1 32\0\xFF\x00\x00\xFF\x00\xFF\x00\xFFnext";
        let frame = read_frame(&mut data).await.unwrap();

        assert_eq!(frame.width, 2);
        assert_eq!(frame.height, 1);
        assert_eq!(frame.bits_per_pixel, 32);
        assert_eq!(frame.pixels, vec![0xFF, 0, 0, 0xFF, 0, 0xFF, 0, 0xFF]);
        // Bytes after the payload are left on the stream.
        assert_eq!(data, b"next");
    }

    #[tokio::test]
    async fn test_various_headers_read_declared_length() {
        for (w, h, bpp) in [(1u32, 1u32, 16u32), (3, 5, 32), (7, 2, 16), (4, 4, 24)] {
            let header = FrameHeader {
                width: w,
                height: h,
                bits_per_pixel: bpp,
            };
            let len = (w * h * bpp / 8) as usize;
            let mut wire = header.to_wire();
            wire.extend(std::iter::repeat(0xAB).take(len + 3));

            let mut data: &[u8] = &wire;
            let frame = read_frame(&mut data).await.unwrap();
            assert_eq!(frame.pixels.len(), len);
            assert_eq!(data.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let mut data: &[u8] = b"2 2 32\0\x01\x02\x03";
        let err = protocol_error(read_frame(&mut data).await.unwrap_err());
        assert_eq!(
            err,
            ProtocolError::TruncatedPayload {
                expected: 16,
                received: 3
            }
        );
    }

    #[tokio::test]
    async fn test_header_without_terminator() {
        let mut data: &[u8] = b"2 1 32";
        let err = protocol_error(read_frame(&mut data).await.unwrap_err());
        assert_eq!(err, ProtocolError::UnterminatedHeader);

        let mut empty: &[u8] = b"";
        let err = protocol_error(read_frame(&mut empty).await.unwrap_err());
        assert_eq!(err, ProtocolError::UnterminatedHeader);
    }

    #[tokio::test]
    async fn test_stops_at_first_nul() {
        // First NUL ends the header even though more header-like text follows.
        let mut data: &[u8] = b"1 1\0 16\0\x00\x00";
        let err = protocol_error(read_frame(&mut data).await.unwrap_err());
        assert_eq!(err, ProtocolError::MalformedHeader("1 1".into()));

        let mut leading: &[u8] = b"\x002 1 32\0";
        let err = protocol_error(read_frame(&mut leading).await.unwrap_err());
        assert_eq!(err, ProtocolError::MalformedHeader(String::new()));
    }

    #[tokio::test]
    async fn test_runaway_header() {
        let wire = vec![b'9'; MAX_HEADER_LEN * 2];
        let mut data: &[u8] = &wire;
        let err = protocol_error(read_frame(&mut data).await.unwrap_err());
        assert_eq!(err, ProtocolError::HeaderTooLong(MAX_HEADER_LEN));
    }

    #[tokio::test]
    async fn test_header_at_length_limit() {
        // Padded with an ignored fourth field to exactly the limit.
        let mut text = b"1 1 32 ".to_vec();
        text.resize(MAX_HEADER_LEN, b'x');

        let mut wire = text.clone();
        wire.push(0);
        wire.extend_from_slice(&[1, 2, 3, 4]);
        let mut data: &[u8] = &wire;
        let frame = read_frame(&mut data).await.unwrap();
        assert_eq!(frame.pixels, vec![1, 2, 3, 4]);
        assert!(data.is_empty());

        // One byte more and the terminator is out of reach.
        let mut wire = text;
        wire.push(b'x');
        wire.push(0);
        let mut data: &[u8] = &wire;
        let err = protocol_error(read_frame(&mut data).await.unwrap_err());
        assert_eq!(err, ProtocolError::HeaderTooLong(MAX_HEADER_LEN));
    }

    #[tokio::test]
    async fn test_capture_from_stub() {
        let frame = StubFrame::test_pattern(4, 3, 32);
        let daemon = StubDaemon::bind("127.0.0.1:0", frame.clone()).await.unwrap();
        let addr = daemon.local_addr();
        let _server = daemon.spawn();

        let captured = capture(&addr.ip().to_string(), addr.port(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(captured.width, 4);
        assert_eq!(captured.height, 3);
        assert_eq!(captured.bits_per_pixel, 32);
        assert_eq!(captured.pixels, frame.payload);
    }

    #[tokio::test]
    async fn test_capture_truncated_by_stub() {
        let frame = StubFrame::test_pattern(4, 4, 32).truncated(10);
        let daemon = StubDaemon::bind("127.0.0.1:0", frame).await.unwrap();
        let addr = daemon.local_addr();
        let _server = daemon.spawn();

        let client = CaptureClient::new(addr.ip().to_string(), addr.port());
        let err = protocol_error(client.capture().await.unwrap_err());
        assert_eq!(
            err,
            ProtocolError::TruncatedPayload {
                expected: 64,
                received: 10
            }
        );
    }

    #[tokio::test]
    async fn test_capture_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = capture("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Connect { .. } | CaptureError::ConnectTimeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_silent_daemon_times_out() {
        // Accepts but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = CaptureClient::new(addr.ip().to_string(), addr.port())
            .with_io_timeout(Duration::from_millis(100));
        let err = client.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Timeout(_)));
    }
}
