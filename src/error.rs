use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures while talking to the capture daemon.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("could not connect to capture daemon at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to capture daemon at {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("capture daemon did not answer within {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error talking to capture daemon: {0}")]
    Io(#[from] io::Error),
}

/// The daemon's response did not match the wire format.
///
/// The daemon has no error reply, so a capture that failed on its side also
/// lands here as a short or garbled frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("stream closed before header terminator")]
    UnterminatedHeader,

    #[error("header exceeds {0} bytes without terminator")]
    HeaderTooLong(usize),

    #[error("malformed header {0:?}")]
    MalformedHeader(String),

    #[error("invalid {field} in header: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("declared frame of {0} bytes exceeds limit")]
    FrameTooLarge(u64),

    #[error("truncated payload: expected {expected} bytes, received {received}")]
    TruncatedPayload { expected: usize, received: usize },
}

/// Why a frame failed the validity check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidFrame {
    #[error("pixel buffer is empty")]
    EmptyPixels,

    #[error("zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },

    #[error("pixel buffer holds {actual} bytes, header implies {expected}")]
    LengthMismatch { expected: u64, actual: usize },
}

/// Failures turning a frame into a PNG on disk.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] InvalidFrame),

    #[error("unsupported bit depth {0} (strict depth policy)")]
    UnsupportedDepth(u32),

    #[error("pixel layout needs {expected} bytes, frame has {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create {}: {source}", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Anything that can stop a screenshot from reaching disk.
#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("background task failed: {0}")]
    Task(String),
}
