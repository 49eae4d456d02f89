//! Screenshots from a native capture daemon over loopback TCP.
//!
//! [`client`] speaks the daemon's wire protocol and hands back a
//! [`protocol::RawFrame`]; [`screen`] turns that frame into an upright PNG;
//! [`service`] runs both off the caller's thread.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod screen;
pub mod service;
pub mod storage;
pub mod stub;

pub use client::{capture, probe, CaptureClient};
pub use config::{Config, DepthPolicy};
pub use error::{CaptureError, EncodeError, InvalidFrame, ProtocolError, ScreenshotError};
pub use protocol::RawFrame;
pub use screen::{encode, ImageAssembler, Rotation, RotationSource};
pub use service::{CaptureReport, Pending, ScreenshotService};
