//! Wire format spoken by the native capture daemon.
//!
//! The client sends the bare ASCII command `SCREEN`. The daemon answers with
//! a header `"<width> <height> <bpp>\0"` followed by exactly
//! `width * height * bpp / 8` raw pixel bytes. There is no further framing and
//! no error reply.

use crate::error::{InvalidFrame, ProtocolError};

/// Command that asks the daemon for one frame. Sent with no terminator.
pub const SCREEN_COMMAND: &[u8] = b"SCREEN";
/// Terminates the ASCII header.
pub const HEADER_TERMINATOR: u8 = 0;
/// Upper bound on header bytes before the terminator.
pub const MAX_HEADER_LEN: usize = 64;
/// Largest payload the client will allocate for.
pub const MAX_FRAME_BYTES: u64 = 256 * 1024 * 1024;

/// Default daemon address (loopback only).
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 42380;

/// Parsed response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
}

impl FrameHeader {
    /// Parse the header text (terminator already stripped).
    ///
    /// Fields are separated by single spaces; anything past the third field
    /// is ignored.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let fields: Vec<&str> = text.split(' ').collect();
        if fields.len() < 3 {
            return Err(ProtocolError::MalformedHeader(text.to_string()));
        }

        let width = parse_field("width", fields[0])?;
        let height = parse_field("height", fields[1])?;
        let bits_per_pixel = parse_field("bpp", fields[2])?;

        if width == 0 {
            return Err(ProtocolError::InvalidField {
                field: "width",
                value: fields[0].to_string(),
            });
        }
        if height == 0 {
            return Err(ProtocolError::InvalidField {
                field: "height",
                value: fields[1].to_string(),
            });
        }

        Ok(Self {
            width,
            height,
            bits_per_pixel,
        })
    }

    /// Number of payload bytes that follow the header.
    ///
    /// Uses the declared bpp verbatim with integer division.
    pub fn payload_len(&self) -> Result<usize, ProtocolError> {
        let bits = (self.width as u64)
            .checked_mul(self.height as u64)
            .and_then(|px| px.checked_mul(self.bits_per_pixel as u64))
            .ok_or(ProtocolError::FrameTooLarge(u64::MAX))?;
        let bytes = bits / 8;
        if bytes > MAX_FRAME_BYTES {
            return Err(ProtocolError::FrameTooLarge(bytes));
        }
        usize::try_from(bytes).map_err(|_| ProtocolError::FrameTooLarge(bytes))
    }

    /// Header bytes as the daemon writes them, terminator included.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}", self.width, self.height, self.bits_per_pixel).into_bytes();
        out.push(HEADER_TERMINATOR);
        out
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<u32, ProtocolError> {
    value.parse::<u32>().map_err(|_| ProtocolError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// One captured frame as returned by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub pixels: Vec<u8>,
}

impl RawFrame {
    pub fn new(header: FrameHeader, pixels: Vec<u8>) -> Self {
        Self {
            width: header.width,
            height: header.height,
            bits_per_pixel: header.bits_per_pixel,
            pixels,
        }
    }

    /// Byte count implied by the dimensions and declared depth, or `None`
    /// if it does not fit in a `u64`.
    pub fn expected_len(&self) -> Option<u64> {
        (self.width as u64)
            .checked_mul(self.height as u64)?
            .checked_mul(self.bits_per_pixel as u64)
            .map(|bits| bits / 8)
    }

    /// Check the frame before it goes anywhere near the encoder.
    pub fn validate(&self) -> Result<(), InvalidFrame> {
        if self.pixels.is_empty() {
            return Err(InvalidFrame::EmptyPixels);
        }
        if self.width == 0 || self.height == 0 {
            return Err(InvalidFrame::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        match self.expected_len() {
            Some(expected) if expected == self.pixels.len() as u64 => {}
            expected => {
                return Err(InvalidFrame::LengthMismatch {
                    expected: expected.unwrap_or(u64::MAX),
                    actual: self.pixels.len(),
                });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
