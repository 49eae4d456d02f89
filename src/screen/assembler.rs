//! Raw frame → PNG on disk.
//!
//! Builds a bitmap from the daemon's pixel bytes, counter-rotates it by the
//! display rotation and writes it with the PNG encoder at its best compression.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, GenericImageView, ImageError, RgbImage, RgbaImage};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::rotation::Rotation;
use crate::config::DepthPolicy;
use crate::error::EncodeError;
use crate::protocol::RawFrame;

/// Memory layout of the daemon's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 16-bit little-endian words, 5 bits red, 6 green, 5 blue.
    Rgb565,
    /// Four 8-bit channels in R, G, B, A byte order.
    Argb8888,
}

impl PixelLayout {
    /// Pick the layout for a declared depth. Under [`DepthPolicy::Lenient`]
    /// any unknown depth is read as 32-bit.
    pub fn for_depth(bits_per_pixel: u32, policy: DepthPolicy) -> Result<Self, EncodeError> {
        match (bits_per_pixel, policy) {
            (16, _) => Ok(PixelLayout::Rgb565),
            (32, _) => Ok(PixelLayout::Argb8888),
            (other, DepthPolicy::Lenient) => {
                warn!(bpp = other, "Unsupported bit depth, falling back to 32-bit layout");
                Ok(PixelLayout::Argb8888)
            }
            (other, DepthPolicy::Strict) => Err(EncodeError::UnsupportedDepth(other)),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb565 => 2,
            PixelLayout::Argb8888 => 4,
        }
    }
}

/// Builds upright PNGs from raw frames under a fixed depth policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAssembler {
    policy: DepthPolicy,
}

impl ImageAssembler {
    pub fn new(policy: DepthPolicy) -> Self {
        Self { policy }
    }

    /// Validate, materialize and rotate a frame into an in-memory bitmap.
    pub fn assemble(&self, frame: RawFrame, rotation: Rotation) -> Result<DynamicImage, EncodeError> {
        frame.validate()?;

        let layout = PixelLayout::for_depth(frame.bits_per_pixel, self.policy)?;
        let bitmap = materialize(frame, layout)?;
        Ok(counter_rotate(bitmap, rotation))
    }

    /// Assemble the frame and write it to `out_path` as PNG.
    pub fn encode(
        &self,
        frame: RawFrame,
        rotation: Rotation,
        out_path: &Path,
    ) -> Result<PathBuf, EncodeError> {
        let image = self.assemble(frame, rotation)?;
        write_png(&image, out_path)?;
        let (width, height) = image.dimensions();
        debug!(path = %out_path.display(), width, height, "Wrote screenshot");
        Ok(out_path.to_path_buf())
    }
}

/// Encode with the lenient depth policy.
pub fn encode(frame: RawFrame, rotation: Rotation, out_path: &Path) -> Result<PathBuf, EncodeError> {
    ImageAssembler::default().encode(frame, rotation, out_path)
}

fn materialize(frame: RawFrame, layout: PixelLayout) -> Result<DynamicImage, EncodeError> {
    let RawFrame {
        width,
        height,
        mut pixels,
        ..
    } = frame;
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(layout.bytes_per_pixel()))
        .unwrap_or(usize::MAX);
    if pixels.len() < expected {
        return Err(EncodeError::LayoutMismatch {
            expected,
            actual: pixels.len(),
        });
    }
    pixels.truncate(expected);

    let mismatch = |actual| EncodeError::LayoutMismatch { expected, actual };
    match layout {
        PixelLayout::Argb8888 => {
            let image = RgbaImage::from_raw(width, height, pixels).ok_or(mismatch(expected))?;
            Ok(DynamicImage::ImageRgba8(image))
        }
        PixelLayout::Rgb565 => {
            let rgb = rgb565_to_rgb(&pixels);
            let image = RgbImage::from_raw(width, height, rgb).ok_or(mismatch(expected))?;
            Ok(DynamicImage::ImageRgb8(image))
        }
    }
}

/// Expand 5-6-5 words to 8 bits per channel by bit replication.
fn rgb565_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
    for word in data.chunks_exact(2) {
        let v = u16::from_le_bytes([word[0], word[1]]);
        let r = ((v >> 11) & 0x1F) as u8;
        let g = ((v >> 5) & 0x3F) as u8;
        let b = (v & 0x1F) as u8;
        rgb.push((r << 3) | (r >> 2));
        rgb.push((g << 2) | (g >> 4));
        rgb.push((b << 3) | (b >> 2));
    }
    rgb
}

/// Undo the display rotation by turning the bitmap the other way.
fn counter_rotate(image: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Deg0 => image,
        Rotation::Deg90 => image.rotate270(),
        Rotation::Deg180 => image.rotate180(),
        Rotation::Deg270 => image.rotate90(),
    }
}

fn write_png(image: &DynamicImage, path: &Path) -> Result<(), EncodeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| EncodeError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file = File::create(path).map_err(|source| EncodeError::CreateFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let encoder =
        PngEncoder::new_with_quality(&mut writer, CompressionType::Best, FilterType::Adaptive);
    image.write_with_encoder(encoder).map_err(|e| match e {
        ImageError::IoError(source) => EncodeError::Write {
            path: path.to_path_buf(),
            source,
        },
        other => EncodeError::Encode(other),
    })?;

    writer.flush().map_err(|source| EncodeError::Write {
        path: path.to_path_buf(),
        source,
    })
}
