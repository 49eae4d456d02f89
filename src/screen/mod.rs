//! Turning raw daemon frames into upright PNG files.

pub mod assembler;
pub mod rotation;

pub use assembler::{encode, ImageAssembler, PixelLayout};
pub use rotation::{DisplayInfo, Orientation, Rotation, RotationSource, StaticDisplay};

/// File extension of written screenshots.
pub const SCREENSHOT_EXTENSION: &str = "png";
