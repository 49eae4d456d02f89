use rand::RngCore;
use std::path::{Path, PathBuf};

use crate::screen::SCREENSHOT_EXTENSION;

/// Screenshot output directory
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh, randomly named path for the next screenshot.
    /// The directory itself is created when the file is written.
    pub fn next_path(&self) -> PathBuf {
        let mut name = generate_token();
        name.push('.');
        name.push_str(SCREENSHOT_EXTENSION);
        self.dir.join(name)
    }
}

/// 128 random bits folded down to 16 hex characters.
fn generate_token() -> String {
    let mut random_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    let (hi, lo) = random_bytes.split_at(8);
    let folded: Vec<u8> = hi.iter().zip(lo).map(|(a, b)| a ^ b).collect();
    hex::encode(folded)
}
