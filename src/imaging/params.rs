//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! [`operations`](super::operations) (which decides paths and sizes) and the
//! [`backend`](super::backend) (which does the pixel work), so a mock backend
//! can stand in during tests.

use std::path::PathBuf;

/// JPEG encoding quality (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Where and how the secondary shot is laid over the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayout {
    /// Overlay size as a fraction `[numerator, denominator]` of the primary.
    pub scale: [u32; 2],
    /// Top-left corner of the overlay on the primary, in pixels.
    pub offset: (u32, u32),
    pub corner_radius: u32,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            scale: [1, 3],
            offset: (50, 50),
            corner_radius: 30,
        }
    }
}

/// Re-encode one image as JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub quality: Quality,
}

/// Picture-in-picture composite of a post's two shots.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeParams {
    pub primary: PathBuf,
    pub secondary: PathBuf,
    pub output: PathBuf,
    pub layout: OverlayLayout,
    pub quality: Quality,
}
