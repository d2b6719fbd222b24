//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image` crate (JPEG, PNG, WebP) |
//! | **Composite** | `resize_exact` (Lanczos3) + rounded-rect mask paste |
//! | **EXIF** | `kamadak-exif` reader + experimental writer, APP1 splice |
//! | **IPTC** | custom IIM/8BIM codec, APP13 splice |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for overlay geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining paths + backend
//! - **Containers**: [`jpeg`] segment splicing shared by [`exif_block`] and [`iptc`]

pub mod backend;
mod calculations;
pub mod exif_block;
pub mod iptc;
pub mod jpeg;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{inside_rounded_rect, overlay_dimensions};
pub use operations::{compose, convert_to_jpeg};
pub use params::{ComposeParams, ConvertParams, OverlayLayout, Quality};
pub use rust_backend::RustBackend;
