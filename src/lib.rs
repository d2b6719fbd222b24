//! # Recap
//!
//! Batch processor for exported dual-camera posts. Each post is a pair of
//! shots (a primary and a secondary) plus a capture time, an optional
//! caption and an optional location. Recap turns an export folder into:
//!
//! - one JPEG per shot, WEBP sources re-encoded, stamped with the post's
//!   capture metadata;
//! - one picture-in-picture composite per post, the secondary shot scaled
//!   down with rounded corners and pasted over the primary.
//!
//! # Architecture
//!
//! ```text
//! recap.toml ─┐
//! posts.json ─┼─→ pipeline ─→ __processed/*.jpg
//! post/*.webp ┘      │    └─→ __combined/{YYYYMMDD_HHMMSS}_combined.jpg
//!                    └──→ PipelineEvent channel ─→ output (log lines)
//! ```
//!
//! The pipeline is sequential. Each post runs inside its own error boundary;
//! only an unusable manifest stops a run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Drives a run: per-post boundary, events, backup purge, dry-run check |
//! | [`manifest`] | `posts.json` loading, per-entry deserialization, `takenAt` parsing |
//! | [`imaging`] | Pure-Rust image operations: JPEG conversion, compositing, JPEG segment splicing |
//! | [`metadata`] | EXIF (timestamp, GPS) and IPTC (caption) container writers |
//! | [`files`] | Unique paths, backup purge, metadata-preserving copy and move |
//! | [`config`] | `recap.toml` loading, validation and merging |
//! | [`output`] | Log-line and check-report formatting |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resizing and encoding use the `image` crate; EXIF goes through
//! `kamadak-exif`. IPTC has no maintained pure-Rust writer, so the small IIM
//! subset needed here is encoded by hand in [`imaging::iptc`]. There are no
//! system dependencies.
//!
//! ## Independent Metadata Containers
//!
//! EXIF and IPTC are separate writers behind
//! [`metadata::ContainerWriter`]. Both are always attempted; a broken EXIF
//! block in a source file never costs the caption.
//!
//! ## No Overwrites
//!
//! Outputs never replace existing files: [`files::unique_path`] appends
//! `_1`, `_2`, … to the stem. Running twice over the same export produces a
//! second set of files rather than clobbering the first.

pub mod config;
pub mod files;
pub mod imaging;
pub mod manifest;
pub mod metadata;
pub mod output;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;
