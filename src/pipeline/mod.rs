//! Pipeline stages for PDF-to-PNG conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the rasteriser can be swapped without touching the
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode
//! (upload)   (engine)   (PNG)
//! ```
//!
//! 1. [`input`]  — describe the upload, validate MIME type and size, read bytes
//! 2. [`render`] — load the document and rasterise pages; engine calls run in
//!    `spawn_blocking` because they are CPU-bound
//! 3. [`encode`] — PNG-encode each `DynamicImage`

pub mod encode;
pub mod input;
pub mod render;
