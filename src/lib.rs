//! # pdfpages
//!
//! Turn PDF pages into PNG images, reorder the pages of a PDF, and combine
//! PDFs and images into one PDF.
//!
//! ## What this crate does (and doesn't)
//!
//! Parsing and rasterisation are delegated to pdfium (through
//! `pdfium-render`); writing PDFs is delegated to `lopdf`. This crate owns
//! the workflow around them: upload validation, batched concurrent
//! rendering, cancellation of superseded runs, monotonic progress,
//! revocable previews, page permutations and file assembly.
//!
//! ## Workflows
//!
//! ```text
//! Converter      PDF ─▶ load ─▶ render (batches) ─▶ PNG ─▶ page-NN.png
//! PageReorderer  PDF ─▶ permute page order ─────────────▶ rearranged-pdf.pdf
//! Combiner       PDFs + images, any order ──────────────▶ combined-pdf.pdf
//! Session        sections · theme · shortcuts · reset
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfpages::{ConversionConfig, Converter, PdfiumEngine, Quality, UploadedFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().quality(Quality::High).build()?;
//!     let converter = Converter::new(Arc::new(PdfiumEngine::new()?), config);
//!
//!     let output = converter.convert_path("document.pdf").await?;
//!     eprintln!("{} pages, {} bytes", output.pages.len(), output.stats.total_bytes);
//!     converter.save_all("pages").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfpages` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfpages = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod combine;
pub mod compose;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod gallery;
pub mod order;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod reorder;
pub mod session;
pub mod state;
pub mod stream;
pub mod theme;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancellationToken;
pub use combine::{CombineItem, CombineKind, CombineReport, Combiner, COMBINED_FILENAME};
pub use compose::{ComposeError, ImageEncoding, PdfComposer, SourcePdf};
pub use config::{ConversionConfig, ConversionConfigBuilder, Quality, DEFAULT_MAX_FILE_SIZE};
pub use convert::Converter;
pub use engine::{PdfiumEngine, RasterDocument, RasterEngine};
pub use error::{EngineError, ErrorKind, PdfPagesError};
pub use gallery::{render_gallery, GALLERY_FILENAME};
pub use order::PageOrderList;
pub use output::{
    page_filename, ConversionOutput, ConversionStats, DocumentInfo, ExportedPdf, PageImageResult,
};
pub use pipeline::input::UploadedFile;
pub use preview::{PreviewHandle, PreviewRegistry};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reorder::{ExportState, PageReorderer, REARRANGED_FILENAME};
pub use session::{Section, Session, Shortcut, ShortcutAction, ShortcutOutcome};
pub use state::{ConverterPhase, PhaseEvent};
pub use stream::{convert_stream, PageStream, StreamedPage};
pub use theme::{Theme, ThemeStore};
