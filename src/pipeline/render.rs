//! Document loading and page rasterisation.
//!
//! ## Why spawn_blocking?
//!
//! Engine calls are CPU-bound (pdfium parses and rasterises synchronously).
//! `tokio::task::spawn_blocking` moves that work onto the blocking pool so the
//! Tokio worker threads keep serving other tasks during long renders.

use crate::engine::{RasterDocument, RasterEngine};
use crate::error::{EngineError, PdfPagesError};
use crate::pipeline::encode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A page rendered and PNG-encoded.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 0-based page index.
    pub index: usize,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Load a document through `engine`, giving up after `timeout`.
///
/// A load that outlives the timeout keeps running on the blocking pool, but
/// its result is dropped.
pub async fn load_document(
    engine: Arc<dyn RasterEngine>,
    bytes: Arc<Vec<u8>>,
    name: &str,
    password: Option<String>,
    timeout: Duration,
) -> Result<Arc<dyn RasterDocument>, PdfPagesError> {
    let task =
        tokio::task::spawn_blocking(move || engine.load(bytes, password.as_deref()));

    let joined = tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| PdfPagesError::LoadTimeout {
            name: name.to_string(),
            secs: timeout.as_secs(),
        })?;

    let document = joined
        .map_err(|e| PdfPagesError::Internal(format!("Load task panicked: {}", e)))?
        .map_err(|e| map_engine_error(e, name))?;

    info!("Loaded '{}': {} pages", name, document.page_count());
    Ok(document)
}

/// Render page `index` at `scale` and PNG-encode it.
pub async fn render_page(
    document: Arc<dyn RasterDocument>,
    index: usize,
    scale: f32,
) -> Result<RenderedPage, PdfPagesError> {
    let total = document.page_count();
    if index >= total {
        return Err(PdfPagesError::PageOutOfRange {
            page: index + 1,
            total,
        });
    }

    tokio::task::spawn_blocking(move || render_page_blocking(document.as_ref(), index, scale))
        .await
        .map_err(|e| PdfPagesError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_page_blocking(
    document: &dyn RasterDocument,
    index: usize,
    scale: f32,
) -> Result<RenderedPage, PdfPagesError> {
    let image = document
        .render_page(index, scale)
        .map_err(|e| match e {
            EngineError::Render { detail, .. } => PdfPagesError::PageConversionFailed {
                page: index + 1,
                detail,
            },
            other => PdfPagesError::PageConversionFailed {
                page: index + 1,
                detail: other.to_string(),
            },
        })?;

    let png = encode::encode_png(&image).map_err(|e| PdfPagesError::PageConversionFailed {
        page: index + 1,
        detail: format!("PNG encoding failed: {}", e),
    })?;

    debug!("Page {} → {} bytes", index + 1, png.len());
    Ok(RenderedPage {
        index,
        width: image.width(),
        height: image.height(),
        png,
    })
}

/// Attach the file name to an engine failure.
pub fn map_engine_error(e: EngineError, name: &str) -> PdfPagesError {
    let name = name.to_string();
    match e {
        EngineError::PasswordRequired => PdfPagesError::PasswordRequired { name },
        EngineError::WrongPassword => PdfPagesError::WrongPassword { name },
        EngineError::Malformed(detail) => PdfPagesError::CorruptPdf { name, detail },
        EngineError::Unavailable(detail) => PdfPagesError::PdfiumBindingFailed(detail),
        EngineError::Render { index, detail } => PdfPagesError::PageConversionFailed {
            page: index + 1,
            detail,
        },
    }
}
