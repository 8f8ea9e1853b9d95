//! Rasterisation engine seam.
//!
//! The converter never talks to pdfium directly. It loads documents through
//! [`RasterEngine`] and renders pages through [`RasterDocument`], so the
//! engine can be swapped (or scripted in tests) without touching the batch,
//! progress and cancellation logic.
//!
//! Both traits are synchronous: engine calls are CPU-bound and the converter
//! runs them under `tokio::task::spawn_blocking`.

pub mod pdfium;

use crate::error::EngineError;
use image::DynamicImage;
use std::sync::Arc;

pub use self::pdfium::PdfiumEngine;

/// Parses PDF bytes into a renderable document.
pub trait RasterEngine: Send + Sync {
    /// Open a document. `bytes` stays alive for as long as the returned handle.
    fn load(
        &self,
        bytes: Arc<Vec<u8>>,
        password: Option<&str>,
    ) -> Result<Arc<dyn RasterDocument>, EngineError>;
}

/// A parsed document owned by whichever controller loaded it.
pub trait RasterDocument: Send + Sync {
    fn page_count(&self) -> usize;

    /// Render the 0-based page `index` at `scale` (1.0 = 72 DPI).
    ///
    /// The bitmap is sized to the page viewport: page size in points times
    /// `scale`, rounded to whole pixels.
    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, EngineError>;
}

/// Pixel size of a page of `width_pt` × `height_pt` points rendered at `scale`.
pub fn viewport_size(width_pt: f32, height_pt: f32, scale: f32) -> (u32, u32) {
    let w = (width_pt * scale).round().max(1.0) as u32;
    let h = (height_pt * scale).round().max(1.0) as u32;
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_viewports() {
        assert_eq!(viewport_size(612.0, 792.0, 1.0), (612, 792));
        assert_eq!(viewport_size(612.0, 792.0, 150.0 / 72.0), (1275, 1650));
        assert_eq!(viewport_size(612.0, 792.0, 300.0 / 72.0), (2550, 3300));
    }

    #[test]
    fn degenerate_page_still_one_pixel() {
        assert_eq!(viewport_size(0.1, 0.1, 1.0), (1, 1));
    }
}
