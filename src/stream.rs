//! Streaming conversion API: emit pages as they complete.
//!
//! ## Why stream?
//!
//! Large documents at print quality take a while. A stream lets callers
//! write pages to disk as they finish instead of holding the whole document
//! in memory, which the [`crate::Converter`] does for its results gallery.
//!
//! [`convert_stream`] keeps up to `batch_size` pages in flight and yields
//! them in page order. It is stateless: there are no preview handles and no
//! supersede semantics. Dropping the stream stops further rendering.

use crate::config::ConversionConfig;
use crate::engine::RasterEngine;
use crate::error::PdfPagesError;
use crate::output::page_filename;
use crate::pipeline::input::{self, UploadedFile};
use crate::pipeline::render;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::info;

/// One page produced by [`convert_stream`].
#[derive(Debug, Clone)]
pub struct StreamedPage {
    /// 1-indexed.
    pub page_number: usize,
    pub total_pages: usize,
    pub filename: String,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<StreamedPage, PdfPagesError>> + Send>>;

/// Load `file` and stream its pages as PNGs, in page order.
///
/// # Returns
/// - `Ok(PageStream)` once the document has loaded
/// - `Err(PdfPagesError)` for validation and load failures
///
/// The stream ends after the first page error.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use pdfpages::{convert_stream, ConversionConfig, PdfiumEngine, UploadedFile};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Arc::new(PdfiumEngine::new()?);
/// let file = UploadedFile::from_path("book.pdf")?;
/// let mut pages = convert_stream(engine, &file, &ConversionConfig::default()).await?;
/// while let Some(page) = pages.next().await {
///     let page = page?;
///     std::fs::write(&page.filename, &page.png)?;
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    engine: Arc<dyn RasterEngine>,
    file: &UploadedFile,
    config: &ConversionConfig,
) -> Result<PageStream, PdfPagesError> {
    input::validate_pdf_upload(file, config.max_file_size)?;
    info!("Starting streaming conversion: {}", file.name);

    let bytes = file.read().await?;
    input::check_pdf_magic(&file.name, &bytes)?;
    let document = render::load_document(
        engine,
        bytes,
        &file.name,
        config.password.clone(),
        Duration::from_secs(config.load_timeout_secs),
    )
    .await?;

    let total = document.page_count();
    let scale = config.quality.scale();
    let callback = config.progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_conversion_start(total);
    }

    let pages = stream::iter(0..total)
        .map(move |index| {
            let document = Arc::clone(&document);
            async move { render::render_page(document, index, scale).await }
        })
        .buffered(config.batch_size.max(1))
        .map(move |result| -> Result<StreamedPage, PdfPagesError> {
            let page = result?;
            let page_number = page.index + 1;
            if let Some(ref cb) = callback {
                cb.on_page_complete(page_number, total, page.png.len());
            }
            Ok(StreamedPage {
                page_number,
                total_pages: total,
                filename: page_filename(page_number),
                png: page.png,
                width: page.width,
                height: page.height,
            })
        })
        .scan(false, |failed, item: Result<StreamedPage, PdfPagesError>| {
            if *failed {
                return futures::future::ready(None);
            }
            *failed = item.is_err();
            futures::future::ready(Some(item))
        });

    Ok(Box::pin(pages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RasterDocument;
    use crate::error::EngineError;
    use image::{DynamicImage, RgbaImage};

    struct Doc(usize, Option<usize>);

    impl RasterDocument for Doc {
        fn page_count(&self) -> usize {
            self.0
        }

        fn render_page(&self, index: usize, _scale: f32) -> Result<DynamicImage, EngineError> {
            if Some(index) == self.1 {
                return Err(EngineError::Render {
                    index,
                    detail: "boom".into(),
                });
            }
            // Later pages finish first.
            std::thread::sleep(Duration::from_millis(((self.0 - index) * 5) as u64));
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(4, 4)))
        }
    }

    struct Engine(usize, Option<usize>);

    impl RasterEngine for Engine {
        fn load(
            &self,
            _bytes: Arc<Vec<u8>>,
            _password: Option<&str>,
        ) -> Result<Arc<dyn RasterDocument>, EngineError> {
            Ok(Arc::new(Doc(self.0, self.1)))
        }
    }

    fn pdf() -> UploadedFile {
        UploadedFile::from_bytes("s.pdf", "application/pdf", b"%PDF-1.4".to_vec())
    }

    #[tokio::test]
    async fn yields_in_page_order() {
        let s = convert_stream(Arc::new(Engine(7, None)), &pdf(), &ConversionConfig::default())
            .await
            .unwrap();
        let pages: Vec<_> = s.collect().await;
        let numbers: Vec<_> = pages.iter().map(|p| p.as_ref().unwrap().page_number).collect();
        assert_eq!(numbers, (1..=7).collect::<Vec<_>>());
        assert_eq!(pages[6].as_ref().unwrap().filename, "page-07.png");
    }

    #[tokio::test]
    async fn stops_after_first_error() {
        let s = convert_stream(Arc::new(Engine(5, Some(2))), &pdf(), &ConversionConfig::default())
            .await
            .unwrap();
        let pages: Vec<_> = s.collect().await;
        assert_eq!(pages.len(), 3);
        assert!(matches!(
            pages[2],
            Err(PdfPagesError::PageConversionFailed { page: 3, .. })
        ));
    }
}
