//! Result types produced by the controllers.

use crate::config::Quality;
use crate::convert::write_atomic;
use crate::error::PdfPagesError;
use crate::preview::PreviewHandle;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One converted page.
#[derive(Debug, Clone, Serialize)]
pub struct PageImageResult {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Encoded PNG; shared with the preview registry.
    #[serde(skip)]
    pub bytes: Arc<Vec<u8>>,
    pub preview: PreviewHandle,
    /// Suggested download name, see [`page_filename`].
    pub filename: String,
    pub byte_size: usize,
    pub width: u32,
    pub height: u32,
}

/// `page-01.png`, `page-02.png`, …; widens past two digits when needed.
pub fn page_filename(page_number: usize) -> String {
    format!("page-{:02}.png", page_number)
}

/// Basic facts about a loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub page_count: usize,
    pub file_size: u64,
}

/// Timing and size figures for one completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub dpi: u32,
    pub scale: f32,
    pub total_bytes: usize,
    pub load_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    pub(crate) fn new(total_pages: usize, quality: Quality) -> Self {
        Self {
            total_pages,
            dpi: quality.dpi(),
            scale: quality.scale(),
            ..Self::default()
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub document: DocumentInfo,
    /// In ascending page order.
    pub pages: Vec<PageImageResult>,
    pub stats: ConversionStats,
}

/// A PDF built by the reorderer or the combiner.
#[derive(Debug, Clone)]
pub struct ExportedPdf {
    /// Suggested download name.
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl ExportedPdf {
    /// Write into `dir` under [`ExportedPdf::filename`], atomically.
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, PdfPagesError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PdfPagesError::OutputWriteFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
        let path = dir.join(&self.filename);
        write_atomic(&path, &self.bytes).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exported_pdf_saves_under_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = ExportedPdf {
            filename: "combined-pdf.pdf".into(),
            bytes: b"%PDF-1.7".to_vec(),
            page_count: 1,
        };
        let path = pdf.save(dir.path().join("nested")).await.unwrap();
        assert!(path.ends_with("nested/combined-pdf.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn filenames_are_zero_padded() {
        assert_eq!(page_filename(1), "page-01.png");
        assert_eq!(page_filename(10), "page-10.png");
        assert_eq!(page_filename(123), "page-123.png");
    }

    #[test]
    fn stats_carry_quality() {
        let s = ConversionStats::new(4, Quality::High);
        assert_eq!(s.dpi, 300);
        assert_eq!(s.total_pages, 4);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["dpi"], 300);
    }

    #[test]
    fn page_result_json_shows_preview_url_without_bytes() {
        let registry = crate::preview::PreviewRegistry::new();
        let bytes = Arc::new(vec![0u8; 16]);
        let page = PageImageResult {
            page_number: 2,
            preview: registry.create(bytes.clone()),
            bytes,
            filename: page_filename(2),
            byte_size: 16,
            width: 10,
            height: 20,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["filename"], "page-02.png");
        assert!(json["preview"]["url"]
            .as_str()
            .unwrap()
            .starts_with("blob:pdfpages/"));
        assert!(json.get("bytes").is_none());
    }
}
