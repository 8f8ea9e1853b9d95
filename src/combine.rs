//! The combiner: merge PDFs and images into one PDF.
//!
//! Items are kept in the order they will appear in the output. A PDF item
//! contributes all of its pages in their own order; a PNG or JPEG item
//! becomes one page sized to the image. Other image encodings are skipped
//! and listed in the [`CombineReport`]. Any other failure aborts the export
//! without producing a file.

use crate::compose::{ImageEncoding, PdfComposer, SourcePdf};
use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::error::PdfPagesError;
use crate::order::move_item;
use crate::output::ExportedPdf;
use crate::pipeline::input::{self, UploadedFile};
use crate::reorder::ExportState;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the exported file.
pub const COMBINED_FILENAME: &str = "combined-pdf.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineKind {
    Pdf,
    Image,
}

/// One entry in the combine list.
#[derive(Debug, Clone)]
pub struct CombineItem {
    /// Stable identity, independent of position.
    pub id: Uuid,
    pub kind: CombineKind,
    pub file: UploadedFile,
}

impl CombineItem {
    pub fn name(&self) -> &str {
        &self.file.name
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone)]
pub struct CombineReport {
    pub pdf: ExportedPdf,
    /// Names of image files that were left out.
    pub skipped: Vec<String>,
}

struct Inner {
    items: Vec<CombineItem>,
    export_state: ExportState,
}

/// Builds one PDF out of several PDFs and images.
#[derive(Clone)]
pub struct Combiner {
    max_file_size: u64,
    inner: Arc<Mutex<Inner>>,
}

impl Default for Combiner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Combiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Combiner")
            .field("items", &inner.items.len())
            .field("export_state", &inner.export_state)
            .finish()
    }
}

impl Combiner {
    pub fn new() -> Self {
        Self::with_max_file_size(DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_max_file_size(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            inner: Arc::new(Mutex::new(Inner {
                items: Vec::new(),
                export_state: ExportState::Ready,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a file. Anything that is neither a PDF nor an image is refused.
    pub fn add_file(&self, file: UploadedFile) -> Result<Uuid, PdfPagesError> {
        let kind = if file.is_pdf() {
            CombineKind::Pdf
        } else if file.is_image() {
            CombineKind::Image
        } else {
            return Err(PdfPagesError::UnsupportedFile {
                name: file.name,
                mime_type: file.mime_type,
            });
        };
        input::validate_size(&file, self.max_file_size)?;

        let id = Uuid::new_v4();
        debug!("Added '{}' as {:?}", file.name, kind);
        self.lock().items.push(CombineItem { id, kind, file });
        Ok(id)
    }

    /// Remove the item at `index`, returning it.
    pub fn remove(&self, index: usize) -> Option<CombineItem> {
        let mut inner = self.lock();
        (index < inner.items.len()).then(|| inner.items.remove(index))
    }

    /// Move the item at `from` to `to`. Returns `false` if out of range.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        move_item(&mut self.lock().items, from, to)
    }

    pub fn items(&self) -> Vec<CombineItem> {
        self.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn clear(&self) {
        self.lock().items.clear();
    }

    pub fn export_state(&self) -> ExportState {
        self.lock().export_state
    }

    /// Build `combined-pdf.pdf` from the items in list order.
    pub async fn export(&self) -> Result<CombineReport, PdfPagesError> {
        let (slot, items) = {
            let mut inner = self.lock();
            if inner.export_state == ExportState::Exporting {
                return Err(export_err("an export is already running".into()));
            }
            if inner.items.is_empty() {
                return Err(export_err("no files to combine".into()));
            }
            let items = inner.items.clone();
            (ExportSlot::claim(&self.inner, &mut inner), items)
        };

        let result = assemble(items).await;
        drop(slot);

        match &result {
            Ok(report) => info!(
                "Exported {} ({} pages, {} skipped)",
                COMBINED_FILENAME,
                report.pdf.page_count,
                report.skipped.len()
            ),
            Err(e) => warn!("Combine export failed: {}", e),
        }
        result
    }
}

/// Holds the export affordance at `Exporting`; dropping it, whether the
/// export finished or its future was dropped, returns it to `Ready`.
struct ExportSlot(Arc<Mutex<Inner>>);

impl ExportSlot {
    fn claim(inner: &Arc<Mutex<Inner>>, locked: &mut Inner) -> Self {
        locked.export_state = ExportState::Exporting;
        Self(Arc::clone(inner))
    }
}

impl Drop for ExportSlot {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).export_state = ExportState::Ready;
    }
}

fn export_err(detail: String) -> PdfPagesError {
    PdfPagesError::ExportFailed {
        filename: COMBINED_FILENAME.to_string(),
        detail,
    }
}

enum Part {
    Pdf { name: String, bytes: Arc<Vec<u8>> },
    Image {
        name: String,
        bytes: Arc<Vec<u8>>,
        encoding: ImageEncoding,
    },
}

async fn assemble(items: Vec<CombineItem>) -> Result<CombineReport, PdfPagesError> {
    let mut parts = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();

    for item in items {
        let name = item.file.name.clone();
        match item.kind {
            CombineKind::Pdf => {
                let bytes = item.file.read().await.map_err(|e| export_err(e.to_string()))?;
                parts.push(Part::Pdf { name, bytes });
            }
            CombineKind::Image => match ImageEncoding::from_mime(&item.file.mime_type) {
                Some(encoding) => {
                    let bytes = item.file.read().await.map_err(|e| export_err(e.to_string()))?;
                    parts.push(Part::Image {
                        name,
                        bytes,
                        encoding,
                    });
                }
                None => {
                    warn!("Skipping '{}': {} cannot be embedded", name, item.file.mime_type);
                    skipped.push(name);
                }
            },
        }
    }

    let bytes = tokio::task::spawn_blocking(move || {
        let mut composer = PdfComposer::new();
        for part in &parts {
            match part {
                Part::Pdf { name, bytes } => {
                    let source = SourcePdf::load(name, bytes)?;
                    composer.append_all(&source)?;
                }
                Part::Image {
                    name,
                    bytes,
                    encoding,
                } => {
                    composer.add_image_page(name, bytes, *encoding)?;
                }
            }
        }
        let page_count = composer.page_count();
        composer.finish().map(|bytes| (bytes, page_count))
    })
    .await
    .map_err(|e| export_err(format!("export task panicked: {}", e)))?
    .map_err(|e| export_err(e.to_string()))?;

    let (bytes, page_count) = bytes;
    Ok(CombineReport {
        pdf: ExportedPdf {
            filename: COMBINED_FILENAME.to_string(),
            bytes,
            page_count,
        },
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_non_media_files() {
        let c = Combiner::new();
        let err = c
            .add_file(UploadedFile::from_bytes("notes.txt", "text/plain", b"hi".to_vec()))
            .unwrap_err();
        assert!(matches!(err, PdfPagesError::UnsupportedFile { .. }));
        assert!(c.is_empty());
    }

    #[test]
    fn classifies_and_reorders() {
        let c = Combiner::new();
        c.add_file(UploadedFile::from_bytes("a.pdf", "application/pdf", b"%PDF".to_vec()))
            .unwrap();
        c.add_file(UploadedFile::from_bytes("b.png", "image/png", vec![0])).unwrap();
        c.add_file(UploadedFile::from_bytes("c.gif", "image/gif", vec![0])).unwrap();

        assert!(c.move_item(2, 0));
        let names: Vec<_> = c.items().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["c.gif", "a.pdf", "b.png"]);
        assert_eq!(c.items()[2].kind, CombineKind::Image);

        let removed = c.remove(1).unwrap();
        assert_eq!(removed.kind, CombineKind::Pdf);
        assert!(c.remove(5).is_none());
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn oversized_file_refused() {
        let c = Combiner::with_max_file_size(4);
        let err = c
            .add_file(UploadedFile::from_bytes("big.png", "image/png", vec![0; 5]))
            .unwrap_err();
        assert!(matches!(err, PdfPagesError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn empty_list_cannot_export() {
        let c = Combiner::new();
        let err = c.export().await.unwrap_err();
        assert!(matches!(err, PdfPagesError::ExportFailed { ref filename, .. } if filename == COMBINED_FILENAME));
        assert_eq!(c.export_state(), ExportState::Ready);
    }

    #[tokio::test]
    async fn only_skipped_images_is_an_error() {
        let c = Combiner::new();
        c.add_file(UploadedFile::from_bytes("x.gif", "image/gif", vec![0])).unwrap();
        assert!(c.export().await.is_err());
        assert_eq!(c.export_state(), ExportState::Ready);
    }
}
