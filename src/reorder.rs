//! The page reorderer: load a PDF, permute its pages, export a new PDF.
//!
//! The order lives in a [`PageOrderList`] and only changes through
//! drag-style moves. Export copies pages from the source in the current
//! order; a failed export leaves the order untouched and the export
//! affordance back at [`ExportState::Ready`].

use crate::compose::{ComposeError, PdfComposer, SourcePdf};
use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::error::PdfPagesError;
use crate::order::PageOrderList;
use crate::output::{DocumentInfo, ExportedPdf};
use crate::pipeline::input::{self, UploadedFile};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Name of the exported file.
pub const REARRANGED_FILENAME: &str = "rearranged-pdf.pdf";

/// Whether an export can be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Ready,
    Exporting,
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

struct Loaded {
    info: DocumentInfo,
    source: Arc<SourcePdf>,
}

struct Inner {
    loaded: Option<Loaded>,
    order: PageOrderList,
    export_state: ExportState,
}

/// Reorders the pages of one PDF.
#[derive(Clone)]
pub struct PageReorderer {
    max_file_size: u64,
    inner: Arc<Mutex<Inner>>,
}

impl Default for PageReorderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PageReorderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("PageReorderer")
            .field("document", &inner.loaded.as_ref().map(|l| &l.info))
            .field("order", &inner.order)
            .field("export_state", &inner.export_state)
            .finish()
    }
}

impl PageReorderer {
    pub fn new() -> Self {
        Self::with_max_file_size(DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_max_file_size(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            inner: Arc::new(Mutex::new(Inner {
                loaded: None,
                order: PageOrderList::identity(0),
                export_state: ExportState::Ready,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load `file`, replacing any previous document, with pages in natural
    /// order.
    pub async fn load(&self, file: &UploadedFile) -> Result<DocumentInfo, PdfPagesError> {
        input::validate_pdf_upload(file, self.max_file_size)?;
        let bytes = file.read().await?;
        input::check_pdf_magic(&file.name, &bytes)?;

        let name = file.name.clone();
        let source = tokio::task::spawn_blocking(move || SourcePdf::load(&name, &bytes))
            .await
            .map_err(|e| PdfPagesError::Internal(format!("Parse task panicked: {}", e)))?
            .map_err(|e| match e {
                ComposeError::Encrypted { name } => PdfPagesError::PasswordRequired { name },
                other => PdfPagesError::CorruptPdf {
                    name: file.name.clone(),
                    detail: other.to_string(),
                },
            })?;

        let info = DocumentInfo {
            name: file.name.clone(),
            page_count: source.page_count(),
            file_size: file.size,
        };
        info!("Loaded '{}' for reordering: {} pages", info.name, info.page_count);

        let mut inner = self.lock();
        inner.order = PageOrderList::identity(info.page_count);
        inner.loaded = Some(Loaded {
            info: info.clone(),
            source: Arc::new(source),
        });
        Ok(info)
    }

    pub fn document(&self) -> Option<DocumentInfo> {
        self.lock().loaded.as_ref().map(|l| l.info.clone())
    }

    pub fn page_count(&self) -> usize {
        self.lock().order.len()
    }

    /// Current order as 0-based source page indices.
    pub fn order(&self) -> Vec<usize> {
        self.lock().order.as_slice().to_vec()
    }

    pub fn export_state(&self) -> ExportState {
        self.lock().export_state
    }

    /// Move the page at position `from` to position `to`. Returns `false`
    /// if either position is out of range.
    pub fn move_page(&self, from: usize, to: usize) -> bool {
        let moved = self.lock().order.move_item(from, to);
        if moved {
            debug!("Moved page position {} → {}", from, to);
        }
        moved
    }

    pub fn reset_order(&self) {
        self.lock().order.reset();
    }

    /// Drop the loaded document.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.loaded = None;
        inner.order = PageOrderList::identity(0);
    }

    /// Build `rearranged-pdf.pdf` with pages in the current order.
    pub async fn export(&self) -> Result<ExportedPdf, PdfPagesError> {
        let export_err = |detail: String| PdfPagesError::ExportFailed {
            filename: REARRANGED_FILENAME.to_string(),
            detail,
        };

        let (slot, source, order) = {
            let mut inner = self.lock();
            if inner.export_state == ExportState::Exporting {
                return Err(export_err("an export is already running".into()));
            }
            let Some(loaded) = inner.loaded.as_ref() else {
                return Err(export_err("no PDF loaded".into()));
            };
            let source = Arc::clone(&loaded.source);
            let order = inner.order.as_slice().to_vec();
            (ExportSlot::claim(&self.inner, &mut inner), source, order)
        };

        let page_count = order.len();
        let result = tokio::task::spawn_blocking(move || {
            let mut composer = PdfComposer::new();
            composer.copy_pages(&source, &order)?;
            composer.finish()
        })
        .await;
        drop(slot);

        let bytes = result
            .map_err(|e| export_err(format!("export task panicked: {}", e)))?
            .map_err(|e| {
                warn!("Reorder export failed: {}", e);
                export_err(e.to_string())
            })?;

        info!("Exported {} ({} pages, {} bytes)", REARRANGED_FILENAME, page_count, bytes.len());
        Ok(ExportedPdf {
            filename: REARRANGED_FILENAME.to_string(),
            bytes,
            page_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_pdf_upload() {
        let r = PageReorderer::new();
        let file = UploadedFile::from_bytes("a.png", "image/png", vec![1, 2, 3]);
        assert!(matches!(
            r.load(&file).await,
            Err(PdfPagesError::InvalidFileType { .. })
        ));
        assert!(r.document().is_none());
    }

    #[tokio::test]
    async fn export_without_document_fails_and_stays_ready() {
        let r = PageReorderer::new();
        let err = r.export().await.unwrap_err();
        assert!(matches!(err, PdfPagesError::ExportFailed { .. }));
        assert_eq!(r.export_state(), ExportState::Ready);
    }

    #[tokio::test]
    async fn unparseable_pdf_is_corrupt() {
        let r = PageReorderer::new();
        let file = UploadedFile::from_bytes("x.pdf", "application/pdf", b"%PDF-1.4 junk".to_vec());
        assert!(matches!(
            r.load(&file).await,
            Err(PdfPagesError::CorruptPdf { .. })
        ));
    }

    #[test]
    fn moves_without_document_are_ignored() {
        let r = PageReorderer::new();
        assert!(!r.move_page(0, 1));
        assert!(r.order().is_empty());
    }
}
