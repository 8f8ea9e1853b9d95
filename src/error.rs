//! Error types for the pdfpages library.
//!
//! [`PdfPagesError`] is the single fatal error type returned by every
//! controller operation. Variants are grouped by the stage that produced them
//! and [`PdfPagesError::kind`] folds them into the five categories the UI
//! shell reacts to:
//!
//! * [`ErrorKind::Validation`] — the file was rejected before any work began.
//! * [`ErrorKind::Load`] — the document could not be opened.
//! * [`ErrorKind::PageConversion`] — one page failed; the run was aborted.
//! * [`ErrorKind::Export`] — building an output PDF failed; nothing was written.
//! * [`ErrorKind::Cancellation`] — a newer run superseded this one.
//!
//! Cancellation is never shown to the user; everything else carries a message
//! meant for display.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdfpages library.
#[derive(Debug, Error)]
pub enum PdfPagesError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The declared MIME type is not `application/pdf`.
    #[error("Please select a valid PDF file. ('{name}' is {mime_type})")]
    InvalidFileType { name: String, mime_type: String },

    /// The file exceeds the configured size ceiling.
    #[error("File size exceeds the {limit_mb}MB limit. Please choose a smaller file. ('{name}' is {size} bytes)")]
    FileTooLarge {
        name: String,
        size: u64,
        limit_mb: u64,
    },

    /// The combiner only accepts PDFs and raster images.
    #[error("'{name}' is neither a PDF nor an image ({mime_type})")]
    UnsupportedFile { name: String, mime_type: String },

    // ── Load errors ───────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The bytes were read, but they do not start with a PDF header.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// The engine could not parse the document.
    #[error("Failed to process PDF '{name}': {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// Loading the document took longer than the configured timeout.
    #[error("Timed out after {secs}s while loading '{name}'")]
    LoadTimeout { name: String, secs: u64 },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or place the library next to the\n\
pdfpages executable or in the current directory.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Page errors ───────────────────────────────────────────────────────
    /// Rendering or encoding a specific page failed; the run was aborted.
    #[error("Failed to convert page {page}: {detail}")]
    PageConversionFailed { page: usize, detail: String },

    /// A page index outside the loaded document was requested.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Building or serialising an output PDF failed.
    #[error("Failed to export '{filename}': {detail}")]
    ExportFailed { filename: String, detail: String },

    // ── Cancellation ──────────────────────────────────────────────────────
    /// The run was superseded by a newer one or reset.
    #[error("Conversion cancelled")]
    Cancelled,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error category used by the session shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Load,
    PageConversion,
    Export,
    Cancellation,
    Other,
}

impl PdfPagesError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PdfPagesError::InvalidFileType { .. }
            | PdfPagesError::FileTooLarge { .. }
            | PdfPagesError::UnsupportedFile { .. } => ErrorKind::Validation,
            PdfPagesError::FileNotFound { .. }
            | PdfPagesError::PermissionDenied { .. }
            | PdfPagesError::NotAPdf { .. }
            | PdfPagesError::CorruptPdf { .. }
            | PdfPagesError::PasswordRequired { .. }
            | PdfPagesError::WrongPassword { .. }
            | PdfPagesError::LoadTimeout { .. }
            | PdfPagesError::PdfiumBindingFailed(_) => ErrorKind::Load,
            PdfPagesError::PageConversionFailed { .. } | PdfPagesError::PageOutOfRange { .. } => {
                ErrorKind::PageConversion
            }
            PdfPagesError::ExportFailed { .. } => ErrorKind::Export,
            PdfPagesError::Cancelled => ErrorKind::Cancellation,
            PdfPagesError::OutputWriteFailed { .. }
            | PdfPagesError::InvalidConfig(_)
            | PdfPagesError::Internal(_) => ErrorKind::Other,
        }
    }

    /// `false` only for cancellation, which is logged but never displayed.
    pub fn is_user_visible(&self) -> bool {
        self.kind() != ErrorKind::Cancellation
    }
}

/// Failure reported by a rasterisation engine.
///
/// Engines know nothing about file names or run state; the converter maps
/// these into [`PdfPagesError`] with that context attached.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("document requires a password")]
    PasswordRequired,

    #[error("incorrect password")]
    WrongPassword,

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("page {index} could not be rendered: {detail}")]
    Render { index: usize, detail: String },

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_too_large_mentions_limit() {
        let e = PdfPagesError::FileTooLarge {
            name: "big.pdf".into(),
            size: 60 * 1024 * 1024,
            limit_mb: 50,
        };
        let msg = e.to_string();
        assert!(msg.contains("50MB limit"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::Validation);
    }

    #[test]
    fn invalid_type_display() {
        let e = PdfPagesError::InvalidFileType {
            name: "notes.txt".into(),
            mime_type: "text/plain".into(),
        };
        assert!(e.to_string().starts_with("Please select a valid PDF file."));
    }

    #[test]
    fn page_failure_reports_page_number() {
        let e = PdfPagesError::PageConversionFailed {
            page: 7,
            detail: "bitmap allocation failed".into(),
        };
        assert!(e.to_string().contains("page 7"));
        assert_eq!(e.kind(), ErrorKind::PageConversion);
    }

    #[test]
    fn cancellation_is_silent() {
        assert!(!PdfPagesError::Cancelled.is_user_visible());
        assert!(PdfPagesError::LoadTimeout {
            name: "a.pdf".into(),
            secs: 30
        }
        .is_user_visible());
    }

    #[test]
    fn export_kind() {
        let e = PdfPagesError::ExportFailed {
            filename: "combined-pdf.pdf".into(),
            detail: "no pages".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Export);
        assert!(e.to_string().contains("combined-pdf.pdf"));
    }
}
