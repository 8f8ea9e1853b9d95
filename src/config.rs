//! Configuration types for PDF-to-image conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The defaults reproduce the behaviour
//! users expect from the upload form: 150 DPI, batches of three pages, a
//! 50 MB upload ceiling and a 30 second load timeout.

use crate::error::PdfPagesError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The MIME type every converter/reorderer upload must declare.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Default upload ceiling: 50 MB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Configuration for a conversion session.
///
/// # Example
/// ```rust
/// use pdfpages::{ConversionConfig, Quality};
///
/// let config = ConversionConfig::builder()
///     .quality(Quality::High)
///     .batch_size(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.quality.scale(), 300.0 / 72.0);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Render quality. Default: [`Quality::Standard`] (150 DPI).
    pub quality: Quality,

    /// Pages rendered concurrently per batch. Default: 3.
    ///
    /// Batches run one after another; within a batch every page is rendered
    /// and encoded at the same time. Small batches bound peak memory, since
    /// a 300 DPI A4 bitmap alone is about 35 MB of RGBA.
    pub batch_size: usize,

    /// Largest accepted upload in bytes. Default: 50 MB.
    pub max_file_size: u64,

    /// Document load timeout in seconds. Default: 30.
    pub load_timeout_secs: u64,

    /// Pause between consecutive files in [`crate::Converter::save_all`], in
    /// milliseconds. Default: 100.
    pub save_delay_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            batch_size: 3,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            load_timeout_secs: 30,
            save_delay_ms: 100,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("quality", &self.quality)
            .field("batch_size", &self.batch_size)
            .field("max_file_size", &self.max_file_size)
            .field("load_timeout_secs", &self.load_timeout_secs)
            .field("save_delay_ms", &self.save_delay_ms)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Size ceiling expressed in whole megabytes, for messages.
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size / (1024 * 1024)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn quality(mut self, quality: Quality) -> Self {
        self.config.quality = quality;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.load_timeout_secs = secs;
        self
    }

    pub fn save_delay_ms(mut self, ms: u64) -> Self {
        self.config.save_delay_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, PdfPagesError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(PdfPagesError::InvalidConfig(
                "Batch size must be ≥ 1".into(),
            ));
        }
        if c.max_file_size == 0 {
            return Err(PdfPagesError::InvalidConfig(
                "Maximum file size must be > 0".into(),
            ));
        }
        if c.load_timeout_secs == 0 {
            return Err(PdfPagesError::InvalidConfig(
                "Load timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Render quality offered by the quality selector.
///
/// Each value is a DPI; the render scale is `dpi / 72` because PDF user
/// space is 72 units per inch.
///
/// | Quality | DPI | Typical use |
/// |---------|-----|-------------|
/// | Screen | 72 | thumbnails, quick previews |
/// | Standard | 150 | on-screen reading (default) |
/// | High | 300 | printing, OCR |
/// | Print | 600 | archival scans |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Screen,
    #[default]
    Standard,
    High,
    Print,
}

impl Quality {
    pub const ALL: [Quality; 4] = [
        Quality::Screen,
        Quality::Standard,
        Quality::High,
        Quality::Print,
    ];

    pub fn dpi(self) -> u32 {
        match self {
            Quality::Screen => 72,
            Quality::Standard => 150,
            Quality::High => 300,
            Quality::Print => 600,
        }
    }

    /// Render scale factor relative to PDF user space.
    pub fn scale(self) -> f32 {
        self.dpi() as f32 / 72.0
    }

    /// Look up the selector entry for an exact DPI value.
    pub fn from_dpi(dpi: u32) -> Option<Quality> {
        Self::ALL.into_iter().find(|q| q.dpi() == dpi)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} DPI", self.dpi())
    }
}
