//! The converter controller: PDF → one PNG per page.
//!
//! A [`Converter`] owns at most one loaded document and the results of the
//! latest run. Runs are superseded rather than queued: starting a new run
//! (another file, or a quality change) cancels the previous run's
//! [`CancellationToken`], releases its previews and takes over. The stale
//! run notices at its next suspension point and unwinds with
//! [`PdfPagesError::Cancelled`].
//!
//! Pages are rendered in fixed-size batches. Batches run one after another;
//! pages within a batch render concurrently on the blocking pool. The first
//! failing page (in page order) aborts the run and discards everything the
//! run produced so far.
//!
//! # Example
//!
//! ```rust,no_run
//! use pdfpages::{ConversionConfig, Converter, PdfiumEngine, UploadedFile};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = Converter::new(Arc::new(PdfiumEngine::new()?), ConversionConfig::default());
//! let output = converter
//!     .convert_file(&UploadedFile::from_path("report.pdf")?)
//!     .await?;
//! for page in &output.pages {
//!     println!("{} ({} bytes)", page.filename, page.byte_size);
//! }
//! converter.save_all("out").await?;
//! # Ok(())
//! # }
//! ```

use crate::cancel::CancellationToken;
use crate::config::{ConversionConfig, Quality};
use crate::engine::{RasterDocument, RasterEngine};
use crate::error::PdfPagesError;
use crate::output::{page_filename, ConversionOutput, ConversionStats, DocumentInfo, PageImageResult};
use crate::pipeline::input::{self, UploadedFile};
use crate::pipeline::render::{self, RenderedPage};
use crate::preview::PreviewRegistry;
use crate::progress::{ProgressTracker, LOADED_PERCENT};
use crate::state::{ConverterPhase, PhaseEvent};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A document that has been loaded and can be re-rendered.
#[derive(Clone)]
struct LoadedSource {
    info: DocumentInfo,
    document: Arc<dyn RasterDocument>,
}

struct Inner {
    phase: ConverterPhase,
    quality: Quality,
    /// Token of the authoritative run, if one is in flight.
    token: Option<CancellationToken>,
    source: Option<LoadedSource>,
    results: Vec<PageImageResult>,
    stats: Option<ConversionStats>,
}

impl Inner {
    fn apply(&mut self, event: PhaseEvent) {
        match self.phase.transition(event) {
            Ok(next) => self.phase = next,
            Err(e) => warn!("Ignoring converter event: {}", e),
        }
    }

    fn is_current(&self, token: &CancellationToken) -> bool {
        !token.is_cancelled()
            && self
                .token
                .as_ref()
                .is_some_and(|t| t.run_id() == token.run_id())
    }
}

/// Converts PDFs into per-page PNG results.
///
/// Cloning a `Converter` yields another handle to the same controller, so a
/// shell can start a new run while an earlier one is still in flight.
#[derive(Clone)]
pub struct Converter {
    engine: Arc<dyn RasterEngine>,
    config: Arc<ConversionConfig>,
    previews: PreviewRegistry,
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("phase", &self.phase())
            .field("config", &self.config)
            .field("previews", &self.previews)
            .finish()
    }
}

impl Converter {
    pub fn new(engine: Arc<dyn RasterEngine>, config: ConversionConfig) -> Self {
        Self::with_previews(engine, config, PreviewRegistry::new())
    }

    /// Use an existing registry, e.g. one shared with the session shell.
    pub fn with_previews(
        engine: Arc<dyn RasterEngine>,
        config: ConversionConfig,
        previews: PreviewRegistry,
    ) -> Self {
        let quality = config.quality;
        Self {
            engine,
            config: Arc::new(config),
            previews,
            inner: Arc::new(Mutex::new(Inner {
                phase: ConverterPhase::Idle,
                quality,
                token: None,
                source: None,
                results: Vec::new(),
                stats: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn phase(&self) -> ConverterPhase {
        self.lock().phase.clone()
    }

    pub fn quality(&self) -> Quality {
        self.lock().quality
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Results of the latest completed run, in page order.
    pub fn results(&self) -> Vec<PageImageResult> {
        self.lock().results.clone()
    }

    pub fn document(&self) -> Option<DocumentInfo> {
        self.lock().source.as_ref().map(|s| s.info.clone())
    }

    pub fn stats(&self) -> Option<ConversionStats> {
        self.lock().stats.clone()
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Validate, load and convert `file`.
    ///
    /// Validation failures return immediately and leave the converter
    /// untouched. Every other outcome supersedes the previous run.
    pub async fn convert_file(&self, file: &UploadedFile) -> Result<ConversionOutput, PdfPagesError> {
        input::validate_pdf_upload(file, self.config.max_file_size)?;

        let (token, _) = self.begin_run(true);
        info!("Starting conversion of '{}' (run {})", file.name, token.run_id());
        let started = Instant::now();

        let loaded = self.load(&token, file).await;
        let (source, quality) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => return Err(self.settle_failure(&token, e)),
        };
        let load_ms = started.elapsed().as_millis() as u64;

        let result = self.run_pages(&token, source, quality, started, load_ms).await;
        result.map_err(|e| self.settle_failure(&token, e))
    }

    /// Convenience wrapper: describe a file on disk and convert it.
    pub async fn convert_path(&self, path: impl AsRef<Path>) -> Result<ConversionOutput, PdfPagesError> {
        let file = UploadedFile::from_path(path)?;
        self.convert_file(&file).await
    }

    /// Change the render quality.
    ///
    /// When a document is loaded it is converted again at the new quality
    /// and the fresh output is returned. A document that is still loading
    /// renders at the new quality once it opens, and `Ok(None)` is returned.
    /// Otherwise only the setting changes.
    pub async fn set_quality(&self, quality: Quality) -> Result<Option<ConversionOutput>, PdfPagesError> {
        let source = {
            let mut inner = self.lock();
            inner.quality = quality;
            inner.source.clone()
        };
        let Some(source) = source else {
            debug!("Quality set to {} (no document loaded)", quality);
            return Ok(None);
        };

        let (token, quality) = self.begin_run(false);
        info!(
            "Re-converting '{}' at {} (run {})",
            source.info.name,
            quality,
            token.run_id()
        );
        let started = Instant::now();

        let entered = self.with_current(&token, |inner| inner.apply(PhaseEvent::Loaded));
        if let Err(e) = entered {
            return Err(self.settle_failure(&token, e));
        }
        self.report(
            LOADED_PERCENT,
            &format!("Loading PDF... Found {} pages", source.info.page_count),
        );

        let result = self.run_pages(&token, source, quality, started, 0).await;
        result.map(Some).map_err(|e| self.settle_failure(&token, e))
    }

    /// Cancel any in-flight run, release every preview and return to idle.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
        let handles: Vec<_> = inner.results.drain(..).map(|r| r.preview).collect();
        self.previews.revoke_many(&handles);
        inner.source = None;
        inner.stats = None;
        let event = if inner.phase.is_busy() {
            PhaseEvent::Cancel
        } else {
            PhaseEvent::Reset
        };
        inner.apply(event);
        debug!("Converter reset");
    }

    /// Load `file` and report its page count without rendering or touching
    /// converter state.
    pub async fn inspect(&self, file: &UploadedFile) -> Result<DocumentInfo, PdfPagesError> {
        input::validate_pdf_upload(file, self.config.max_file_size)?;
        let bytes = file.read().await?;
        input::check_pdf_magic(&file.name, &bytes)?;
        let document = render::load_document(
            Arc::clone(&self.engine),
            bytes,
            &file.name,
            self.config.password.clone(),
            Duration::from_secs(self.config.load_timeout_secs),
        )
        .await?;
        Ok(DocumentInfo {
            name: file.name.clone(),
            page_count: document.page_count(),
            file_size: file.size,
        })
    }

    /// Write every current result into `dir`, pausing between files.
    ///
    /// Each file is written atomically (temp file + rename). Returns the
    /// written paths in page order.
    pub async fn save_all(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, PdfPagesError> {
        let dir = dir.as_ref();
        let results = self.results();
        if results.is_empty() {
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PdfPagesError::OutputWriteFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let delay = Duration::from_millis(self.config.save_delay_ms);
        let mut written = Vec::with_capacity(results.len());
        for (i, page) in results.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let path = dir.join(&page.filename);
            write_atomic(&path, &page.bytes).await?;
            debug!("Saved {}", path.display());
            written.push(path);
        }

        info!("Saved {} page images to {}", written.len(), dir.display());
        Ok(written)
    }

    // ── Run internals ────────────────────────────────────────────────────

    /// Supersede the current run and hand out a token for the new one.
    fn begin_run(&self, drop_source: bool) -> (CancellationToken, Quality) {
        let token = CancellationToken::new();
        let mut inner = self.lock();
        if let Some(previous) = inner.token.replace(token.clone()) {
            debug!("Run {} superseded by run {}", previous.run_id(), token.run_id());
            previous.cancel();
        }
        let handles: Vec<_> = inner.results.drain(..).map(|r| r.preview).collect();
        self.previews.revoke_many(&handles);
        inner.stats = None;
        if drop_source {
            inner.source = None;
        }
        inner.apply(PhaseEvent::Start);
        drop(inner);

        self.report(0.0, "Loading PDF...");
        (token, self.quality())
    }

    /// Run `f` on the state only if `token` is still the authoritative run.
    fn with_current<R>(
        &self,
        token: &CancellationToken,
        f: impl FnOnce(&mut Inner) -> R,
    ) -> Result<R, PdfPagesError> {
        let mut inner = self.lock();
        if !inner.is_current(token) {
            return Err(PdfPagesError::Cancelled);
        }
        Ok(f(&mut inner))
    }

    async fn load(
        &self,
        token: &CancellationToken,
        file: &UploadedFile,
    ) -> Result<(LoadedSource, Quality), PdfPagesError> {
        let bytes = file.read().await?;
        token.check()?;
        input::check_pdf_magic(&file.name, &bytes)?;

        let document = render::load_document(
            Arc::clone(&self.engine),
            bytes,
            &file.name,
            self.config.password.clone(),
            Duration::from_secs(self.config.load_timeout_secs),
        )
        .await?;
        token.check()?;

        let source = LoadedSource {
            info: DocumentInfo {
                name: file.name.clone(),
                page_count: document.page_count(),
                file_size: file.size,
            },
            document,
        };
        // Quality is read with the source stored: a change before this point
        // applies to this run, a change after it supersedes the run.
        let stored = source.clone();
        let quality = self.with_current(token, move |inner| {
            inner.source = Some(stored);
            inner.apply(PhaseEvent::Loaded);
            inner.quality
        })?;
        self.report(
            LOADED_PERCENT,
            &format!("Loading PDF... Found {} pages", source.info.page_count),
        );
        Ok((source, quality))
    }

    async fn run_pages(
        &self,
        token: &CancellationToken,
        source: LoadedSource,
        quality: Quality,
        started: Instant,
        load_ms: u64,
    ) -> Result<ConversionOutput, PdfPagesError> {
        let total = source.document.page_count();
        let scale = quality.scale();
        let callback = self.config.progress_callback.clone();
        if let Some(ref cb) = callback {
            cb.on_conversion_start(total);
        }

        let tracker = Arc::new(ProgressTracker::new());
        tracker.advance(LOADED_PERCENT);
        let completed = Arc::new(AtomicUsize::new(0));
        let render_start = Instant::now();

        let indices: Vec<usize> = (0..total).collect();
        for batch in indices.chunks(self.config.batch_size.max(1)) {
            token.check()?;
            debug!(
                "Rendering batch: pages {}..={}",
                batch[0] + 1,
                batch[batch.len() - 1] + 1
            );

            let tasks = batch.iter().map(|&index| {
                let document = Arc::clone(&source.document);
                let tracker = Arc::clone(&tracker);
                let completed = Arc::clone(&completed);
                async move {
                    let page = render::render_page(document, index, scale).await?;
                    token.check()?;
                    let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                    let percent = tracker.advance(ProgressTracker::pages_percent(done, total));
                    self.progress(token, percent, &format!("Converting page {} of {}...", done, total));
                    Ok::<RenderedPage, PdfPagesError>(page)
                }
            });

            for outcome in join_all(tasks).await {
                match outcome {
                    Ok(page) => self.commit_page(token, page, total)?,
                    Err(e) => {
                        if let (Some(cb), PdfPagesError::PageConversionFailed { page, .. }) =
                            (callback.as_ref(), &e)
                        {
                            if !token.is_cancelled() {
                                cb.on_page_error(*page, total, &e.to_string());
                            }
                        }
                        return Err(e);
                    }
                }
            }
        }
        let render_ms = render_start.elapsed().as_millis() as u64;

        let output = self.with_current(token, |inner| {
            let mut stats = ConversionStats::new(total, quality);
            stats.total_bytes = inner.results.iter().map(|r| r.byte_size).sum();
            stats.load_duration_ms = load_ms;
            stats.render_duration_ms = render_ms;
            stats.total_duration_ms = started.elapsed().as_millis() as u64;

            inner.apply(PhaseEvent::Progress(100.0));
            inner.apply(PhaseEvent::Finished { pages: total });
            inner.token = None;
            inner.stats = Some(stats.clone());

            ConversionOutput {
                document: source.info.clone(),
                pages: inner.results.clone(),
                stats,
            }
        })?;

        self.report(100.0, &format!("Successfully converted {} pages!", total));
        if let Some(ref cb) = callback {
            cb.on_conversion_complete(total);
        }
        info!(
            "Conversion complete: {} pages at {}, {}ms total",
            total, quality, output.stats.total_duration_ms
        );
        Ok(output)
    }

    /// Register a finished page. Happens under the state lock so a
    /// superseded run can never append.
    fn commit_page(
        &self,
        token: &CancellationToken,
        page: RenderedPage,
        total: usize,
    ) -> Result<(), PdfPagesError> {
        let byte_size = page.png.len();
        let page_number = page.index + 1;
        self.with_current(token, |inner| {
            let bytes = Arc::new(page.png);
            let preview = self.previews.create(Arc::clone(&bytes));
            inner.results.push(PageImageResult {
                page_number,
                bytes,
                preview,
                filename: page_filename(page_number),
                byte_size,
                width: page.width,
                height: page.height,
            });
        })?;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_complete(page_number, total, byte_size);
        }
        Ok(())
    }

    /// Publish progress for the authoritative run only.
    fn progress(&self, token: &CancellationToken, percent: f32, message: &str) {
        let current = self
            .with_current(token, |inner| inner.apply(PhaseEvent::Progress(percent)))
            .is_ok();
        if current {
            self.report(percent, message);
        }
    }

    fn report(&self, percent: f32, message: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_progress(percent, message);
        }
    }

    /// Turn a run failure into its final error, updating state if the run
    /// is still authoritative.
    fn settle_failure(&self, token: &CancellationToken, err: PdfPagesError) -> PdfPagesError {
        if matches!(err, PdfPagesError::Cancelled) || token.is_cancelled() {
            debug!("Run {} cancelled: {}", token.run_id(), err);
            return PdfPagesError::Cancelled;
        }

        let mut inner = self.lock();
        if inner.is_current(token) {
            let handles: Vec<_> = inner.results.drain(..).map(|r| r.preview).collect();
            self.previews.revoke_many(&handles);
            inner.token = None;
            inner.apply(PhaseEvent::Failed(err.to_string()));
        }
        warn!("Conversion failed: {}", err);
        err
    }
}

/// Write `bytes` to `path` via a sibling temp file and rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PdfPagesError> {
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| PdfPagesError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PdfPagesError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use image::{DynamicImage, RgbaImage};

    struct FlatEngine {
        pages: usize,
        fail_on: Option<usize>,
    }

    struct FlatDoc {
        pages: usize,
        fail_on: Option<usize>,
    }

    impl RasterEngine for FlatEngine {
        fn load(
            &self,
            _bytes: Arc<Vec<u8>>,
            _password: Option<&str>,
        ) -> Result<Arc<dyn RasterDocument>, EngineError> {
            Ok(Arc::new(FlatDoc {
                pages: self.pages,
                fail_on: self.fail_on,
            }))
        }
    }

    impl RasterDocument for FlatDoc {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, EngineError> {
            if Some(index) == self.fail_on {
                return Err(EngineError::Render {
                    index,
                    detail: "boom".into(),
                });
            }
            let (w, h) = crate::engine::viewport_size(20.0, 10.0, scale);
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(w, h)))
        }
    }

    fn pdf(name: &str) -> UploadedFile {
        UploadedFile::from_bytes(name, "application/pdf", b"%PDF-1.7 fake".to_vec())
    }

    fn converter(pages: usize, fail_on: Option<usize>) -> Converter {
        Converter::new(
            Arc::new(FlatEngine { pages, fail_on }),
            ConversionConfig::default(),
        )
    }

    #[tokio::test]
    async fn converts_every_page_in_order() {
        let c = converter(5, None);
        let out = c.convert_file(&pdf("five.pdf")).await.unwrap();
        let numbers: Vec<_> = out.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(out.pages[0].filename, "page-01.png");
        assert_eq!(c.phase(), ConverterPhase::Results { pages: 5 });
        assert_eq!(c.previews().outstanding(), 5);
    }

    #[tokio::test]
    async fn validation_failure_leaves_state_untouched() {
        let c = converter(2, None);
        let bad = UploadedFile::from_bytes("x.txt", "text/plain", b"hello".to_vec());
        assert!(c.convert_file(&bad).await.is_err());
        assert_eq!(c.phase(), ConverterPhase::Idle);
    }

    #[tokio::test]
    async fn failing_page_discards_partial_results() {
        let c = converter(6, Some(4));
        let err = c.convert_file(&pdf("bad.pdf")).await.unwrap_err();
        assert!(matches!(err, PdfPagesError::PageConversionFailed { page: 5, .. }));
        assert!(c.results().is_empty());
        assert_eq!(c.previews().outstanding(), 0);
        assert!(matches!(c.phase(), ConverterPhase::Error { .. }));
    }

    #[tokio::test]
    async fn reset_releases_previews() {
        let c = converter(3, None);
        c.convert_file(&pdf("three.pdf")).await.unwrap();
        c.reset();
        assert_eq!(c.previews().outstanding(), 0);
        assert_eq!(c.phase(), ConverterPhase::Idle);
        assert!(c.document().is_none());
    }

    #[tokio::test]
    async fn quality_change_reconverts_loaded_document() {
        let c = converter(2, None);
        assert!(c.set_quality(Quality::High).await.unwrap().is_none());

        c.convert_file(&pdf("two.pdf")).await.unwrap();
        let first = c.results()[0].width;
        let out = c.set_quality(Quality::Print).await.unwrap().unwrap();
        assert_eq!(out.stats.dpi, 600);
        assert!(out.pages[0].width > first);
        assert_eq!(c.previews().outstanding(), 2);
    }

    #[tokio::test]
    async fn not_a_pdf_is_a_load_error() {
        let c = converter(1, None);
        let file = UploadedFile::from_bytes("fake.pdf", "application/pdf", b"GIF89a".to_vec());
        let err = c.convert_file(&file).await.unwrap_err();
        assert!(matches!(err, PdfPagesError::NotAPdf { .. }));
        assert!(matches!(c.phase(), ConverterPhase::Error { .. }));
    }

    #[tokio::test]
    async fn save_all_writes_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let c = Converter::new(
            Arc::new(FlatEngine {
                pages: 2,
                fail_on: None,
            }),
            ConversionConfig::builder().save_delay_ms(0).build().unwrap(),
        );
        c.convert_file(&pdf("two.pdf")).await.unwrap();
        let paths = c.save_all(dir.path()).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert!(dir.path().join("page-02.png").exists());
        assert!(!dir.path().join("page-02.tmp").exists());
    }
}
