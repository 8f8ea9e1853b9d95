//! Shared fixtures for the integration tests.
//!
//! PDFs are built in memory with `lopdf`; rendering goes through a scripted
//! engine so nothing here needs libpdfium.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use lopdf::{Dictionary, Document, Object, Stream};
use pdfpages::{ConversionProgressCallback, EngineError, RasterDocument, RasterEngine, UploadedFile};
use std::io::Cursor;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// ── PDF and image fixtures ───────────────────────────────────────────────────

/// A PDF with `num_pages` pages, each showing `"{prefix}-Page-{n}"`.
pub fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for n in 1..=num_pages {
        let content = format!("BT /F1 12 Tf 50 700 Td ({prefix}-Page-{n}) Tj ET");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "MediaBox",
                Object::Array([0, 0, 612, 792].into_iter().map(Object::Integer).collect()),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            ("Kids", Object::Array(kids)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("serialise test pdf");
    buffer
}

/// Content stream text of every page, in page order.
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("parse exported pdf");
    doc.get_pages()
        .values()
        .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap_or_default()).into_owned())
        .collect()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

pub fn pdf_upload(name: &str, bytes: Vec<u8>) -> UploadedFile {
    UploadedFile::from_bytes(name, "application/pdf", bytes)
}

/// Minimal bytes that pass the `%PDF` magic check; the scripted engine
/// never parses them.
pub fn fake_pdf(name: &str) -> UploadedFile {
    pdf_upload(name, b"%PDF-1.7\n%scripted\n".to_vec())
}

// ── Scripted engine ──────────────────────────────────────────────────────────

/// Engine whose documents render blank pages after an optional delay.
#[derive(Clone)]
pub struct ScriptedEngine {
    pub pages: usize,
    pub delay: Duration,
    pub load_delay: Duration,
    pub fail_on: Option<usize>,
}

impl ScriptedEngine {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            delay: Duration::ZERO,
            load_delay: Duration::ZERO,
            fail_on: None,
        }
    }

    pub fn slow(pages: usize, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(pages)
        }
    }

    pub fn slow_load(pages: usize, load_delay: Duration) -> Self {
        Self {
            load_delay,
            ..Self::new(pages)
        }
    }
}

struct ScriptedDoc(ScriptedEngine);

impl RasterEngine for ScriptedEngine {
    fn load(
        &self,
        _bytes: Arc<Vec<u8>>,
        _password: Option<&str>,
    ) -> Result<Arc<dyn RasterDocument>, EngineError> {
        if !self.load_delay.is_zero() {
            std::thread::sleep(self.load_delay);
        }
        Ok(Arc::new(ScriptedDoc(self.clone())))
    }
}

impl RasterDocument for ScriptedDoc {
    fn page_count(&self) -> usize {
        self.0.pages
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, EngineError> {
        if !self.0.delay.is_zero() {
            std::thread::sleep(self.0.delay);
        }
        if Some(index) == self.0.fail_on {
            return Err(EngineError::Render {
                index,
                detail: "scripted failure".into(),
            });
        }
        let (w, h) = pdfpages::engine::viewport_size(612.0, 792.0, scale);
        Ok(DynamicImage::ImageRgba8(RgbaImage::new(w, h)))
    }
}

// ── Progress recorder ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingCallback {
    pub percents: Mutex<Vec<f32>>,
    pub messages: Mutex<Vec<String>>,
    pub completed_pages: Mutex<Vec<usize>>,
    pub finished: Mutex<Option<usize>>,
}

impl ConversionProgressCallback for RecordingCallback {
    fn on_progress(&self, percent: f32, message: &str) {
        self.percents.lock().unwrap().push(percent);
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, _byte_size: usize) {
        self.completed_pages.lock().unwrap().push(page_num);
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        *self.finished.lock().unwrap() = Some(total_pages);
    }
}
