//! pdfium-backed [`RasterEngine`].
//!
//! ## Binding
//!
//! The location of the pdfium shared library is resolved once per process
//! and cached in a `OnceLock`. Resolution order (first hit wins):
//!
//! 1. `PDFIUM_LIB_PATH` — explicit path to the library file
//! 2. next to the running executable
//! 3. the current working directory
//! 4. the system library search path
//!
//! A `Pdfium` instance is bound inside every blocking call and dropped when
//! the call returns, so no bindings are shared between threads.
//!
//! ## Documents
//!
//! A `pdfium_render::PdfDocument` borrows its bindings, so [`PdfiumDocument`]
//! keeps the raw bytes and re-opens the document inside each blocking render
//! call. Opening from memory is cheap compared to rasterising a page.

use super::{RasterDocument, RasterEngine};
use crate::error::EngineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Where the pdfium library was found.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LibrarySource {
    File(PathBuf),
    System,
}

static LIBRARY: OnceLock<LibrarySource> = OnceLock::new();

impl LibrarySource {
    fn bind(&self) -> Result<Pdfium, EngineError> {
        let bindings = match self {
            LibrarySource::File(path) => Pdfium::bind_to_library(path),
            LibrarySource::System => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| EngineError::Unavailable(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

/// Rasterisation engine backed by the pdfium C++ library.
#[derive(Debug, Clone)]
pub struct PdfiumEngine {
    library: LibrarySource,
}

impl PdfiumEngine {
    /// Locate pdfium (once per process) and return an engine handle.
    pub fn new() -> Result<Self, EngineError> {
        let library = match LIBRARY.get() {
            Some(library) => library.clone(),
            None => {
                let found = locate_library()?;
                LIBRARY.get_or_init(|| found).clone()
            }
        };
        Ok(Self { library })
    }
}

impl RasterEngine for PdfiumEngine {
    fn load(
        &self,
        bytes: Arc<Vec<u8>>,
        password: Option<&str>,
    ) -> Result<Arc<dyn RasterDocument>, EngineError> {
        let pdfium = self.library.bind()?;
        let page_count = {
            let document = pdfium
                .load_pdf_from_byte_slice(&bytes, password)
                .map_err(|e| classify_load_error(&e, password.is_some()))?;
            document.pages().len() as usize
        };
        info!("PDF loaded: {} pages", page_count);

        Ok(Arc::new(PdfiumDocument {
            library: self.library.clone(),
            bytes,
            password: password.map(str::to_owned),
            page_count,
        }))
    }
}

/// A document opened by [`PdfiumEngine`].
pub struct PdfiumDocument {
    library: LibrarySource,
    bytes: Arc<Vec<u8>>,
    password: Option<String>,
    page_count: usize,
}

impl RasterDocument for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, EngineError> {
        let render_err = |detail: String| EngineError::Render { index, detail };

        let pdfium = self.library.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.bytes, self.password.as_deref())
            .map_err(|e| classify_load_error(&e, self.password.is_some()))?;

        let page_index =
            u16::try_from(index).map_err(|_| render_err(format!("index {index} exceeds u16")))?;
        let page = document
            .pages()
            .get(page_index)
            .map_err(|e| render_err(format!("{:?}", e)))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| render_err(format!("{:?}", e)))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

fn classify_load_error(e: &PdfiumError, password_given: bool) -> EngineError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password_given {
            EngineError::WrongPassword
        } else {
            EngineError::PasswordRequired
        }
    } else {
        EngineError::Malformed(err_str)
    }
}

fn locate_library() -> Result<LibrarySource, EngineError> {
    let mut attempts: Vec<String> = Vec::new();

    for candidate in candidate_paths() {
        match Pdfium::bind_to_library(&candidate) {
            Ok(_) => {
                debug!("Found pdfium at {}", candidate.display());
                return Ok(LibrarySource::File(candidate));
            }
            Err(e) => attempts.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(_) => {
            debug!("Using system pdfium");
            Ok(LibrarySource::System)
        }
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(EngineError::Unavailable(attempts.join("; ")))
        }
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        if !p.is_empty() {
            paths.push(PathBuf::from(p));
        }
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|d| d.to_path_buf()))
    {
        paths.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }
    paths.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    paths.into_iter().filter(|p| p.exists()).collect()
}
