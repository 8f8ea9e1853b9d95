//! End-to-end tests against the real pdfium engine.
//!
//! These need libpdfium at runtime, so they are gated behind the
//! `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture

mod common;

use common::{create_test_pdf, init_tracing, pdf_upload};
use futures::StreamExt;
use pdfpages::{
    convert_stream, ConversionConfig, Converter, PdfPagesError, PdfiumEngine, Quality,
    RasterEngine,
};
use std::sync::Arc;

/// Skip this test unless E2E_ENABLED is set, otherwise bind pdfium.
macro_rules! e2e_engine {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_tracing();
        let engine: Arc<dyn RasterEngine> =
            Arc::new(PdfiumEngine::new().expect("libpdfium must be loadable for e2e tests"));
        engine
    }};
}

#[tokio::test]
async fn test_letter_pages_at_each_quality() {
    let engine = e2e_engine!();
    let bytes = create_test_pdf(2, "E2E");

    for (quality, expected) in [
        (Quality::Screen, (612, 792)),
        (Quality::Standard, (1275, 1650)),
        (Quality::High, (2550, 3300)),
    ] {
        let config = ConversionConfig::builder().quality(quality).build().unwrap();
        let converter = Converter::new(Arc::clone(&engine), config);
        let out = converter
            .convert_file(&pdf_upload("letter.pdf", bytes.clone()))
            .await
            .unwrap();

        assert_eq!(out.pages.len(), 2);
        for page in &out.pages {
            assert_eq!((page.width, page.height), expected, "{quality}");
            assert!(page.bytes.starts_with(b"\x89PNG"));
        }
        println!("{quality}: {} bytes total", out.stats.total_bytes);
    }
}

#[tokio::test]
async fn test_inspect_page_count() {
    let engine = e2e_engine!();
    let converter = Converter::new(engine, ConversionConfig::default());
    let info = converter
        .inspect(&pdf_upload("five.pdf", create_test_pdf(5, "I")))
        .await
        .unwrap();
    assert_eq!(info.page_count, 5);
}

#[tokio::test]
async fn test_corrupt_pdf_is_a_load_error() {
    let engine = e2e_engine!();
    let converter = Converter::new(engine, ConversionConfig::default());
    let err = converter
        .convert_file(&pdf_upload("broken.pdf", b"%PDF-1.7\ngarbage".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, PdfPagesError::CorruptPdf { .. }), "{err}");
}

#[tokio::test]
async fn test_stream_yields_pages_in_order() {
    let engine = e2e_engine!();
    let config = ConversionConfig::builder()
        .quality(Quality::Screen)
        .build()
        .unwrap();
    let file = pdf_upload("four.pdf", create_test_pdf(4, "S"));

    let stream = convert_stream(engine, &file, &config).await.unwrap();
    let numbers: Vec<usize> = stream
        .map(|page| page.unwrap().page_number)
        .collect()
        .await;
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}
