//! End-to-end tests against a real Tesseract install.
//!
//! These tests shell out to the `tesseract` binary and read posting images
//! from `./test_cases/`. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_blank_image -- --nocapture

use image::{GrayImage, ImageFormat, Luma};
use posting_ocr::{
    process_batch_sync, process_image, BatchInput, ErrorKind, JobPipeline, PipelineConfig,
    SkillTaxonomy, TesseractRecognizer,
};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn png(img: &GrayImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn posting_images() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(test_cases_dir()) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("png" | "jpg" | "jpeg")
            )
        })
        .collect();
    paths.sort();
    paths
}

// ── Engine ───────────────────────────────────────────────────────────────────

#[test]
fn test_probe_tesseract() {
    e2e_skip_unless_enabled!();
    let version = TesseractRecognizer::default().probe().unwrap();
    println!("engine: {version}");
    assert!(version.to_lowercase().contains("tesseract"));
}

#[test]
fn test_missing_binary_is_ocr_error() {
    // No engine needed: the spawn itself fails.
    let config = PipelineConfig::builder()
        .tesseract_path("/nonexistent/bin/tesseract")
        .build()
        .unwrap();
    let img = png(&GrayImage::from_pixel(32, 32, Luma([255])));
    let err = process_image(&img, &config, Arc::new(SkillTaxonomy::builtin())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ocr);
}

#[test]
fn test_blank_image_is_empty_text() {
    e2e_skip_unless_enabled!();
    let img = png(&GrayImage::from_pixel(400, 200, Luma([255])));
    let err = process_image(
        &img,
        &PipelineConfig::default(),
        Arc::new(SkillTaxonomy::builtin()),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyText, "got: {err}");
}

// ── Postings ─────────────────────────────────────────────────────────────────

#[test]
fn test_sample_posting() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("posting.png"));
    let bytes = std::fs::read(&path).unwrap();
    let record = process_image(
        &bytes,
        &PipelineConfig::default(),
        Arc::new(SkillTaxonomy::builtin()),
    )
    .unwrap();

    println!("{}", serde_json::to_string_pretty(&record).unwrap());
    assert!(!record.description.is_empty());
    assert!(!record.description.contains("  "));
    assert!(!record.title.is_empty());
    assert!(!record.company.is_empty());
}

#[test]
fn test_all_test_cases_in_batch() {
    e2e_skip_unless_enabled!();
    let paths = posting_images();
    if paths.is_empty() {
        println!("SKIP — no images in {}", test_cases_dir().display());
        return;
    }

    let inputs: Vec<BatchInput> = paths
        .iter()
        .map(|p| BatchInput::from_path(p).unwrap())
        .collect();
    let pipeline = Arc::new(
        JobPipeline::new(
            PipelineConfig::default(),
            Arc::new(SkillTaxonomy::builtin()),
        )
        .unwrap(),
    );
    let out = process_batch_sync(pipeline, inputs, None).unwrap();

    for item in &out.items {
        println!("{}: {}", item.source, item.to_json());
        if let Err(e) = &item.result {
            assert_ne!(e.kind(), ErrorKind::Internal, "{}: {e}", item.source);
        }
    }
    assert_eq!(out.stats.total_images, paths.len());
}
