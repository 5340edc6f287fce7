//! CLI binary for posting-ocr.
//!
//! A thin shim over the library crate: flags map onto `PipelineConfig` and
//! `TaxonomyLoader`, results go to stdout as JSON Lines, logs and progress go
//! to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use posting_ocr::config::DEFAULT_CHAR_WHITELIST;
use posting_ocr::{
    process_batch, BatchInput, BatchProgressCallback, ErrorReport, JobPipeline, JobRecord,
    MatchStrictness, PipelineConfig, PipelineError, ProgressCallback, TaxonomyLoader,
    TaxonomySource, TesseractRecognizer,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar plus a log line per image. Images
/// complete out of order, so start times are keyed by input index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Reading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_images} posting images…"))
        ));
    }

    fn on_image_start(&self, index: usize, source: &str) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(source.to_string());
    }

    fn on_image_complete(&self, index: usize, source: &str, record: &JobRecord) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:<28}  {:<32}  {}  {}",
            green("✓"),
            source,
            record.title,
            dim(&format!("{:>3} skills", record.skills.len())),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, source: &str, error: &PipelineError) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let full = error.to_string().replace('\n', " ");
        let msg = if full.chars().count() > 80 {
            format!("{}\u{2026}", full.chars().take(79).collect::<String>())
        } else {
            full
        };

        self.bar.println(format!(
            "  {} {:<28}  {}  {}",
            red("✗"),
            source,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_images: usize, success_count: usize) {
        let failed = total_images.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} images processed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images processed  ({} failed)",
                if failed == total_images {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One posting, built-in skill list
  posting-ocr flyer.png

  # Many postings with the ESCO and O*NET skill databases
  posting-ocr --esco skill_data/esco/skills_en.csv \
              --onet skill_data/onet/Skills.txt scans/*.jpg > jobs.jsonl

  # Phrase-only skill matching, larger working width
  posting-ocr --strictness phrase --target-width 2000 photo.jpg

OUTPUT:
  One JSON object per input image, in input order, on stdout:
    {"title":…,"company":…,"qualifications":…,"description":…,"skills":[…]}
  or, for an image that failed:
    {"error":"…"}
  Logs and progress go to stderr. Exit status is 1 if any image failed.

ENVIRONMENT VARIABLES:
  POSTING_OCR_*       Every option has a POSTING_OCR_<NAME> fallback
  RUST_LOG            Override the log filter (e.g. posting_ocr=debug)

SETUP:
  Install Tesseract 4 or 5 with English data (apt install tesseract-ocr,
  brew install tesseract) or pass --tesseract /path/to/tesseract.
"#;

/// Extract structured job records from job-posting images.
#[derive(Parser, Debug)]
#[command(
    name = "posting-ocr",
    version,
    about = "Extract structured job records from job-posting images",
    long_about = "Read scanned, photographed or screenshotted job postings with Tesseract OCR \
and emit a JSON record per image: title, company, qualifications, description and \
recognised skills.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Posting images (PNG, JPEG, BMP, GIF, TIFF, WebP).
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// ESCO skills CSV (reads the `preferredLabel` column).
    #[arg(long, env = "POSTING_OCR_ESCO")]
    esco: Option<PathBuf>,

    /// O*NET skills file, tab separated (reads the `Element Name` column).
    #[arg(long, env = "POSTING_OCR_ONET")]
    onet: Option<PathBuf>,

    /// Plain skill list, one label per line. Repeatable.
    #[arg(long = "skills-list", value_name = "TXT")]
    skills_list: Vec<PathBuf>,

    /// Do not include the built-in skill list.
    #[arg(long, env = "POSTING_OCR_NO_BUILTIN_SKILLS")]
    no_builtin_skills: bool,

    /// Skill matching: loose (any significant word of a phrase) or phrase.
    #[arg(long, env = "POSTING_OCR_STRICTNESS", default_value = "loose")]
    strictness: MatchStrictness,

    /// Resize images to this width before binarisation (pixels).
    #[arg(long, env = "POSTING_OCR_TARGET_WIDTH")]
    target_width: Option<u32>,

    /// Adaptive threshold neighbourhood (odd, ≥ 3).
    #[arg(long, env = "POSTING_OCR_BLOCK_SIZE", default_value_t = 11)]
    block_size: u32,

    /// Constant subtracted from the local mean when thresholding.
    #[arg(long, env = "POSTING_OCR_THRESHOLD_OFFSET", default_value_t = 2,
          allow_hyphen_values = true)]
    threshold_offset: i16,

    /// Median filter radius after binarisation (0 disables).
    #[arg(long, env = "POSTING_OCR_DENOISE_RADIUS", default_value_t = 1)]
    denoise_radius: u32,

    /// Contrast multiplier for the enhanced profile.
    #[arg(long, env = "POSTING_OCR_CONTRAST", default_value_t = 2.0)]
    contrast: f32,

    /// Contrast multiplier for the basic fallback profile.
    #[arg(long, env = "POSTING_OCR_BASIC_CONTRAST", default_value_t = 1.5)]
    basic_contrast: f32,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "POSTING_OCR_PSM", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Characters Tesseract may emit; empty string disables the whitelist.
    #[arg(long, env = "POSTING_OCR_WHITELIST", default_value = DEFAULT_CHAR_WHITELIST)]
    whitelist: String,

    /// Tesseract language.
    #[arg(long, env = "POSTING_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Path to the tesseract executable.
    #[arg(long, env = "POSTING_OCR_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Per-image OCR timeout in seconds.
    #[arg(long, env = "POSTING_OCR_OCR_TIMEOUT", default_value_t = 30)]
    ocr_timeout: u64,

    /// Number of images processed at once.
    #[arg(short, long, env = "POSTING_OCR_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Disable progress bar.
    #[arg(long, env = "POSTING_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "POSTING_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all stderr output except errors.
    #[arg(short, long, env = "POSTING_OCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v asks for everything.
    let show_progress = !cli.quiet && !cli.no_progress && cli.images.len() > 1;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Skill taxonomy ───────────────────────────────────────────────────
    let load = build_loader(&cli).load();
    if !cli.quiet {
        for err in &load.errors {
            eprintln!("{} {}", cyan("⚠"), err);
        }
    }
    let taxonomy = Arc::new(load.taxonomy);

    // ── Pipeline ─────────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    match TesseractRecognizer::from_config(&config).probe() {
        Ok(version) => debug!("Using {version}"),
        Err(e) => warn!("{e}; every image will fail until Tesseract is available"),
    }
    let pipeline = Arc::new(
        JobPipeline::new(config, taxonomy).context("Failed to build pipeline")?,
    );

    // ── Read inputs ──────────────────────────────────────────────────────
    // Unreadable files keep their slot so output stays in argument order.
    let mut lines: Vec<Option<serde_json::Value>> = vec![None; cli.images.len()];
    let mut slots = Vec::with_capacity(cli.images.len());
    let mut inputs = Vec::with_capacity(cli.images.len());
    let mut failed = false;
    for (slot, path) in cli.images.iter().enumerate() {
        match BatchInput::from_path(path) {
            Ok(input) => {
                slots.push(slot);
                inputs.push(input);
            }
            Err(e) => {
                failed = true;
                let report = ErrorReport {
                    error: format!("Cannot read '{}': {e}", path.display()),
                };
                warn!("{}", report.error);
                lines[slot] = Some(serde_json::to_value(report)?);
            }
        }
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let output = process_batch(pipeline, inputs, progress).await;
    for item in &output.items {
        failed |= !item.is_ok();
        lines[slots[item.index]] = Some(item.to_json());
    }

    // ── Emit JSON Lines ──────────────────────────────────────────────────
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for line in lines.into_iter().flatten() {
        serde_json::to_writer(&mut handle, &line).context("Failed to serialise output")?;
        handle.write_all(b"\n").context("Failed to write to stdout")?;
    }
    handle.flush().context("Failed to write to stdout")?;

    if !cli.quiet && !show_progress {
        eprintln!(
            "Processed {}/{} images in {}ms",
            output.stats.succeeded,
            cli.images.len(),
            output.stats.total_duration_ms
        );
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Map CLI args to `TaxonomyLoader`.
fn build_loader(cli: &Cli) -> TaxonomyLoader {
    let mut loader = TaxonomyLoader::new().include_builtin(!cli.no_builtin_skills);
    if let Some(ref path) = cli.esco {
        loader = loader.source(TaxonomySource::esco(path));
    }
    if let Some(ref path) = cli.onet {
        loader = loader.source(TaxonomySource::onet(path));
    }
    for path in &cli.skills_list {
        loader = loader.source(TaxonomySource::lines(path));
    }
    loader
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .threshold_block_size(cli.block_size)
        .threshold_offset(cli.threshold_offset)
        .denoise_radius(cli.denoise_radius)
        .contrast_factor(cli.contrast)
        .basic_contrast_factor(cli.basic_contrast)
        .page_seg_mode(cli.psm)
        .char_whitelist(cli.whitelist.clone())
        .language(cli.lang.clone())
        .tesseract_path(cli.tesseract.clone())
        .ocr_timeout_secs(cli.ocr_timeout)
        .match_strictness(cli.strictness)
        .concurrency(cli.concurrency);

    if let Some(width) = cli.target_width {
        builder = builder.target_width(width);
    }

    builder.build().context("Invalid configuration")
}
