//! Text recognition: normalised image → raw text via an external OCR engine.
//!
//! The pipeline only depends on the [`TextRecognizer`] trait. The built-in
//! [`TesseractRecognizer`] pipes a PNG into the `tesseract` executable over
//! stdin and reads the text back from stdout, so nothing is written to disk.
//!
//! ## Engine configuration
//!
//! Every call uses the same fixed settings:
//! * `--psm 6` — one uniform block of text, which suits single-column postings
//! * `preserve_interword_spaces=1` — keep the spacing the engine saw
//! * `tessedit_char_whitelist` — reject glyph guesses outside the expected
//!   alphabet, trading some recall for precision on garbled regions
//!
//! ## Timeouts
//!
//! Recognition is a blocking call. The child process is polled until the
//! configured deadline and killed if it has not finished; the timeout is
//! reported as [`PipelineError::OcrTimeout`], never swallowed.
//!
//! An empty but successful recognition is *not* an error here. Deciding what
//! to do about empty text is the orchestrator's job.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::encode::encode_png;
use crate::pipeline::preprocess::{NormalizedImage, PreprocessProfile};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Capability interface for the recognition stage.
pub trait TextRecognizer: Send + Sync {
    /// Recognise the text in `image`.
    ///
    /// # Errors
    /// [`PipelineError::Ocr`] on a hard engine failure,
    /// [`PipelineError::OcrTimeout`] when the engine exceeds its deadline.
    fn recognize(&self, image: &NormalizedImage) -> Result<String, PipelineError>;
}

/// Engine parameters, split out of [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSettings {
    pub binary: PathBuf,
    pub language: String,
    pub page_seg_mode: u8,
    pub char_whitelist: String,
    pub preserve_interword_spaces: bool,
    pub timeout: Duration,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for OcrSettings {
    fn from(c: &PipelineConfig) -> Self {
        Self {
            binary: c.tesseract_path.clone(),
            language: c.language.clone(),
            page_seg_mode: c.page_seg_mode,
            char_whitelist: c.char_whitelist.clone(),
            preserve_interword_spaces: c.preserve_interword_spaces,
            timeout: Duration::from_secs(c.ocr_timeout_secs),
        }
    }
}

impl OcrSettings {
    /// Command-line arguments for one recognition call.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--psm".to_string(),
            self.page_seg_mode.to_string(),
            "-c".to_string(),
            format!(
                "preserve_interword_spaces={}",
                u8::from(self.preserve_interword_spaces)
            ),
        ];
        if !self.char_whitelist.is_empty() {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", self.char_whitelist));
        }
        args
    }
}

/// Recogniser backed by the `tesseract` command-line tool.
#[derive(Debug, Clone, Default)]
pub struct TesseractRecognizer {
    settings: OcrSettings,
}

impl TesseractRecognizer {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(OcrSettings::from(config))
    }

    pub fn settings(&self) -> &OcrSettings {
        &self.settings
    }

    /// Check that the engine binary can be launched; returns its version banner.
    pub fn probe(&self) -> Result<String, PipelineError> {
        let output = Command::new(&self.settings.binary)
            .arg("--version")
            .output()
            .map_err(|e| PipelineError::Ocr {
                profile: PreprocessProfile::Enhanced,
                detail: format!(
                    "cannot launch '{}': {e}",
                    self.settings.binary.display()
                ),
            })?;
        // Older releases print the banner on stderr.
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &NormalizedImage) -> Result<String, PipelineError> {
        let profile = image.profile();
        let ocr_err = |detail: String| PipelineError::Ocr { profile, detail };

        let png = encode_png(image).map_err(|e| ocr_err(format!("PNG encoding failed: {e}")))?;
        let start = Instant::now();

        let mut child = Command::new(&self.settings.binary)
            .args(self.settings.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ocr_err(format!(
                    "cannot launch '{}': {e}",
                    self.settings.binary.display()
                ))
            })?;

        // Feed stdin and drain both output pipes on helper threads so a chatty
        // engine can never block on a full pipe while we poll for exit.
        let stdin = child.stdin.take();
        let writer = thread::spawn(move || match stdin {
            Some(mut pipe) => pipe.write_all(&png),
            None => Ok(()),
        });
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        // Helper threads finish once the pipes close; on the abort paths they
        // are not joined in case the engine left a grandchild holding them open.
        let status = match wait_with_deadline(&mut child, self.settings.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(
                    "OCR engine exceeded {:?} on {} image, killing it",
                    self.settings.timeout, profile
                );
                kill_and_reap(&mut child);
                drop((writer, stdout_reader, stderr_reader));
                return Err(PipelineError::OcrTimeout {
                    profile,
                    secs: self.settings.timeout.as_secs().max(1),
                });
            }
            Err(e) => {
                kill_and_reap(&mut child);
                drop((writer, stdout_reader, stderr_reader));
                return Err(ocr_err(format!("waiting for engine failed: {e}")));
            }
        };

        let write_result = writer
            .join()
            .map_err(|_| ocr_err("stdin writer panicked".into()))?;
        let stdout = join_output(stdout_reader).map_err(|e| ocr_err(format!("reading stdout: {e}")))?;
        let stderr = join_output(stderr_reader).unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(ocr_err(format!("engine exited with {status}: {}", stderr.trim())));
        }
        if let Err(e) = write_result {
            // The engine may legitimately stop reading once it has decoded the image.
            debug!("Engine closed stdin early: {}", e);
        }

        let text = String::from_utf8_lossy(&stdout).into_owned();
        debug!(
            "OCR ({} profile) → {} chars in {}ms",
            profile,
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            p.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_output(handle: thread::JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| io::Error::other("output reader panicked"))?
}

/// Stop the engine and collect its exit status so no zombie is left behind.
fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Killing engine failed: {}", e);
    }
    let _ = child.wait();
}

/// Poll `child` until it exits or `timeout` elapses; `Ok(None)` means timed out.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
