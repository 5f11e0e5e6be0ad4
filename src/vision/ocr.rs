//! Text recognition over captured screen regions.
//!
//! [`TextRecognizer`] is the contract the decision engine consumes; the
//! shipped implementation shells out to a Tesseract executable with TSV
//! output so per-word confidences survive into the result. Recognition
//! always crops to the requested region first, both to bound cost and to
//! keep surrounding UI chrome from polluting the read. The subprocess wait
//! is bounded: a wedged tesseract is killed at the deadline and reported as
//! an ordinary recognition error, so the caller's retry policy stays in
//! charge.

use anyhow::{anyhow, bail, Context, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::capture::Frame;
use crate::config::RelativeRect;
use crate::vision::preprocess::{crop_region, threshold_bright_pixels, GrayImage};

/// Recognized text with a confidence estimate.
#[derive(Clone, Debug, PartialEq)]
pub struct Recognized {
    pub text: String,
    /// Mean word confidence in [0, 1].
    pub confidence: f32,
    /// Whether confidence reached the configured reliability threshold.
    /// Unreliable text is propagated as-is, never coerced to an empty
    /// string as if it had been confidently read.
    pub reliable: bool,
}

/// Recognizes text within a region of a frame.
pub trait TextRecognizer {
    fn recognize(&self, frame: &Frame, region: &RelativeRect) -> Result<Recognized>;
}

/// Granularity at which the subprocess wait re-checks its deadline.
const WAIT_SLICE: Duration = Duration::from_millis(25);

/// Tesseract-backed recognizer.
///
/// Language, thresholds, and the subprocess deadline are fixed at
/// construction time, not inferred per call.
pub struct TesseractRecognizer {
    executable: PathBuf,
    language: String,
    /// Binarization threshold for isolating bright UI text.
    bright_threshold: u8,
    /// Reliability cutoff applied to the mean word confidence.
    confidence_threshold: f32,
    /// Deadline for one tesseract invocation.
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn new(
        executable: PathBuf,
        language: &str,
        confidence_threshold: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            executable,
            language: language.to_string(),
            bright_threshold: 190,
            confidence_threshold,
            timeout,
        }
    }

    /// Runs Tesseract on the preprocessed crop and parses its TSV output.
    fn run_tesseract(&self, img: &GrayImage) -> Result<String> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut child = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("6") // Assume single uniform block of text
            .arg("tsv")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run {}", self.executable.display()))?;

        let status = wait_bounded(&mut child, self.timeout)?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("failed to read tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);
        Ok(tsv)
    }
}

/// Waits for a child process in short slices, killing it once the deadline
/// passes. The error for an overrun child is ordinary and retryable; the
/// wait itself can never hang the calling iteration.
fn wait_bounded(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            let _ = child.kill();
            let _ = child.wait();
            bail!("tesseract did not finish within {:?}", timeout);
        }
        thread::sleep(remaining.min(WAIT_SLICE));
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, frame: &Frame, region: &RelativeRect) -> Result<Recognized> {
        let cropped = crop_region(frame, region);
        let binary = threshold_bright_pixels(&cropped, self.bright_threshold);
        let tsv = self.run_tesseract(&binary)?;
        let (text, confidence) = parse_tsv(&tsv);
        Ok(Recognized {
            reliable: confidence >= self.confidence_threshold,
            text,
            confidence,
        })
    }
}

/// Parses Tesseract TSV output into joined text plus mean word confidence.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Level 5 rows are words; their conf
/// column is 0-100, scaled here to [0, 1].
fn parse_tsv(tsv: &str) -> (String, f32) {
    let mut words: Vec<String> = Vec::new();
    let mut conf_sum = 0.0f32;

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        words.push(text.to_string());
        conf_sum += conf;
    }

    if words.is_empty() {
        return (String::new(), 0.0);
    }

    let confidence = conf_sum / words.len() as f32 / 100.0;
    (words.join(" "), confidence)
}
