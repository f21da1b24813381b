//! Tesseract engine adapter.
//!
//! Drives the `tesseract` command-line tool. Each call writes the bitmap to a temp
//! PNG and asks for TSV output so word confidences come back with the text.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use super::backend::{OcrEngine, OcrError, OcrSession, Recognition, ResourcePaths};
use super::check_binary;
use crate::models::Bitmap;
use crate::presets::{EngineParams, Languages, SegmentationMode};

/// Tesseract via its CLI.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    resources: ResourcePaths,
}

impl TesseractEngine {
    /// Use `tesseract` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            resources: ResourcePaths::default(),
        }
    }

    pub fn with_binary(mut self, binary: PathBuf) -> Self {
        self.binary = binary;
        self
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        self.resources.data_dir = data_dir;
        self
    }

    pub fn resources(&self) -> &ResourcePaths {
        &self.resources
    }

    /// Languages the installed tesseract has data for.
    pub async fn installed_languages(&self) -> Result<Vec<String>, OcrError> {
        let mut cmd = Command::new(&self.binary);
        if let Some(dir) = &self.resources.data_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        let output = cmd
            .arg("--list-langs")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(e, &self.binary))?;

        if !output.status.success() {
            return Err(OcrError::EngineInit(format!(
                "tesseract --list-langs failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // Older versions print the list on stderr.
        let listing = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        Ok(parse_language_list(&listing))
    }

    async fn run(
        &self,
        bitmap: &Bitmap,
        languages: Languages,
        mode: SegmentationMode,
        params: Option<&EngineParams>,
        data_dir: Option<&Path>,
    ) -> Result<Recognition, OcrError> {
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("page.png");

        let owned = bitmap.clone();
        let save_path = image_path.clone();
        tokio::task::spawn_blocking(move || owned.save(save_path))
            .await
            .map_err(|e| OcrError::RecognitionFailed(format!("image encoder panicked: {}", e)))??;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(&image_path)
            .arg("stdout")
            .args(["-l", languages.code()])
            .args(["--psm", &mode.to_string()]);
        if let Some(dir) = data_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        if let Some(params) = params {
            cmd.args(["--oem", &params.oem.to_string()])
                .args(["--dpi", &params.dpi.to_string()])
                .arg("-c")
                .arg(format!(
                    "preserve_interword_spaces={}",
                    u8::from(params.preserve_interword_spaces)
                ));
            if !params.dictionaries {
                cmd.args(["-c", "load_system_dawg=0", "-c", "load_freq_dawg=0"]);
            }
        }
        cmd.arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("running {:?}", cmd.as_std());
        let output = cmd
            .output()
            .await
            .map_err(|e| spawn_error(e, &self.binary))?;

        if !output.status.success() {
            return Err(OcrError::RecognitionFailed(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_error(e: std::io::Error, binary: &Path) -> OcrError {
    if e.kind() == std::io::ErrorKind::NotFound {
        OcrError::EngineUnavailable(format!(
            "{} not found (install tesseract-ocr)",
            binary.display()
        ))
    } else {
        OcrError::Io(e)
    }
}

/// Parse `tesseract --list-langs` output.
fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

/// Rebuild text and mean word confidence from TSV output.
///
/// Words on the same line are joined by spaces, lines by newlines, and a change of
/// block or paragraph inserts a blank line.
pub fn parse_tsv(tsv: &str) -> Recognition {
    let mut text = String::new();
    let mut confidences: Vec<f32> = Vec::new();
    let mut last_paragraph: Option<(u32, u32)> = None;
    let mut last_line: Option<(u32, u32, u32)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }
        let block: u32 = cols[2].parse().unwrap_or(0);
        let paragraph: u32 = cols[3].parse().unwrap_or(0);
        let line: u32 = cols[4].parse().unwrap_or(0);

        let para_key = (block, paragraph);
        let line_key = (block, paragraph, line);
        match (last_paragraph, last_line) {
            (None, _) => {}
            (Some(p), _) if p != para_key => text.push_str("\n\n"),
            (_, Some(l)) if l != line_key => text.push('\n'),
            _ => text.push(' '),
        }
        text.push_str(word);
        last_paragraph = Some(para_key);
        last_line = Some(line_key);

        if let Ok(conf) = cols[10].parse::<f32>() {
            if conf >= 0.0 {
                confidences.push(conf);
            }
        }
    }

    let confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
    };

    Recognition { text, confidence }
}

/// A configured tesseract invocation template.
struct TesseractSession {
    engine: TesseractEngine,
    languages: Languages,
    mode: SegmentationMode,
    params: EngineParams,
}

#[async_trait]
impl OcrSession for TesseractSession {
    async fn configure(
        &mut self,
        mode: SegmentationMode,
        params: &EngineParams,
    ) -> Result<(), OcrError> {
        self.mode = mode;
        self.params = *params;
        Ok(())
    }

    async fn recognize(&mut self, bitmap: &Bitmap) -> Result<Recognition, OcrError> {
        let data_dir = self.engine.resources.data_dir.clone();
        self.engine
            .run(
                bitmap,
                self.languages,
                self.mode,
                Some(&self.params),
                data_dir.as_deref(),
            )
            .await
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        if self.binary.components().count() > 1 {
            self.binary.is_file()
        } else {
            check_binary(&self.binary.to_string_lossy())
        }
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            "Tesseract is available".to_string()
        } else {
            "Tesseract not installed. Install with: apt install tesseract-ocr tesseract-ocr-tha"
                .to_string()
        }
    }

    async fn initialize(&self, languages: Languages) -> Result<Box<dyn OcrSession>, OcrError> {
        let installed = self.installed_languages().await?;
        let missing: Vec<&str> = languages
            .codes()
            .iter()
            .copied()
            .filter(|code| !installed.iter().any(|l| l == code))
            .collect();
        if !missing.is_empty() {
            return Err(OcrError::EngineInit(format!(
                "missing language data: {}",
                missing.join(", ")
            )));
        }

        Ok(Box::new(TesseractSession {
            engine: self.clone(),
            languages,
            mode: SegmentationMode::AUTO,
            params: EngineParams::default(),
        }))
    }

    async fn recognize_once(
        &self,
        bitmap: &Bitmap,
        languages: Languages,
        resources: &ResourcePaths,
    ) -> Result<Recognition, OcrError> {
        let data_dir = resources
            .data_dir
            .as_deref()
            .or(self.resources.data_dir.as_deref());
        self.run(bitmap, languages, SegmentationMode::AUTO, None, data_dir)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word(block: u32, par: u32, line: u32, n: u32, conf: &str, text: &str) -> String {
        format!(
            "5\t1\t{}\t{}\t{}\t{}\t0\t0\t10\t10\t{}\t{}",
            block, par, line, n, conf, text
        )
    }

    #[test]
    fn test_parse_tsv_layout_and_confidence() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t".to_string(),
            word(1, 1, 1, 1, "90", "Hello"),
            word(1, 1, 1, 2, "80", "world"),
            word(1, 1, 2, 1, "70", "next"),
            word(2, 1, 1, 1, "60", "para"),
            word(2, 1, 1, 2, "-1", " "),
        ]
        .join("\n");

        let rec = parse_tsv(&tsv);
        assert_eq!(rec.text, "Hello world\nnext\n\npara");
        assert_eq!(rec.confidence, Some(75.0));
        assert!(rec.is_usable());
    }

    #[test]
    fn test_parse_tsv_empty() {
        let rec = parse_tsv(HEADER);
        assert_eq!(rec.text, "");
        assert_eq!(rec.confidence, None);
        assert!(!rec.is_usable());
    }

    #[test]
    fn test_parse_language_list() {
        let listing = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nosd\ntha\n";
        assert_eq!(parse_language_list(listing), vec!["eng", "osd", "tha"]);
    }
}
