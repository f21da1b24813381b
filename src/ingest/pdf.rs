//! Paged sources via poppler's command-line tools.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use super::password::{PasswordPrompt, PasswordReason};
use super::IngestError;

/// An opened PDF plus the password that unlocks it, if any.
#[derive(Debug, Clone)]
pub struct PdfSource {
    path: PathBuf,
    password: Option<String>,
    tool_dir: Option<PathBuf>,
}

impl PdfSource {
    pub fn new(path: &Path, password: Option<String>, tool_dir: Option<PathBuf>) -> Self {
        Self {
            path: path.to_path_buf(),
            password,
            tool_dir,
        }
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn command(&self, tool: &str) -> Command {
        let program = match &self.tool_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        };
        let mut cmd = Command::new(program);
        if let Some(password) = &self.password {
            cmd.arg("-upw").arg(password);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn output(&self, mut cmd: Command, tool: &str) -> Result<Vec<u8>, IngestError> {
        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::ToolNotFound(format!(
                    "{} (install poppler-utils)",
                    tool
                )))
            }
            Err(e) => return Err(IngestError::Io(e)),
        };

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Incorrect password") {
            return Err(if self.password.is_some() {
                IngestError::PasswordIncorrect(self.name())
            } else {
                IngestError::PasswordRequired(self.name())
            });
        }
        Err(IngestError::ToolFailed(format!(
            "{} failed on {}: {}",
            tool,
            self.name(),
            stderr.trim()
        )))
    }

    /// Number of pages, read from `pdfinfo`.
    pub async fn page_count(&self) -> Result<u32, IngestError> {
        let mut cmd = self.command("pdfinfo");
        cmd.arg(&self.path);
        let stdout = self.output(cmd, "pdfinfo").await?;
        parse_page_count(&String::from_utf8_lossy(&stdout)).ok_or_else(|| {
            IngestError::ToolFailed(format!("pdfinfo reported no page count for {}", self.name()))
        })
    }

    /// Embedded text layer of one page.
    pub async fn extract_text(&self, page: u32) -> Result<String, IngestError> {
        let page_str = page.to_string();
        let mut cmd = self.command("pdftotext");
        cmd.args(["-layout", "-enc", "UTF-8", "-f", &page_str, "-l", &page_str])
            .arg(&self.path)
            .arg("-");
        let stdout = self.output(cmd, "pdftotext").await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    /// Rasterize one page to PNG bytes at `scale` times 72 dpi.
    pub async fn render(&self, page: u32, scale: f32) -> Result<Vec<u8>, IngestError> {
        let temp_dir = TempDir::new()?;
        let prefix = temp_dir.path().join("page");
        let page_str = page.to_string();
        let dpi = ((72.0 * scale).round() as u32).max(36).to_string();

        let mut cmd = self.command("pdftoppm");
        cmd.args(["-png", "-r", &dpi, "-f", &page_str, "-l", &page_str, "-singlefile"])
            .arg(&self.path)
            .arg(&prefix);
        debug!("rendering page {} of {} at {} dpi", page, self.name(), dpi);
        self.output(cmd, "pdftoppm").await?;

        let png = prefix.with_extension("png");
        Ok(tokio::fs::read(&png).await?)
    }
}

fn parse_page_count(info: &str) -> Option<u32> {
    info.lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|n| n.parse().ok())
}

/// Open a PDF, asking `prompt` for a password until one works or the prompt gives up.
pub async fn open_pdf(
    path: &Path,
    initial_password: Option<String>,
    prompt: &dyn PasswordPrompt,
    tool_dir: Option<PathBuf>,
) -> Result<(PdfSource, u32), IngestError> {
    let mut password = initial_password;
    loop {
        let source = PdfSource::new(path, password.take(), tool_dir.clone());
        let reason = match source.page_count().await {
            Ok(count) => return Ok((source, count)),
            Err(IngestError::PasswordRequired(_)) => PasswordReason::Required,
            Err(IngestError::PasswordIncorrect(_)) => PasswordReason::Incorrect,
            Err(e) => return Err(e),
        };
        match prompt.request(&source.name(), reason).await {
            Some(next) => password = Some(next),
            None => return Err(IngestError::Cancelled(source.name())),
        }
    }
}
