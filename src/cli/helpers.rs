//! Shared helper functions for CLI commands.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::ingest::{PasswordPrompt, PasswordReason};
use crate::ocr::TesseractEngine;
use crate::work_queue::SkipToken;

/// Overall progress bar in the house style.
pub fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let progress = ProgressBar::new(len);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    progress.set_message(message);
    progress
}

/// Tesseract engine located from settings, or from PATH.
pub fn engine_from_settings(settings: &Settings) -> TesseractEngine {
    let mut engine = TesseractEngine::new().with_data_dir(settings.tessdata_dir());
    if let Some(binary) = settings.tesseract_binary() {
        engine = engine.with_binary(binary);
    }
    engine
}

/// Truncate a string to at most `max_chars` characters, adding an ellipsis.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Whether a person is at the terminal to answer prompts and press keys.
pub fn is_interactive() -> bool {
    console::user_attended() && Term::stdout().is_term()
}

/// Where to write results. A directory gets a timestamped file name.
pub fn output_path(requested: &Path, extension: &str) -> PathBuf {
    if requested.is_dir() {
        requested.join(default_output_name(extension))
    } else {
        requested.to_path_buf()
    }
}

pub fn default_output_name(extension: &str) -> String {
    format!("ocr_all-{}.{}", Local::now().format("%Y%m%d-%H%M%S"), extension)
}

/// File name for one page's text when splitting results per page.
pub fn page_file_name(document: &str, page: usize) -> String {
    let stem = Path::new(document)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| document.to_string());
    format!("{}-page-{}.txt", stem, page)
}

/// Asks for document passwords on the controlling terminal.
pub struct TermPasswordPrompt;

#[async_trait]
impl PasswordPrompt for TermPasswordPrompt {
    async fn request(&self, document: &str, reason: PasswordReason) -> Option<String> {
        let prompt = match reason {
            PasswordReason::Required => {
                format!("{} {} is encrypted. Password (empty to cancel): ", style("?").cyan(), document)
            }
            PasswordReason::Incorrect => format!(
                "{} Incorrect password for {}. Try again (empty to cancel): ",
                style("✗").red(),
                document
            ),
        };

        let entered = tokio::task::spawn_blocking(move || {
            let term = Term::stderr();
            term.write_str(&prompt).ok()?;
            term.read_secure_line().ok()
        })
        .await
        .ok()
        .flatten()?;

        if entered.is_empty() {
            None
        } else {
            Some(entered)
        }
    }
}

/// Raise `skip` whenever the user types `s` and Enter.
///
/// Runs on a detached thread so a pending read never holds up shutdown.
pub fn spawn_skip_listener(skip: SkipToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("s") {
                skip.request();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer name.pdf", 10), "a much ...");
        assert_eq!(truncate("ภาษาไทยยาวมาก", 6), "ภาษ...");
    }

    #[test]
    fn test_page_file_name() {
        assert_eq!(page_file_name("report.pdf", 3), "report-page-3.txt");
        assert_eq!(page_file_name("noext", 1), "noext-page-1.txt");
    }

    #[test]
    fn test_output_path_for_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "json");
        assert_eq!(path.parent(), Some(dir.path()));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ocr_all-"));
        assert!(name.ends_with(".json"));

        let file = dir.path().join("out.txt");
        assert_eq!(output_path(&file, "txt"), file);
    }
}
