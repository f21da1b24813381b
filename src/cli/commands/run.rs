//! Recognition command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::ProgressBar;
use tokio::sync::mpsc;

use crate::config::{Knob, PipelineConfig, Settings};
use crate::export::OutputFormat;
use crate::ingest::{Ingestor, NoPrompt, PasswordPrompt};
use crate::models::{Batch, Resolution};
use crate::ocr::{OcrEngine, ResourcePaths};
use crate::presets::{hardware_hint, Languages, PresetId};
use crate::services::{OcrService, Phase, ProgressEvent, RunSummary};
use crate::text::TextOptions;
use crate::work_queue::SkipToken;

use super::super::helpers::{
    engine_from_settings, is_interactive, output_path, page_file_name, progress_bar,
    spawn_skip_listener, truncate, TermPasswordPrompt,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Images or PDFs to recognize
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Preset: super-turbo, turbo (default), balanced, tables, accurate
    #[arg(short, long)]
    pub preset: Option<PresetId>,

    /// Languages: tha, eng or tha+eng
    #[arg(short, long)]
    pub languages: Option<Languages>,

    /// Page segmentation mode (3, 6, 7, 11 or 12)
    #[arg(long)]
    pub psm: Option<u8>,

    /// Convert to grayscale before recognition
    #[arg(long)]
    pub grayscale: Option<bool>,

    /// Binarize with an automatic threshold
    #[arg(long)]
    pub binarize: Option<bool>,

    /// Upscale factor (1.6-3.5)
    #[arg(long)]
    pub scale: Option<f32>,

    /// Contrast multiplier (0.8-1.6)
    #[arg(long)]
    pub contrast: Option<f32>,

    /// Unsharp-mask amount (0-1)
    #[arg(long)]
    pub sharpen: Option<f32>,

    /// Per-page timeout in seconds (20-300)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip Thai spacing cleanup
    #[arg(long)]
    pub no_locale_fix: bool,

    /// Insert spaces between segmented Thai words
    #[arg(long)]
    pub word_spaces: bool,

    /// Keep recognized line breaks instead of reflowing
    #[arg(long)]
    pub no_wrap: bool,

    /// Reflow width in characters (20-200)
    #[arg(long)]
    pub wrap_width: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write results to this file, or a timestamped file inside this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write each page's text to its own file in this directory
    #[arg(long)]
    pub split_pages: Option<PathBuf>,

    /// Password for encrypted PDFs
    #[arg(long, env = "OCRFLOW_PDF_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Override the detected CPU count used to size worker pools
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

impl RunArgs {
    /// Start from the chosen preset and apply each knob given on the command line.
    pub fn pipeline_config(&self, default_preset: PresetId) -> anyhow::Result<PipelineConfig> {
        let mut config = PipelineConfig::new(self.preset.unwrap_or(default_preset));

        let knobs = [
            self.languages.map(Knob::Languages),
            self.psm.map(Knob::Segmentation),
            self.grayscale.map(Knob::Grayscale),
            self.binarize.map(Knob::Binarize),
            self.scale.map(Knob::Scale),
            self.contrast.map(Knob::Contrast),
            self.sharpen.map(Knob::Sharpen),
            self.timeout
                .map(|secs| Knob::Timeout(Duration::from_secs(secs))),
        ];
        for knob in knobs.into_iter().flatten() {
            config.override_knob(knob)?;
        }
        Ok(config)
    }

    pub fn text_options(&self, base: TextOptions) -> TextOptions {
        TextOptions {
            locale_fix: base.locale_fix && !self.no_locale_fix,
            word_spaces: base.word_spaces || self.word_spaces,
            auto_wrap: base.auto_wrap && !self.no_wrap,
            wrap_width: self.wrap_width.unwrap_or(base.wrap_width),
        }
    }
}

/// Recognize the given files and write the results.
pub async fn cmd_run(settings: &Settings, args: RunArgs) -> anyhow::Result<()> {
    let config = args.pipeline_config(settings.preset)?;
    let text_options = args.text_options(settings.text);
    let format = args.format.unwrap_or(settings.output);
    let preset = config.preset();
    let hint = args.jobs.unwrap_or_else(hardware_hint).max(1);

    let engine = engine_from_settings(settings);
    if !engine.is_available() {
        eprintln!("{} Tesseract is not available", style("✗").red());
        eprintln!("  {}", style(engine.availability_hint()).dim());
        eprintln!();
        eprintln!("Install it, then run: ocrflow check");
        return Err(anyhow::anyhow!(
            "Missing required tools. Run 'ocrflow check' for install instructions."
        ));
    }
    let resources = ResourcePaths {
        data_dir: settings.tessdata_dir(),
    };

    eprintln!(
        "{} Preset {} ({}), languages {}",
        style("→").cyan(),
        style(config.selection()).bold(),
        preset.label,
        config.options.languages
    );

    let (event_tx, event_rx) = mpsc::channel::<ProgressEvent>(256);
    let event_handler = tokio::spawn(render_events(event_rx));
    let started = Instant::now();

    let interactive = is_interactive();
    let prompt: Box<dyn PasswordPrompt> = if interactive {
        Box::new(TermPasswordPrompt)
    } else {
        Box::new(NoPrompt)
    };
    let ingestor = Ingestor::new(preset.render_concurrency.limit(hint))
        .with_tool_dir(settings.poppler_dir())
        .with_password(args.password.clone())
        .with_events(event_tx.clone());
    let ingested = ingestor.ingest(&args.files, prompt.as_ref()).await;
    drop(ingestor);
    let documents = match ingested {
        Ok(documents) => documents,
        Err(e) => {
            drop(event_tx);
            let _ = event_handler.await;
            return Err(e.into());
        }
    };

    let mut batch = Batch::new(documents);
    let skip = SkipToken::new();
    if interactive {
        eprintln!(
            "{} Type {} and Enter to skip the current page",
            style("→").dim(),
            style("s").bold()
        );
        spawn_skip_listener(skip.clone());
    }

    let service = OcrService::new(Arc::new(engine))
        .with_resources(resources)
        .with_hardware_hint(hint);
    let summary = service
        .run(&mut batch, &config, &text_options, &skip, Some(event_tx.clone()))
        .await;
    drop(event_tx);
    let _ = event_handler.await;

    report(&batch, &summary, started.elapsed());

    let rendered = format.render(&batch.documents)?;
    match &args.output {
        Some(path) => {
            let path = output_path(path, format.extension());
            tokio::fs::write(&path, &rendered).await?;
            eprintln!("{} Wrote {}", style("✓").green(), path.display());
        }
        None => println!("{}", rendered),
    }

    if let Some(dir) = &args.split_pages {
        let written = write_page_files(&batch, dir).await?;
        eprintln!(
            "{} Wrote {} page file(s) to {}",
            style("✓").green(),
            written,
            dir.display()
        );
    }

    Ok(())
}

/// Render progress events until every sender is gone.
async fn render_events(mut event_rx: mpsc::Receiver<ProgressEvent>) {
    let mut pb: Option<ProgressBar> = None;
    let mut recognizing = false;

    while let Some(event) = event_rx.recv().await {
        let total = event.total_pages as u64;
        match event.phase {
            Phase::Rendering => {
                let progress = pb.get_or_insert_with(|| {
                    let bar = progress_bar(total, "Rendering...");
                    bar.enable_steady_tick(Duration::from_millis(120));
                    bar
                });
                progress.set_length(total);
                progress.set_position(event.page_index as u64);
                progress.set_message(format!(
                    "Rendering {} page {}",
                    truncate(&event.filename, 40),
                    event.page_index + 1
                ));
            }
            Phase::Recognizing | Phase::PageSettled => {
                if !recognizing {
                    if let Some(previous) = pb.take() {
                        previous.finish_and_clear();
                    }
                    let bar = progress_bar(total, "Running OCR...");
                    bar.enable_steady_tick(Duration::from_millis(120));
                    pb = Some(bar);
                    recognizing = true;
                }
                let Some(ref progress) = pb else { continue };
                if event.phase == Phase::PageSettled {
                    progress.inc(1);
                    progress.set_message(format!("{}% overall", event.overall_percent));
                } else {
                    progress.set_message(format!(
                        "{} p{} {} {}%",
                        truncate(&event.filename, 32),
                        event.page_index + 1,
                        event.sub_phase_label.as_deref().unwrap_or(""),
                        event.sub_phase_percent
                    ));
                }
            }
            Phase::Finished => {
                if let Some(progress) = pb.take() {
                    progress.finish_and_clear();
                }
            }
        }
    }

    if let Some(progress) = pb.take() {
        progress.finish_and_clear();
    }
}

fn report(batch: &Batch, summary: &RunSummary, elapsed: Duration) {
    for document in &batch.documents {
        for page in &document.pages {
            if let Some(Resolution::Failed(error)) = page.resolution() {
                eprintln!(
                    "  {} {} page {}: {}",
                    style("✗").red(),
                    document.name,
                    page.number,
                    error
                );
            }
        }
    }

    if summary.degraded {
        eprintln!(
            "  {} Engine session could not be created; pages used one-shot recognition",
            style("!").yellow()
        );
    }

    let mut msg = format!(
        "{} Recognized {} of {} pages in {:.1}s ({} from embedded text",
        style("✓").green(),
        summary.settled() - summary.failed,
        summary.total_pages,
        elapsed.as_secs_f64(),
        summary.pre_extracted
    );
    if summary.via_fallback > 0 {
        msg.push_str(&format!(", {} by fallback", summary.via_fallback));
    }
    msg.push(')');
    eprintln!("{}", msg);
    if summary.failed > 0 {
        eprintln!(
            "  {} {} pages failed ({} skipped, {} over budget, {} timed out)",
            style("!").yellow(),
            summary.failed,
            summary.skipped,
            summary.budget_exceeded,
            summary.timed_out
        );
    }
}

async fn write_page_files(batch: &Batch, dir: &Path) -> anyhow::Result<usize> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = 0;
    for document in &batch.documents {
        for (i, page) in document.pages.iter().enumerate() {
            let body = match (page.text.is_empty(), &page.error) {
                (false, _) => page.text.as_str(),
                (true, Some(error)) => error.as_str(),
                (true, None) => continue,
            };
            let path = dir.join(page_file_name(&document.name, i + 1));
            tokio::fs::write(&path, body).await?;
            written += 1;
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(argv: &[&str]) -> RunArgs {
        let mut full = vec!["ocrflow"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_preset_only_keeps_selection() {
        let config = parse(&["a.png", "-p", "tables"])
            .pipeline_config(PresetId::Balanced)
            .unwrap();
        assert_eq!(config.selection(), PresetId::Tables);
    }

    #[test]
    fn test_knob_flags_demote_to_custom() {
        let config = parse(&["a.png", "--contrast", "1.3", "--timeout", "60"])
            .pipeline_config(PresetId::Accurate)
            .unwrap();
        assert_eq!(config.selection(), PresetId::Custom);
        assert_eq!(config.preset().id, PresetId::Accurate);
        assert_eq!(config.options.contrast, 1.3);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_knob_is_an_error() {
        let result = parse(&["a.png", "--psm", "4"]).pipeline_config(PresetId::Balanced);
        assert!(result.is_err());
    }

    #[test]
    fn test_text_flags_override_settings() {
        let options = parse(&["a.png", "--no-wrap", "--word-spaces", "--wrap-width", "80"])
            .text_options(TextOptions::default());
        assert!(!options.auto_wrap);
        assert!(options.word_spaces);
        assert!(options.locale_fix);
        assert_eq!(options.wrap_width, 80);
    }
}
