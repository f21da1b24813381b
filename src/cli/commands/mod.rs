//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod presets;
mod reflow;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

use run::RunArgs;

#[derive(Parser)]
#[command(name = "ocrflow")]
#[command(about = "Adaptive OCR for scanned documents and images")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize text in images and PDFs
    Run(RunArgs),

    /// Re-wrap an existing text file for reading
    Reflow {
        /// Text file to reflow
        file: PathBuf,
        /// Maximum line width (20-200)
        #[arg(short, long)]
        width: Option<usize>,
        /// Language set the text is in (tha, eng, tha+eng)
        #[arg(short, long)]
        languages: Option<crate::presets::Languages>,
        /// Clean up Thai spacing artifacts before wrapping
        #[arg(long)]
        locale_fix: bool,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available presets
    Presets,

    /// Check OCR and PDF tool availability
    Check,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(path).await?,
        None => Settings::load().await,
    };
    if let Some(path) = &settings.source_path {
        tracing::info!("using config {}", path.display());
    }

    match cli.command {
        Commands::Run(args) => run::cmd_run(&settings, args).await,
        Commands::Reflow {
            file,
            width,
            languages,
            locale_fix,
            output,
        } => {
            reflow::cmd_reflow(
                &settings,
                &file,
                width,
                languages,
                locale_fix,
                output.as_deref(),
            )
            .await
        }
        Commands::Presets => presets::cmd_presets(),
        Commands::Check => check::cmd_check(&settings).await,
    }
}
