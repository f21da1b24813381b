//! Tool availability check.

use console::style;

use crate::config::Settings;
use crate::ocr::{check_tools, OcrEngine};
use crate::presets::Languages;

use super::super::helpers::engine_from_settings;

/// Print which external tools and language packs are installed.
pub async fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    println!("\n{}", style("OCR Tool Status").bold());
    println!("{}", "-".repeat(50));

    let tools = check_tools();
    println!("\n{}", style("Tools:").cyan());
    let mut all_found = true;
    for (tool, available) in &tools {
        let status = if *available {
            style("✓ found").green()
        } else {
            all_found = false;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    let engine = engine_from_settings(settings);

    println!("\n{}", style("Language Data:").cyan());
    if engine.is_available() {
        match engine.installed_languages().await {
            Ok(installed) => {
                for code in Languages::ThaiEnglish.codes() {
                    let status = if installed.iter().any(|l| l == code) {
                        style("✓ installed").green()
                    } else {
                        all_found = false;
                        style("✗ missing").red()
                    };
                    println!("  {:<15} {}", code, status);
                }
            }
            Err(e) => {
                all_found = false;
                println!("  {} {}", style("✗").red(), e);
            }
        }
    } else {
        println!("  {}", style(engine.availability_hint()).dim());
    }

    if let Some(path) = &settings.source_path {
        println!("\n{}", style("Config:").cyan());
        println!("  {}", path.display());
    }

    println!();
    if all_found {
        println!("{} All OCR tools are available", style("✓").green());
    } else {
        println!(
            "{} Some tools are missing. Install them for full OCR support:",
            style("!").yellow()
        );
        println!("  - pdftotext, pdftoppm, pdfinfo: poppler-utils package");
        println!("  - tesseract: tesseract-ocr package");
        println!("  - tha, eng: tesseract-ocr-tha and tesseract-ocr-eng language packs");
    }

    Ok(())
}
