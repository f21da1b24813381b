//! Reflow command: re-wrap existing text without recognition.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::presets::Languages;
use crate::text::{postprocess, TextOptions};

/// Options for a standalone reflow. Word spacing is left off so only layout changes.
pub fn reflow_options(
    settings: &Settings,
    width: Option<usize>,
    locale_fix: bool,
) -> TextOptions {
    TextOptions {
        locale_fix,
        word_spaces: false,
        auto_wrap: true,
        wrap_width: width.unwrap_or(settings.text.wrap_width),
    }
}

pub async fn cmd_reflow(
    settings: &Settings,
    file: &Path,
    width: Option<usize>,
    languages: Option<Languages>,
    locale_fix: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file).await?;
    let options = reflow_options(settings, width, locale_fix);
    let languages = languages.unwrap_or(settings.preset.preset().defaults.languages);
    let reflowed = postprocess(&text, languages, &options);

    match output {
        Some(path) => {
            tokio::fs::write(path, &reflowed).await?;
            eprintln!(
                "{} Reflowed {} to {} columns -> {}",
                style("✓").green(),
                file.display(),
                options.wrap_width(),
                path.display()
            );
        }
        None => println!("{}", reflowed),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reflow_file_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        let words = vec!["word"; 30].join(" ");
        std::fs::write(&input, &words).unwrap();

        cmd_reflow(
            &Settings::default(),
            &input,
            Some(20),
            Some(Languages::English),
            false,
            Some(&output),
        )
        .await
        .unwrap();

        let result = std::fs::read_to_string(&output).unwrap();
        assert!(result.lines().count() > 1);
        assert!(result.lines().all(|line| line.chars().count() <= 20));
    }

    #[test]
    fn test_reflow_options_clamp_width() {
        let options = reflow_options(&Settings::default(), Some(5), true);
        assert_eq!(options.wrap_width(), 20);
        assert!(options.locale_fix);
        assert!(!options.word_spaces);
    }
}
