//! Text reflow and post-processing.
//!
//! Applied to recognized text in a fixed order: locale cleanup, optional word
//! spacing, then readable wrapping.

mod cleanup;
mod wrap;

pub use cleanup::{clean_thai, collapse_excess_blank_lines, is_thai, segment_words, space_words};
pub use wrap::{break_into_lines, collapse_blank_lines, format_readable};

use serde::{Deserialize, Serialize};

use crate::presets::Languages;

pub const DEFAULT_WRAP_WIDTH: usize = 60;
pub const MIN_WRAP_WIDTH: usize = 20;
pub const MAX_WRAP_WIDTH: usize = 200;

/// Post-processing switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    /// Clean up spacing artifacts in Thai output.
    pub locale_fix: bool,
    /// Insert spaces between segmented words.
    pub word_spaces: bool,
    pub auto_wrap: bool,
    pub wrap_width: usize,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            locale_fix: true,
            word_spaces: false,
            auto_wrap: true,
            wrap_width: DEFAULT_WRAP_WIDTH,
        }
    }
}

impl TextOptions {
    pub fn wrap_width(&self) -> usize {
        self.wrap_width.clamp(MIN_WRAP_WIDTH, MAX_WRAP_WIDTH)
    }
}

/// Run the post-processing chain for text recognized in `languages`.
pub fn postprocess(text: &str, languages: Languages, options: &TextOptions) -> String {
    let mut out = text.to_string();
    if languages.includes_thai() && options.locale_fix {
        out = clean_thai(&out);
    }
    if languages.includes_thai() && options.word_spaces {
        out = space_words(&out);
    }
    if options.auto_wrap {
        out = format_readable(&out, options.wrap_width(), languages);
    }
    out
}

/// Normalize text from an embedded text layer: collapse 3+ newlines and trim.
pub fn normalize_extracted(text: &str) -> String {
    collapse_excess_blank_lines(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postprocess_english_only_skips_thai_cleanup() {
        let options = TextOptions {
            auto_wrap: false,
            ..TextOptions::default()
        };
        assert_eq!(postprocess("a   b", Languages::English, &options), "a   b");
    }

    #[test]
    fn test_postprocess_wraps() {
        let options = TextOptions {
            wrap_width: 20,
            ..TextOptions::default()
        };
        let out = postprocess(
            "the quick brown fox jumps over the lazy dog",
            Languages::English,
            &options,
        );
        assert!(out.lines().all(|l| l.chars().count() <= 20));
        assert!(out.lines().count() >= 3);
    }

    #[test]
    fn test_wrap_width_clamped() {
        let options = TextOptions {
            wrap_width: 5,
            ..TextOptions::default()
        };
        assert_eq!(options.wrap_width(), MIN_WRAP_WIDTH);
    }

    #[test]
    fn test_normalize_extracted() {
        assert_eq!(normalize_extracted("\n\nA\n\n\n\nB\n"), "A\n\nB");
    }
}
