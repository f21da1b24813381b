//! Cleanup for scripts written without inter-word spaces.
//!
//! Recognizers tend to emit spaces between glyph clusters of Thai text, and in
//! particular right after combining vowels and tone marks. This module undoes that.

use std::sync::LazyLock;

use icu_segmenter::WordSegmenter;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static EXCESS_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACE_BEFORE_CLOSING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.;:!?)\]])").unwrap());

/// Thai block, U+0E00 to U+0E7F.
pub fn is_thai(c: char) -> bool {
    ('\u{0E00}'..='\u{0E7F}').contains(&c)
}

fn is_inline_space(c: char) -> bool {
    c.is_whitespace() && c != '\n' && c != '\r'
}

/// Drop runs of spaces that sit between two Thai characters, combining vowels and
/// tone marks included. Line breaks are kept.
fn drop_injected_spaces(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !is_inline_space(c) {
            out.push(c);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && is_inline_space(chars[i]) {
            i += 1;
        }
        let prev = out.chars().next_back();
        let next = chars.get(i).copied();
        if !(prev.is_some_and(is_thai) && next.is_some_and(is_thai)) {
            out.extend(&chars[start..i]);
        }
    }

    out
}

/// Collapse 3+ newlines to a single blank line and trim the ends.
pub fn collapse_excess_blank_lines(text: &str) -> String {
    EXCESS_BLANK_LINES.replace_all(text, "\n\n").trim().to_string()
}

/// Canonical composition, injected-space removal, line trimming and blank-line
/// collapsing.
pub fn clean_thai(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let joined = drop_injected_spaces(&composed);
    let trimmed = joined
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    collapse_excess_blank_lines(&trimmed)
}

/// Split `text` at dictionary word boundaries. Whitespace comes back as its own
/// segments.
pub fn segment_words(text: &str) -> Vec<&str> {
    let segmenter = WordSegmenter::new_dictionary();
    let breaks: Vec<usize> = segmenter.segment_str(text).collect();
    breaks
        .windows(2)
        .map(|w| &text[w[0]..w[1]])
        .filter(|s| !s.is_empty())
        .collect()
}

/// Put single spaces between words, line by line, and pull closing punctuation
/// back onto the word before it.
pub fn space_words(text: &str) -> String {
    text.lines()
        .map(|line| {
            let spaced = segment_words(line)
                .into_iter()
                .filter(|tok| !tok.trim().is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            SPACE_BEFORE_CLOSING.replace_all(&spaced, "$1").into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_between_thai_removed() {
        assert_eq!(clean_thai("ภาษา ไทย"), "ภาษาไทย");
        assert_eq!(clean_thai("สวัส  ดี"), "สวัสดี");
    }

    #[test]
    fn test_space_after_combining_mark_before_thai_removed() {
        assert_eq!(clean_thai("ดี มาก"), "ดีมาก");
        assert_eq!(clean_thai("ก\u{0E31} น"), "ก\u{0E31}น");
    }

    #[test]
    fn test_space_after_combining_mark_before_other_script_kept() {
        assert_eq!(clean_thai("ดี OK"), "ดี OK");
        assert_eq!(clean_thai("ราคานี้ 100 บาท"), "ราคานี้ 100 บาท");
    }

    #[test]
    fn test_latin_spacing_kept() {
        assert_eq!(clean_thai("hello   world"), "hello   world");
        assert_eq!(clean_thai("ไทย abc"), "ไทย abc");
    }

    #[test]
    fn test_lines_trimmed_and_blank_lines_collapsed() {
        assert_eq!(clean_thai("  a  \n\n\n\n  b "), "a\n\nb");
    }

    #[test]
    fn test_newlines_between_thai_kept() {
        assert_eq!(clean_thai("ไทย\nไทย"), "ไทย\nไทย");
    }

    #[test]
    fn test_nfc_applied() {
        // e + combining acute composes to a single code point.
        assert_eq!(clean_thai("e\u{0301}"), "\u{00E9}");
    }

    #[test]
    fn test_segment_words_covers_input() {
        let text = "hello world, again";
        let joined: String = segment_words(text).concat();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_space_words_latin() {
        assert_eq!(space_words("hello   world ,ok"), "hello world, ok");
    }

    #[test]
    fn test_space_words_keeps_lines() {
        let spaced = space_words("one two\nthree");
        assert_eq!(spaced.lines().count(), 2);
    }
}
