//! Iterative line wrapping.
//!
//! Every loop here consumes input strictly forward; there is no recursion, so any
//! input length terminates.

use std::sync::LazyLock;

use regex::Regex;

use super::cleanup::{is_thai, segment_words};
use crate::presets::Languages;

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\n\s*").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-*•]|\d+\.)\s+").unwrap());

/// Lines shorter than this that start like a heading or label are left alone.
const SHORT_LINE_CHARS: usize = 8;

fn is_sentence_terminal(c: char) -> bool {
    matches!(
        c,
        '。' | '、' | '.' | '!' | '?' | '…' | '”' | '’' | ')' | ']' | '\u{0E2F}' | '\u{0E46}'
    )
}

fn is_soft_break(c: char) -> bool {
    matches!(c, ',' | ';' | ':') || is_sentence_terminal(c)
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn ends_sentence(token: &str) -> bool {
    token.trim_end().chars().next_back().is_some_and(is_sentence_terminal)
}

/// Byte offset just past the last soft-break character, ignoring the first char.
fn soft_break_cut(line: &str) -> Option<usize> {
    line.char_indices()
        .skip(1)
        .filter(|(_, c)| is_soft_break(*c))
        .last()
        .map(|(i, c)| i + c.len_utf8())
}

/// Split a token into chunks of at most `max` chars.
fn hard_split(token: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

fn tokenize(paragraph: &str, non_spaced: bool, max: usize) -> Vec<String> {
    let raw: Vec<&str> = if non_spaced {
        segment_words(paragraph)
    } else {
        paragraph.split(' ').filter(|t| !t.is_empty()).collect()
    };
    let mut tokens = Vec::with_capacity(raw.len());
    for token in raw {
        if width(token) > max {
            tokens.extend(hard_split(token, max));
        } else {
            tokens.push(token.to_string());
        }
    }
    tokens
}

fn joined(line: &str, joiner: &str, token: &str) -> String {
    if line.is_empty() {
        token.to_string()
    } else {
        format!("{}{}{}", line, joiner, token)
    }
}

fn push_line(lines: &mut Vec<String>, line: &mut String) {
    let trimmed = line.trim();
    if !trimmed.is_empty() {
        lines.push(trimmed.to_string());
    }
    line.clear();
}

/// Collapse runs of blank lines to one and trim the document.
pub fn collapse_blank_lines(lines: &[String]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut blank = false;
    for line in lines {
        if line.trim().is_empty() {
            if !blank {
                out.push("");
                blank = true;
            }
        } else {
            out.push(line);
            blank = false;
        }
    }
    out.join("\n").trim().to_string()
}

/// Greedy wrap of `text` at `max_width` chars.
///
/// Paragraphs are split at blank lines and flattened. `non_spaced` selects dictionary
/// segmentation and an empty joiner, for scripts without spaces between words.
pub fn break_into_lines(text: &str, max_width: usize, non_spaced: bool) -> String {
    let max = max_width.max(1);
    let flush_at = 24f64.min(0.4 * max as f64);
    let joiner = if non_spaced { "" } else { " " };
    let mut lines: Vec<String> = Vec::new();

    for paragraph in PARAGRAPH_BREAK.split(text) {
        let flat = LINE_BREAK.replace_all(paragraph, " ");
        let flat = MULTI_SPACE.replace_all(&flat, " ");
        let flat = flat.trim();
        if flat.is_empty() {
            continue;
        }

        let mut line = String::new();
        for token in tokenize(flat, non_spaced, max) {
            let candidate = joined(&line, joiner, &token);
            if width(&candidate) <= max {
                line = candidate;
                if ends_sentence(&token) && width(line.trim()) as f64 >= flush_at {
                    push_line(&mut lines, &mut line);
                }
                continue;
            }

            match soft_break_cut(&line) {
                Some(cut) => {
                    let rest = line[cut..].trim().to_string();
                    line.truncate(cut);
                    push_line(&mut lines, &mut line);
                    let retry = joined(&rest, joiner, &token);
                    if width(&retry) <= max {
                        line = retry;
                    } else {
                        line = rest;
                        push_line(&mut lines, &mut line);
                        line = token;
                    }
                }
                None => {
                    push_line(&mut lines, &mut line);
                    line = token;
                }
            }
        }
        push_line(&mut lines, &mut line);
        lines.push(String::new());
    }

    collapse_blank_lines(&lines)
}

fn is_structural(line: &str) -> bool {
    if LIST_ITEM.is_match(line) {
        return true;
    }
    let starts_like_label = line
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '#' || c == '>');
    starts_like_label && width(line) < SHORT_LINE_CHARS
}

fn flush_paragraph(
    buffer: &mut Vec<&str>,
    preserved: &mut Vec<String>,
    max_width: usize,
    has_thai: bool,
    has_english: bool,
) {
    let paragraph = buffer.join("\n");
    let paragraph = paragraph.trim();
    if !paragraph.is_empty() {
        let non_spaced = has_thai && (!has_english || paragraph.chars().any(is_thai));
        preserved.push(break_into_lines(paragraph, max_width, non_spaced));
    }
    buffer.clear();
}

/// Reflow recognized text for reading.
///
/// List items and short heading-like lines pass through verbatim; other runs of
/// lines are wrapped as paragraphs. A paragraph is wrapped as non-spaced script when
/// Thai is expected and either English isn't, or the paragraph holds Thai.
pub fn format_readable(text: &str, max_width: usize, languages: Languages) -> String {
    let has_thai = languages.includes_thai();
    let has_english = languages.includes_english();

    let mut preserved: Vec<String> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if is_structural(line) {
            flush_paragraph(&mut buffer, &mut preserved, max_width, has_thai, has_english);
            preserved.push(line.trim().to_string());
        } else if line.trim().is_empty() {
            flush_paragraph(&mut buffer, &mut preserved, max_width, has_thai, has_english);
            preserved.push(String::new());
        } else {
            buffer.push(line);
        }
    }
    flush_paragraph(&mut buffer, &mut preserved, max_width, has_thai, has_english);

    collapse_blank_lines(&preserved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<&str> {
        s.lines().collect()
    }

    #[test]
    fn test_greedy_packing() {
        let out = break_into_lines("aaa bbb ccc ddd", 7, false);
        assert_eq!(lines(&out), vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn test_long_token_hard_split_without_recursion() {
        let token = "a".repeat(10_000);
        for max in [60usize, 7, 33, 1] {
            let out = break_into_lines(&token, max, false);
            let produced = lines(&out);
            assert_eq!(produced.len(), 10_000usize.div_ceil(max));
            assert!(produced.iter().all(|l| l.chars().count() <= max));
        }
    }

    #[test]
    fn test_never_exceeds_width() {
        let text = "Invoice 2024, items: pens; paper (A4), staples. Total due by Friday! \
                    Supercalifragilisticexpialidocious-words-that-go-on-and-on, then more.";
        for max in [10usize, 20, 35, 60] {
            let out = break_into_lines(text, max, false);
            for line in out.lines() {
                assert!(line.chars().count() <= max, "{:?} > {}", line, max);
            }
        }
    }

    #[test]
    fn test_sentence_end_flushes_early() {
        let text = "This sentence is long enough to flush. Next one";
        let out = break_into_lines(text, 60, false);
        assert_eq!(
            lines(&out),
            vec!["This sentence is long enough to flush.", "Next one"]
        );
    }

    #[test]
    fn test_sentence_flush_threshold_is_fractional() {
        // 0.4 * 33 = 13.2, so a 13-char sentence stays on the line.
        let out = break_into_lines("aaaa bbbb cc. dddd", 33, false);
        assert_eq!(out, "aaaa bbbb cc. dddd");
        // 0.4 * 30 = 12, so the same sentence flushes at width 30.
        let out = break_into_lines("aaaa bbbb cc. dddd", 30, false);
        assert_eq!(lines(&out), vec!["aaaa bbbb cc.", "dddd"]);
    }

    #[test]
    fn test_soft_break_carries_remainder() {
        // Overflow on "zz" splits after the comma and carries "bb" forward.
        let out = break_into_lines("aa, bb zz", 6, false);
        assert_eq!(lines(&out), vec!["aa,", "bb zz"]);
    }

    #[test]
    fn test_paragraphs_kept_separate() {
        let out = break_into_lines("one\ntwo\n\n\n\nthree", 60, false);
        assert_eq!(out, "one two\n\nthree");
    }

    #[test]
    fn test_thai_paragraph_wraps_within_width() {
        let text = "ภาษาไทยเป็นภาษาที่ไม่มีการเว้นวรรคระหว่างคำ ทำให้การตัดบรรทัดต้องอาศัยพจนานุกรม";
        let out = break_into_lines(text, 20, true);
        assert!(out.lines().count() > 1);
        for line in out.lines() {
            assert!(line.chars().count() <= 20);
        }
    }

    #[test]
    fn test_structural_lines_pass_through() {
        let text = "- first item that is quite long and would otherwise be wrapped\n\
                    1. numbered\n\
                    # Head\n\
                    body text continues here";
        let out = format_readable(text, 20, Languages::English);
        let out = lines(&out);
        assert_eq!(
            out[0],
            "- first item that is quite long and would otherwise be wrapped"
        );
        assert_eq!(out[1], "1. numbered");
        assert_eq!(out[2], "# Head");
        assert_eq!(out[3], "body text continues");
        assert_eq!(out[4], "here");
    }

    #[test]
    fn test_blank_lines_collapse_everywhere() {
        let out = format_readable("a line here\n\n\n\n\nanother line", 60, Languages::English);
        assert_eq!(out, "a line here\n\nanother line");
    }

    #[test]
    fn test_format_readable_long_token() {
        let token = "b".repeat(10_000);
        let out = format_readable(&token, 60, Languages::ThaiEnglish);
        assert_eq!(out.lines().count(), 167);
    }
}
