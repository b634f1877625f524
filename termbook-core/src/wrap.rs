//! Width-aware line wrapping.
//!
//! Width is counted in characters (code points), so multi-byte text wraps at the same column as
//! ASCII. Lines break only between words; a word wider than the line sits alone on its own line.
//! A no-break space (U+00A0) joins its neighbours into one word.

use textwrap::core::Fragment;
use textwrap::wrap_algorithms::wrap_first_fit;

#[derive(Debug, Clone, Copy)]
struct Word<'a> {
    text: &'a str,
    chars: usize,
}

impl<'a> Word<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.chars().count(),
        }
    }
}

impl Fragment for Word<'_> {
    fn width(&self) -> f64 {
        self.chars as f64
    }

    fn whitespace_width(&self) -> f64 {
        1.0
    }

    fn penalty_width(&self) -> f64 {
        0.0
    }
}

/// Wraps `text` into display lines no wider than `width` characters.
///
/// Every `\n` ends a paragraph; an empty (or whitespace-only) paragraph becomes one blank line.
/// Returns no lines for empty text or a zero width.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.is_empty() {
        return Vec::new();
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(paragraph, width, &mut lines);
    }
    lines
}

fn wrap_paragraph(paragraph: &str, width: usize, out: &mut Vec<String>) {
    let words: Vec<Word<'_>> = paragraph
        .split(is_break)
        .filter(|word| !word.is_empty())
        .map(Word::new)
        .collect();
    if words.is_empty() {
        out.push(String::new());
        return;
    }

    for line in wrap_first_fit(&words, &[width as f64]) {
        let mut rendered = String::new();
        for (idx, word) in line.iter().enumerate() {
            if idx > 0 {
                rendered.push(' ');
            }
            rendered.push_str(word.text);
        }
        out.push(rendered);
    }
}

fn is_break(c: char) -> bool {
    c.is_whitespace() && c != '\u{a0}'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;

    fn chars(line: &str) -> usize {
        line.chars().count()
    }

    #[test]
    fn paragraph_break_survives_as_blank_line() {
        assert_eq!(
            wrap("Hello world\n\nBye", 5),
            vec!["Hello", "world", "", "Bye"]
        );
    }

    #[test]
    fn packs_words_greedily() {
        assert_eq!(
            wrap("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
    }

    #[test]
    fn exact_fit_stays_on_one_line() {
        assert_eq!(wrap("abc def", 7), vec!["abc def"]);
        assert_eq!(wrap("abc def", 6), vec!["abc", "def"]);
    }

    #[test]
    fn long_word_is_placed_alone_without_splitting() {
        assert_eq!(
            wrap("a incomprehensibilities b", 6),
            vec!["a", "incomprehensibilities", "b"]
        );
    }

    #[test]
    fn width_counts_characters_not_bytes() {
        let lines = wrap("día café niño", 9);
        assert_eq!(lines, vec!["día café", "niño"]);
        assert!(lines.iter().all(|line| chars(line) <= 9));
        assert!(lines[0].len() > 9);
    }

    #[test]
    fn whitespace_runs_collapse_at_wrap_points() {
        assert_eq!(wrap("  spaced \t  out  ", 20), vec!["spaced out"]);
    }

    #[test]
    fn no_break_space_keeps_words_together() {
        assert_eq!(wrap("10\u{a0}km away", 4), vec!["10\u{a0}km", "away"]);
        assert_eq!(
            wrap(&extract(b"<p>10&nbsp;km away</p>"), 6),
            vec!["", "", "10\u{a0}km", "away"]
        );
    }

    #[test]
    fn whitespace_only_paragraphs_are_blank_lines() {
        assert_eq!(wrap("a\n   \nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap("\n\na", 10), vec!["", "", "a"]);
    }

    #[test]
    fn zero_width_or_empty_text_yields_nothing() {
        assert!(wrap("some text", 0).is_empty());
        assert!(wrap("", 10).is_empty());
    }

    #[test]
    fn lines_never_exceed_width_except_single_long_words() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod \
                    tempor incididunt ut labore et dolore magna aliqua.\n\nUt enim ad minim \
                    veniam, quis nostrud exercitation ullamco laboris.";
        for width in 1..=40 {
            for line in wrap(text, width) {
                let is_single_word = !line.contains(' ');
                assert!(
                    chars(&line) <= width || is_single_word,
                    "width {width}: {line:?}"
                );
            }
        }
    }

    #[test]
    fn rejoining_lines_reproduces_words() {
        let text = "one two  three\nfour\n\nfive six";
        let lines = wrap(text, 4);
        let rejoined: Vec<&str> = lines.iter().flat_map(|l| l.split_whitespace()).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn wrapping_is_idempotent() {
        let text = "Call me Ishmael. Some years ago, never mind how long precisely.";
        assert_eq!(wrap(text, 17), wrap(text, 17));
    }

    #[test]
    fn wrapped_paragraph_snapshot() {
        let text = "It was the best of times, it was the worst of times.\n\nIt was the age of wisdom.";
        insta::assert_snapshot!(wrap(text, 20).join("\n"), @r"
        It was the best of
        times, it was the
        worst of times.

        It was the age of
        wisdom.
        ");
    }
}
