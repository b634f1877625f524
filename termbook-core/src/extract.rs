//! Chapter markup to flat text.
//!
//! The markup is read as a stream of [`MarkupToken`]s and folded into a single string. Opening a
//! block-level element inserts a paragraph break; text is appended verbatim in document order.
//! Stray `&` characters are escaped before parsing and text that is not valid UTF-8 is decoded
//! lossily. Structurally malformed input stops the stream early and whatever text was recovered
//! up to that point is returned.

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::warn;

/// Inserted once per opened block-level element.
pub const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupToken {
    /// An element was opened (including self-closing forms); carries the lowercased local name.
    Open(String),
    Text(String),
    Other,
}

/// Elements that start a new block of text.
pub fn is_block_element(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div" | "br" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li"
    )
}

/// Tokenizes XHTML/HTML-ish markup. Ends at EOF or at the first parse error.
pub struct MarkupTokens<'a> {
    reader: Reader<&'a [u8]>,
    finished: bool,
}

impl<'a> MarkupTokens<'a> {
    pub fn new(markup: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(markup);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        Self {
            reader,
            finished: false,
        }
    }
}

impl Iterator for MarkupTokens<'_> {
    type Item = MarkupToken;

    fn next(&mut self) -> Option<MarkupToken> {
        if self.finished {
            return None;
        }
        let token = match self.reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                MarkupToken::Open(name)
            }
            Ok(Event::Text(e)) => match e.decode() {
                Ok(text) => MarkupToken::Text(text.into_owned()),
                Err(_) => MarkupToken::Text(String::from_utf8_lossy(&e).into_owned()),
            },
            Ok(Event::CData(e)) => match self.reader.decoder().decode(&e) {
                Ok(text) => MarkupToken::Text(text.into_owned()),
                Err(_) => MarkupToken::Text(String::from_utf8_lossy(&e).into_owned()),
            },
            Ok(Event::GeneralRef(e)) => match e.decode() {
                Ok(name) => MarkupToken::Text(resolve_entity(&name).into_owned()),
                Err(_) => MarkupToken::Text(format!("&{};", String::from_utf8_lossy(&e))),
            },
            Ok(Event::Eof) => {
                self.finished = true;
                return None;
            }
            Ok(_) => MarkupToken::Other,
            Err(err) => return self.stop(&err),
        };
        Some(token)
    }
}

impl MarkupTokens<'_> {
    fn stop(&mut self, err: &dyn std::fmt::Display) -> Option<MarkupToken> {
        warn!(
            position = self.reader.error_position(),
            error = %err,
            "markup parse error; keeping text recovered so far"
        );
        self.finished = true;
        None
    }
}

/// Folds a token stream into text, inserting [`BLOCK_SEPARATOR`] for each opened block element.
pub fn fold_tokens<I>(tokens: I) -> String
where
    I: IntoIterator<Item = MarkupToken>,
{
    tokens.into_iter().fold(String::new(), |mut out, token| {
        match token {
            MarkupToken::Open(tag) if is_block_element(&tag) => out.push_str(BLOCK_SEPARATOR),
            MarkupToken::Text(text) => out.push_str(&text),
            MarkupToken::Open(_) | MarkupToken::Other => {}
        }
        out
    })
}

/// Extracts displayable text from chapter markup. Never fails; a whitespace-only result means the
/// chapter has no readable text.
pub fn extract(markup: &[u8]) -> String {
    let markup = escape_stray_ampersands(markup);
    fold_tokens(MarkupTokens::new(&markup))
}

/// Rewrites every `&` that does not start a `&name;` or `&#num;` reference as `&amp;`, leaving
/// CDATA sections and comments untouched.
fn escape_stray_ampersands(markup: &[u8]) -> Cow<'_, [u8]> {
    if !markup.contains(&b'&') {
        return Cow::Borrowed(markup);
    }
    let mut out = Vec::with_capacity(markup.len() + 8);
    let mut rest = markup;
    while let Some(&byte) = rest.first() {
        if let Some(len) = raw_section_len(rest) {
            out.extend_from_slice(&rest[..len]);
            rest = &rest[len..];
            continue;
        }
        if byte == b'&' && !starts_with_reference(rest) {
            out.extend_from_slice(b"&amp;");
        } else {
            out.push(byte);
        }
        rest = &rest[1..];
    }
    Cow::Owned(out)
}

fn raw_section_len(input: &[u8]) -> Option<usize> {
    let (open, close): (&[u8], &[u8]) = if input.starts_with(b"<![CDATA[") {
        (b"<![CDATA[", b"]]>")
    } else if input.starts_with(b"<!--") {
        (b"<!--", b"-->")
    } else {
        return None;
    };
    let body = &input[open.len()..];
    let len = body
        .windows(close.len())
        .position(|window| window == close)
        .map_or(input.len(), |pos| open.len() + pos + close.len());
    Some(len)
}

fn starts_with_reference(input: &[u8]) -> bool {
    let body = &input[1..];
    let name = body.strip_prefix(b"#").unwrap_or(body);
    let name_len = name.iter().take_while(|b| b.is_ascii_alphanumeric()).count();
    name_len > 0 && name.get(name_len) == Some(&b';')
}

/// Replaces each tab with `tab_width` spaces.
pub fn expand_tabs(text: &str, tab_width: usize) -> String {
    if !text.contains('\t') {
        return text.to_string();
    }
    text.replace('\t', &" ".repeat(tab_width))
}

fn resolve_entity(name: &str) -> Cow<'static, str> {
    let reference = format!("&{};", name);
    if let Ok(resolved) = quick_xml::escape::unescape(&reference) {
        return Cow::Owned(resolved.into_owned());
    }
    let known = match name {
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "copy" => "\u{a9}",
        "shy" => "\u{ad}",
        _ => return Cow::Owned(reference),
    };
    Cow::Borrowed(known)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_elements_insert_one_separator_each() {
        let text = extract(b"<html><body><h1>Title</h1><p>First</p><p>Second</p></body></html>");
        assert_eq!(text, "\n\nTitle\n\nFirst\n\nSecond");
    }

    #[test]
    fn inline_elements_do_not_break_text() {
        let text = extract(b"<p>An <em>emphasised</em> <a href=\"#x\">link</a>.</p>");
        assert_eq!(text, "\n\nAn emphasised link.");
    }

    #[test]
    fn self_closing_line_breaks_count_as_blocks() {
        assert_eq!(extract(b"<p>one<br/>two</p>"), "\n\none\n\ntwo");
    }

    #[test]
    fn separator_is_emitted_before_element_text() {
        let text = extract(b"before<div>inside</div>after");
        assert_eq!(text, "before\n\ninsideafter");
    }

    #[test]
    fn whitespace_between_tags_is_kept_verbatim() {
        let text = extract(b"<body>\n  <p>a</p>\n</body>");
        assert_eq!(text, "\n  \n\na\n");
    }

    #[test]
    fn namespaced_and_uppercase_tags_are_recognised() {
        assert_eq!(extract(b"<x:P>a</x:P><LI>b</LI>"), "\n\na\n\nb");
    }

    #[test]
    fn all_heading_levels_and_list_items_start_blocks() {
        for tag in ["h1", "h2", "h3", "h4", "h5", "h6", "li", "div"] {
            let markup = format!("x<{tag}>y</{tag}>");
            assert_eq!(extract(markup.as_bytes()), "x\n\ny", "tag {tag}");
        }
        assert_eq!(extract(b"x<span>y</span>"), "xy");
    }

    #[test]
    fn entities_are_resolved() {
        let text = extract(b"<p>Fish &amp; chips &#8212; caf&#xe9;&nbsp;ok &bogus;</p>");
        assert_eq!(text, "\n\nFish & chips \u{2014} caf\u{e9}\u{a0}ok &bogus;");
    }

    #[test]
    fn cdata_is_text() {
        assert_eq!(extract(b"<p><![CDATA[a < b]]></p>"), "\n\na < b");
    }

    #[test]
    fn stray_ampersand_is_literal_text() {
        assert_eq!(
            extract(b"<p>AT&T</p><p>rest of chapter</p>"),
            "\n\nAT&T\n\nrest of chapter"
        );
        assert_eq!(extract(b"<p>a & b &amp; c</p>"), "\n\na & b & c");
        assert_eq!(extract(b"<p>trailing &</p>"), "\n\ntrailing &");
    }

    #[test]
    fn ampersands_in_cdata_and_comments_are_untouched() {
        assert_eq!(extract(b"<p><![CDATA[a & b]]></p>"), "\n\na & b");
        assert_eq!(extract(b"<p>x<!-- & -->y</p>"), "\n\nxy");
    }

    #[test]
    fn invalid_utf8_text_is_decoded_lossily() {
        assert_eq!(
            extract(b"<p>before</p><p>bad \xff byte</p><p>after</p>"),
            "\n\nbefore\n\nbad \u{fffd} byte\n\nafter"
        );
    }

    #[test]
    fn truncated_markup_returns_recovered_text() {
        assert_eq!(extract(b"<p>first</p><p"), "\n\nfirst");
    }

    #[test]
    fn mismatched_end_tags_do_not_abort() {
        let text = extract(b"<p>one</div><p>two</p>");
        assert_eq!(text, "\n\none\n\ntwo");
    }

    #[test]
    fn image_only_chapter_is_whitespace() {
        let text = extract(b"<body>\n<div><img src=\"cover.jpg\"/></div>\n</body>");
        assert!(text.trim().is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let markup = b"<p>same</p><p>bytes</p>";
        assert_eq!(extract(markup), extract(markup));
    }

    #[test]
    fn fold_is_independent_of_tokenizer() {
        let tokens = vec![
            MarkupToken::Text("a".into()),
            MarkupToken::Open("li".into()),
            MarkupToken::Other,
            MarkupToken::Open("span".into()),
            MarkupToken::Text("b".into()),
        ];
        assert_eq!(fold_tokens(tokens), "a\n\nb");
    }

    #[test]
    fn tabs_expand_to_fixed_width() {
        assert_eq!(expand_tabs("a\tb", 4), "a    b");
        assert_eq!(expand_tabs("none", 4), "none");
        assert_eq!(expand_tabs("\t", 2), "  ");
    }
}
