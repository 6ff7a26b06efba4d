//! Plain-text normalization for rich-text source payloads.
//!
//! Every source adapter funnels titles, bodies, and excerpts through
//! [`normalize`]: markup tags are removed, a fixed set of named entities is
//! decoded, whitespace runs collapse to one space, and the result is
//! optionally cut to a character budget. Unknown entities pass through
//! untouched and the function never fails.
//!
//! [`relevance`] holds the term-containment scoring shared by the ranker and
//! the adapters that pre-rank their own candidates.

pub mod relevance;

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Normalize markup into bounded plain text.
///
/// `max_length` counts characters, not bytes; the cut is hard (no ellipsis).
/// The output is a fixed point: `normalize(normalize(x, n), n) == normalize(x, n)`.
pub fn normalize(markup: &str, max_length: Option<usize>) -> String {
    let text = collapse_whitespace(&strip_markup(markup));
    match max_length {
        Some(max) => truncate_chars(&text, max).trim_end().to_string(),
        None => text,
    }
}

/// Remove tags and decode entities until neither pass changes the text.
///
/// Decoding can expose new tags (`&lt;b&gt;`) or entities (`&amp;amp;`), so a
/// single pass would not be idempotent. Each changing pass shortens the text,
/// which bounds the loop. Only `<` followed by a letter, `/`, `!` or `?` opens
/// a tag, so decoded comparisons like `a < 100 > b` stay as text.
pub fn strip_markup(markup: &str) -> String {
    let mut current = markup.to_string();
    loop {
        let next = decode_entities(&strip_tags(&current));
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Collapse every whitespace run (including NBSP and ideographic space) to a
/// single ASCII space, trimming both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Borrow at most `max` characters from the start of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

fn strip_tags(text: &str) -> String {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[A-Za-z/!?][^>]*>").expect("valid regex"));

    TAG_RE.replace_all(text, "").into_owned()
}

fn decode_entities(text: &str) -> String {
    static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"&(?:nbsp|amp|lt|gt|quot|#039);").expect("valid regex")
    });

    ENTITY_RE
        .replace_all(text, |caps: &Captures| match &caps[0] {
            "&nbsp;" => " ",
            "&amp;" => "&",
            "&lt;" => "<",
            "&gt;" => ">",
            "&quot;" => "\"",
            _ => "'",
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let html = "<p>Hello <strong>world</strong></p>\n\n<p>  second   line </p>";
        assert_eq!(normalize(html, None), "Hello world second line");
    }

    #[test]
    fn decodes_known_entities() {
        let html = "Tom&nbsp;&amp;&nbsp;Jerry &quot;quoted&quot; it&#039;s";
        assert_eq!(normalize(html, None), "Tom & Jerry \"quoted\" it's");
    }

    #[test]
    fn unknown_entities_pass_through() {
        assert_eq!(normalize("caf&eacute; &#8217;", None), "caf&eacute; &#8217;");
    }

    #[test]
    fn escaped_markup_does_not_survive() {
        assert_eq!(normalize("&lt;b&gt;bold&lt;/b&gt; text", None), "bold text");
    }

    #[test]
    fn escaped_comparisons_survive() {
        assert_eq!(
            normalize("CPC &lt; 100 and CTR &gt; 2%", None),
            "CPC < 100 and CTR > 2%"
        );
        assert_eq!(normalize("x &lt; y &gt; z", None), "x < y > z");
        assert_eq!(normalize("<p>1 < 2</p>", None), "1 < 2");
    }

    #[test]
    fn truncates_by_characters() {
        let text = "<p>ターゲティング設定方法について</p>";
        assert_eq!(normalize(text, Some(7)), "ターゲティング");
        assert_eq!(normalize("short", Some(100)), "short");
    }

    #[test]
    fn truncation_does_not_leave_trailing_space() {
        assert_eq!(normalize("abc def", Some(4)), "abc");
    }

    #[test]
    fn normalize_is_a_fixed_point() {
        let inputs = [
            "<div>\n  <h2>Title</h2>&nbsp;&nbsp;body &amp;amp; more</div>",
            "x &lt; y &gt; z",
            "plain text already",
            "　全角　スペース　",
            "",
            "<<>>",
        ];
        for input in inputs {
            let once = normalize(input, None);
            assert_eq!(normalize(&once, None), once, "input: {input:?}");

            let capped = normalize(input, Some(5));
            assert_eq!(normalize(&capped, Some(5)), capped, "input: {input:?}");
        }
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(normalize("", Some(10)), "");
        assert_eq!(normalize("<br/>", None), "");
    }
}
