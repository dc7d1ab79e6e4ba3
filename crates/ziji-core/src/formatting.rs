//! Formatting utilities (Markdown prose → Telegram HTML, message chunking).
//!
//! Fenced code never reaches these helpers: the segmenter pulls it out first
//! and it is delivered as a file.

use std::sync::OnceLock;

use regex::Regex;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"))
}

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*\n]+)\*\*").expect("valid regex"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("valid regex"))
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6} +(.+)$").expect("valid regex"))
}

/// Convert the Markdown subset LLMs use in prose to Telegram HTML.
///
/// Handles inline code, `**bold**`, `# headers` and `[text](url)` links.
/// Inline code is protected from the other rules.
pub fn markdown_to_html(input: &str) -> String {
    let mut codes: Vec<String> = Vec::new();
    let protected = inline_code_re().replace_all(input, |caps: &regex::Captures| {
        let idx = codes.len();
        codes.push(caps[1].to_string());
        format!("\0INLINECODE{idx}\0")
    });

    let mut text = escape_html(&protected);
    text = header_re().replace_all(&text, "<b>$1</b>").to_string();
    text = bold_re().replace_all(&text, "<b>$1</b>").to_string();
    text = link_re()
        .replace_all(&text, r#"<a href="$2">$1</a>"#)
        .to_string();

    for (i, code) in codes.iter().enumerate() {
        text = text.replace(
            &format!("\0INLINECODE{i}\0"),
            &format!("<code>{}</code>", escape_html(code)),
        );
    }
    text
}

/// Split `text` into chunks of at most `limit` chars, preferring line breaks.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                out.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn converts_bold_links_and_headers() {
        assert_eq!(markdown_to_html("**hi** there"), "<b>hi</b> there");
        assert_eq!(
            markdown_to_html("[x](https://example.com)"),
            r#"<a href="https://example.com">x</a>"#
        );
        assert_eq!(markdown_to_html("## Title\nbody"), "<b>Title</b>\nbody");
    }

    #[test]
    fn inline_code_is_escaped_and_left_alone() {
        assert_eq!(
            markdown_to_html("use `**a** < b` now"),
            "use <code>**a** &lt; b</code> now"
        );
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("abc", 10), vec!["abc".to_string()]);
    }

    #[test]
    fn splits_on_lines_then_hard_wraps() {
        let chunks = split_text("aaaa\nbbbb\ncc", 6);
        assert_eq!(chunks, vec!["aaaa\n", "bbbb\n", "cc"]);

        let chunks = split_text("abcdefgh", 3);
        assert_eq!(chunks, vec!["abc", "def", "gh"]);
        assert_eq!(chunks.concat(), "abcdefgh");
    }
}
