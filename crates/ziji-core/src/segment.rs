//! Split an LLM reply into ordered prose and fenced-code segments.

const FENCE: &str = "```";

/// A contiguous run of prose or fenced code within a reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code { language: String, content: String },
}

impl Segment {
    pub fn is_code(&self) -> bool {
        matches!(self, Segment::Code { .. })
    }
}

enum State {
    InText,
    InCode {
        fence_start: usize,
        language: String,
        body_start: usize,
    },
}

/// Split `reply` into segments, left to right.
///
/// An opening fence is three backticks followed by an optional language tag
/// that runs to the end of the line. The first following fence closes the
/// block. Text between blocks is trimmed and dropped when empty. An opening
/// fence that is never closed stays in the trailing text segment.
pub fn split_response(reply: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut text_start = 0usize;
    let mut cursor = 0usize;
    let mut state = State::InText;

    loop {
        match state {
            State::InText => {
                let Some(rel) = reply[cursor..].find(FENCE) else {
                    break;
                };
                let fence_start = cursor + rel;
                let tag_start = fence_start + FENCE.len();
                let Some(nl) = reply[tag_start..].find('\n') else {
                    break;
                };
                state = State::InCode {
                    fence_start,
                    language: reply[tag_start..tag_start + nl].trim().to_string(),
                    body_start: tag_start + nl + 1,
                };
            }
            State::InCode {
                fence_start,
                language,
                body_start,
            } => {
                let Some(rel) = reply[body_start..].find(FENCE) else {
                    break;
                };
                let body_end = body_start + rel;

                push_text(&mut out, &reply[text_start..fence_start]);
                out.push(Segment::Code {
                    language,
                    content: reply[body_start..body_end].trim().to_string(),
                });

                cursor = body_end + FENCE.len();
                text_start = cursor;
                state = State::InText;
            }
        }
    }

    push_text(&mut out, &reply[text_start..]);
    out
}

/// The code segments of `segments`, in order, as `(language, content)`.
pub fn code_segments(segments: &[Segment]) -> Vec<(&str, &str)> {
    segments
        .iter()
        .filter_map(|s| match s {
            Segment::Code { language, content } => Some((language.as_str(), content.as_str())),
            Segment::Text(_) => None,
        })
        .collect()
}

fn push_text(out: &mut Vec<Segment>, raw: &str) {
    let t = raw.trim();
    if !t.is_empty() {
        out.push(Segment::Text(t.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    fn code(lang: &str, s: &str) -> Segment {
        Segment::Code {
            language: lang.to_string(),
            content: s.to_string(),
        }
    }

    #[test]
    fn text_code_text() {
        assert_eq!(
            split_response("pre ```python\nprint(1)\n``` post"),
            vec![text("pre"), code("python", "print(1)"), text("post")]
        );
    }

    #[test]
    fn no_fences_yields_single_trimmed_text() {
        assert_eq!(split_response("  hello\nworld \n"), vec![text("hello\nworld")]);
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(split_response("").is_empty());
        assert!(split_response(" \n\t ").is_empty());
    }

    #[test]
    fn unterminated_fence_stays_in_trailing_text() {
        assert_eq!(
            split_response("intro\n```rust\nfn main() {}"),
            vec![text("intro\n```rust\nfn main() {}")]
        );
    }

    #[test]
    fn fence_without_newline_is_text() {
        assert_eq!(split_response("a ```b"), vec![text("a ```b")]);
    }

    #[test]
    fn odd_fence_count_after_a_complete_block() {
        assert_eq!(
            split_response("```js\nx()\n```\nthen ```py\nnever closed"),
            vec![code("js", "x()"), text("then ```py\nnever closed")]
        );
    }

    #[test]
    fn first_closing_fence_ends_the_block() {
        assert_eq!(
            split_response("```\na\n```\n```\nb\n```"),
            vec![code("", "a"), code("", "b")]
        );
    }

    #[test]
    fn language_tag_is_trimmed_and_may_be_empty() {
        assert_eq!(
            split_response("```python  \nx = 1\n```"),
            vec![code("python", "x = 1")]
        );
        assert_eq!(split_response("```\nplain\n```"), vec![code("", "plain")]);
    }

    #[test]
    fn whitespace_between_blocks_is_dropped() {
        let segs = split_response("```a\n1\n```   \n\n```b\n2\n```");
        assert_eq!(segs, vec![code("a", "1"), code("b", "2")]);
    }

    #[test]
    fn preserves_order_and_content() {
        let reply = "Here:\n```sh\nls -la\n```\nand\n```sh\npwd\n```\ndone";
        let segs = split_response(reply);
        assert_eq!(
            segs,
            vec![
                text("Here:"),
                code("sh", "ls -la"),
                text("and"),
                code("sh", "pwd"),
                text("done"),
            ]
        );
        assert_eq!(code_segments(&segs), vec![("sh", "ls -la"), ("sh", "pwd")]);
        assert_eq!(segs.iter().filter(|s| s.is_code()).count(), 2);
    }

    #[test]
    fn handles_multibyte_text() {
        assert_eq!(
            split_response("你好 ```py\nprint('世界')\n``` 再见"),
            vec![text("你好"), code("py", "print('世界')"), text("再见")]
        );
    }
}
