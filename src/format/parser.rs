//! Inline format parser
//!
//! Grammar:
//! - `[[...]]` bold, `[/...]` italic, `[-...]` strikethrough; these
//!   nest arbitrarily, innermost delimiter closes first
//! - `` `...` `` code span: contents verbatim up to the next backtick,
//!   nothing nests inside
//! - `[name]` internal link, `[/path/to/name]` cross-project link. A
//!   bracket run is a link only when its content holds no nested
//!   delimiter; a leading `/` reads as a link when the content has at
//!   least two path segments, otherwise it opens an italic span
//!
//! Malformed markup never fails: an unmatched opening delimiter at
//! end-of-text is flattened back to literal characters, so parsing
//! followed by [`render_spans`] reproduces the input byte-for-byte.

use serde::{Deserialize, Serialize};

/// A parsed inline span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Span {
    /// Literal text
    Text(String),

    /// `[[...]]`
    Bold(Vec<Span>),

    /// `[/...]`
    Italic(Vec<Span>),

    /// `[-...]`
    Strike(Vec<Span>),

    /// `` `...` ``, contents verbatim
    Code(String),

    /// `[target]`; the token's inner text, classification happens in
    /// the link resolver
    Link(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    Bold,
    Italic,
    Strike,
}

impl SpanKind {
    fn open(&self) -> &'static str {
        match self {
            SpanKind::Bold => "[[",
            SpanKind::Italic => "[/",
            SpanKind::Strike => "[-",
        }
    }

    fn wrap(&self, children: Vec<Span>) -> Span {
        match self {
            SpanKind::Bold => Span::Bold(children),
            SpanKind::Italic => Span::Italic(children),
            SpanKind::Strike => Span::Strike(children),
        }
    }
}

/// An open delimiter awaiting its close
struct Frame {
    kind: SpanKind,
    children: Vec<Span>,
}

/// Parse a node's raw text into a span tree
///
/// Pure: the stored text is never modified, and no input is rejected.
pub fn parse_spans(text: &str) -> Vec<Span> {
    Parser::new(text).run()
}

/// Serialize a span tree back to raw text
///
/// Inverse of [`parse_spans`]: for any input text,
/// `render_spans(&parse_spans(text)) == text`.
pub fn render_spans(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            Span::Text(t) => out.push_str(t),
            Span::Bold(children) => {
                out.push_str("[[");
                out.push_str(&render_spans(children));
                out.push_str("]]");
            }
            Span::Italic(children) => {
                out.push_str("[/");
                out.push_str(&render_spans(children));
                out.push(']');
            }
            Span::Strike(children) => {
                out.push_str("[-");
                out.push_str(&render_spans(children));
                out.push(']');
            }
            Span::Code(code) => {
                out.push('`');
                out.push_str(code);
                out.push('`');
            }
            Span::Link(target) => {
                out.push('[');
                out.push_str(target);
                out.push(']');
            }
        }
    }
    out
}

struct Parser<'a> {
    rest: &'a str,
    stack: Vec<Frame>,
    top: Vec<Span>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            rest: text,
            stack: Vec::new(),
            top: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Span> {
        while !self.rest.is_empty() {
            if self.eat_code() || self.eat_close() || self.eat_open_or_link() {
                continue;
            }
            // Plain character
            let Some(ch) = self.rest.chars().next() else {
                break;
            };
            let (chunk, rest) = self.rest.split_at(ch.len_utf8());
            let chunk = chunk.to_string();
            self.rest = rest;
            self.push_text(&chunk);
        }

        // Unmatched openers flatten back to literal text, innermost
        // first so the parent receives them in source order
        while let Some(frame) = self.stack.pop() {
            let parent = self.current();
            parent.push(Span::Text(frame.kind.open().to_string()));
            parent.extend(frame.children);
        }
        coalesce(self.top)
    }

    fn current(&mut self) -> &mut Vec<Span> {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut self.top,
        }
    }

    fn push_text(&mut self, text: &str) {
        self.current().push(Span::Text(text.to_string()));
    }

    fn eat_code(&mut self) -> bool {
        if !self.rest.starts_with('`') {
            return false;
        }
        match self.rest[1..].find('`') {
            Some(end) => {
                let code = self.rest[1..1 + end].to_string();
                self.current().push(Span::Code(code));
                self.rest = &self.rest[end + 2..];
            }
            None => {
                // Unterminated: literal backtick
                self.push_text("`");
                self.rest = &self.rest[1..];
            }
        }
        true
    }

    fn eat_close(&mut self) -> bool {
        if !self.rest.starts_with(']') {
            return false;
        }
        let Some(frame) = self.stack.last() else {
            return false;
        };
        match frame.kind {
            SpanKind::Bold => {
                if !self.rest.starts_with("]]") {
                    return false;
                }
                self.rest = &self.rest[2..];
            }
            SpanKind::Italic | SpanKind::Strike => {
                self.rest = &self.rest[1..];
            }
        }
        if let Some(frame) = self.stack.pop() {
            let span = frame.kind.wrap(coalesce(frame.children));
            self.current().push(span);
        }
        true
    }

    fn eat_open_or_link(&mut self) -> bool {
        if !self.rest.starts_with('[') {
            return false;
        }
        if self.rest.starts_with("[[") {
            self.stack.push(Frame {
                kind: SpanKind::Bold,
                children: Vec::new(),
            });
            self.rest = &self.rest[2..];
            return true;
        }
        if self.rest.starts_with("[-") {
            self.stack.push(Frame {
                kind: SpanKind::Strike,
                children: Vec::new(),
            });
            self.rest = &self.rest[2..];
            return true;
        }
        if self.rest.starts_with("[/") {
            if let Some(target) = self.link_lookahead() {
                if is_path_link(&target) {
                    let consumed = 1 + target.len() + 1;
                    self.current().push(Span::Link(target));
                    self.rest = &self.rest[consumed..];
                    return true;
                }
            }
            self.stack.push(Frame {
                kind: SpanKind::Italic,
                children: Vec::new(),
            });
            self.rest = &self.rest[2..];
            return true;
        }
        // Plain `[`: an internal link if the bracket run is simple
        if let Some(target) = self.link_lookahead() {
            if !target.is_empty() && !target.starts_with('/') {
                let consumed = 1 + target.len() + 1;
                self.current().push(Span::Link(target));
                self.rest = &self.rest[consumed..];
                return true;
            }
        }
        self.push_text("[");
        self.rest = &self.rest[1..];
        true
    }

    /// Content between the current `[` and its closing `]`, if the run
    /// holds no nested delimiter
    fn link_lookahead(&self) -> Option<String> {
        let inner = &self.rest[1..];
        let end = inner.find(']')?;
        let content = &inner[..end];
        if content.contains('[') || content.contains('`') {
            return None;
        }
        Some(content.to_string())
    }
}

/// A leading-slash token is a link when it names at least two nonempty
/// path segments; otherwise it reads as italic markup.
fn is_path_link(content: &str) -> bool {
    let Some(path) = content.strip_prefix('/') else {
        return false;
    };
    let segments: Vec<&str> = path.split('/').collect();
    segments.len() >= 2 && segments.iter().all(|s| !s.is_empty())
}

/// Merge adjacent text spans (keeps the tree canonical for render)
fn coalesce(spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match (out.last_mut(), span) {
            (Some(Span::Text(prev)), Span::Text(next)) => prev.push_str(&next),
            (_, span) => out.push(span),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round_trip(text: &str) {
        assert_eq!(render_spans(&parse_spans(text)), text, "round trip of {text:?}");
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            parse_spans("hello world"),
            vec![Span::Text("hello world".to_string())]
        );
    }

    #[test]
    fn test_bold_span() {
        assert_eq!(
            parse_spans("a [[bold]] b"),
            vec![
                Span::Text("a ".to_string()),
                Span::Bold(vec![Span::Text("bold".to_string())]),
                Span::Text(" b".to_string()),
            ]
        );
    }

    #[test]
    fn test_italic_and_strike() {
        assert_eq!(
            parse_spans("[/lean] [-gone]"),
            vec![
                Span::Italic(vec![Span::Text("lean".to_string())]),
                Span::Text(" ".to_string()),
                Span::Strike(vec![Span::Text("gone".to_string())]),
            ]
        );
    }

    #[test]
    fn test_nested_spans_close_innermost_first() {
        assert_eq!(
            parse_spans("[[a [/b [-c]]]]"),
            vec![Span::Bold(vec![
                Span::Text("a ".to_string()),
                Span::Italic(vec![
                    Span::Text("b ".to_string()),
                    Span::Strike(vec![Span::Text("c".to_string())]),
                ]),
            ])]
        );
    }

    #[test]
    fn test_code_span_is_verbatim() {
        assert_eq!(
            parse_spans("run `[[not bold]]` now"),
            vec![
                Span::Text("run ".to_string()),
                Span::Code("[[not bold]]".to_string()),
                Span::Text(" now".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_code_is_literal() {
        assert_eq!(
            parse_spans("a ` b"),
            vec![Span::Text("a ` b".to_string())]
        );
    }

    #[test]
    fn test_internal_link() {
        assert_eq!(
            parse_spans("see [Meeting Notes]"),
            vec![
                Span::Text("see ".to_string()),
                Span::Link("Meeting Notes".to_string()),
            ]
        );
    }

    #[test]
    fn test_cross_project_link() {
        assert_eq!(
            parse_spans("[/wiki/Home]"),
            vec![Span::Link("/wiki/Home".to_string())]
        );
        assert_eq!(
            parse_spans("[/a/b/c]"),
            vec![Span::Link("/a/b/c".to_string())]
        );
    }

    #[test]
    fn test_single_segment_slash_is_italic() {
        assert_eq!(
            parse_spans("[/lean]"),
            vec![Span::Italic(vec![Span::Text("lean".to_string())])]
        );
    }

    #[test]
    fn test_unmatched_openers_degrade_to_literal() {
        assert_eq!(
            parse_spans("a [[b"),
            vec![Span::Text("a [[b".to_string())]
        );
        assert_eq!(
            parse_spans("[/x [-y"),
            vec![Span::Text("[/x [-y".to_string())]
        );
    }

    #[test]
    fn test_stray_close_is_literal() {
        assert_eq!(parse_spans("a ] b"), vec![Span::Text("a ] b".to_string())]);
    }

    #[test]
    fn test_empty_brackets_are_literal() {
        assert_eq!(parse_spans("[]"), vec![Span::Text("[]".to_string())]);
    }

    #[test]
    fn test_round_trip_samples() {
        for text in [
            "",
            "plain",
            "a [[b [/c] d]] e",
            "[[unclosed [/both",
            "`code` and [link] and [/x/y]",
            "mixed ] stray ` tick",
            "[[a]] [[b]]",
            "[-[/deep [[deeper]] still]]",
            "[a`b]`",
        ] {
            round_trip(text);
        }
    }

    proptest! {
        /// Parsing never loses bytes: render(parse(text)) == text for
        /// arbitrary delimiter soup.
        #[test]
        fn prop_render_round_trip(parts in proptest::collection::vec(
            prop_oneof![
                Just("[[".to_string()),
                Just("]]".to_string()),
                Just("[/".to_string()),
                Just("[-".to_string()),
                Just("]".to_string()),
                Just("`".to_string()),
                Just("[".to_string()),
                Just("/".to_string()),
                "[a-z ]{0,6}",
            ],
            0..24,
        )) {
            let text: String = parts.concat();
            prop_assert_eq!(render_spans(&parse_spans(&text)), text);
        }
    }
}
