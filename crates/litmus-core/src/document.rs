//! Adapter over the markdown parser.
//!
//! Flattens the parser's depth-first event stream into the two node kinds the
//! directive scanner cares about: raw markup (HTML blocks and inline HTML)
//! and code blocks. Everything else is traversal structure.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::error::Position;

/// A document node relevant to test extraction, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocEvent {
    Markup {
        text: String,
        position: Position,
    },
    Code {
        text: String,
        lang: Option<String>,
        position: Position,
    },
}

/// Walk the document and collect markup and code events with line positions.
#[must_use]
pub fn scan_document(text: &str) -> Vec<DocEvent> {
    let lines = LineIndex::new(text);
    let mut events = Vec::new();

    let mut open_markup: Option<(String, std::ops::Range<usize>)> = None;
    let mut open_code: Option<(String, Option<String>, std::ops::Range<usize>)> = None;

    for (event, range) in Parser::new_ext(text, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::HtmlBlock) => {
                open_markup = Some((String::new(), range));
            }
            Event::End(TagEnd::HtmlBlock) => {
                if let Some((markup, span)) = open_markup.take() {
                    events.push(DocEvent::Markup {
                        text: markup,
                        position: lines.position_of(&span),
                    });
                }
            }
            Event::Html(chunk) => {
                if let Some((markup, _)) = open_markup.as_mut() {
                    markup.push_str(&chunk);
                }
            }
            Event::InlineHtml(chunk) => {
                events.push(DocEvent::Markup {
                    text: chunk.into_string(),
                    position: lines.position_of(&range),
                });
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(|word| word.to_string())
                    }
                    CodeBlockKind::Indented => None,
                };
                open_code = Some((String::new(), lang, range));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((mut code, lang, span)) = open_code.take() {
                    // A block's value always carries its final line terminator.
                    if !code.ends_with('\n') {
                        code.push('\n');
                    }
                    events.push(DocEvent::Code {
                        text: code,
                        lang,
                        position: lines.position_of(&span),
                    });
                }
            }
            Event::Text(chunk) => {
                if let Some((code, _, _)) = open_code.as_mut() {
                    code.push_str(&chunk);
                }
            }
            _ => {}
        }
    }

    events
}

/// Byte offset to 1-based line lookup.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(offset + 1);
            }
        }
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|start| *start <= offset)
    }

    fn position_of(&self, range: &std::ops::Range<usize>) -> Position {
        let start_line = self.line_of(range.start);
        let end_line = self.line_of(range.end.saturating_sub(1).max(range.start));
        Position::span(start_line, end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup_events(doc: &str) -> Vec<(String, Position)> {
        scan_document(doc)
            .into_iter()
            .filter_map(|event| match event {
                DocEvent::Markup { text, position } => Some((text, position)),
                DocEvent::Code { .. } => None,
            })
            .collect()
    }

    fn code_events(doc: &str) -> Vec<(String, Option<String>, Position)> {
        scan_document(doc)
            .into_iter()
            .filter_map(|event| match event {
                DocEvent::Code { text, lang, position } => Some((text, lang, position)),
                DocEvent::Markup { .. } => None,
            })
            .collect()
    }

    #[test]
    fn finds_html_comment_blocks_with_positions() {
        let doc = "# Title\n\n<!-- !test program cat -->\n\ntext\n";
        let markup = markup_events(doc);
        assert_eq!(markup.len(), 1);
        assert!(markup[0].0.contains("!test program cat"));
        assert_eq!(markup[0].1.start_line, 3);
    }

    #[test]
    fn finds_fenced_code_with_language_and_trailing_newline() {
        let doc = "```sh\necho hi\n```\n";
        let code = code_events(doc);
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].0, "echo hi\n");
        assert_eq!(code[0].1.as_deref(), Some("sh"));
        assert_eq!(code[0].2.start_line, 1);
        assert_eq!(code[0].2.end_line, 3);
    }

    #[test]
    fn fence_language_is_first_info_word() {
        let doc = "```text extra words\nbody\n```\n";
        let code = code_events(doc);
        assert_eq!(code[0].1.as_deref(), Some("text"));
    }

    #[test]
    fn bare_fence_has_no_language() {
        let doc = "```\nbody\n```\n";
        assert_eq!(code_events(doc)[0].1, None);
    }

    #[test]
    fn empty_code_block_is_a_single_newline() {
        let doc = "```\n```\n";
        assert_eq!(code_events(doc)[0].0, "\n");
    }

    #[test]
    fn code_inside_list_items_is_found() {
        let doc = "- item\n\n  ```\n  nested\n  ```\n";
        let code = code_events(doc);
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].0, "nested\n");
    }

    #[test]
    fn document_order_interleaves_markup_and_code() {
        let doc = "<!-- !test in a -->\n\n```\none\n```\n\n<!-- !test in b -->\n\n```\ntwo\n```\n";
        let kinds: Vec<&str> = scan_document(doc)
            .iter()
            .map(|event| match event {
                DocEvent::Markup { .. } => "markup",
                DocEvent::Code { .. } => "code",
            })
            .collect();
        assert_eq!(kinds, vec!["markup", "code", "markup", "code"]);
    }
}
