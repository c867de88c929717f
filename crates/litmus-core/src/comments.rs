//! HTML comment extraction from raw markup text.
//!
//! Comments are `<!-- stuff -->`, but the same delimiters may also occur
//! inside CDATA sections, where they must not be parsed. Whichever construct
//! opens first swallows the other until its own closer.

use crate::error::{Fatal, Position};

const COMMENT_OPENER: &str = "<!--";
const COMMENT_CLOSER: &str = "-->";
const CDATA_OPENER: &str = "<![CDATA[";
const CDATA_CLOSER: &str = "]]>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Base,
    InComment,
    InCdata,
}

/// Extract the bodies of every HTML comment in `markup`, in order.
///
/// `position` is where the markup block sits in the outer document; it anchors
/// the line numbers reported for unterminated regions.
pub fn extract_comments(markup: &str, position: Position) -> Result<Vec<String>, Fatal> {
    let mut comments = Vec::new();
    let mut state = ScanState::Base;
    let mut cursor = 0usize;

    loop {
        let rest = &markup[cursor..];
        match state {
            ScanState::Base => {
                let comment_at = rest.find(COMMENT_OPENER);
                let cdata_at = rest.find(CDATA_OPENER);
                match (comment_at, cdata_at) {
                    (None, None) => return Ok(comments),
                    (Some(offset), None) => {
                        state = ScanState::InComment;
                        cursor += offset;
                    }
                    (None, Some(offset)) => {
                        state = ScanState::InCdata;
                        cursor += offset;
                    }
                    // Both found; whichever opens first wins.
                    (Some(comment), Some(cdata)) => {
                        if comment < cdata {
                            state = ScanState::InComment;
                            cursor += comment;
                        } else {
                            state = ScanState::InCdata;
                            cursor += cdata;
                        }
                    }
                }
            }
            ScanState::InComment => {
                let body_start = cursor + COMMENT_OPENER.len();
                match markup[body_start..].find(COMMENT_CLOSER) {
                    Some(offset) => {
                        comments.push(markup[body_start..body_start + offset].to_string());
                        cursor = body_start + offset + COMMENT_CLOSER.len();
                        state = ScanState::Base;
                    }
                    None => {
                        return Err(Fatal::UnterminatedComment {
                            line: line_at(markup, cursor, position),
                        })
                    }
                }
            }
            ScanState::InCdata => {
                let body_start = cursor + CDATA_OPENER.len();
                match markup[body_start..].find(CDATA_CLOSER) {
                    Some(offset) => {
                        cursor = body_start + offset + CDATA_CLOSER.len();
                        state = ScanState::Base;
                    }
                    None => {
                        return Err(Fatal::UnterminatedCdata {
                            line: line_at(markup, cursor, position),
                        })
                    }
                }
            }
        }
    }
}

/// Document line of the byte at `offset`, given the block's own position.
fn line_at(markup: &str, offset: usize, position: Position) -> usize {
    markup[..offset].matches('\n').count() + position.start_line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_line_one(markup: &str) -> Result<Vec<String>, Fatal> {
        extract_comments(markup, Position::line(1))
    }

    fn comments_or_panic(markup: &str) -> Vec<String> {
        match at_line_one(markup) {
            Ok(comments) => comments,
            Err(err) => panic!("expected comments in {markup:?}: {err}"),
        }
    }

    #[test]
    fn extracts_comment_bodies_in_order() {
        let comments = comments_or_panic("<!-- one --> text <!--two-->");
        assert_eq!(comments, vec![" one ".to_string(), "two".to_string()]);
    }

    #[test]
    fn text_without_comments_yields_nothing() {
        assert_eq!(comments_or_panic("<p>just markup</p>"), Vec::<String>::new());
    }

    #[test]
    fn comment_opener_inside_cdata_is_not_a_comment() {
        let comments = comments_or_panic("<![CDATA[ <!-- not a comment --> ]]><!-- real -->");
        assert_eq!(comments, vec![" real ".to_string()]);
    }

    #[test]
    fn cdata_opener_inside_comment_is_swallowed() {
        let comments = comments_or_panic("<!-- has <![CDATA[ inside --> tail");
        assert_eq!(comments, vec![" has <![CDATA[ inside ".to_string()]);
    }

    #[test]
    fn unterminated_comment_reports_its_document_line() {
        let result = extract_comments("line one\nline two <!-- oops", Position::line(10));
        assert_eq!(result, Err(Fatal::UnterminatedComment { line: 11 }));
    }

    #[test]
    fn unterminated_cdata_reports_its_document_line() {
        let result = extract_comments("<![CDATA[ never closed", Position::line(3));
        assert_eq!(result, Err(Fatal::UnterminatedCdata { line: 3 }));
    }

    #[test]
    fn comment_closer_without_opener_is_plain_text() {
        assert_eq!(comments_or_panic("dangling --> here"), Vec::<String>::new());
    }
}
