//! TAP line protocol output.
//!
//! Results may arrive in completion order; the reporter prints them in
//! declaration order via the reorder buffer. Skipped tests consume their plan
//! index but print nothing. Notes blocks render as YAML-style fragments
//! between `---` rules, indented under their result line.

use std::io::Write;

use litmus_core::directive::DirectiveKind;
use litmus_core::error::{Fatal, Note, Notes};

use crate::exec::Outcome;
use crate::pool::{RunStats, TestResult};
use crate::reorder::ReorderBuffer;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_DIM: &str = "\x1b[2m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_RED: &str = "\x1b[31m";
const COLOR_YELLOW: &str = "\x1b[33m";
const COLOR_BLUE: &str = "\x1b[34m";
const STYLE_OK_TRAILER: &str = "\x1b[7;32m";
const STYLE_SKIP_TRAILER: &str = "\x1b[7;33m";
const STYLE_FAIL_TRAILER: &str = "\x1b[7;31m";
const STYLE_PARSE_TRAILER: &str = "\x1b[30;41m";

// Values at most this wide stay on the key's line, single-quoted.
const NOTE_VALUE_WIDTH: usize = 80;

pub struct Reporter<'a> {
    out: &'a mut dyn Write,
    use_color: bool,
    buffer: ReorderBuffer<Option<String>>,
}

impl<'a> Reporter<'a> {
    pub fn new(out: &'a mut dyn Write, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            buffer: ReorderBuffer::new(),
        }
    }

    pub fn header(&mut self) -> std::io::Result<()> {
        writeln!(self.out, "TAP version 13")
    }

    pub fn plan(&mut self, total: usize) -> std::io::Result<()> {
        let line = self.paint(&format!("1..{total}"), COLOR_DIM);
        writeln!(self.out, "{line}")
    }

    /// The empty-document short circuit: zero plan, explanation, pointer.
    pub fn no_tests(&mut self, homepage: &str) -> std::io::Result<()> {
        writeln!(self.out, "{}", self.paint("1..0", COLOR_YELLOW))?;
        writeln!(self.out, "{}", self.paint("# no tests", COLOR_YELLOW))?;
        writeln!(
            self.out,
            "{}",
            self.paint(&format!("# For help, see {homepage}"), COLOR_DIM)
        )
    }

    /// Accept one completion; prints it and any buffered successors once all
    /// lower indices have been printed. Skips hold their slot silently.
    pub fn record(&mut self, result: &TestResult) -> std::io::Result<()> {
        let line = match &result.outcome {
            Outcome::Pass => Some(self.success_line(result.index + 1, &result.name)),
            Outcome::Fail { reason, notes } => {
                Some(self.failure_line(result.index + 1, &result.name, reason, notes))
            }
            Outcome::Skip => None,
        };
        for ready in self.buffer.accept(result.index, line) {
            if let Some(text) = ready {
                writeln!(self.out, "{text}")?;
            }
        }
        Ok(())
    }

    pub fn summary(&mut self, stats: &RunStats) -> std::io::Result<()> {
        writeln!(self.out)?;
        let state_color = if stats.failed == 0 {
            COLOR_GREEN
        } else {
            COLOR_RED
        };
        writeln!(
            self.out,
            "{}",
            self.paint(
                &format!("# {}/{} passed", stats.passed, stats.total),
                state_color
            )
        )?;
        let trailer = if stats.failed > 0 {
            self.paint(&format!("# FAILED {}", stats.failed), STYLE_FAIL_TRAILER)
        } else if stats.skipped > 0 {
            self.paint(
                &format!("# OK, SKIPPED {}", stats.skipped),
                STYLE_SKIP_TRAILER,
            )
        } else {
            self.paint("# OK", STYLE_OK_TRAILER)
        };
        writeln!(self.out, "{trailer}")
    }

    /// Render a fatal parse error as a zero plan plus one synthetic failure.
    pub fn fatal(&mut self, fatal: &Fatal) -> std::io::Result<()> {
        writeln!(self.out, "{}", self.paint("0..0", COLOR_DIM))?;
        let notes = fatal.notes(&DirectiveKind::supported_words());
        let line = self.failure_line(0, &fatal.subject(), &fatal.to_string(), &notes);
        writeln!(self.out, "{line}")?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "{}",
            self.paint("# FAILED TO PARSE TESTS", STYLE_PARSE_TRAILER)
        )
    }

    fn success_line(&self, index: usize, name: &str) -> String {
        format!(
            "{} {} {name}",
            self.paint("ok", COLOR_GREEN),
            self.paint(&index.to_string(), COLOR_DIM)
        )
    }

    fn failure_line(&self, index: usize, name: &str, reason: &str, notes: &Notes) -> String {
        let mut line = format!(
            "{} {} {name}{}",
            self.paint("not ok", COLOR_RED),
            self.paint(&index.to_string(), COLOR_DIM),
            self.paint(&format!(": {reason}"), COLOR_DIM)
        );
        if !notes.is_empty() {
            line.push('\n');
            line.push_str(&self.format_notes(notes, 1));
        }
        line
    }

    /// YAML-style properties between `---` rules.
    fn format_notes(&self, notes: &Notes, level: usize) -> String {
        let rule = indent(level, &self.paint("---", COLOR_DIM));
        let mut lines = Vec::with_capacity(notes.len());
        for (key, value) in notes {
            let key_text = indent(level, &format!("{}:", self.paint(key, COLOR_BLUE)));
            let value_text = match value {
                Note::Number(n) => format!(" {n}"),
                Note::List(items) => {
                    let mut text = String::new();
                    for item in items {
                        text.push('\n');
                        text.push_str(&indent(level + 1, &format!("- {item}")));
                    }
                    text
                }
                Note::Text(value) => {
                    // Compact single-quoted form when it is unambiguous and
                    // fits; block notation otherwise.
                    let available = NOTE_VALUE_WIDTH.saturating_sub(level * 2 + key.len());
                    let fits = available > value.chars().count() + 3;
                    if fits && !value.contains('\n') && !value.contains('\'') {
                        format!(" '{value}'")
                    } else {
                        format!(" |\n{}", indent(level + 1, value))
                    }
                }
            };
            lines.push(format!("{key_text}{value_text}"));
        }
        format!("{rule}\n{}\n{rule}", lines.join("\n"))
    }

    fn paint(&self, text: &str, style: &str) -> String {
        if self.use_color {
            format!("{style}{text}{COLOR_RESET}")
        } else {
            text.to_string()
        }
    }
}

fn indent(level: usize, text: &str) -> String {
    let spaces = "  ".repeat(level);
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{spaces}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use litmus_core::error::Position;

    fn output_of<F>(mut build: F) -> String
    where
        F: FnMut(&mut Reporter) -> std::io::Result<()>,
    {
        let mut sink = Vec::new();
        let mut reporter = Reporter::new(&mut sink, false);
        match build(&mut reporter) {
            Ok(()) => {}
            Err(err) => panic!("report write failed: {err}"),
        }
        match String::from_utf8(sink) {
            Ok(text) => text,
            Err(err) => panic!("report should be utf-8: {err}"),
        }
    }

    fn pass(index: usize, name: &str) -> TestResult {
        TestResult {
            index,
            name: name.to_string(),
            outcome: Outcome::Pass,
        }
    }

    fn fail(index: usize, name: &str, reason: &str, notes: Notes) -> TestResult {
        TestResult {
            index,
            name: name.to_string(),
            outcome: Outcome::Fail {
                reason: reason.to_string(),
                notes,
            },
        }
    }

    fn skip(index: usize, name: &str) -> TestResult {
        TestResult {
            index,
            name: name.to_string(),
            outcome: Outcome::Skip,
        }
    }

    #[test]
    fn header_and_plan() {
        let text = output_of(|r| {
            r.header()?;
            r.plan(3)
        });
        assert_eq!(text, "TAP version 13\n1..3\n");
    }

    #[test]
    fn success_lines_are_numbered_from_one() {
        let text = output_of(|r| r.record(&pass(0, "first")));
        assert_eq!(text, "ok 1 first\n");
    }

    #[test]
    fn failure_line_carries_reason_and_notes() {
        let notes = vec![
            ("program".to_string(), Note::Text("cat".to_string())),
            ("exit status".to_string(), Note::Number(1)),
        ];
        let text = output_of(|r| r.record(&fail(0, "broken", "program exited with error", notes.clone())));
        assert_eq!(
            text,
            "not ok 1 broken: program exited with error\n  \
             ---\n  program: 'cat'\n  exit status: 1\n  ---\n"
        );
    }

    #[test]
    fn multiline_note_values_use_block_notation() {
        let notes = vec![(
            "how to fix".to_string(),
            Note::Text("first line\nsecond line".to_string()),
        )];
        let text = output_of(|r| r.record(&fail(0, "t", "input not defined", notes.clone())));
        assert!(text.contains("how to fix: |\n    first line\n    second line\n"));
    }

    #[test]
    fn quoted_values_with_quotes_fall_back_to_blocks() {
        let notes = vec![(
            "program".to_string(),
            Note::Text("echo 'hi'".to_string()),
        )];
        let text = output_of(|r| r.record(&fail(0, "t", "x", notes.clone())));
        assert!(text.contains("program: |\n    echo 'hi'\n"));
    }

    #[test]
    fn list_values_render_as_dash_items() {
        let notes = vec![(
            "input locations".to_string(),
            Note::List(vec!["line 3".to_string(), "line 9".to_string()]),
        )];
        let text = output_of(|r| r.record(&fail(0, "t", "multiple inputs defined", notes.clone())));
        assert!(text.contains("input locations:\n    - line 3\n    - line 9\n"));
    }

    #[test]
    fn out_of_order_results_print_in_declaration_order() {
        let text = output_of(|r| {
            r.record(&pass(2, "third"))?;
            r.record(&pass(0, "first"))?;
            r.record(&pass(1, "second"))
        });
        assert_eq!(text, "ok 1 first\nok 2 second\nok 3 third\n");
    }

    #[test]
    fn skipped_tests_hold_their_slot_silently() {
        let text = output_of(|r| {
            r.record(&pass(2, "third"))?;
            r.record(&skip(1, "second"))?;
            r.record(&pass(0, "first"))
        });
        assert_eq!(text, "ok 1 first\nok 3 third\n");
    }

    #[test]
    fn summary_reports_ok() {
        let stats = RunStats {
            total: 2,
            passed: 2,
            failed: 0,
            skipped: 0,
        };
        let text = output_of(|r| r.summary(&stats));
        assert_eq!(text, "\n# 2/2 passed\n# OK\n");
    }

    #[test]
    fn summary_reports_skips() {
        let stats = RunStats {
            total: 3,
            passed: 1,
            failed: 0,
            skipped: 2,
        };
        let text = output_of(|r| r.summary(&stats));
        assert_eq!(text, "\n# 1/3 passed\n# OK, SKIPPED 2\n");
    }

    #[test]
    fn summary_reports_failures() {
        let stats = RunStats {
            total: 3,
            passed: 1,
            failed: 2,
            skipped: 0,
        };
        let text = output_of(|r| r.summary(&stats));
        assert_eq!(text, "\n# 1/3 passed\n# FAILED 2\n");
    }

    #[test]
    fn fatal_errors_render_a_zero_plan_and_parse_trailer() {
        let fatal = Fatal::UnknownCommand {
            word: "porgram".to_string(),
            position: Position::line(4),
        };
        let text = output_of(|r| {
            r.header()?;
            r.fatal(&fatal)
        });
        assert!(text.starts_with("TAP version 13\n0..0\nnot ok 0 'porgram': unknown command type\n"));
        assert!(text.contains("location: 'line 4'"));
        assert!(text.contains("supported commands:\n    - program\n    - in\n"));
        assert!(text.ends_with("\n# FAILED TO PARSE TESTS\n"));
    }

    #[test]
    fn no_tests_short_circuit() {
        let text = output_of(|r| {
            r.header()?;
            r.no_tests("https://example.invalid/litmus")
        });
        assert_eq!(
            text,
            "TAP version 13\n1..0\n# no tests\n# For help, see https://example.invalid/litmus\n"
        );
    }

    #[test]
    fn colored_lines_wrap_styles_around_markers() {
        let mut sink = Vec::new();
        let mut reporter = Reporter::new(&mut sink, true);
        match reporter.record(&pass(0, "tinted")) {
            Ok(()) => {}
            Err(err) => panic!("report write failed: {err}"),
        }
        let text = match String::from_utf8(sink) {
            Ok(text) => text,
            Err(err) => panic!("report should be utf-8: {err}"),
        };
        assert!(text.contains("\x1b[32mok\x1b[0m"));
        assert!(text.ends_with("tinted\n"));
    }
}
