//! Cardinality and shape checks over accumulated specs.
//!
//! Runs once per spec before execution. The first rule that matches wins and
//! becomes that test's single failure; a spec that passes every rule
//! collapses each field list to its first value.

use crate::error::{Note, Notes};
use crate::spec::{Block, ExitExpectation, RawTest, Sourced};

/// A spec that survived validation, each field at most one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTest {
    pub name: String,
    pub program: Sourced<String>,
    pub input: Option<Block>,
    pub output: Option<Block>,
    pub error: Option<Block>,
    pub check: Option<Block>,
    pub exit: Option<Sourced<ExitExpectation>>,
    pub only: bool,
}

/// A per-test validation failure; isolates to this test, never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalid {
    pub reason: String,
    pub notes: Notes,
}

const ALL_ANNOTATION_FIELDS: [&str; 6] = ["input", "output", "error", "check", "program", "exit"];

/// Validate one accumulated spec and collapse it to its normalized form.
pub fn validate(name: &str, raw: &RawTest) -> Result<NormalizedTest, Invalid> {
    let Some(program) = raw.program.clone() else {
        let mut notes = annotation_locations(raw, &ALL_ANNOTATION_FIELDS);
        notes.push((
            "how to fix".to_string(),
            Note::Text(
                "Declare a test program before your test,\n\
                 using <!-- !test program <TEST PROGRAM HERE> -->"
                    .to_string(),
            ),
        ));
        return Err(Invalid {
            reason: "no program defined".to_string(),
            notes,
        });
    };

    if raw.exit.len() > 1 {
        let mut notes = annotation_locations(raw, &["exit"]);
        notes.push((
            "how to fix".to_string(),
            Note::Text(
                "Have just 1 expected exit status, before one of\n\
                 this test's '!test' commands."
                    .to_string(),
            ),
        ));
        return Err(Invalid {
            reason: "multiple expected exit statuses defined".to_string(),
            notes,
        });
    }

    if !raw.check.is_empty() {
        for (field, blocks) in [
            ("input", &raw.input),
            ("output", &raw.output),
            ("error", &raw.error),
        ] {
            if !blocks.is_empty() {
                let mut notes = annotation_locations(raw, &[field, "check"]);
                notes.push((
                    "how to fix".to_string(),
                    Note::Text(format!(
                        "Remove the {field}, or create an in/out test instead."
                    )),
                ));
                return Err(Invalid {
                    reason: format!("defined as check, but also has {field}"),
                    notes,
                });
            }
        }
        if raw.check.len() > 1 {
            let mut notes = annotation_locations(raw, &["check"]);
            notes.push((
                "how to fix".to_string(),
                Note::Text("Remove or rename the other checks.".to_string()),
            ));
            return Err(Invalid {
                reason: "multiple checks defined".to_string(),
                notes,
            });
        }
    } else {
        if raw.input.is_empty() {
            let mut notes = annotation_locations(raw, &["output"]);
            notes.push((
                "how to fix".to_string(),
                Note::Text(format!(
                    "Define an input for '{name}', using\n\n  <!-- !test in {name} -->\n\n\
                     followed by a code block."
                )),
            ));
            return Err(Invalid {
                reason: "input not defined".to_string(),
                notes,
            });
        }
        if raw.output.is_empty() && raw.error.is_empty() {
            let mut notes = annotation_locations(raw, &["input"]);
            notes.push((
                "how to fix".to_string(),
                Note::Text(format!(
                    "Define an output or error for '{name}', using\n\n  \
                     <!-- !test out {name} -->\n\nor\n\n  <!-- !test err {name} -->\n\n\
                     followed by a code block."
                )),
            ));
            return Err(Invalid {
                reason: "only input defined".to_string(),
                notes,
            });
        }
        for (field, blocks) in [
            ("input", &raw.input),
            ("output", &raw.output),
            ("error", &raw.error),
        ] {
            if blocks.len() > 1 {
                let mut notes = annotation_locations(raw, &ALL_ANNOTATION_FIELDS);
                notes.push((
                    "how to fix".to_string(),
                    Note::Text(format!("Remove or rename the other {field}s.")),
                ));
                return Err(Invalid {
                    reason: format!("multiple {field}s defined"),
                    notes,
                });
            }
        }
    }

    Ok(NormalizedTest {
        name: name.to_string(),
        program,
        input: raw.input.first().cloned(),
        output: raw.output.first().cloned(),
        error: raw.error.first().cloned(),
        check: raw.check.first().cloned(),
        exit: raw.exit.first().cloned(),
        only: !raw.only.is_empty(),
    })
}

/// Location notes for the given fields of an accumulated spec, singular or
/// plural keys depending on how many times each field was declared.
#[must_use]
pub fn annotation_locations(raw: &RawTest, fields: &[&str]) -> Notes {
    let mut notes = Notes::new();
    for field in fields {
        let positions = positions_for(raw, field);
        match positions.len() {
            0 => {}
            1 => notes.push((format!("{field} location"), Note::Text(positions[0].clone()))),
            _ => notes.push((format!("{field} locations"), Note::List(positions))),
        }
    }
    notes
}

/// Location notes for a normalized test; every field has at most one origin.
#[must_use]
pub fn normalized_locations(test: &NormalizedTest) -> Notes {
    let mut notes = Notes::new();
    let mut push = |field: &str, position: Option<String>| {
        if let Some(position) = position {
            notes.push((format!("{field} location"), Note::Text(position)));
        }
    };
    push("input", test.input.as_ref().map(|b| b.position.to_string()));
    push("output", test.output.as_ref().map(|b| b.position.to_string()));
    push("error", test.error.as_ref().map(|b| b.position.to_string()));
    push("check", test.check.as_ref().map(|b| b.position.to_string()));
    push("program", Some(test.program.position.to_string()));
    push("exit", test.exit.as_ref().map(|s| s.position.to_string()));
    notes
}

fn positions_for(raw: &RawTest, field: &str) -> Vec<String> {
    let block_positions = |blocks: &[Block]| {
        blocks
            .iter()
            .map(|block| block.position.to_string())
            .collect::<Vec<_>>()
    };
    match field {
        "input" => block_positions(&raw.input),
        "output" => block_positions(&raw.output),
        "error" => block_positions(&raw.error),
        "check" => block_positions(&raw.check),
        "program" => raw
            .program
            .iter()
            .map(|sourced| sourced.position.to_string())
            .collect(),
        "exit" => raw
            .exit
            .iter()
            .map(|sourced| sourced.position.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Position;

    fn block(text: &str, line: usize) -> Block {
        Block {
            text: text.to_string(),
            lang: None,
            position: Position::line(line),
        }
    }

    fn program(code: &str) -> Option<Sourced<String>> {
        Some(Sourced {
            value: code.to_string(),
            position: Position::line(1),
        })
    }

    fn reason_of(result: Result<NormalizedTest, Invalid>) -> String {
        match result {
            Err(invalid) => invalid.reason,
            Ok(test) => panic!("expected validation failure, got {test:?}"),
        }
    }

    fn valid_or_panic(name: &str, raw: &RawTest) -> NormalizedTest {
        match validate(name, raw) {
            Ok(test) => test,
            Err(invalid) => panic!("expected valid spec: {}", invalid.reason),
        }
    }

    #[test]
    fn missing_program_is_reported_first() {
        let raw = RawTest {
            input: vec![block("x\n", 3)],
            output: vec![block("x\n", 5)],
            ..RawTest::default()
        };
        assert_eq!(reason_of(validate("t", &raw)), "no program defined");
    }

    #[test]
    fn multiple_exit_statuses_are_rejected() {
        let raw = RawTest {
            program: program("cat"),
            check: vec![block("x\n", 3)],
            exit: vec![
                Sourced {
                    value: ExitExpectation::Code(1),
                    position: Position::line(2),
                },
                Sourced {
                    value: ExitExpectation::AnyNonzero,
                    position: Position::line(7),
                },
            ],
            ..RawTest::default()
        };
        let Err(invalid) = validate("t", &raw) else {
            panic!("expected failure");
        };
        assert_eq!(invalid.reason, "multiple expected exit statuses defined");
        assert_eq!(
            invalid.notes[0],
            (
                "exit locations".to_string(),
                Note::List(vec!["line 2".to_string(), "line 7".to_string()])
            )
        );
    }

    #[test]
    fn check_conflicts_with_each_stream_field() {
        let base = RawTest {
            program: program("cat"),
            check: vec![block("c\n", 2)],
            ..RawTest::default()
        };

        let mut with_input = base.clone();
        with_input.input.push(block("x\n", 4));
        assert_eq!(
            reason_of(validate("t", &with_input)),
            "defined as check, but also has input"
        );

        let mut with_output = base.clone();
        with_output.output.push(block("x\n", 4));
        assert_eq!(
            reason_of(validate("t", &with_output)),
            "defined as check, but also has output"
        );

        let mut with_error = base;
        with_error.error.push(block("x\n", 4));
        assert_eq!(
            reason_of(validate("t", &with_error)),
            "defined as check, but also has error"
        );
    }

    #[test]
    fn multiple_checks_are_rejected() {
        let raw = RawTest {
            program: program("cat"),
            check: vec![block("a\n", 2), block("b\n", 6)],
            ..RawTest::default()
        };
        assert_eq!(reason_of(validate("t", &raw)), "multiple checks defined");
    }

    #[test]
    fn input_is_required_for_stream_tests() {
        let raw = RawTest {
            program: program("cat"),
            output: vec![block("x\n", 3)],
            ..RawTest::default()
        };
        assert_eq!(reason_of(validate("t", &raw)), "input not defined");
    }

    #[test]
    fn input_alone_is_not_a_test() {
        let raw = RawTest {
            program: program("cat"),
            input: vec![block("x\n", 3)],
            ..RawTest::default()
        };
        assert_eq!(reason_of(validate("t", &raw)), "only input defined");
    }

    #[test]
    fn duplicate_inputs_list_both_locations() {
        let raw = RawTest {
            program: program("cat"),
            input: vec![block("a\n", 3), block("b\n", 9)],
            output: vec![block("a\n", 5)],
            ..RawTest::default()
        };
        let Err(invalid) = validate("t", &raw) else {
            panic!("expected failure");
        };
        assert_eq!(invalid.reason, "multiple inputs defined");
        let Some((_, Note::List(locations))) = invalid
            .notes
            .iter()
            .find(|(key, _)| key == "input locations")
        else {
            panic!("expected input locations list in {:?}", invalid.notes);
        };
        assert_eq!(locations, &vec!["line 3".to_string(), "line 9".to_string()]);
    }

    #[test]
    fn valid_stream_test_normalizes_to_first_values() {
        let raw = RawTest {
            program: program("cat"),
            input: vec![block("in\n", 3)],
            output: vec![block("out\n", 5)],
            ..RawTest::default()
        };
        let test = valid_or_panic("t", &raw);
        assert_eq!(test.program.value, "cat");
        assert_eq!(test.input.map(|b| b.text), Some("in\n".to_string()));
        assert_eq!(test.output.map(|b| b.text), Some("out\n".to_string()));
        assert_eq!(test.check, None);
        assert_eq!(test.exit, None);
        assert!(!test.only);
    }

    #[test]
    fn valid_check_test_normalizes() {
        let raw = RawTest {
            program: program("sh"),
            check: vec![block("exit 0\n", 3)],
            only: vec![Position::line(2)],
            ..RawTest::default()
        };
        let test = valid_or_panic("t", &raw);
        assert_eq!(test.check.map(|b| b.text), Some("exit 0\n".to_string()));
        assert!(test.only);
    }

    #[test]
    fn error_only_stream_test_is_valid() {
        let raw = RawTest {
            program: program("cat >&2"),
            input: vec![block("x\n", 3)],
            error: vec![block("x\n", 5)],
            ..RawTest::default()
        };
        let test = valid_or_panic("t", &raw);
        assert_eq!(test.output, None);
        assert_eq!(test.error.map(|b| b.text), Some("x\n".to_string()));
    }
}
