//! Subprocess execution and outcome evaluation for one test.
//!
//! A test's program runs as a shell command. Its stdin is fed the input (or
//! check) block text from a dedicated writer thread and then closed; both
//! output streams and the exit status are captured in full. There is no
//! timeout: a hung test hangs the run.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use litmus_core::error::{Note, Notes};
use litmus_core::spec::ExitExpectation;
use litmus_core::validate::{normalized_locations, NormalizedTest};

use crate::diff;

pub const ENV_INDEX: &str = "LITMUS_INDEX";
pub const ENV_NAME: &str = "LITMUS_NAME";
pub const ENV_INDEX_FIRST: &str = "LITMUS_INDEX_FIRST";
pub const ENV_INDEX_LAST: &str = "LITMUS_INDEX_LAST";
pub const ENV_HAS_COLOR: &str = "LITMUS_HAS_COLOR";
pub const ENV_INPUT_LANG: &str = "LITMUS_INPUT_LANG";

/// Captured streams and exit status of one finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub stdout: String,
    pub stderr: String,
    /// -1 when the process was terminated by a signal.
    pub exit_code: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("spawn program: {0}")]
    Spawn(String),
    #[error("write program input: {0}")]
    Stdin(String),
    #[error("wait for program: {0}")]
    Wait(String),
}

/// Identifying context exported to the subprocess environment.
#[derive(Debug, Clone, Copy)]
pub struct TestContext<'a> {
    /// 0-based declaration index.
    pub index: usize,
    pub total: usize,
    pub name: &'a str,
    pub use_color: bool,
}

/// Final verdict for one test slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail { reason: String, notes: Notes },
    Skip,
}

/// Spawn the test's program and capture everything it does.
pub fn run_subprocess(test: &NormalizedTest, ctx: &TestContext) -> Result<Execution, ExecError> {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&test.program.value)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env(ENV_INDEX, (ctx.index + 1).to_string())
        .env(ENV_NAME, ctx.name)
        .env(ENV_INDEX_FIRST, "1")
        .env(ENV_INDEX_LAST, ctx.total.to_string())
        .env(ENV_HAS_COLOR, if ctx.use_color { "1" } else { "0" });
    if let Some(lang) = input_lang(test) {
        command.env(ENV_INPUT_LANG, lang);
    }

    let mut child = command
        .spawn()
        .map_err(|err| ExecError::Spawn(err.to_string()))?;

    let payload = stdin_payload(test).to_string();
    let writer = child.stdin.take().map(|mut stdin| {
        thread::spawn(move || -> Result<(), String> {
            match stdin.write_all(payload.as_bytes()) {
                Ok(()) => Ok(()),
                // The subprocess may close its input early; that just means
                // it doesn't want any more.
                Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                Err(err) => Err(err.to_string()),
            }
        })
    });

    let output = child
        .wait_with_output()
        .map_err(|err| ExecError::Wait(err.to_string()))?;

    if let Some(handle) = writer {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(ExecError::Stdin(err)),
            Err(_) => return Err(ExecError::Stdin("input writer panicked".to_string())),
        }
    }

    Ok(Execution {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Apply the pass/fail rules to a finished execution.
#[must_use]
pub fn evaluate(test: &NormalizedTest, execution: &Execution, use_color: bool) -> Outcome {
    let expectation = test.exit.as_ref().map(|sourced| sourced.value);
    let exit_ok = match expectation {
        Some(ExitExpectation::AnyNonzero) => execution.exit_code != 0,
        Some(ExitExpectation::Code(code)) => execution.exit_code == code,
        None => execution.exit_code == 0,
    };

    if !exit_ok {
        let wording = match expectation {
            Some(_) if execution.exit_code == 0 => "unexpected success",
            Some(_) => "unexpected exit status",
            None => "error",
        };
        return Outcome::Fail {
            reason: format!("program exited with {wording}"),
            notes: exit_failure_notes(test, execution, expectation),
        };
    }

    // Check-shaped tests are verified by exit status alone.
    if test.check.is_some() {
        return Outcome::Pass;
    }

    if let Some(output) = &test.output {
        if execution.stdout != output.text {
            return Outcome::Fail {
                reason: "output mismatch".to_string(),
                notes: mismatch_notes(test, execution, MismatchStream::Stdout, use_color),
            };
        }
    }
    if let Some(error) = &test.error {
        if execution.stderr != error.text {
            return Outcome::Fail {
                reason: "error mismatch".to_string(),
                notes: mismatch_notes(test, execution, MismatchStream::Stderr, use_color),
            };
        }
    }

    Outcome::Pass
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MismatchStream {
    Stdout,
    Stderr,
}

fn exit_failure_notes(
    test: &NormalizedTest,
    execution: &Execution,
    expectation: Option<ExitExpectation>,
) -> Notes {
    let mut notes = Notes::new();
    notes.push(("program".to_string(), Note::Text(test.program.value.clone())));
    notes.push((
        "exit status".to_string(),
        Note::Number(i64::from(execution.exit_code)),
    ));
    if let Some(expectation) = expectation {
        let value = match expectation {
            ExitExpectation::Code(code) => Note::Number(i64::from(code)),
            ExitExpectation::AnyNonzero => Note::Text("nonzero".to_string()),
        };
        notes.push(("expected exit status".to_string(), value));
    }
    notes.push(("stderr".to_string(), Note::Text(execution.stderr.clone())));
    notes.push(("stdout".to_string(), Note::Text(execution.stdout.clone())));
    notes.extend(normalized_locations(test));
    notes
}

fn mismatch_notes(
    test: &NormalizedTest,
    execution: &Execution,
    stream: MismatchStream,
    use_color: bool,
) -> Notes {
    let (label, other_label, expected_block, actual_text, other_text) = match stream {
        MismatchStream::Stdout => (
            "stdout",
            "stderr",
            test.output.as_ref(),
            &execution.stdout,
            &execution.stderr,
        ),
        MismatchStream::Stderr => (
            "stderr",
            "stdout",
            test.error.as_ref(),
            &execution.stderr,
            &execution.stdout,
        ),
    };
    let expected_text = expected_block.map(|block| block.text.as_str()).unwrap_or("");
    let rendered = diff::render(expected_text, actual_text, use_color);

    let mut notes = Notes::new();
    notes.push((format!("expected {label}"), Note::Text(rendered.expected)));
    notes.push((format!("actual {label}"), Note::Text(rendered.actual)));
    if let Some(legend) = rendered.legend {
        notes.push((
            "invisible characters in diff".to_string(),
            Note::Text(legend),
        ));
    }
    notes.push(("program".to_string(), Note::Text(test.program.value.clone())));
    notes.push((other_label.to_string(), Note::Text(other_text.clone())));
    notes.extend(normalized_locations(test));
    notes
}

fn stdin_payload(test: &NormalizedTest) -> &str {
    if let Some(input) = &test.input {
        &input.text
    } else if let Some(check) = &test.check {
        &check.text
    } else {
        ""
    }
}

fn input_lang(test: &NormalizedTest) -> Option<&str> {
    if let Some(input) = &test.input {
        input.lang.as_deref()
    } else if let Some(check) = &test.check {
        check.lang.as_deref()
    } else {
        None
    }
}
