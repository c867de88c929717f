//! Command-line surface of litmus.
//!
//! Parses flags, reads the document from a file or stdin, and maps the run
//! to the process exit-code contract: 0 success, 1 test failure, 2 fatal
//! format/usage error, 3 internal error.

use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use litmus_core::collect_specs;
use litmus_runner::{default_jobs, run_tests, Reporter, RunOptions};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_TEST_FAILURE: i32 = 1;
pub const EXIT_FORMAT_ERROR: i32 = 2;
pub const EXIT_INTERNAL_ERROR: i32 = 3;

const HOMEPAGE: &str = env!("CARGO_PKG_REPOSITORY");
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Run { file: Option<PathBuf>, jobs: usize },
    Version,
    Help,
}

/// Entry point for the binary: real stdio, color from terminal detection.
pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let use_color = std::io::stdout().is_terminal();
    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr().lock();
    run_with(&args, &mut stdin, &mut stdout, &mut stderr, use_color)
}

/// Testable entry point with injected streams.
pub fn run_with(
    args: &[String],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    use_color: bool,
) -> i32 {
    let command = match parse_args(args) {
        Ok(command) => command,
        Err(message) => {
            let _ = writeln!(stderr, "{message}");
            let _ = write_usage(stderr);
            return EXIT_FORMAT_ERROR;
        }
    };

    match command {
        Command::Version => {
            let _ = writeln!(stdout, "{VERSION}");
            EXIT_SUCCESS
        }
        Command::Help => {
            let _ = write_usage(stdout);
            EXIT_SUCCESS
        }
        Command::Run { file, jobs } => {
            let text = match read_input(file.as_deref(), stdin) {
                Ok(text) => text,
                Err(message) => {
                    let _ = writeln!(stderr, "{message}");
                    return EXIT_FORMAT_ERROR;
                }
            };
            match run_document(&text, jobs, stdout, use_color) {
                Ok(code) => code,
                Err(message) => {
                    let _ = writeln!(stderr, "{message}");
                    EXIT_INTERNAL_ERROR
                }
            }
        }
    }
}

/// Captured output of one in-process invocation, for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub fn run_for_test(args: &[&str], input: &str) -> CommandOutput {
    let owned_args: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
    let mut stdin = std::io::Cursor::new(input.as_bytes().to_vec());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit_code = run_with(&owned_args, &mut stdin, &mut stdout, &mut stderr, false);
    let stdout = match String::from_utf8(stdout) {
        Ok(value) => value,
        Err(err) => panic!("stdout should be utf-8: {err}"),
    };
    let stderr = match String::from_utf8(stderr) {
        Ok(value) => value,
        Err(err) => panic!("stderr should be utf-8: {err}"),
    };
    CommandOutput {
        stdout,
        stderr,
        exit_code,
    }
}

/// Parse, run, and report one document; the returned code is the process
/// exit code, and an `Err` is an internal failure.
fn run_document(
    text: &str,
    jobs: usize,
    out: &mut dyn Write,
    use_color: bool,
) -> Result<i32, String> {
    let write_failed = |err: std::io::Error| format!("write report: {err}");

    let mut reporter = Reporter::new(out, use_color);
    reporter.header().map_err(write_failed)?;

    let book = match collect_specs(text) {
        Ok(book) => book,
        Err(fatal) => {
            reporter.fatal(&fatal).map_err(write_failed)?;
            return Ok(EXIT_FORMAT_ERROR);
        }
    };

    let tests = book.into_tests();
    if tests.is_empty() {
        reporter.no_tests(HOMEPAGE).map_err(write_failed)?;
        return Ok(EXIT_SUCCESS);
    }

    reporter.plan(tests.len()).map_err(write_failed)?;
    let options = RunOptions { jobs, use_color };
    let stats = run_tests(tests, &options, |result| reporter.record(&result))
        .map_err(|err| err.to_string())?;
    reporter.summary(&stats).map_err(write_failed)?;

    Ok(if stats.failed > 0 {
        EXIT_TEST_FAILURE
    } else {
        EXIT_SUCCESS
    })
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut jobs = default_jobs();

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--jobs" => {
                index += 1;
                let Some(raw) = args.get(index) else {
                    return Err("Missing '--jobs' value (expected integer >= 1)".to_string());
                };
                jobs = match raw.parse::<usize>() {
                    Ok(value) if value >= 1 => value,
                    _ => {
                        return Err(format!(
                            "Invalid '--jobs' value '{raw}' (expected integer >= 1)"
                        ))
                    }
                };
            }
            "--version" => return Ok(Command::Version),
            "--help" => return Ok(Command::Help),
            other => files.push(PathBuf::from(other)),
        }
        index += 1;
    }

    if files.len() > 1 {
        let listing = files
            .iter()
            .map(|file| format!("- {}", file.display()))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(format!(
            "Too many files given.  Expected 1 max, got {}:\n{listing}",
            files.len()
        ));
    }

    Ok(Command::Run {
        file: files.pop(),
        jobs,
    })
}

fn read_input(file: Option<&Path>, stdin: &mut dyn Read) -> Result<String, String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| format!("read {}: {err}", path.display())),
        None => {
            let mut text = String::new();
            stdin
                .read_to_string(&mut text)
                .map_err(|err| format!("read stdin: {err}"))?;
            Ok(text)
        }
    }
}

fn write_usage(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "litmus [flags] [<file>]")?;
    writeln!(out, "  If no <file> given, reads stdin.")?;
    writeln!(out, "Options:")?;
    writeln!(
        out,
        "  --jobs <n>  How many tests may run in parallel  (default: # of CPU cores; here {})",
        default_jobs()
    )?;
    writeln!(out, "  --version   Show version number")?;
    writeln!(out, "  --help      Show help")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_defaults_to_stdin_and_core_count() {
        match parse_args(&[]) {
            Ok(Command::Run { file, jobs }) => {
                assert_eq!(file, None);
                assert!(jobs >= 1);
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn parse_args_accepts_a_single_file() {
        let args = vec!["README.md".to_string()];
        match parse_args(&args) {
            Ok(Command::Run { file, .. }) => {
                assert_eq!(file, Some(PathBuf::from("README.md")));
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn parse_args_rejects_multiple_files() {
        let args = vec!["a.md".to_string(), "b.md".to_string()];
        let Err(message) = parse_args(&args) else {
            panic!("expected an error");
        };
        assert!(message.contains("Too many files"));
        assert!(message.contains("a.md"));
        assert!(message.contains("b.md"));
    }

    #[test]
    fn parse_args_validates_jobs() {
        for bad in ["0", "-2", "many"] {
            let args = vec!["--jobs".to_string(), bad.to_string()];
            let Err(message) = parse_args(&args) else {
                panic!("expected an error for jobs={bad}");
            };
            assert!(message.contains("Invalid '--jobs' value"));
        }
    }

    #[test]
    fn parse_args_reads_jobs_value() {
        let args = vec!["--jobs".to_string(), "7".to_string(), "doc.md".to_string()];
        match parse_args(&args) {
            Ok(Command::Run { file, jobs }) => {
                assert_eq!(jobs, 7);
                assert_eq!(file, Some(PathBuf::from("doc.md")));
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }
}
