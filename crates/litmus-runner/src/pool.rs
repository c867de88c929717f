//! Bounded-concurrency test dispatch.
//!
//! The coordinating thread validates specs, applies the skip policy, and
//! feeds runnable tests to a pool of worker threads over an mpsc queue.
//! Workers pull jobs in declaration order; completions flow back on a result
//! channel that only the coordinator drains, so result processing (reporting,
//! counters) never interleaves.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use litmus_core::error::Note;
use litmus_core::spec::RawTest;
use litmus_core::validate::{validate, NormalizedTest};

use crate::exec::{evaluate, run_subprocess, Outcome, TestContext};

/// Outcome of one test slot, tagged with its declaration index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub index: usize,
    pub name: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Maximum subprocesses in flight at once.
    pub jobs: usize,
    pub use_color: bool,
}

/// Aggregate counts for the summary trailer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("result channel closed before all tests finished")]
    ResultsTruncated,
    #[error("write report: {0}")]
    Report(String),
}

/// Default job count: one per host core.
#[must_use]
pub fn default_jobs() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

struct Job {
    index: usize,
    test: NormalizedTest,
}

/// Run every test and hand each completion to `emit` as it arrives.
///
/// Emission order is completion order; the reporter's reorder buffer is what
/// turns that back into declaration order. If any test is marked `only`,
/// every unmarked test is skipped without validation or execution.
pub fn run_tests<F>(
    tests: Vec<(String, RawTest)>,
    options: &RunOptions,
    mut emit: F,
) -> Result<RunStats, EngineError>
where
    F: FnMut(TestResult) -> std::io::Result<()>,
{
    let total = tests.len();
    let mut stats = RunStats {
        total,
        ..RunStats::default()
    };
    let any_only = tests.iter().any(|(_, raw)| !raw.only.is_empty());

    let mut immediate = Vec::new();
    let mut runnable = Vec::new();
    for (index, (name, raw)) in tests.into_iter().enumerate() {
        if any_only && raw.only.is_empty() {
            immediate.push(TestResult {
                index,
                name,
                outcome: Outcome::Skip,
            });
            continue;
        }
        match validate(&name, &raw) {
            Ok(test) => runnable.push(Job { index, test }),
            Err(invalid) => immediate.push(TestResult {
                index,
                name,
                outcome: Outcome::Fail {
                    reason: invalid.reason,
                    notes: invalid.notes,
                },
            }),
        }
    }

    let pending = runnable.len();
    let (result_tx, result_rx) = mpsc::channel::<TestResult>();
    let mut handles = Vec::new();

    if !runnable.is_empty() {
        let worker_count = options.jobs.max(1).min(pending);
        let (work_tx, work_rx) = mpsc::channel::<Job>();
        let work_rx = Arc::new(Mutex::new(work_rx));
        for _ in 0..worker_count {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let use_color = options.use_color;
            handles.push(thread::spawn(move || {
                worker_loop(&work_rx, &result_tx, total, use_color);
            }));
        }
        // Submission order is declaration order.
        for job in runnable {
            if work_tx.send(job).is_err() {
                break;
            }
        }
    }
    drop(result_tx);

    for result in immediate {
        count(&mut stats, &result.outcome);
        emit(result).map_err(|err| EngineError::Report(err.to_string()))?;
    }
    for _ in 0..pending {
        let result = result_rx.recv().map_err(|_| EngineError::ResultsTruncated)?;
        count(&mut stats, &result.outcome);
        emit(result).map_err(|err| EngineError::Report(err.to_string()))?;
    }

    for handle in handles {
        let _ = handle.join();
    }

    Ok(stats)
}

fn count(stats: &mut RunStats, outcome: &Outcome) {
    match outcome {
        Outcome::Pass => stats.passed += 1,
        Outcome::Fail { .. } => stats.failed += 1,
        Outcome::Skip => stats.skipped += 1,
    }
}

fn worker_loop(
    work_rx: &Arc<Mutex<mpsc::Receiver<Job>>>,
    result_tx: &mpsc::Sender<TestResult>,
    total: usize,
    use_color: bool,
) {
    loop {
        let job = {
            let Ok(guard) = work_rx.lock() else {
                return;
            };
            match guard.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };

        let ctx = TestContext {
            index: job.index,
            total,
            name: &job.test.name,
            use_color,
        };
        let outcome = match run_subprocess(&job.test, &ctx) {
            Ok(execution) => evaluate(&job.test, &execution, use_color),
            Err(err) => Outcome::Fail {
                reason: "program could not be run".to_string(),
                notes: vec![
                    (
                        "program".to_string(),
                        Note::Text(job.test.program.value.clone()),
                    ),
                    ("error".to_string(), Note::Text(err.to_string())),
                ],
            },
        };

        let result = TestResult {
            index: job.index,
            name: job.test.name.clone(),
            outcome,
        };
        if result_tx.send(result).is_err() {
            return;
        }
    }
}
