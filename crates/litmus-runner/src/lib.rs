//! Run-time half of litmus: subprocess execution under bounded concurrency
//! and declaration-ordered TAP reporting.
//!
//! The engine dispatches validated tests onto a worker pool and hands
//! completions, in whatever order they arrive, to the reporter; the
//! reporter's reorder buffer restores declaration order without serializing
//! execution.

pub mod diff;
pub mod exec;
pub mod pool;
pub mod reorder;
pub mod report;

pub use exec::{Execution, Outcome, TestContext};
pub use pool::{default_jobs, run_tests, EngineError, RunOptions, RunStats, TestResult};
pub use reorder::ReorderBuffer;
pub use report::Reporter;
