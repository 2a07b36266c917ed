//! sdt-ci - a matrix-driven CI runner for the sdt-python workflow

pub mod builtin;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::config::WorkflowConfig;
pub use core::matrix::{Matrix, MatrixInstance, OperatingSystem};
pub use core::trigger::{EventKind, TriggerEvent, TriggerSet};
pub use core::{ExecutionStatus, Job, JobContext, Step, StepState};
pub use execution::{
    ExecutionEngine, ExecutionEvent, MatrixScheduler, RunOptions, SchedulingStrategy, WorkflowRun,
};
pub use runner::{CommandInvocation, CommandOutput, CommandRunner, RunnerError, SubprocessRunner};
