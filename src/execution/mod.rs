//! Workflow execution engine

pub mod engine;
pub mod executor;
pub mod scheduler;
pub mod workspace;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{ExecutionResult, StepExecutor};
pub use scheduler::{MatrixScheduler, RunOptions, SchedulingStrategy, WorkflowRun};
pub use workspace::Workspace;
