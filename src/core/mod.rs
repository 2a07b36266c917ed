//! Core domain models for workflows
//!
//! This module defines the fundamental data structures that represent
//! workflows, their trigger and matrix configuration, jobs and steps.

pub mod config;
pub mod context;
pub mod job;
pub mod lint;
pub mod matrix;
pub mod state;
pub mod step;
pub mod trigger;

pub use context::*;
pub use job::*;
pub use state::*;
pub use step::*;
