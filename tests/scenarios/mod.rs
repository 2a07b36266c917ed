//! Scenario tests for matrix runs

mod fail_fast;
mod lint_passes;
mod matrix;
mod provisioning;
mod triggers;
