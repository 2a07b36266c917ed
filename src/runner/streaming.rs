//! Streaming support for command execution
//!
//! While a command runs, every line it writes to stdout or stderr is
//! delivered to an [`OutputCallback`]. The full output is still returned
//! in the final [`CommandOutput`](crate::runner::CommandOutput).
//!
//! # Example
//!
//! ```no_run
//! use sdt_ci::runner::{CommandInvocation, CommandRunner, OutputCallback, OutputStream, SubprocessRunner};
//!
//! struct LivePrinter;
//!
//! impl OutputCallback for LivePrinter {
//!     fn on_line(&self, stream: OutputStream, line: &str) {
//!         match stream {
//!             OutputStream::Stdout => println!("{}", line),
//!             OutputStream::Stderr => eprintln!("{}", line),
//!         }
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = SubprocessRunner::default();
//! let invocation = CommandInvocation::new("conda info");
//! let output = runner.run(&invocation, Some(&LivePrinter)).await?;
//! println!("exit code: {:?}", output.exit_code);
//! # Ok(())
//! # }
//! ```

use crate::runner::OutputStream;

/// Callback for output lines as they arrive
///
/// This trait is object-safe and can be used as `&dyn OutputCallback`.
pub trait OutputCallback: Send + Sync {
    /// Called once per line, without the trailing newline
    fn on_line(&self, stream: OutputStream, line: &str);
}
