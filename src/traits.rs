//! Seams between the suites and the processes they drive.

use crate::errors::Result;
use crate::process::ProcessResult;

/// Runs one invocation of the CLI under test.
///
/// Implemented by [`crate::process::ProcessRunner`]; tests substitute a mock
/// to exercise [`crate::session::CliSession`] without a binary.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Runs with `args` passed verbatim as the argument vector.
    fn run_command(&self, args: Vec<String>) -> Result<ProcessResult>;
}
