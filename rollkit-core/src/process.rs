//! Process-execution collaborator contract.

use std::path::Path;

use crate::error::Result;

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with `args` in `cwd` and captures its output.
    ///
    /// A non-zero exit is reported through `CommandOutput::success`; only a
    /// failure to launch is an error.
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput>;
}
