//! Runs external commands on the host.

use std::path::Path;
use std::process::{Command, Stdio};

use rollkit_core::error::{Error, Result};
use rollkit_core::process::{CommandOutput, ProcessRunner};
use tracing::{debug, info};

/// Spawns commands with captured output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcess;

impl SystemProcess {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemProcess {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        info!("→ {} {} (in {})", program, args.join(" "), cwd.display());

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::TaskExecution {
                package: cwd.display().to_string(),
                task: program.to_string(),
                message: format!("failed to launch: {}", e),
            })?;

        debug!(program, status = ?output.status.code(), "command finished");

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs a command and turns a non-zero exit into an error.
pub(crate) fn run_checked(
    process: &dyn ProcessRunner,
    program: &str,
    args: &[String],
    cwd: &Path,
) -> Result<CommandOutput> {
    let output = process.run(program, args, cwd)?;
    if !output.success {
        return Err(Error::TaskExecution {
            package: cwd.display().to_string(),
            task: format!("{} {}", program, args.join(" ")),
            message: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}
