use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use crate::error::SraError;

/// Captured result of an external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turns a non-zero exit into `CommandFailed`, keeping the output otherwise.
    pub fn check(self, program: &Path) -> Result<Self, SraError> {
        if self.success() {
            return Ok(self);
        }
        let stderr = self.stderr.trim();
        let message = if stderr.is_empty() {
            "no error output".to_string()
        } else {
            stderr.to_string()
        };
        Err(SraError::CommandFailed {
            program: program.display().to_string(),
            code: self
                .code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            message,
        })
    }
}

pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, SraError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, SraError> {
        (**self).run(program, args, cwd)
    }
}

/// Runs commands with `std::process`, capturing both output streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, SraError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => SraError::MissingTool(program.display().to_string()),
            _ => SraError::CommandFailed {
                program: program.display().to_string(),
                code: "spawn".to_string(),
                message: err.to_string(),
            },
        })?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
