use crate::config::AppConfig;
use crate::errors::DeskpackError;
use crate::logging::append_run_log;
use crate::runtime::{ProcessRequest, ProcessRunner};
use crate::types::BuildScope;
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapOutcome {
    Created {
        executable: PathBuf,
        size_bytes: u64,
    },
    ToolMissing {
        tool: PathBuf,
    },
    Failed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// The tool exists but the OS refused to start it.
    LaunchFailed {
        tool: PathBuf,
        message: String,
    },
}

impl WrapOutcome {
    pub fn executable(&self) -> Option<&PathBuf> {
        match self {
            Self::Created { executable, .. } => Some(executable),
            _ => None,
        }
    }
}

/// Drives the Launch4j console wrapper with its XML config.
pub struct Launch4jClient<'a> {
    runner: &'a dyn ProcessRunner,
    cfg: &'a AppConfig,
    scope: &'a BuildScope,
}

impl<'a> Launch4jClient<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, cfg: &'a AppConfig, scope: &'a BuildScope) -> Self {
        Self { runner, cfg, scope }
    }

    pub fn wrap_executable(&self) -> Result<WrapOutcome, DeskpackError> {
        let tool = self.scope.resolve(&self.cfg.wrapper.tool);
        if !tool.is_file() {
            append_run_log(
                "warn",
                "wrapper.tool_missing",
                json!({ "tool": tool.display().to_string() }),
            );
            return Ok(WrapOutcome::ToolMissing { tool });
        }

        let config_file = self.scope.resolve(&self.cfg.wrapper.config_file);
        let executable = self.scope.resolve(&self.cfg.wrapper.output_executable);
        // A leftover executable from an earlier run must not pass for fresh output.
        if executable.exists() {
            std::fs::remove_file(&executable)
                .map_err(|e| DeskpackError::Io(format!("{}: {e}", executable.display())))?;
        }
        let request = ProcessRequest {
            program: tool.display().to_string(),
            args: vec![config_file.display().to_string()],
            cwd: Some(self.scope.project_root.clone()),
        };
        append_run_log(
            "info",
            "wrapper.started",
            json!({ "command": request.command_line() }),
        );
        let out = match self.runner.run(request) {
            Ok(out) => out,
            Err(DeskpackError::Process(message)) => {
                append_run_log(
                    "error",
                    "wrapper.failed",
                    json!({
                        "tool": tool.display().to_string(),
                        "launch_error": message,
                    }),
                );
                return Ok(WrapOutcome::LaunchFailed { tool, message });
            }
            Err(error) => return Err(error),
        };

        if out.exit_code != 0 || !executable.is_file() {
            append_run_log(
                "error",
                "wrapper.failed",
                json!({
                    "exit_code": out.exit_code,
                    "executable_exists": executable.is_file(),
                    "stdout": out.stdout,
                    "stderr": out.stderr,
                }),
            );
            return Ok(WrapOutcome::Failed {
                exit_code: out.exit_code,
                stdout: out.stdout,
                stderr: out.stderr,
            });
        }

        let size_bytes = std::fs::metadata(&executable)
            .map_err(|e| DeskpackError::Io(e.to_string()))?
            .len();
        append_run_log(
            "info",
            "wrapper.created",
            json!({
                "executable": executable.display().to_string(),
                "size_bytes": size_bytes,
            }),
        );
        Ok(WrapOutcome::Created {
            executable,
            size_bytes,
        })
    }
}
