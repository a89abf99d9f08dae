//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which executes commands
//! using `std::process::Command` with captured output. When a stdin
//! payload is present it is written from a dedicated thread so the child's
//! output pipes drain concurrently and a large archive stream cannot
//! deadlock against a full pipe buffer.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};
use which::which;

use super::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::error::VirtstageError;

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are logged but not executed,
/// and `execute()` returns `Ok(ExecutionResult { status: None, .. })`.
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if self.dry_run {
            tracing::info!("dry run: {}", spec.display());
            return Ok(ExecutionResult {
                status: None,
                stdout: Vec::new(),
                stderr: Vec::new(),
            });
        }

        let cmd = which(&spec.command).map_err(|_| VirtstageError::CommandNotFound {
            command: spec.command.clone(),
        })?;
        tracing::trace!("command found: {}: {}", spec.command, cmd.to_string_lossy());

        let mut command = Command::new(cmd);
        command.args(&spec.args);

        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }

        for (key, value) in &spec.env {
            command.env(key, value);
        }

        command.stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn command `{}`", spec.display()))?;

        tracing::trace!("spawned command: {}: pid={}", spec.command, child.id());

        let writer = match spec.stdin.clone() {
            Some(payload) => {
                let mut pipe = child
                    .stdin
                    .take()
                    .expect("stdin was configured as piped above");
                Some(thread::spawn(move || pipe.write_all(&payload)))
            }
            None => None,
        };

        let output = match child.wait_with_output() {
            Ok(o) => o,
            Err(e) => {
                return Err(VirtstageError::Execution {
                    command: spec.display(),
                    status: format!("failed to wait for command: {}", e),
                }
                .into());
            }
        };

        if let Some(handle) = writer {
            match handle.join() {
                // A child that exits before draining its stdin closes the
                // pipe; the resulting write error is reflected in the exit
                // status, not reported separately.
                Ok(Err(e)) => {
                    tracing::debug!("stdin writer finished with error: {}", e);
                }
                Ok(Ok(())) => {}
                Err(_) => {
                    return Err(VirtstageError::Execution {
                        command: spec.display(),
                        status: "stdin writer thread panicked".to_string(),
                    }
                    .into());
                }
            }
        }

        tracing::trace!(
            "executed command: {}: success={}",
            spec.command,
            output.status.success()
        );

        Ok(ExecutionResult {
            status: Some(output.status),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
