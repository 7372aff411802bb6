//! External command surface of the web server.
//!
//! # Responsibilities
//! - Define the capability calls the synchronizer needs (`ApacheControl`)
//! - Run the configured privileged commands with a hard timeout
//! - Capture output verbatim so failures can be shown to an operator
//!
//! # Design Decisions
//! - Commands are argv templates, never passed through a shell
//! - `{file}` in a template is replaced by the config file name
//! - A timed-out child is killed, and the expiry is its own error kind

use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::observability::metrics;

/// Placeholder substituted with the `<domain>.conf` file name.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout if the command wrote any, stderr otherwise.
    ///
    /// `apachectl configtest` reports "Syntax OK" on stderr, so callers that
    /// only look at stdout would lose it.
    pub fn text(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Errors from invoking an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no command configured for {0}")]
    NotConfigured(&'static str),

    #[error("failed to run `{command}`: {source}")]
    Spawn { command: String, source: io::Error },

    #[error("`{command}` timed out after {}s", .timeout.as_secs_f32())]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` failed ({}): {}", describe_exit(.code), .output.text().trim())]
    Failed {
        command: String,
        code: Option<i32>,
        output: CommandOutput,
    },
}

impl CommandError {
    /// Captured output, when the command got far enough to produce any.
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            CommandError::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "killed by signal".to_string(),
    }
}

/// The capability calls the synchronizer makes against the web server.
#[async_trait]
pub trait ApacheControl: Send + Sync {
    /// Activate `<file>` from the available directory.
    async fn enable_site(&self, file: &str) -> Result<CommandOutput, CommandError>;

    /// Deactivate `<file>`.
    async fn disable_site(&self, file: &str) -> Result<CommandOutput, CommandError>;

    /// Gracefully reload the server so it picks up changes.
    async fn reload(&self) -> Result<CommandOutput, CommandError>;

    /// Run the server's configuration self-check.
    async fn test_config(&self) -> Result<CommandOutput, CommandError>;
}

/// Argv templates for each capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplates {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
    pub reload: Vec<String>,
    pub test: Vec<String>,
}

/// [`ApacheControl`] backed by real processes.
#[derive(Debug, Clone)]
pub struct CommandControl {
    templates: CommandTemplates,
    timeout: Duration,
}

impl CommandControl {
    pub fn new(templates: CommandTemplates, timeout: Duration) -> Self {
        Self { templates, timeout }
    }

    async fn run(
        &self,
        name: &'static str,
        template: &[String],
        file: Option<&str>,
    ) -> Result<CommandOutput, CommandError> {
        let argv: Vec<String> = template
            .iter()
            .map(|arg| match file {
                Some(file) => arg.replace(FILE_PLACEHOLDER, file),
                None => arg.clone(),
            })
            .collect();
        let (program, args) = argv
            .split_first()
            .ok_or(CommandError::NotConfigured(name))?;
        let command_line = argv.join(" ");

        tracing::debug!(command = %command_line, "Running web server command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        metrics::record_command(name, started);

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandError::Spawn {
                    command: command_line,
                    source,
                })
            }
            Err(_) => {
                tracing::warn!(command = %command_line, timeout = ?self.timeout, "Web server command timed out");
                return Err(CommandError::Timeout {
                    command: command_line,
                    timeout: self.timeout,
                });
            }
        };

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            Ok(captured)
        } else {
            Err(CommandError::Failed {
                command: command_line,
                code: output.status.code(),
                output: captured,
            })
        }
    }
}

#[async_trait]
impl ApacheControl for CommandControl {
    async fn enable_site(&self, file: &str) -> Result<CommandOutput, CommandError> {
        self.run("enable-site", &self.templates.enable, Some(file)).await
    }

    async fn disable_site(&self, file: &str) -> Result<CommandOutput, CommandError> {
        self.run("disable-site", &self.templates.disable, Some(file)).await
    }

    async fn reload(&self) -> Result<CommandOutput, CommandError> {
        self.run("reload-server", &self.templates.reload, None).await
    }

    async fn test_config(&self) -> Result<CommandOutput, CommandError> {
        self.run("test-config", &self.templates.test, None).await
    }
}
