//! External command execution
//!
//! Installation strategies are plain data ([`CommandSpec`] lists); this module
//! is the only place that actually spawns processes. Tests substitute their own
//! [`CommandRunner`].

use colored::Colorize;
use std::fmt;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Run a script through `sh -c`
    pub fn sh(script: impl Into<String>) -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.into()],
        }
    }

    /// Run a script through `bash -c` (needed for nvm, which is bash-only)
    pub fn bash(script: impl Into<String>) -> Self {
        Self {
            program: "bash".to_string(),
            args: vec!["-c".to_string(), script.into()],
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("could not start command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("command exited with {status}")]
    Exit { status: String },
}

/// Runs external commands on behalf of the remediation engine
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run to completion, showing the command's output to the user
    async fn run(&self, command: &CommandSpec) -> Result<(), CommandError>;

    /// Run silently and return trimmed stdout on success
    async fn capture(&self, command: &CommandSpec) -> Option<String>;
}

/// Spawns real processes via tokio
///
/// No timeout is applied: a hung package manager blocks the run until the
/// user interrupts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<(), CommandError> {
        println!("{} {}", "Running:".dimmed(), command.to_string().yellow());

        let mut child = TokioCommand::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        if let (Some(stdout), Some(stderr)) = (stdout, stderr) {
            let mut stdout_reader = BufReader::new(stdout).lines();
            let mut stderr_reader = BufReader::new(stderr).lines();
            let mut stdout_open = true;
            let mut stderr_open = true;

            while stdout_open || stderr_open {
                tokio::select! {
                    line = stdout_reader.next_line(), if stdout_open => {
                        match line {
                            Ok(Some(line)) => println!("  {}", line),
                            Ok(None) => stdout_open = false,
                            Err(e) => {
                                eprintln!("{} {}", "Error reading stdout:".red(), e);
                                stdout_open = false;
                            }
                        }
                    }
                    line = stderr_reader.next_line(), if stderr_open => {
                        match line {
                            Ok(Some(line)) => eprintln!("  {}", line.yellow()),
                            Ok(None) => stderr_open = false,
                            Err(e) => {
                                eprintln!("{} {}", "Error reading stderr:".red(), e);
                                stderr_open = false;
                            }
                        }
                    }
                }
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Exit {
                status: match status.code() {
                    Some(code) => format!("exit code {}", code),
                    None => "a signal".to_string(),
                },
            })
        }
    }

    async fn capture(&self, command: &CommandSpec) -> Option<String> {
        let output = TokioCommand::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if output.status.success() {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace_args() {
        let cmd = CommandSpec::sh("curl -fsSL https://example.com | bash -");
        assert_eq!(cmd.to_string(), "sh -c 'curl -fsSL https://example.com | bash -'");

        let cmd = CommandSpec::new("sudo", &["apt-get", "install", "-y", "nodejs"]);
        assert_eq!(cmd.to_string(), "sudo apt-get install -y nodejs");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_reports_exit_code() {
        let runner = SystemRunner;
        assert!(runner.run(&CommandSpec::sh("exit 0")).await.is_ok());

        let err = runner.run(&CommandSpec::sh("exit 3")).await.unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_capture() {
        let runner = SystemRunner;
        let out = runner.capture(&CommandSpec::sh("printf ' hello \\n'")).await;
        assert_eq!(out.as_deref(), Some("hello"));
        assert!(runner.capture(&CommandSpec::sh("exit 1")).await.is_none());
    }
}
