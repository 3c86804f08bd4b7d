//! External process execution
//!
//! Runs one external command to completion and captures its output. Child
//! processes are killed if the awaiting future is dropped (run timeout).

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, or -1 when the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short human readable reason for a failed invocation
    pub fn failure_reason(&self) -> String {
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };

        if detail.is_empty() {
            format!("exit code {}", self.exit_code)
        } else {
            format!("exit code {}: {}", self.exit_code, last_lines(detail, 5))
        }
    }
}

/// Builder for an external command invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, OsString)>,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Creates a command from a command line (program followed by arguments)
    pub fn new(command_line: &[String]) -> io::Result<Self> {
        let (program, args) = command_line.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty command line")
        })?;

        Ok(Self::program(program.clone()).args(args.iter().cloned()))
    }

    /// Creates a command for a program without arguments
    pub fn program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.current_dir = dir;
        self
    }

    /// Command line as it would be typed in a shell (environment omitted)
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the command to completion
    ///
    /// # Errors
    /// Only when the process cannot be spawned; a non-zero exit is reported
    /// through [`ToolOutput::exit_code`].
    pub async fn run(self) -> io::Result<ToolOutput> {
        debug!("Running: {}", self.display());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| {
            io::Error::new(e.kind(), format!("failed to run '{}': {}", self.program, e))
        })?;

        let result = ToolOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.stdout.trim().is_empty() {
            debug!("{} stdout: {}", self.program, result.stdout.trim());
        }
        if !result.stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, result.stderr.trim());
        }
        debug!("{} exited with code {}", self.program, result.exit_code);

        Ok(result)
    }
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(count)..].join(" | ")
}
