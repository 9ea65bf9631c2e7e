//! External command runner.
//!
//! Every toolchain invocation in the build goes through [`Cmd`]: it blocks
//! until the tool exits, captures its output, and classifies the two
//! failure modes callers care about (tool missing, tool failed).
//!
//! ```rust,ignore
//! use calendar_builder::process::Cmd;
//!
//! let result = Cmd::new("javac")
//!     .args(["-d", "build"])
//!     .arg_path(&source)
//!     .error_msg("javac failed")
//!     .run()?;
//! println!("{}", result.stdout);
//! ```

use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::StepError;

/// Captured outcome of a finished command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let mut out = String::new();
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        out.push_str(stdout);
        if !stdout.is_empty() && !stderr.is_empty() {
            out.push('\n');
        }
        out.push_str(stderr);
        out
    }

    /// First non-empty line of stdout, falling back to stderr.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}

/// Builder for a blocking external command.
#[derive(Debug)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    error_msg: Option<String>,
    allow_fail: bool,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            dir: None,
            envs: Vec::new(),
            error_msg: None,
            allow_fail: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Message prefixed to the error when the command exits nonzero.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Return the result instead of an error on nonzero exit.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd
    }

    /// Run to completion with captured output and null stdin.
    pub fn run(self) -> Result<CommandResult> {
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() && !self.allow_fail {
            return Err(self.exit_error(result.status, result.combined()));
        }
        Ok(result)
    }

    /// Run with inherited stdio so the user sees progress.
    pub fn run_interactive(self) -> Result<ExitStatus> {
        let status = self
            .command()
            .status()
            .map_err(|e| self.spawn_error(e))?;

        if !status.success() && !self.allow_fail {
            return Err(self.exit_error(status, String::new()));
        }
        Ok(status)
    }

    fn spawn_error(&self, err: std::io::Error) -> anyhow::Error {
        if err.kind() == ErrorKind::NotFound {
            anyhow::Error::new(StepError::MissingTool {
                tool: self.program_name(),
                hint: "not on PATH".to_string(),
            })
        } else {
            anyhow::Error::new(err).context(format!("spawning '{}'", self.program_name()))
        }
    }

    fn exit_error(&self, status: ExitStatus, diagnostics: String) -> anyhow::Error {
        let err = anyhow::Error::new(StepError::NonZeroExit {
            tool: self.program_name(),
            status: status.to_string(),
            diagnostics,
        });
        match &self.error_msg {
            Some(msg) => err.context(msg.clone()),
            None => err,
        }
    }
}

/// Resolve a tool on PATH.
pub fn which(tool: &str) -> Option<String> {
    which::which(tool)
        .ok()
        .map(|path| path.display().to_string())
}

/// Check if a tool resolves on PATH (or is an existing path).
pub fn exists(tool: &str) -> bool {
    Path::new(tool).is_file() || which(tool).is_some()
}

/// Fail with [`StepError::MissingTool`] unless `tool` resolves.
pub fn ensure_exists(tool: &str, hint: &str) -> Result<()> {
    if exists(tool) {
        return Ok(());
    }
    Err(StepError::MissingTool {
        tool: tool.to_string(),
        hint: hint.to_string(),
    })
    .with_context(|| format!("resolving '{}'", tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;

    #[test]
    fn test_exists() {
        assert!(exists("sh") || exists("cmd"));
        assert!(!exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_missing_tool_is_classified() {
        let err = Cmd::new("definitely_not_a_real_command_12345")
            .run()
            .unwrap_err();
        assert!(matches!(classify(&err), Some(StepError::MissingTool { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_carries_diagnostics() {
        let err = Cmd::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .error_msg("probe failed")
            .run()
            .unwrap_err();
        match classify(&err) {
            Some(StepError::NonZeroExit { diagnostics, .. }) => {
                assert_eq!(diagnostics, "broken");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(format!("{:#}", err).contains("probe failed"));
    }

    #[cfg(unix)]
    #[test]
    fn test_allow_fail_and_first_line() {
        let result = Cmd::new("sh")
            .args(["-c", "echo; echo 'openjdk 17' >&2; exit 1"])
            .allow_fail()
            .run()
            .unwrap();
        assert!(!result.success());
        assert_eq!(result.first_line(), Some("openjdk 17"));
    }
}
