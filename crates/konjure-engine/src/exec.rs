//! External command runner
//!
//! Readers describe the tool invocation they need as an [`ExternalCommand`];
//! running it captures stdout and turns failures into
//! [`EngineError::ExternalCommandFailed`] with the tool's stderr.

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{EngineError, Result};

/// A single invocation of an external tool
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    tool: String,
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    current_dir: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ExternalCommand {
    /// `tool` is the name used in errors, `program` the executable to run
    pub fn new(tool: impl Into<String>, program: impl AsRef<Path>) -> Self {
        Self {
            tool: tool.into(),
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            stdin: None,
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

    /// Add a flag and its value when the value is non-empty
    pub fn flag(self, flag: &str, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.arg(flag).arg(value)
        }
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Bytes written to the child's stdin
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Arguments as strings (lossy), useful for logging and tests
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn get_env(&self, key: &str) -> Option<String> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.to_string_lossy().into_owned())
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn get_stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    /// The command line as it would be typed in a shell
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.arg_strings());
        parts.join(" ")
    }

    /// Run to completion and return stdout
    pub fn output(&self) -> Result<Vec<u8>> {
        tracing::debug!(tool = %self.tool, command = %self.command_line(), "running external command");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;

        // Feed stdin from a separate thread so a chatty child cannot block on a full stdout pipe
        let writer = match (child.stdin.take(), self.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(std::thread::spawn(move || pipe.write_all(&input))),
            _ => None,
        };

        let output = child.wait_with_output()?;
        let written = writer.map(|writer| writer.join());

        // A failing tool may exit before reading its input; its stderr matters more
        if !output.status.success() {
            return Err(EngineError::ExternalCommandFailed {
                tool: self.tool.clone(),
                code: output.status.code(),
                stderr: strip_stderr(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        match written {
            Some(Ok(Err(err))) if err.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(err.into());
            }
            Some(Err(_)) => {
                return Err(EngineError::ExternalCommandFailed {
                    tool: self.tool.clone(),
                    code: None,
                    stderr: "failed to write standard input".to_string(),
                });
            }
            _ => {}
        }

        Ok(output.stdout)
    }

    /// Run and decode stdout as UTF-8 text
    pub fn output_string(&self) -> Result<String> {
        let stdout = self.output()?;
        String::from_utf8(stdout).map_err(|e| EngineError::ExternalCommandFailed {
            tool: self.tool.clone(),
            code: None,
            stderr: format!("output is not valid UTF-8: {}", e),
        })
    }

    fn spawn_error(&self, err: std::io::Error) -> EngineError {
        if err.kind() == std::io::ErrorKind::NotFound {
            EngineError::ToolNotFound {
                tool: self.tool.clone(),
                program: self.program.to_string_lossy().into_owned(),
            }
        } else {
            EngineError::Io(err)
        }
    }
}

/// Trim whitespace and the conventional `Error: ` prefix tools print
fn strip_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    trimmed
        .strip_prefix("Error: ")
        .or_else(|| trimmed.strip_prefix("error: "))
        .unwrap_or(trimmed)
        .to_string()
}
