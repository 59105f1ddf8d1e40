//! Subprocess execution for toolchain probes and builds.
//!
//! Every external program waldo starts is described by a [`ToolchainProcess`]
//! and started through a [`TaskRunner`]. Probes use [`TaskRunner::run`] and
//! capture output; builds use [`TaskRunner::execute`] and stream it.

use crate::io::IoStreams;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// How the child's environment relates to the parent's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    /// The child sees exactly the parent's environment.
    #[default]
    Inherit,
    /// The parent's environment plus these overrides.
    Extend(BTreeMap<String, String>),
    /// Only these variables.
    Replace(BTreeMap<String, String>),
}

/// A fully described external program invocation.
///
/// # Example
///
/// ```
/// use waldo_core::runner::ToolchainProcess;
///
/// let process = ToolchainProcess::new("xcodebuild", "/tmp/app")
///     .args(["-list", "-json"]);
/// assert_eq!(process.command_line(), "xcodebuild -list -json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainProcess {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub environment: Environment,
}

impl ToolchainProcess {
    pub fn new(executable: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            environment: Environment::Inherit,
        }
    }

    /// A shell command line run through the platform shell.
    pub fn shell(command: &str, working_dir: impl Into<PathBuf>) -> Self {
        if cfg!(target_os = "windows") {
            Self::new("cmd", working_dir).args(["/C", command])
        } else {
            Self::new("sh", working_dir).args(["-c", command])
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

    /// Adds an environment override, switching an inherited environment to
    /// an extended one.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self.environment {
            Environment::Inherit => {
                let mut vars = BTreeMap::new();
                vars.insert(key.into(), value.into());
                self.environment = Environment::Extend(vars);
            }
            Environment::Extend(vars) | Environment::Replace(vars) => {
                vars.insert(key.into(), value.into());
            }
        }
        self
    }

    /// Program name and arguments, for logs and error messages.
    pub fn command_line(&self) -> String {
        let program = self
            .executable
            .file_name()
            .unwrap_or(self.executable.as_os_str())
            .to_string_lossy();
        let mut line = program.into_owned();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args).current_dir(&self.working_dir);
        match &self.environment {
            Environment::Inherit => {}
            Environment::Extend(vars) => {
                cmd.envs(vars);
            }
            Environment::Replace(vars) => {
                cmd.env_clear().envs(vars);
            }
        }
        cmd
    }

    fn spawn_error(&self, source: io::Error) -> TaskError {
        TaskError::Spawn {
            command: self.command_line(),
            source,
        }
    }

    fn stream_error(&self, source: io::Error) -> TaskError {
        TaskError::Stream {
            command: self.command_line(),
            source,
        }
    }
}

/// Captured output of a probe, decoded and with trailing newlines removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Captured output of a probe, as raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Errors from starting or waiting on a child process.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("failed to start `{command}`: {source}. Ensure it is installed and on your PATH")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The child ran and exited unsuccessfully. `stderr` is empty when the
    /// output was streamed rather than captured.
    #[error("`{command}` exited with {}{}", describe_code(.code), describe_stderr(.stderr))]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error while running `{command}`: {source}")]
    Stream {
        command: String,
        #[source]
        source: io::Error,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl TaskError {
    pub fn code(&self) -> Option<i32> {
        match self {
            TaskError::Exit { code, .. } => *code,
            _ => None,
        }
    }
}

/// Starts external programs.
pub trait TaskRunner {
    /// Runs `process` to completion, capturing its output.
    ///
    /// The default decodes [`TaskRunner::run_raw`] lossily and strips
    /// trailing newlines.
    fn run(&self, process: &ToolchainProcess) -> Result<Output, TaskError> {
        let raw = self.run_raw(process)?;
        Ok(Output {
            stdout: trim_newlines(&raw.stdout),
            stderr: trim_newlines(&raw.stderr),
        })
    }

    /// Runs `process` to completion, capturing its output as bytes.
    fn run_raw(&self, process: &ToolchainProcess) -> Result<RawOutput, TaskError>;

    /// Runs `process` to completion, streaming its stdout and stderr into
    /// `io` as they are produced.
    fn execute(&self, process: &ToolchainProcess, io: &mut IoStreams) -> Result<(), TaskError>;
}

fn trim_newlines(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

/// [`TaskRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl TaskRunner for SystemRunner {
    fn run_raw(&self, process: &ToolchainProcess) -> Result<RawOutput, TaskError> {
        tracing::debug!(command = %process.command_line(), dir = %process.working_dir.display(), "running probe");
        let output = process
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| process.spawn_error(e))?;

        if !output.status.success() {
            return Err(TaskError::Exit {
                command: process.command_line(),
                code: output.status.code(),
                stderr: trim_newlines(&output.stderr).trim().to_string(),
            });
        }

        Ok(RawOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn execute(&self, process: &ToolchainProcess, io: &mut IoStreams) -> Result<(), TaskError> {
        tracing::debug!(command = %process.command_line(), dir = %process.working_dir.display(), "executing");
        let mut child = process
            .to_command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| process.spawn_error(e))?;

        let missing = || process.stream_error(io::Error::other("child output pipe unavailable"));
        let mut child_out = child.stdout.take().ok_or_else(missing)?;
        let mut child_err = child.stderr.take().ok_or_else(missing)?;

        let out = &mut io.out;
        let err = &mut io.err;
        let (copied_out, copied_err) = thread::scope(|scope| {
            let pump = scope.spawn(move || io::copy(&mut child_err, err));
            let copied_out = io::copy(&mut child_out, out);
            let copied_err = pump
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stderr pump panicked")));
            (copied_out, copied_err)
        });

        // Reap the child before reporting pipe errors.
        let status = child.wait().map_err(|e| process.stream_error(e))?;
        copied_out.map_err(|e| process.stream_error(e))?;
        copied_err.map_err(|e| process.stream_error(e))?;
        let _ = io.out.flush();
        let _ = io.err.flush();

        if !status.success() {
            return Err(TaskError::Exit {
                command: process.command_line(),
                code: status.code(),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_io;

    #[test]
    fn env_switches_inherit_to_extend() {
        let process = ToolchainProcess::new("npx", "/tmp").env("FORCE_BUNDLING", "1");
        let mut expected = BTreeMap::new();
        expected.insert("FORCE_BUNDLING".to_string(), "1".to_string());
        assert_eq!(process.environment, Environment::Extend(expected));
    }

    #[test]
    fn command_line_uses_program_name_and_quotes_spaces() {
        let process = ToolchainProcess::new("/work/android/gradlew", "/work/android")
            .args(["app:assembleDebug", "--console=plain"]);
        assert_eq!(
            process.command_line(),
            "gradlew app:assembleDebug --console=plain"
        );

        let hook = ToolchainProcess::new("sh", "/tmp").args(["-c", "echo hi"]);
        assert_eq!(hook.command_line(), "sh -c \"echo hi\"");
    }

    #[test]
    fn exit_error_reports_status_and_stderr() {
        let err = TaskError::Exit {
            command: "xcodebuild -list -json".into(),
            code: Some(65),
            stderr: "no project".into(),
        };
        assert_eq!(err.code(), Some(65));
        assert_eq!(
            err.to_string(),
            "`xcodebuild -list -json` exited with status 65: no project"
        );
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let process = ToolchainProcess::new("waldo-definitely-not-installed", ".");
        let err = SystemRunner.run(&process).unwrap_err();
        assert!(matches!(err, TaskError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn run_trims_trailing_newlines() {
        let process = ToolchainProcess::shell("printf 'hello\\n\\n'", ".");
        let output = SystemRunner.run(&process).unwrap();
        assert_eq!(output.stdout, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn run_raw_keeps_stdout_byte_for_byte() {
        let process = ToolchainProcess::shell("printf 'x\\n\\n'", ".");
        let raw = SystemRunner.run_raw(&process).unwrap();
        assert_eq!(raw.stdout, b"x\n\n".to_vec());
        assert_eq!(SystemRunner.run(&process).unwrap().stdout, "x");
    }

    #[cfg(unix)]
    #[test]
    fn run_reports_exit_status_with_trimmed_stderr() {
        let process = ToolchainProcess::shell("echo broken >&2; exit 3", ".");
        match SystemRunner.run(&process).unwrap_err() {
            TaskError::Exit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn execute_streams_both_pipes() {
        let (mut io, out, err) = test_io("");
        let process = ToolchainProcess::shell("echo to-out; echo to-err >&2", ".");
        SystemRunner.execute(&process, &mut io).unwrap();
        assert_eq!(out.contents(), "to-out\n");
        assert_eq!(err.contents(), "to-err\n");
    }

    #[cfg(unix)]
    #[test]
    fn execute_passes_environment_overrides() {
        let (mut io, out, _err) = test_io("");
        let process = ToolchainProcess::shell("echo $FORCE_BUNDLING", ".").env("FORCE_BUNDLING", "1");
        SystemRunner.execute(&process, &mut io).unwrap();
        assert_eq!(out.contents(), "1\n");
    }

    #[cfg(unix)]
    #[test]
    fn execute_reports_exit_status() {
        let (mut io, _out, _err) = test_io("");
        let process = ToolchainProcess::shell("exit 7", ".");
        let err = SystemRunner.execute(&process, &mut io).unwrap_err();
        assert_eq!(err.code(), Some(7));
    }

    #[test]
    fn resolve_in_keeps_absolute_paths() {
        let base = Path::new("/work");
        assert_eq!(resolve_in(base, Path::new("ios")), PathBuf::from("/work/ios"));
        assert_eq!(resolve_in(base, Path::new("/abs")), PathBuf::from("/abs"));
    }
}
