//! Helpers shared by every toolchain builder.
//!
//! [`BuildContext`] bundles the task runner, the I/O surface and the
//! verbosity flag, and turns task-runner failures into the right
//! [`WaldoError`] kind:
//!
//! - read-only probes fail with [`WaldoError::IntrospectionFailed`]
//! - streamed builds fail with [`WaldoError::BuildFailed`] carrying the
//!   child's exit status
//!
//! Verification helpers check the shape of the produced artifact.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::io::IoStreams;
use crate::runner::{Output, RawOutput, TaskError, TaskRunner, ToolchainProcess};
use crate::types::{Platform, WaldoError};

/// Everything a builder needs to talk to the outside world.
pub struct BuildContext<'a> {
    pub runner: &'a dyn TaskRunner,
    pub io: &'a mut IoStreams,
    pub verbose: bool,
}

impl<'a> BuildContext<'a> {
    pub fn new(runner: &'a dyn TaskRunner, io: &'a mut IoStreams) -> Self {
        Self {
            runner,
            io,
            verbose: false,
        }
    }

    /// Enables verbose toolchain output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Writes one line of progress to the output stream.
    pub fn say(&mut self, message: impl fmt::Display) -> Result<(), WaldoError> {
        writeln!(self.io.out, "{message}")?;
        Ok(())
    }

    /// Runs a read-only probe, capturing its output.
    pub fn probe(&mut self, process: &ToolchainProcess, what: &str) -> Result<Output, WaldoError> {
        tracing::debug!(command = %process.command_line(), "introspecting {what}");
        self.runner
            .run(process)
            .map_err(|e| WaldoError::introspection(what, e))
    }

    /// Runs a read-only probe whose stdout is parsed byte-for-byte.
    pub fn probe_raw(
        &mut self,
        process: &ToolchainProcess,
        what: &str,
    ) -> Result<RawOutput, WaldoError> {
        tracing::debug!(command = %process.command_line(), "introspecting {what}");
        self.runner
            .run_raw(process)
            .map_err(|e| WaldoError::introspection(what, e))
    }

    /// Runs a build step, streaming its output to the user.
    pub fn stream(&mut self, process: &ToolchainProcess, what: &str) -> Result<(), WaldoError> {
        if self.verbose {
            self.say(format_args!("  Running: {}", process.command_line()))?;
        }
        self.runner
            .execute(process, self.io)
            .map_err(|e| build_failed(what, e))
    }
}

fn build_failed(what: &str, err: TaskError) -> WaldoError {
    let code = err.code();
    let reason = match err {
        TaskError::Exit { stderr, .. } if !stderr.is_empty() => stderr,
        TaskError::Exit { .. } => "see the output above for details".to_string(),
        other => other.to_string(),
    };
    WaldoError::BuildFailed {
        what: what.to_string(),
        code,
        reason,
    }
}

/// Where and for which platform a builder operates.
#[derive(Debug, Clone, Copy)]
pub struct BuildTarget<'a> {
    /// Absolute path of the container.
    pub base_path: &'a Path,
    pub platform: Platform,
}

impl<'a> BuildTarget<'a> {
    pub fn new(base_path: &'a Path, platform: Platform) -> Self {
        Self {
            base_path,
            platform,
        }
    }
}

/// Verifies that an `.app` bundle was produced.
pub fn verify_app_bundle(path: &Path) -> Result<PathBuf, WaldoError> {
    if path.is_dir() {
        Ok(path.to_path_buf())
    } else {
        Err(WaldoError::ArtifactMissing {
            path: path.to_path_buf(),
            expected: "an .app directory",
        })
    }
}

/// Verifies that an `.apk` file was produced.
pub fn verify_apk_file(path: &Path) -> Result<PathBuf, WaldoError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(WaldoError::ArtifactMissing {
            path: path.to_path_buf(),
            expected: "an .apk file",
        })
    }
}

/// Upper-cases the first character: `freeDebug` becomes `FreeDebug`.
pub fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-cases the first character: `FreeDebug` becomes `freeDebug`.
pub fn lower_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The final path component, used when a toolchain reports no app name.
pub fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string())
}
