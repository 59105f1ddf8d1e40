//! Test doubles: in-memory streams and a scripted task runner.

use crate::io::IoStreams;
use crate::runner::{RawOutput, TaskError, TaskRunner, ToolchainProcess};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

/// A cloneable in-memory writer.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streams reading from `input`, plus handles onto what was written.
pub fn test_io(input: &str) -> (IoStreams, SharedBuf, SharedBuf) {
    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let io = IoStreams::new(
        Cursor::new(input.as_bytes().to_vec()),
        out.clone(),
        err.clone(),
    );
    (io, out, err)
}

enum Scripted {
    Stdout(String),
    Exit(i32),
}

/// Replays canned responses keyed by [`ToolchainProcess::command_line`] and
/// records every process it is asked to start.
///
/// Unscripted probes fail with exit status 1; unscripted `execute` calls
/// succeed.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: BTreeMap<String, Scripted>,
    calls: RefCell<Vec<ToolchainProcess>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, command_line: &str, stdout: &str) -> Self {
        self.responses
            .insert(command_line.to_string(), Scripted::Stdout(stdout.to_string()));
        self
    }

    pub fn fail(mut self, command_line: &str, code: i32) -> Self {
        self.responses
            .insert(command_line.to_string(), Scripted::Exit(code));
        self
    }

    pub fn calls(&self) -> Vec<ToolchainProcess> {
        self.calls.borrow().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(ToolchainProcess::command_line)
            .collect()
    }

    fn record(&self, process: &ToolchainProcess) -> Option<&Scripted> {
        self.calls.borrow_mut().push(process.clone());
        self.responses.get(&process.command_line())
    }

    fn exit(process: &ToolchainProcess, code: i32, stderr: &str) -> TaskError {
        TaskError::Exit {
            command: process.command_line(),
            code: Some(code),
            stderr: stderr.to_string(),
        }
    }
}

impl TaskRunner for ScriptedRunner {
    fn run_raw(&self, process: &ToolchainProcess) -> Result<RawOutput, TaskError> {
        match self.record(process) {
            Some(Scripted::Stdout(stdout)) => Ok(RawOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
            }),
            Some(Scripted::Exit(code)) => Err(Self::exit(process, *code, "scripted failure")),
            None => Err(Self::exit(process, 1, "no scripted response")),
        }
    }

    fn execute(&self, process: &ToolchainProcess, _io: &mut IoStreams) -> Result<(), TaskError> {
        match self.record(process) {
            Some(Scripted::Exit(code)) => Err(Self::exit(process, *code, "")),
            _ => Ok(()),
        }
    }
}
