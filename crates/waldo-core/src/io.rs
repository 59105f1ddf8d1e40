//! Input and output streams shared by prompts, progress output and streamed
//! subprocess output.

use std::io::{self, BufRead, Write};

/// The three streams a command interacts with.
///
/// Prompts read from `input` and write to `out`. Streamed build output goes
/// to `out` and `err`. Tests substitute in-memory buffers.
pub struct IoStreams {
    input: Box<dyn BufRead>,
    pub out: Box<dyn Write + Send>,
    pub err: Box<dyn Write + Send>,
}

impl IoStreams {
    pub fn new(
        input: impl BufRead + 'static,
        out: impl Write + Send + 'static,
        err: impl Write + Send + 'static,
    ) -> Self {
        Self {
            input: Box::new(input),
            out: Box::new(out),
            err: Box::new(err),
        }
    }

    /// Streams attached to the process's stdin, stdout and stderr.
    pub fn system() -> Self {
        Self::new(io::stdin().lock(), io::stdout(), io::stderr())
    }

    /// Reads one line of input without its line terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}
