// SPDX-License-Identifier: GPL-3.0-or-later

//! Line-based operator prompt.

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PromptError {
    /// The operator closed the input stream. Treated as aborting the run.
    #[error("prompt input closed")]
    Closed,
    #[error("prompt I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Synchronous request/response channel to the operator.
pub trait PromptChannel: Send {
    /// Print one informational line.
    fn show(&mut self, line: &str) -> Result<(), PromptError>;

    /// Print `prompt` and read one line of input, without its line ending.
    fn read_line(&mut self, prompt: &str) -> Result<String, PromptError>;

    /// Read a signed integer, re-prompting until the input parses.
    fn read_index(&mut self, prompt: &str) -> Result<i64, PromptError> {
        loop {
            let line = self.read_line(prompt)?;
            match line.trim().parse::<i64>() {
                Ok(value) => return Ok(value),
                Err(_) => {
                    debug!(target: "resolver", input = %line.trim(), "rejected non-integer input");
                    self.show("Please enter a whole number.")?;
                }
            }
        }
    }
}

/// Prompt channel over any reader/writer pair, stdin/stdout in the binary.
pub struct ConsoleChannel<R, W> {
    input: R,
    output: W,
}

impl ConsoleChannel<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleChannel<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R, W> PromptChannel for ConsoleChannel<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn show(&mut self, line: &str) -> Result<(), PromptError> {
        writeln!(self.output, "{line}")?;
        Ok(())
    }

    fn read_line(&mut self, prompt: &str) -> Result<String, PromptError> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut buffer = String::new();
        if self.input.read_line(&mut buffer)? == 0 {
            return Err(PromptError::Closed);
        }
        Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
    }
}
