use std::io::{self, Write};
use std::process::{ChildStdout, Stdio};

/// The stream a stage reads from, i.e. whatever the previous stage produced.
#[derive(Debug)]
pub(crate) enum StageInput {
    /// The shell's own standard input; what the first stage of a segment gets.
    Inherit,
    /// Output of a builtin, fully materialized.
    Buffer(Vec<u8>),
    /// Read end of an external process's stdout.
    Pipe(ChildStdout),
}

impl StageInput {
    /// Convert this input into a [`Stdio`] for `std::process::Command`.
    ///
    /// A buffer cannot be handed to a child directly: the child gets a pipe and
    /// the bytes are returned so the caller can feed them in.
    pub(crate) fn into_stdio(self) -> (Stdio, Option<Vec<u8>>) {
        match self {
            StageInput::Inherit => (Stdio::inherit(), None),
            StageInput::Buffer(bytes) => (Stdio::piped(), Some(bytes)),
            StageInput::Pipe(stdout) => (Stdio::from(stdout), None),
        }
    }

    /// Copy the stream into `sink` until EOF and return the number of bytes moved.
    ///
    /// `Inherit` is never drained: a chain made only of empty stages produces no output.
    pub(crate) fn drain_into(self, sink: &mut dyn Write) -> io::Result<u64> {
        let copied = match self {
            StageInput::Inherit => 0,
            StageInput::Buffer(bytes) => {
                sink.write_all(&bytes)?;
                bytes.len() as u64
            }
            StageInput::Pipe(mut stdout) => io::copy(&mut stdout, sink)?,
        };
        sink.flush()?;
        Ok(copied)
    }
}
