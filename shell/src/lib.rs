//! A small line-oriented shell core.
//!
//! One input line is split into background segments (`&`) and piped stages (`|`).
//! Each stage is either a builtin (`cd`, `pwd`, `echo`, `ps`, `kill`) run inline, or an
//! external program spawned with its stdin wired to the previous stage's output.
//! Every segment but the last runs in a duplicated process; the last one runs in the
//! caller and its output is written to a caller-supplied sink.
//!
//! The main entry point is [`Interpreter`]. [`parser`] and [`command`] expose the
//! splitting and stage resolution steps on their own.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
mod external;
mod interpreter;
mod io_adapters;
pub mod job;
pub mod parser;
mod pipeline;

pub use command::{ExitCode, Target, resolve};
pub use env::Environment;
pub use error::{ErrorKind, ShellError, StageError};
pub use external::find_command_path;
pub use interpreter::{EXIT_LINE, Interpreter, is_exit_line};
pub use job::{Job, JobState, JobTable};
pub use parser::{ParsedLine, Segment, Stage, parse_line};
