use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use crate::io_adapters::StageInput;
use std::ffi::OsStr;
use std::io::{self, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Component, Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

/// Command that is not a builtin.
pub(crate) struct ExternalCommand {
    name: String,
    args: Vec<String>,
}

/// A launched external stage: the process plus the thread feeding it a builtin's output, if any.
pub(crate) struct Spawned {
    pub(crate) name: String,
    pub(crate) child: Child,
    feeder: Option<JoinHandle<io::Result<()>>>,
}

impl ExternalCommand {
    pub(crate) fn new(name: String, args: Vec<String>) -> Self {
        Self { name, args }
    }

    /// Start the process with `input` as its stdin and a pipe as its stdout.
    ///
    /// Does not wait for the process. The returned [`StageInput`] is the read end of
    /// its stdout, ready to be wired into the next stage.
    pub(crate) fn spawn(
        self,
        input: StageInput,
        env: &Environment,
    ) -> Result<(Spawned, StageInput), ShellError> {
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let Some(executable) = find_command_path(
            OsStr::new(search_paths),
            &env.current_dir,
            Path::new(&self.name),
        ) else {
            return Err(ShellError::Spawn {
                name: self.name,
                source: io::Error::new(io::ErrorKind::NotFound, "command not found"),
            });
        };

        let (stdin, pending) = input.into_stdio();
        let spawned = Command::new(&executable)
            .arg0(&self.name)
            .args(&self.args)
            .envs(env.vars.iter())
            .current_dir(&env.current_dir)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                return Err(ShellError::Spawn {
                    name: self.name,
                    source,
                });
            }
        };
        tracing::debug!(name = %self.name, pid = child.id(), path = %executable.display(), "spawned");

        let feeder = match (pending, child.stdin.take()) {
            (Some(bytes), Some(mut stdin)) => {
                Some(thread::spawn(move || stdin.write_all(&bytes)))
            }
            _ => None,
        };
        let output = match child.stdout.take() {
            Some(stdout) => StageInput::Pipe(stdout),
            None => StageInput::Buffer(Vec::new()),
        };

        Ok((
            Spawned {
                name: self.name,
                child,
                feeder,
            },
            output,
        ))
    }
}

impl Spawned {
    /// Block until the process exits and return its exit code.
    pub(crate) fn wait(mut self) -> io::Result<ExitCode> {
        let status = self.child.wait()?;
        if let Some(feeder) = self.feeder.take() {
            match feeder.join() {
                Ok(Err(e)) if e.kind() != io::ErrorKind::BrokenPipe => {
                    tracing::warn!(name = %self.name, error = %e, "feeding stdin failed");
                }
                Err(_) => tracing::warn!(name = %self.name, "stdin feeder panicked"),
                _ => {}
            }
        }
        Ok(exit_code(status))
    }

    /// Give up on the process without waiting: hand the child back to the caller
    /// so it can be reaped later.
    pub(crate) fn detach(self) -> Child {
        self.child
    }
}

fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    if let Some(signal) = exit_status.signal() {
        128 + signal
    } else if exit_status.core_dumped() {
        255
    } else {
        -1
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is a file.
/// - Relative with several components (`bin/sh`, `./foo`, `../x`): resolved against `cwd`.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first match. Relative PATH entries are taken relative to `cwd`.
/// - Empty path: returns `None`.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return find_by_path(path);
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(Component::Normal(name)), None) => find_in_path(search_paths, cwd, name),
        _ => find_by_path(&cwd.join(path)),
    }
}

fn find_in_path(search_paths: &OsStr, cwd: &Path, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths).find_map(|dir| find_by_path(&cwd.join(dir).join(cmd)))
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    path.is_file().then(|| path.to_path_buf())
}
