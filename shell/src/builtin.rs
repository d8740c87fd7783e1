use crate::command::{ExitCode, Target};
use crate::env::Environment;
use crate::error::ShellError;
use argh::{EarlyExit, FromArgs};
use nix::sys::signal::{self, Signal};
use nix::unistd::{AccessFlags, Pid, access};
use std::fs;
use std::io::{self, Write};
use sysinfo::System;

/// Built-in commands known to the shell at compile time.
///
/// Builtins run in-process, synchronously, and write into the stage's output buffer.
/// None of them read their input stream.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Build the command from its arguments. Most builtins delegate to [`argh`].
    fn parse(args: &[&str]) -> Result<Self, EarlyExit>;

    /// Executes the command against the shell environment.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode, ShellError>;
}

/// Parse and run builtin `T`.
///
/// `--help` prints usage and succeeds; any other parse failure is an
/// [`ShellError::InvalidArgument`] carrying argh's first message line.
fn run<T: BuiltinCommand>(
    args: &[String],
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> Result<ExitCode, ShellError> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::parse(&args) {
        Ok(cmd) => cmd.execute(stdout, env),
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => {
            stdout.write_all(output.as_bytes()).map_err(ShellError::Stream)?;
            Ok(0)
        }
        Err(EarlyExit {
            output,
            status: Err(()),
        }) => Err(ShellError::InvalidArgument(
            output.lines().next().unwrap_or_default().to_owned(),
        )),
    }
}

/// Execute a builtin target. Non-builtin targets do nothing here.
pub(crate) fn execute(
    target: &Target,
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> Result<ExitCode, ShellError> {
    match target {
        Target::ChangeDirectory(args) => run::<Cd>(args, stdout, env),
        Target::PrintWorkingDirectory(args) => run::<Pwd>(args, stdout, env),
        Target::Echo(args) => run::<Echo>(args, stdout, env),
        Target::ListProcesses(args) => run::<Ps>(args, stdout, env),
        Target::Terminate(args) => run::<Kill>(args, stdout, env),
        Target::NoOp | Target::ExternalCommand { .. } => Ok(0),
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode, ShellError> {
        let meta = fs::metadata(&env.current_dir).map_err(ShellError::Environment)?;
        if !meta.is_dir() {
            return Err(ShellError::Environment(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is no longer a directory", env.current_dir.display()),
            )));
        }
        writeln!(stdout, "{}", env.current_dir.display()).map_err(ShellError::Stream)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub targets: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode, ShellError> {
        let [target] = self.targets.as_slice() else {
            return Err(ShellError::InvalidArgument(format!(
                "expected exactly one directory, got {}",
                self.targets.len()
            )));
        };

        // join keeps absolute targets as they are
        let new_dir = env.current_dir.join(target);
        let canonical = fs::canonicalize(&new_dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                ShellError::PathNotFound(new_dir.clone())
            }
            _ => ShellError::Environment(e),
        })?;
        if !canonical.is_dir() {
            return Err(ShellError::InvalidArgument(format!(
                "{} is not a directory",
                canonical.display()
            )));
        }
        // a directory without search permission cannot be the working directory
        access(&canonical, AccessFlags::X_OK)
            .map_err(|e| ShellError::Environment(io::Error::from(e)))?;

        env.set_var("PWD", canonical.to_string_lossy());
        env.current_dir = canonical;
        Ok(0)
    }
}

/// Write the arguments to standard output, separated by single spaces.
///
/// Arguments are never interpreted as flags.
pub struct Echo {
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Echo {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode, ShellError> {
        writeln!(stdout, "{}", self.args.join(" ")).map_err(ShellError::Stream)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List running processes as "PID<tab>CMD" lines.
pub struct Ps {
    #[argh(switch, short = 'A')]
    /// list every process, not only the ones started by the shell's parent.
    pub all: bool,
}

impl BuiltinCommand for Ps {
    fn name() -> &'static str {
        "ps"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode, ShellError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ShellError::Enumeration(
                "process table is not available on this platform".to_string(),
            ));
        }
        let mut system = System::new();
        system.refresh_processes();
        if system.processes().is_empty() {
            return Err(ShellError::Enumeration("process table is empty".to_string()));
        }

        let parent = sysinfo::Pid::from_u32(std::os::unix::process::parent_id());
        let mut rows: Vec<(u32, &str)> = system
            .processes()
            .values()
            .filter(|p| self.all || p.parent() == Some(parent))
            .map(|p| (p.pid().as_u32(), p.name()))
            .collect();
        rows.sort_unstable_by_key(|(pid, _)| *pid);

        let mut write_rows = || -> io::Result<()> {
            writeln!(stdout, "PID\tCMD")?;
            for (pid, name) in &rows {
                writeln!(stdout, "{}\t{}", pid, name)?;
            }
            Ok(())
        };
        write_rows().map_err(ShellError::Stream)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Send an interrupt (SIGINT) to each given process.
pub struct Kill {
    #[argh(positional)]
    /// ids of the processes to interrupt.
    pub pids: Vec<String>,
}

impl BuiltinCommand for Kill {
    fn name() -> &'static str {
        "kill"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode, ShellError> {
        if self.pids.is_empty() {
            return Err(ShellError::InvalidArgument(
                "expected at least one process id".to_string(),
            ));
        }
        // validate everything before the first signal goes out
        let pids = self
            .pids
            .iter()
            .map(|raw| match raw.parse::<i32>() {
                Ok(pid) if pid > 0 => Ok(pid),
                _ => Err(ShellError::InvalidArgument(format!(
                    "`{}` is not a process id",
                    raw
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        for pid in pids {
            signal::kill(Pid::from_raw(pid), Signal::SIGINT)
                .map_err(|source| ShellError::SignalDelivery { pid, source })?;
            tracing::debug!(pid, "sent SIGINT");
        }
        Ok(0)
    }
}
