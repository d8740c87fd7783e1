use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::{ShellError, StageError};
use crate::job::{self, JobTable};
use crate::parser::parse_line;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result};
use std::io::{self, Write};

/// Line that ends the read-loop.
pub const EXIT_LINE: &str = "exit";

/// True if `line` (with or without its trailing newline) is exactly [`EXIT_LINE`].
pub fn is_exit_line(line: &str) -> bool {
    line.strip_suffix('\n').unwrap_or(line) == EXIT_LINE
}

/// A minimal shell that runs lines of piped, optionally backgrounded commands.
///
/// The interpreter owns the [`Environment`] shared by every stage it dispatches and
/// the [`JobTable`] of processes it has not waited for.
///
/// Example
/// ```
/// use myshell::Interpreter;
/// let mut sh = Interpreter::new().unwrap();
/// let mut out = Vec::new();
/// let code = sh.run_line("echo hello world", &mut out).unwrap();
/// assert_eq!(code, 0);
/// assert_eq!(out, b"hello world\n");
/// ```
pub struct Interpreter {
    env: Environment,
    jobs: JobTable,
}

impl Interpreter {
    /// Create an interpreter from the current process environment.
    pub fn new() -> std::result::Result<Self, ShellError> {
        Ok(Self::with_environment(Environment::new()?))
    }

    pub fn with_environment(env: Environment) -> Self {
        Self {
            env,
            jobs: JobTable::default(),
        }
    }

    /// Run one input line, writing the foreground output to `out`.
    ///
    /// Blocks until the foreground segment completes. Background segments are started
    /// and left running.
    pub fn run_line(
        &mut self,
        line: &str,
        out: &mut dyn Write,
    ) -> std::result::Result<ExitCode, StageError> {
        self.jobs.reap();
        let parsed = parse_line(line);
        tracing::debug!(segments = parsed.segments().len(), "dispatching line");
        job::dispatch(&parsed, &mut self.env, &mut self.jobs, out)
    }

    pub fn prompt(&self) -> String {
        format!("myshell:{}$ ", self.env.current_dir.display())
    }

    /// Interactive Read-Eval-Print Loop on the terminal.
    ///
    /// Ends on `exit` or end of input. A failing line prints one diagnostic to stderr
    /// and the loop goes on.
    pub fn repl(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    if is_exit_line(&line) {
                        break;
                    }
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    let mut stdout = io::stdout();
                    if let Err(err) = self.run_line(&line, &mut stdout) {
                        eprintln!("myshell: {}", err);
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use std::path::PathBuf;

    fn shell_in(dir: PathBuf) -> Interpreter {
        Interpreter::with_environment(Environment::with_current_dir(dir))
    }

    fn run(sh: &mut Interpreter, line: &str) -> (std::result::Result<ExitCode, StageError>, String) {
        let mut out = Vec::new();
        let res = sh.run_line(line, &mut out);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_exit_line_is_exact() {
        assert!(is_exit_line("exit"));
        assert!(is_exit_line("exit\n"));
        assert!(!is_exit_line("exit 1"));
        assert!(!is_exit_line(" exit"));
    }

    #[test]
    fn test_cd_then_pwd_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let target = fs::canonicalize(tmp.path()).unwrap();
        let mut sh = shell_in(std::env::current_dir().unwrap());

        let (res, out) = run(&mut sh, &format!("cd {}", target.display()));
        assert_eq!(res.unwrap(), 0);
        assert!(out.is_empty());

        let (_, out) = run(&mut sh, "pwd");
        assert_eq!(out, format!("{}\n", target.display()));
        assert_eq!(sh.prompt(), format!("myshell:{}$ ", target.display()));
    }

    #[test]
    fn test_cd_failure_keeps_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sh = shell_in(tmp.path().to_path_buf());

        let (res, _) = run(&mut sh, "cd does-not-exist");
        let err = res.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
        assert!(err.to_string().starts_with("cd: "));

        let (res, _) = run(&mut sh, "cd a b");
        assert_eq!(res.unwrap_err().kind(), ErrorKind::InvalidArgument);

        let (_, out) = run(&mut sh, "pwd");
        assert_eq!(out, format!("{}\n", tmp.path().display()));
    }

    #[test]
    fn test_background_mutation_does_not_leak_across_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let start = fs::canonicalize(tmp.path()).unwrap();
        let mut sh = shell_in(start.clone());

        let (res, _) = run(&mut sh, "cd / &");
        assert_eq!(res.unwrap(), 0);

        let (_, out) = run(&mut sh, "pwd");
        assert_eq!(out, format!("{}\n", start.display()));
    }

    #[test]
    fn test_external_commands_see_shell_directory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("marker.txt"), b"found\n").unwrap();
        let mut sh = shell_in(std::env::current_dir().unwrap());

        run(&mut sh, &format!("cd {}", tmp.path().display())).0.unwrap();
        let (res, out) = run(&mut sh, "cat marker.txt | cat");

        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "found\n");
    }

    #[test]
    fn test_failing_line_does_not_poison_the_next() {
        let mut sh = Interpreter::new().unwrap();
        assert!(run(&mut sh, "no-such-command-31f0").0.is_err());
        let (res, out) = run(&mut sh, "echo still alive");
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, "still alive\n");
    }
}
