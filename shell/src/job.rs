use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::{ShellError, StageError};
use crate::io_adapters::StageInput;
use crate::parser::{ParsedLine, Segment};
use crate::pipeline::Pipeline;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork, setpgid};
use std::io::Write;
use std::process::Child;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum JobState {
    Running,
    Completed,
}

/// A background segment running in its own duplicated process.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Job {
    pub pid: i32,
    pub state: JobState,
    /// Known once the job is reaped; `None` if it was reaped elsewhere.
    pub exit_code: Option<ExitCode>,
}

/// Processes the shell started but does not wait for in the foreground:
/// background jobs, and stages detached from an aborted pipeline.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    detached: Vec<Child>,
}

impl JobTable {
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn detached_count(&self) -> usize {
        self.detached.len()
    }

    fn track(&mut self, pid: Pid) {
        self.jobs.push(Job {
            pid: pid.as_raw(),
            state: JobState::Running,
            exit_code: None,
        });
    }

    pub(crate) fn detach(&mut self, child: Child) {
        self.detached.push(child);
    }

    /// Collect every finished process without blocking.
    ///
    /// Completed jobs are removed from the table and returned.
    pub fn reap(&mut self) -> Vec<Job> {
        for job in self.jobs.iter_mut() {
            match waitpid(Pid::from_raw(job.pid), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => {
                    job.state = JobState::Completed;
                    job.exit_code = Some(code);
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    job.state = JobState::Completed;
                    job.exit_code = Some(128 + signal as i32);
                }
                Ok(_) => {}
                Err(Errno::ECHILD) => job.state = JobState::Completed,
                Err(e) => tracing::warn!(pid = job.pid, error = %e, "waitpid failed"),
            }
        }
        let (done, running): (Vec<Job>, Vec<Job>) = self
            .jobs
            .iter()
            .partition(|job| job.state == JobState::Completed);
        self.jobs = running;
        for job in &done {
            tracing::debug!(pid = job.pid, exit_code = ?job.exit_code, "background job completed");
        }

        self.detached
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
        done
    }
}

/// Run every segment of `line`: all but the last in the background, the last in the caller.
///
/// Returns the foreground segment's result. Background segments never block or fail
/// their siblings; a segment that cannot be started is only logged.
pub(crate) fn dispatch(
    line: &ParsedLine,
    env: &mut Environment,
    jobs: &mut JobTable,
    sink: &mut dyn Write,
) -> Result<ExitCode, StageError> {
    for segment in line.background() {
        if segment.is_noop() {
            continue;
        }
        match spawn_background(segment, env, jobs, sink) {
            Ok(pid) => tracing::debug!(pid, "background job started"),
            Err(error) => tracing::warn!(%error, "background segment not started"),
        }
    }

    match line.foreground() {
        Some(segment) => Pipeline::new(env, jobs).run(segment, StageInput::Inherit, sink),
        None => Ok(0),
    }
}

/// Duplicate the shell and run `segment` in the copy.
///
/// The parent announces `[pid]` on `sink` and returns at once. The child owns a copy of
/// `env`, so nothing it changes is seen by the parent. The child leads its own process
/// group, so a terminal interrupt aimed at the foreground does not reach it.
fn spawn_background(
    segment: &Segment,
    env: &mut Environment,
    jobs: &mut JobTable,
    sink: &mut dyn Write,
) -> Result<i32, ShellError> {
    // anything still buffered would otherwise be written twice
    sink.flush().map_err(ShellError::Stream)?;

    // SAFETY: the child only runs the segment and then exits; it never returns to the caller.
    match unsafe { fork() }.map_err(ShellError::Fork)? {
        ForkResult::Parent { child } => {
            // set from both sides; whichever runs first wins the race
            if let Err(e) = setpgid(child, child) {
                tracing::debug!(pid = child.as_raw(), error = %e, "setpgid from parent failed");
            }
            jobs.track(child);
            writeln!(sink, "[{}]", child).map_err(ShellError::Stream)?;
            Ok(child.as_raw())
        }
        ForkResult::Child => run_forked(segment, env, sink),
    }
}

fn run_forked(segment: &Segment, env: &mut Environment, sink: &mut dyn Write) -> ! {
    if let Err(e) = setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
        tracing::debug!(error = %e, "setpgid in background job failed");
    }
    let mut jobs = JobTable::default();
    let code = match Pipeline::new(env, &mut jobs).run(segment, StageInput::Inherit, sink) {
        Ok(code) => code,
        Err(error) => {
            tracing::debug!(%error, "background segment failed");
            1
        }
    };
    let _ = writeln!(sink, "[{}] Done", std::process::id());
    let _ = sink.flush();
    std::process::exit(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use nix::unistd::getpgid;
    use std::fs;
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    fn reap_until_done(jobs: &mut JobTable) -> Vec<Job> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut done = Vec::new();
        while !jobs.jobs().is_empty() && Instant::now() < deadline {
            done.extend(jobs.reap());
            thread::sleep(Duration::from_millis(20));
        }
        done
    }

    #[test]
    fn test_background_cd_does_not_leak() {
        let tmp = tempfile::tempdir().unwrap();
        let start = fs::canonicalize(tmp.path()).unwrap();
        let mut env = Environment::with_current_dir(start.clone());
        let mut jobs = JobTable::default();
        let mut out = Vec::new();

        let res = dispatch(&parse_line("cd / & pwd"), &mut env, &mut jobs, &mut out);

        assert_eq!(res.unwrap(), 0);
        assert_eq!(env.current_dir, start);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().last(), Some(start.to_str().unwrap()));
        assert!(out.starts_with('['));

        let done = reap_until_done(&mut jobs);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].state, JobState::Completed);
        assert_eq!(done[0].exit_code, Some(0));
    }

    #[test]
    fn test_failing_background_segment_exits_nonzero() {
        let mut env = Environment::new().unwrap();
        let mut jobs = JobTable::default();
        let mut out = Vec::new();

        let res = dispatch(
            &parse_line("no-such-command-77ab & echo fg"),
            &mut env,
            &mut jobs,
            &mut out,
        );

        assert_eq!(res.unwrap(), 0);
        assert!(String::from_utf8(out).unwrap().ends_with("fg\n"));
        let done = reap_until_done(&mut jobs);
        assert_eq!(done[0].exit_code, Some(1));
    }

    #[test]
    fn test_background_job_leads_its_own_process_group() {
        let mut env = Environment::new().unwrap();
        let mut jobs = JobTable::default();
        let mut out = Vec::new();

        dispatch(&parse_line("sleep 1 & true"), &mut env, &mut jobs, &mut out).unwrap();

        let job = Pid::from_raw(jobs.jobs()[0].pid);
        let job_group = getpgid(Some(job)).unwrap();
        assert_eq!(job_group, job);
        assert_ne!(job_group, getpgid(None).unwrap());

        reap_until_done(&mut jobs);
    }

    #[test]
    fn test_noop_background_segments_are_skipped() {
        let mut env = Environment::new().unwrap();
        let mut jobs = JobTable::default();
        let mut out = Vec::new();

        let res = dispatch(&parse_line(" & & echo hi"), &mut env, &mut jobs, &mut out);

        assert_eq!(res.unwrap(), 0);
        assert!(jobs.jobs().is_empty());
        assert_eq!(String::from_utf8(out).unwrap(), "hi\n");
    }

    #[test]
    fn test_empty_line_runs_nothing() {
        let mut env = Environment::new().unwrap();
        let mut jobs = JobTable::default();
        let mut out = Vec::new();
        let res = dispatch(&parse_line("   "), &mut env, &mut jobs, &mut out);
        assert_eq!(res.unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_reap_collects_detached_children() {
        let mut jobs = JobTable::default();
        let mut child = Command::new("true").spawn().unwrap();
        while child.try_wait().unwrap().is_none() {
            thread::sleep(Duration::from_millis(10));
        }
        jobs.detach(child);
        jobs.reap();
        assert_eq!(jobs.detached_count(), 0);
    }
}
